mod common;

use storefront_api::{
    dto::auth::{LoginRequest, RegisterRequest},
    error::AppError,
    models::{Provider, Role},
    oauth::GoogleProfile,
    services::{admin_service, auth_service},
};
use uuid::Uuid;

fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        name: name.into(),
        email: email.into(),
        password: password.into(),
    }
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn local_register_and_login() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let email = common::unique_email("local");

    let registered = auth_service::register_user(&state, register("Sara", &email, "secret123"))
        .await?
        .data
        .expect("auth");
    assert_eq!(registered.user.provider, Provider::Local);
    let claims = state.tokens.verify(&registered.token)?;
    assert_eq!(claims.role, Role::Shopper);

    let duplicate =
        auth_service::register_user(&state, register("Sara", &email.to_uppercase(), "secret123"))
            .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(ref msg)) if msg == "User already exists"));

    let wrong_password = auth_service::login_user(&state, login(&email, "nope1234")).await;
    let unknown = auth_service::login_user(&state, login(&common::unique_email("ghost"), "x")).await;
    match (wrong_password, unknown) {
        (Err(AppError::Unauthorized(a)), Err(AppError::Unauthorized(b))) => assert_eq!(a, b),
        other => panic!("expected two invalid-credential errors, got {other:?}"),
    }

    let logged_in = auth_service::login_user(&state, login(&email, "secret123"))
        .await?
        .data
        .expect("auth");
    assert_eq!(logged_in.user.id, registered.user.id);

    let me = auth_service::current_user(&state, &common::shopper(registered.user.id))
        .await?
        .data
        .expect("user");
    assert_eq!(me.email, email);
    Ok(())
}

#[tokio::test]
async fn google_sign_in_links_existing_local_account() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let email = common::unique_email("linked");
    let local = auth_service::register_user(&state, register("Omar", &email, "secret123"))
        .await?
        .data
        .expect("auth");

    let profile = GoogleProfile {
        id: format!("g-{}", Uuid::new_v4()),
        email: email.clone(),
        email_verified: true,
        name: Some("Omar G".into()),
        picture: Some("https://img.example/omar.png".into()),
    };
    let linked = auth_service::sign_in_with_google(&state, profile.clone()).await?;
    assert_eq!(linked.user.id, local.user.id);
    assert_eq!(linked.user.provider, Provider::Google);
    assert_eq!(linked.user.avatar_url, "https://img.example/omar.png");

    let again = auth_service::sign_in_with_google(&state, profile).await?;
    assert_eq!(again.user.id, local.user.id);

    let password_login = auth_service::login_user(&state, login(&email, "secret123")).await;
    assert!(
        matches!(password_login, Err(AppError::Unauthorized(ref msg)) if msg == "Please login with Google")
    );
    Ok(())
}

#[tokio::test]
async fn unverified_google_email_does_not_link_local_account() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let email = common::unique_email("unverified");
    let local = auth_service::register_user(&state, register("Sana", &email, "secret123"))
        .await?
        .data
        .expect("auth");

    let attempt = auth_service::sign_in_with_google(
        &state,
        GoogleProfile {
            id: format!("g-{}", Uuid::new_v4()),
            email: email.clone(),
            email_verified: false,
            name: Some("Not Sana".into()),
            picture: None,
        },
    )
    .await;
    assert!(matches!(attempt, Err(AppError::Unauthorized(_))));

    let still_local = auth_service::login_user(&state, login(&email, "secret123"))
        .await?
        .data
        .expect("auth");
    assert_eq!(still_local.user.id, local.user.id);
    assert_eq!(still_local.user.provider, Provider::Local);
    Ok(())
}

#[tokio::test]
async fn google_sign_in_creates_verified_shopper() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let email = common::unique_email("fresh");
    let auth = auth_service::sign_in_with_google(
        &state,
        GoogleProfile {
            id: format!("g-{}", Uuid::new_v4()),
            email: email.clone(),
            email_verified: true,
            name: None,
            picture: None,
        },
    )
    .await?;

    assert_eq!(auth.user.provider, Provider::Google);
    assert!(auth.user.is_verified);
    assert_eq!(auth.user.email, email);
    assert!(email.starts_with(&auth.user.name));
    Ok(())
}

#[tokio::test]
async fn admin_registration_needs_a_token_once_an_admin_exists() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let caller = common::admin();
    let email = common::unique_email("admin");

    let created = admin_service::register_admin(
        &state,
        Some(&caller),
        register("Ops", &email, "adminpass"),
    )
    .await?
    .data
    .expect("admin");
    assert_eq!(state.tokens.verify(&created.token)?.role, Role::Admin);

    let anonymous = admin_service::register_admin(
        &state,
        None,
        register("Intruder", &common::unique_email("intruder"), "adminpass"),
    )
    .await;
    assert!(matches!(anonymous, Err(AppError::Unauthorized(_))));

    let shopper = common::shopper(Uuid::new_v4());
    let as_shopper = admin_service::register_admin(
        &state,
        Some(&shopper),
        register("Intruder", &common::unique_email("intruder"), "adminpass"),
    )
    .await;
    assert!(matches!(as_shopper, Err(AppError::Forbidden)));

    let logged_in = admin_service::login_admin(&state, login(&email, "adminpass"))
        .await?
        .data
        .expect("admin");
    assert_eq!(logged_in.admin.id, created.admin.id);

    let bad = admin_service::login_admin(&state, login(&email, "wrongpass")).await;
    assert!(matches!(bad, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn concurrent_anonymous_admin_registrations_admit_at_most_one() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let (first, second) = tokio::join!(
        admin_service::register_admin(
            &state,
            None,
            register("First", &common::unique_email("boot-a"), "adminpass"),
        ),
        admin_service::register_admin(
            &state,
            None,
            register("Second", &common::unique_email("boot-b"), "adminpass"),
        ),
    );

    let admitted = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    assert!(admitted <= 1);
    for refused in [first, second].into_iter().filter_map(Result::err) {
        assert!(matches!(refused, AppError::Unauthorized(_)));
    }
    Ok(())
}

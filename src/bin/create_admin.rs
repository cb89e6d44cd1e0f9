//! Create an administrator, or reset the password and name of an existing one.
//!
//! Usage: `create_admin <email> <password> [name]`, falling back to `ADMIN_EMAIL`,
//! `ADMIN_PASSWORD` and `ADMIN_NAME`.

use anyhow::{Context, anyhow};
use storefront_api::{
    credentials::hash_password,
    db::{create_pool, run_migrations},
    dto::auth::RegisterRequest,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let mut args = std::env::args().skip(1);
    let email = args
        .next()
        .or_else(|| std::env::var("ADMIN_EMAIL").ok())
        .context("usage: create_admin <email> <password> [name]")?;
    let password = args
        .next()
        .or_else(|| std::env::var("ADMIN_PASSWORD").ok())
        .context("usage: create_admin <email> <password> [name]")?;
    let name = args
        .next()
        .or_else(|| std::env::var("ADMIN_NAME").ok())
        .unwrap_or_else(|| "Administrator".to_string());

    let registration = RegisterRequest {
        name,
        email,
        password,
    }
    .validate()
    .map_err(|err| anyhow!(err.to_string()))?;
    let password_hash = hash_password(&registration.password).map_err(|err| anyhow!(err.to_string()))?;

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let (id, created): (Uuid, bool) = sqlx::query_as(
        r#"
        INSERT INTO admins (id, name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                updated_at = NOW()
        RETURNING id, (xmax = 0) AS created
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&registration.name)
    .bind(&registration.email)
    .bind(password_hash)
    .fetch_one(&pool)
    .await?;
    pool.close().await;

    if created {
        println!("Created administrator {} ({id})", registration.email);
    } else {
        println!("Reset administrator {} ({id})", registration.email);
    }
    Ok(())
}

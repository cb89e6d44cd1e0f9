use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::record_admin_action,
    db::OrmConn,
    dto::products::{NewProduct, ProductChanges, ProductForm, ProductList},
    entity::{
        product_images::{
            ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages,
            Model as ImageModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    images::{delete_all, upload_all},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, ProductImage, ProductSummary},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Title => Column::Title,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();
    let mut images = images_by_product(&state.orm, &ids).await?;
    let items = rows
        .into_iter()
        .map(|model| {
            let gallery = images.remove(&model.id).unwrap_or_default();
            product_from_entity(model, gallery)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = find_product(&state.orm, id).await?;
    let images = images_for(&state.orm, id).await?;
    Ok(ApiResponse::success(
        "Product",
        product_from_entity(model, images),
        None,
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let (product, uploads) = form.into_new_product()?;

    let images = upload_all(state.images.as_ref(), uploads, &product.title).await?;

    let saved = match insert_product(&state.orm, product, &images).await {
        Ok(saved) => saved,
        Err(err) => {
            // The row never landed, so its uploads are orphans.
            delete_all(state.images.as_ref(), &images).await;
            return Err(err);
        }
    };

    tracing::info!(product_id = %saved.id, images = saved.images.len(), "product created");
    record_admin_action(
        &state.pool,
        user,
        "product_create",
        "products",
        serde_json::json!({ "product_id": saved.id, "title": saved.title }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created successfully",
        saved,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let (changes, uploads) = form.into_changes()?;

    let existing = find_product(&state.orm, id).await?;
    let old_images = images_for(&state.orm, id).await?;

    let replacement = if uploads.is_empty() {
        None
    } else {
        let alt_text = changes.title.clone().unwrap_or_else(|| existing.title.clone());
        Some(upload_all(state.images.as_ref(), uploads, &alt_text).await?)
    };

    let saved = match apply_changes(&state.orm, existing, changes, replacement.as_deref()).await
    {
        Ok(model) => model,
        Err(err) => {
            if let Some(images) = &replacement {
                delete_all(state.images.as_ref(), images).await;
            }
            return Err(err);
        }
    };

    let images = match replacement {
        Some(images) => {
            let failures = delete_all(state.images.as_ref(), &old_images).await;
            if failures > 0 {
                tracing::warn!(product_id = %id, failures, "old product images were not all removed");
            }
            images
        }
        None => old_images,
    };

    record_admin_action(
        &state.pool,
        user,
        "product_update",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated successfully",
        product_from_entity(saved, images),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<()>> {
    ensure_admin(user)?;
    find_product(&state.orm, id).await?;
    let images = images_for(&state.orm, id).await?;

    let failures = delete_all(state.images.as_ref(), &images).await;
    if failures > 0 {
        tracing::warn!(product_id = %id, failures, "some product images could not be deleted");
    }

    Products::delete_by_id(id).exec(&state.orm).await?;

    record_admin_action(
        &state.pool,
        user,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id, "image_delete_failures": failures }),
    )
    .await;

    Ok(ApiResponse::message("Product deleted successfully"))
}

/// Live title, price and first image for each product that still exists.
pub async fn summaries<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, ProductSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products = Products::find()
        .filter(Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;
    let mut images = images_by_product(conn, ids).await?;

    Ok(products
        .into_iter()
        .map(|product| {
            let image = images
                .remove(&product.id)
                .and_then(|gallery| gallery.into_iter().next())
                .map(|image| image.url);
            (
                product.id,
                ProductSummary {
                    id: product.id,
                    title: product.title,
                    price: product.price,
                    image,
                },
            )
        })
        .collect())
}

async fn find_product(db: &OrmConn, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

async fn images_for(db: &OrmConn, product_id: Uuid) -> AppResult<Vec<ProductImage>> {
    Ok(images_by_product(db, &[product_id])
        .await?
        .remove(&product_id)
        .unwrap_or_default())
}

async fn images_by_product<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<ProductImage>>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = ProductImages::find()
        .filter(ImageCol::ProductId.is_in(product_ids.iter().copied()))
        .order_by_asc(ImageCol::ProductId)
        .order_by_asc(ImageCol::Position)
        .all(conn)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.product_id)
            .or_default()
            .push(image_from_entity(row));
    }
    Ok(grouped)
}

async fn insert_product(
    db: &OrmConn,
    product: NewProduct,
    images: &[ProductImage],
) -> AppResult<Product> {
    let now = Utc::now();
    let txn = db.begin().await?;

    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(product.title),
        description: Set(product.description),
        price: Set(product.price),
        stock: Set(product.stock),
        category: Set(product.category),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    replace_images(&txn, model.id, images).await?;
    txn.commit().await?;

    Ok(product_from_entity(model, images.to_vec()))
}

async fn apply_changes(
    db: &OrmConn,
    existing: ProductModel,
    changes: ProductChanges,
    replacement: Option<&[ProductImage]>,
) -> AppResult<ProductModel> {
    let txn = db.begin().await?;
    let product_id = existing.id;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = changes.title {
        active.title = Set(title);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(price) = changes.price {
        active.price = Set(price);
    }
    if let Some(stock) = changes.stock {
        active.stock = Set(stock);
    }
    if let Some(category) = changes.category {
        active.category = Set(category);
    }
    active.updated_at = Set(Utc::now().into());
    let model = active.update(&txn).await?;

    if let Some(images) = replacement {
        ProductImages::delete_many()
            .filter(ImageCol::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        replace_images(&txn, product_id, images).await?;
    }

    txn.commit().await?;
    Ok(model)
}

async fn replace_images<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    images: &[ProductImage],
) -> AppResult<()> {
    if images.is_empty() {
        return Ok(());
    }
    let rows = images.iter().enumerate().map(|(position, image)| ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        position: Set(position as i32),
        external_id: Set(image.external_id.clone()),
        url: Set(image.url.clone()),
        alt_text: Set(image.alt_text.clone()),
    });
    ProductImages::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Escape `LIKE` metacharacters so search text matches literally. Postgres uses `\`
/// as the default escape character.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn image_from_entity(model: ImageModel) -> ProductImage {
    ProductImage {
        external_id: model.external_id,
        url: model.url,
        alt_text: model.alt_text,
    }
}

fn product_from_entity(model: ProductModel, images: Vec<ProductImage>) -> Product {
    Product {
        id: model.id,
        title: model.title,
        description: model.description,
        price: model.price,
        stock: model.stock,
        category: model.category,
        images,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50% off"), r"50\% off");
        assert_eq!(escape_like("a_b"), r"a\_b");
        assert_eq!(escape_like(r"C:\shop"), r"C:\\shop");
        assert_eq!(escape_like("plain text"), "plain text");
    }
}

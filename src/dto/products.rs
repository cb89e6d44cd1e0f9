use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    images::ImageUpload,
    models::Product,
};

pub const MAX_PRODUCT_IMAGES: usize = 5;
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

/// Multipart body accepted by product create and update. Documentation only.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ProductUpload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub category: Option<String>,
    /// Up to five image files.
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
}

/// Raw multipart fields as received, before any validation.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub category: Option<String>,
    pub images: Vec<ImageUpload>,
}

#[derive(Debug, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub stock: i32,
    pub category: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub category: Option<String>,
}

impl ProductForm {
    /// Store a text field by name. Unknown fields are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "price" => &mut self.price,
            "stock" => &mut self.stock,
            "category" => &mut self.category,
            _ => return,
        };
        *slot = Some(value);
    }

    pub fn push_image(&mut self, image: ImageUpload) -> AppResult<()> {
        if !image.content_type.starts_with("image/") {
            return Err(AppError::validation("Only image files are allowed"));
        }
        if self.images.len() >= MAX_PRODUCT_IMAGES {
            return Err(AppError::Validation(format!(
                "A product can have at most {MAX_PRODUCT_IMAGES} images"
            )));
        }
        self.images.push(image);
        Ok(())
    }

    pub fn into_new_product(self) -> AppResult<(NewProduct, Vec<ImageUpload>)> {
        let (Some(title), Some(description), Some(price)) = (
            text(self.title),
            text(self.description),
            text(self.price),
        ) else {
            return Err(AppError::validation(
                "Please provide title, description, and price",
            ));
        };

        let product = NewProduct {
            title,
            description,
            price: parse_price(&price)?,
            stock: text(self.stock).map(|s| parse_stock(&s)).transpose()?.unwrap_or(0),
            category: text(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        };
        Ok((product, self.images))
    }

    pub fn into_changes(self) -> AppResult<(ProductChanges, Vec<ImageUpload>)> {
        let changes = ProductChanges {
            title: text(self.title),
            description: text(self.description),
            price: text(self.price).map(|p| parse_price(&p)).transpose()?,
            stock: text(self.stock).map(|s| parse_stock(&s)).transpose()?,
            category: text(self.category),
        };
        Ok((changes, self.images))
    }
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_price(raw: &str) -> AppResult<i64> {
    let price: i64 = raw
        .parse()
        .map_err(|_| AppError::validation("Price must be a whole number"))?;
    if price < 0 {
        return Err(AppError::validation("Price cannot be negative"));
    }
    Ok(price)
}

fn parse_stock(raw: &str) -> AppResult<i32> {
    let stock: i32 = raw
        .parse()
        .map_err(|_| AppError::validation("Stock must be a whole number"))?;
    if stock < 0 {
        return Err(AppError::validation("Stock cannot be negative"));
    }
    Ok(stock)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(content_type: &str) -> ImageUpload {
        ImageUpload {
            file_name: "photo".into(),
            content_type: content_type.into(),
            bytes: vec![1, 2, 3],
        }
    }

    fn form(fields: &[(&str, &str)]) -> ProductForm {
        let mut form = ProductForm::default();
        for (name, value) in fields {
            form.set_field(name, value.to_string());
        }
        form
    }

    #[test]
    fn new_product_needs_title_description_and_price() {
        let err = form(&[("title", "Shoe"), ("price", "100")])
            .into_new_product()
            .unwrap_err();
        assert_eq!(err.to_string(), "Please provide title, description, and price");
    }

    #[test]
    fn category_and_stock_have_defaults() {
        let (product, images) = form(&[
            ("title", " Shoe "),
            ("description", "Running shoe"),
            ("price", "2500"),
        ])
        .into_new_product()
        .unwrap();

        assert_eq!(product.title, "Shoe");
        assert_eq!(product.price, 2500);
        assert_eq!(product.stock, 0);
        assert_eq!(product.category, DEFAULT_CATEGORY);
        assert!(images.is_empty());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(form(&[("title", "a"), ("description", "b"), ("price", "12.5")])
            .into_new_product()
            .is_err());
        assert!(form(&[("price", "-3")]).into_changes().is_err());
        assert!(form(&[("stock", "many")]).into_changes().is_err());
    }

    #[test]
    fn changes_keep_only_supplied_fields() {
        let (changes, _) = form(&[("price", "90"), ("category", ""), ("colour", "red")])
            .into_changes()
            .unwrap();
        assert_eq!(
            changes,
            ProductChanges {
                price: Some(90),
                ..ProductChanges::default()
            }
        );
    }

    #[test]
    fn only_five_images_are_accepted() {
        let mut form = ProductForm::default();
        for _ in 0..MAX_PRODUCT_IMAGES {
            form.push_image(image("image/png")).unwrap();
        }
        assert!(form.push_image(image("image/png")).is_err());
    }

    #[test]
    fn non_image_files_are_rejected() {
        let mut form = ProductForm::default();
        let err = form.push_image(image("application/pdf")).unwrap_err();
        assert_eq!(err.to_string(), "Only image files are allowed");
    }
}

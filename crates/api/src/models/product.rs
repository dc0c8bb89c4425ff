//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use shopfront_core::{Price, ProductId, Quantity};

/// Maximum length of a product title.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length of a search keyword.
pub const MAX_KEYWORD_LENGTH: usize = 100;

/// Largest stock count a product can hold (the `INTEGER` column limit).
#[allow(clippy::cast_sign_loss)] // i32::MAX is positive
pub const MAX_STOCK: u32 = i32::MAX as u32;

/// A catalog entry (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub brand: String,
    /// List price.
    pub price: Price,
    /// Discounted price, if the product is on sale.
    pub sale_price: Option<Price>,
    /// Units available for checkout.
    pub total_stock: u32,
    /// Media host URL of the product image.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The price a shopper pays per unit right now.
    ///
    /// A sale price only applies when it undercuts the list price.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        effective_price(self.price, self.sale_price)
    }

    /// Whether `quantity` units can be taken from stock.
    #[must_use]
    pub const fn has_stock_for(&self, quantity: Quantity) -> bool {
        self.total_stock >= quantity.get()
    }
}

/// Effective unit price given a list price and an optional sale price.
#[must_use]
pub fn effective_price(price: Price, sale_price: Option<Price>) -> Price {
    match sale_price {
        Some(sale) if sale < price => sale,
        _ => price,
    }
}

/// Payload for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    pub price: Price,
    #[serde(default)]
    pub sale_price: Option<Price>,
    pub total_stock: u32,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
}

impl NewProduct {
    /// Trim text fields and check required ones.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.title = validate_title(&self.title)?;
        validate_stock(self.total_stock)?;
        self.description = self.description.trim().to_string();
        self.category = self.category.trim().to_lowercase();
        self.brand = self.brand.trim().to_lowercase();
        self.image_url = self.image_url.and_then(non_empty);
        Ok(self)
    }
}

/// Partial update of a product. Absent fields are left unchanged.
///
/// `salePrice: null` clears the sale price; omitting it keeps the current one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "present")]
    pub sale_price: Option<Option<Price>>,
    pub total_stock: Option<u32>,
    #[serde(default, alias = "image", deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
}

impl ProductUpdate {
    /// Trim text fields and check the ones that are present.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        if let Some(title) = &self.title {
            self.title = Some(validate_title(title)?);
        }
        if let Some(stock) = self.total_stock {
            validate_stock(stock)?;
        }
        self.description = self.description.map(|d| d.trim().to_string());
        self.category = self.category.map(|c| c.trim().to_lowercase());
        self.brand = self.brand.map(|b| b.trim().to_lowercase());
        self.image_url = self.image_url.map(|url| url.and_then(non_empty));
        Ok(self)
    }

    /// Apply the present fields to `product`.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(title) = &self.title {
            product.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            product.description.clone_from(description);
        }
        if let Some(category) = &self.category {
            product.category.clone_from(category);
        }
        if let Some(brand) = &self.brand {
            product.brand.clone_from(brand);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(sale_price) = self.sale_price {
            product.sale_price = sale_price;
        }
        if let Some(stock) = self.total_stock {
            product.total_stock = stock;
        }
        if let Some(image_url) = &self.image_url {
            product.image_url.clone_from(image_url);
        }
    }
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_stock(stock: u32) -> Result<(), String> {
    if stock > MAX_STOCK {
        return Err(format!("totalStock must be at most {MAX_STOCK}"));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("title is required".to_string());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!("title must be at most {MAX_TITLE_LENGTH} characters"));
    }
    Ok(title.to_string())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Listing order for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ProductSort {
    #[serde(rename = "price-lowtohigh")]
    PriceLowToHigh,
    #[serde(rename = "price-hightolow")]
    PriceHighToLow,
    #[default]
    #[serde(rename = "title-atoz")]
    TitleAToZ,
    #[serde(rename = "title-ztoa")]
    TitleZToA,
}

/// Catalog listing filter. Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Lower-cased category names; a product matches if its category is listed.
    pub categories: Vec<String>,
    /// Lower-cased brand names; a product matches if its brand is listed.
    pub brands: Vec<String>,
    pub sort: ProductSort,
}

impl ProductFilter {
    /// Build a filter from comma-separated query parameters.
    #[must_use]
    pub fn from_query(category: Option<&str>, brand: Option<&str>, sort: ProductSort) -> Self {
        Self {
            categories: split_list(category),
            brands: split_list(brand),
            sort,
        }
    }

    /// Whether `product` passes the category and brand filters.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        (self.categories.is_empty() || self.categories.contains(&product.category))
            && (self.brands.is_empty() || self.brands.contains(&product.brand))
    }

    /// Sort `products` in place according to [`ProductFilter::sort`].
    pub fn sort(&self, products: &mut [Product]) {
        match self.sort {
            ProductSort::PriceLowToHigh => products.sort_by_key(|p| (p.effective_price(), p.id)),
            ProductSort::PriceHighToLow => products.sort_by(|a, b| {
                b.effective_price()
                    .cmp(&a.effective_price())
                    .then(a.id.cmp(&b.id))
            }),
            ProductSort::TitleAToZ => {
                products.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
            }
            ProductSort::TitleZToA => {
                products.sort_by(|a, b| b.title.to_lowercase().cmp(&a.title.to_lowercase()));
            }
        }
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|part| part.trim().to_lowercase())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Validate and normalise a search keyword.
///
/// # Errors
///
/// Returns a message if the keyword is blank or too long.
pub fn normalize_keyword(keyword: &str) -> Result<String, String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err("keyword is required".to_string());
    }
    if keyword.chars().count() > MAX_KEYWORD_LENGTH {
        return Err(format!(
            "keyword must be at most {MAX_KEYWORD_LENGTH} characters"
        ));
    }
    Ok(keyword.to_lowercase())
}

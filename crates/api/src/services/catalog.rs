//! Catalog lookup and product management.

use thiserror::Error;
use tracing::instrument;

use shopfront_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::product::normalize_keyword;
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Payload or query failed validation.
    #[error("{0}")]
    Validation(String),

    /// Product does not exist.
    #[error("product not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Read and write access to the product catalog.
pub struct CatalogService<'a> {
    products: &'a dyn ProductRepository,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(products: &'a dyn ProductRepository) -> Self {
        Self { products }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list(filter).await?)
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if it does not exist.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products.get(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Keyword search.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a blank or oversized keyword.
    pub async fn search(&self, keyword: &str) -> Result<Vec<Product>, CatalogError> {
        let keyword = normalize_keyword(keyword).map_err(CatalogError::Validation)?;
        Ok(self.products.search(&keyword).await?)
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if required fields are missing.
    #[instrument(skip_all, fields(title = %product.title))]
    pub async fn create(&self, product: NewProduct) -> Result<Product, CatalogError> {
        let product = product.normalize().map_err(CatalogError::Validation)?;
        let created = self.products.create(product).await?;
        tracing::info!(product_id = %created.id, title = %created.title, "Product created");
        Ok(created)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid fields and
    /// `CatalogError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        let update = update.normalize().map_err(CatalogError::Validation)?;
        let updated = self.products.update(id, update).await.map_err(not_found)?;
        tracing::info!(product_id = %id, "Product updated");
        Ok(updated)
    }

    /// Delete a product. Cart lines referencing it go with it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        self.products.delete(id).await.map_err(not_found)?;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

fn not_found(e: RepositoryError) -> CatalogError {
    match e {
        RepositoryError::NotFound => CatalogError::NotFound,
        other => CatalogError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::Price;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::ProductSort;

    fn new_product(title: &str, category: &str, brand: &str, cents: u32) -> NewProduct {
        NewProduct {
            title: title.to_string(),
            description: format!("{title} description"),
            category: category.to_string(),
            brand: brand.to_string(),
            price: Price::from_cents(cents),
            sale_price: None,
            total_stock: 10,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_filter_and_sort() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        catalog.create(new_product("Runner", "Men", "Nike", 5000)).await.unwrap();
        catalog.create(new_product("Walker", "women", "nike", 3000)).await.unwrap();
        catalog.create(new_product("Boot", "men", "adidas", 9000)).await.unwrap();

        let filter = ProductFilter::from_query(Some("men"), None, ProductSort::PriceHighToLow);
        let titles: Vec<String> = catalog
            .list(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Boot", "Runner"]);

        let filter = ProductFilter::from_query(None, Some("nike"), ProductSort::TitleAToZ);
        assert_eq!(catalog.list(&filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        catalog.create(new_product("Trail Runner", "men", "nike", 5000)).await.unwrap();
        catalog.create(new_product("Sandal", "women", "puma", 2000)).await.unwrap();

        assert_eq!(catalog.search("RUNNER").await.unwrap().len(), 1);
        assert_eq!(catalog.search("puma").await.unwrap().len(), 1);
        assert!(catalog.search("boots").await.unwrap().is_empty());
        assert!(matches!(
            catalog.search("  ").await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_product() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);

        assert!(matches!(
            catalog
                .update(ProductId::new(404), ProductUpdate::default())
                .await,
            Err(CatalogError::NotFound)
        ));
        assert!(matches!(
            catalog.delete(ProductId::new(404)).await,
            Err(CatalogError::NotFound)
        ));
    }
}

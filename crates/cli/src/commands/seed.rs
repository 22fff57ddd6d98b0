//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! - id: P1
//!   name: Kemeja Batik
//!   price: "50000"
//!   image_url: https://cdn.toko.id/p1.jpg
//! ```
//!
//! Products are upserted by id, so re-running a seed updates names and
//! prices in place. Existing cart lines keep the price they captured.

use std::path::Path;

use tracing::info;

use toko_storefront::db::{CatalogStore, NewProduct, PgStore};

use super::{CommandError, connect};

/// Upsert every product in `path`.
///
/// # Errors
///
/// Returns `CommandError` if the file cannot be read or parsed, or if a
/// database operation fails.
pub async fn products(path: &Path) -> Result<(), CommandError> {
    // Read and parse before connecting to the database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let products = parse_products(&content)?;
    info!(path = %path.display(), count = products.len(), "Parsed products");

    let store = PgStore::new(connect().await?);
    for product in &products {
        let saved = store.upsert_product(product).await?;
        info!(id = %saved.id, price = %saved.price, "Upserted product");
    }

    info!("Seeding complete! {} products upserted", products.len());
    Ok(())
}

fn parse_products(content: &str) -> Result<Vec<NewProduct>, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let products = parse_products(
            r#"
- id: P1
  name: Kemeja Batik
  price: "50000"
  image_url: https://cdn.toko.id/p1.jpg
- id: P2
  name: Tas Rotan
  price: "12500.50"
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id.as_str(), "P1");
        assert_eq!(products[1].price.to_string(), "12500.50");
        assert!(products[1].image_url.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_price() {
        assert!(parse_products("- id: P1\n  name: Kemeja Batik\n").is_err());
    }
}

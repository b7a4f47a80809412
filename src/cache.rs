//! In-memory caching using moka
//!
//! Currencies and product types (with their tax rate) change rarely and are
//! read on every calculation, so they are cached. Prices and documents are
//! always read from the database.

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::pricing::models::{Currency, ProductType};
use crate::pricing::queries;

/// Application cache holding pricing reference data
#[derive(Clone)]
pub struct AppCache {
    /// Currencies (id -> Currency)
    pub currencies: Cache<i32, Arc<Currency>>,
    /// Product types (id -> ProductType)
    pub product_types: Cache<i32, Arc<ProductType>>,
}

impl AppCache {
    /// Create a new cache instance with the given time to live
    pub fn new(ttl: Duration) -> Self {
        Self {
            // Currencies: a handful of rows
            currencies: Cache::builder()
                .max_capacity(100)
                .time_to_live(ttl)
                .build(),

            product_types: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .time_to_idle(ttl / 2)
                .build(),
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            currencies_size: self.currencies.entry_count(),
            product_types_size: self.product_types.entry_count(),
        }
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.currencies.invalidate_all();
        self.product_types.invalidate_all();
        info!("All caches invalidated");
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(10 * 60))
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub currencies_size: u64,
    pub product_types_size: u64,
}

/// Start background cache warmer
///
/// Warms the cache on startup and refreshes it every `every`.
pub async fn start_cache_warmer(cache: AppCache, db: PgPool, every: Duration) {
    let mut interval = interval(every);
    loop {
        // First tick completes immediately
        interval.tick().await;
        warm_cache(&cache, &db).await;
    }
}

/// Warm the cache with all currencies and product types
async fn warm_cache(cache: &AppCache, db: &PgPool) {
    info!("Starting cache warm-up...");

    match queries::get_all_currencies(db).await {
        Ok(currencies) => {
            for currency in currencies {
                cache.currencies.insert(currency.id, Arc::new(currency)).await;
            }
        }
        Err(e) => warn!("Failed to warm currency cache: {}", e),
    }

    match queries::get_all_product_types(db).await {
        Ok(product_types) => {
            for product_type in product_types {
                cache
                    .product_types
                    .insert(product_type.id, Arc::new(product_type))
                    .await;
            }
        }
        Err(e) => warn!("Failed to warm product type cache: {}", e),
    }

    info!("Cache warm-up complete. Stats: {:?}", cache.stats());
}

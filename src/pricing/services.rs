//! Pricing service functions with database access.
//!
//! These functions load records through the cache and queries, run the pure
//! calculators and write the results back. A document calculation writes all
//! of its rows in one transaction, or nothing when any position fails.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::AppCache;

use super::calculators::{self, DocumentCalculation};
use super::errors::PricingError;
use super::lookup::PriceBook;
use super::models::{Currency, ProductType, SalesDocumentPosition};
use super::queries;

/// Result of a single position calculation
#[derive(Debug, Clone)]
pub struct PositionCalculation {
    pub position: SalesDocumentPosition,
    pub currency: Arc<Currency>,
    pub amount: Decimal,
}

/// Result of a document calculation together with its currency
#[derive(Debug, Clone)]
pub struct DocumentPricingResult {
    pub calculation: DocumentCalculation,
    pub currency: Arc<Currency>,
}

/// Recalculate and store price and tax of a sales document and its positions.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `cache` - Application cache (currencies and product types)
/// * `document_id` - id of the sales document
/// * `pricing_date` - day prices are looked up for
pub async fn calculate_document_price(
    pool: &PgPool,
    cache: &AppCache,
    document_id: i32,
    pricing_date: NaiveDate,
) -> Result<DocumentPricingResult, PricingError> {
    let document = queries::get_sales_document(pool, document_id)
        .await?
        .ok_or_else(|| PricingError::not_found("SalesDocument", document_id))?;

    let currency = load_currency(pool, cache, document.currency_id).await?;
    let positions = queries::get_document_positions(pool, document.id).await?;
    let book = load_price_book(pool, cache, &positions, document.customer_id, currency.id).await?;

    let calculation =
        calculators::calculate_document_price(&document, &positions, &currency, pricing_date, &book)?;

    let mut tx = pool.begin().await?;
    for position in &calculation.positions {
        queries::update_position_calculation(&mut *tx, position).await?;
    }
    queries::update_document_calculation(&mut *tx, &calculation.document).await?;
    tx.commit().await?;

    info!(
        document_id,
        positions = calculation.positions.len(),
        price = %calculation.price,
        tax = %calculation.tax,
        currency = %currency.short_name,
        "Document price calculated"
    );

    Ok(DocumentPricingResult {
        calculation,
        currency,
    })
}

/// Recalculate and store the price of a single position.
///
/// `contact_id` selects customer group prices, `currency_id` the price
/// currency and rounding.
pub async fn calculate_position_price(
    pool: &PgPool,
    cache: &AppCache,
    position_id: i32,
    pricing_date: NaiveDate,
    contact_id: i32,
    currency_id: i32,
) -> Result<PositionCalculation, PricingError> {
    let mut position = load_position(pool, position_id).await?;
    let currency = load_currency(pool, cache, currency_id).await?;
    let book = load_price_book(
        pool,
        cache,
        std::slice::from_ref(&position),
        contact_id,
        currency.id,
    )
    .await?;

    let amount =
        calculators::calculate_position_price(&mut position, pricing_date, contact_id, &currency, &book)?;
    queries::update_position_calculation(pool, &position).await?;

    debug!(position_id, price = %amount, "Position price calculated");

    Ok(PositionCalculation {
        position,
        currency,
        amount,
    })
}

/// Recalculate and store the tax of a single position from its stored unit price.
pub async fn calculate_position_tax(
    pool: &PgPool,
    cache: &AppCache,
    position_id: i32,
    currency_id: i32,
) -> Result<PositionCalculation, PricingError> {
    let mut position = load_position(pool, position_id).await?;
    let currency = load_currency(pool, cache, currency_id).await?;

    let mut book = PriceBook::new();
    for product_type in load_product_types(pool, cache, &[position.product_type_id]).await? {
        book.add_product_type(&product_type);
    }

    let amount = calculators::calculate_position_tax(&mut position, &currency, &book)?;
    queries::update_position_calculation(pool, &position).await?;

    debug!(position_id, tax = %amount, "Position tax calculated");

    Ok(PositionCalculation {
        position,
        currency,
        amount,
    })
}

async fn load_position(pool: &PgPool, position_id: i32) -> Result<SalesDocumentPosition, PricingError> {
    queries::get_position(pool, position_id)
        .await?
        .ok_or_else(|| PricingError::not_found("SalesDocumentPosition", position_id))
}

/// Get a currency, trying the cache first
async fn load_currency(
    pool: &PgPool,
    cache: &AppCache,
    currency_id: i32,
) -> Result<Arc<Currency>, PricingError> {
    if let Some(cached) = cache.currencies.get(&currency_id).await {
        debug!("Cache HIT for currency: {}", currency_id);
        return Ok(cached);
    }
    debug!("Cache MISS for currency: {}", currency_id);

    let currency = queries::get_currency(pool, currency_id)
        .await?
        .ok_or_else(|| PricingError::not_found("Currency", currency_id))?;
    let currency = Arc::new(currency);
    cache.currencies.insert(currency_id, currency.clone()).await;
    Ok(currency)
}

/// Get product types, querying only the ones not in the cache
async fn load_product_types(
    pool: &PgPool,
    cache: &AppCache,
    product_type_ids: &[i32],
) -> Result<Vec<Arc<ProductType>>, PricingError> {
    let mut found = Vec::with_capacity(product_type_ids.len());
    let mut missing = Vec::new();

    for id in product_type_ids {
        match cache.product_types.get(id).await {
            Some(cached) => found.push(cached),
            None => missing.push(*id),
        }
    }

    if !missing.is_empty() {
        debug!("Cache MISS for product types: {:?}", missing);
        for product_type in queries::get_product_types(pool, &missing).await? {
            let product_type = Arc::new(product_type);
            cache
                .product_types
                .insert(product_type.id, product_type.clone())
                .await;
            found.push(product_type);
        }
    }

    Ok(found)
}

/// Build the price book needed to price `positions` for one customer and currency
async fn load_price_book(
    pool: &PgPool,
    cache: &AppCache,
    positions: &[SalesDocumentPosition],
    customer_id: i32,
    currency_id: i32,
) -> Result<PriceBook, PricingError> {
    let mut book = PriceBook::new();
    if positions.is_empty() {
        return Ok(book);
    }

    let product_type_ids: Vec<i32> = positions
        .iter()
        .map(|p| p.product_type_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    for product_type in load_product_types(pool, cache, &product_type_ids).await? {
        book.add_product_type(&product_type);
    }

    // Overridden unit prices need no lookup
    let looked_up: Vec<i32> = positions
        .iter()
        .filter(|p| !p.overwrite_product_price)
        .map(|p| p.product_type_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if !looked_up.is_empty() {
        for price in queries::get_product_prices(pool, &looked_up, currency_id).await? {
            book.add_price(price);
        }
        for group_id in queries::get_customer_group_ids(pool, customer_id).await? {
            book.add_membership(customer_id, group_id);
        }
    }

    Ok(book)
}

//! HTTP routes for the pricing API.
//!
//! The CRM calls these endpoints with JSON bodies. Amounts are sent and
//! returned as decimal strings.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::cache::CacheStats;
use crate::error::Result;
use crate::AppState;

use super::calculators;
use super::lookup::PriceBook;
use super::models::{Currency, ProductPrice, ProductType, SalesDocument, SalesDocumentPosition};
use super::requests::{
    CalculateDocumentRequest, CalculatePositionPriceRequest, CalculatePositionTaxRequest,
    QuoteRequest,
};
use super::responses::{DocumentPricingResponse, MoneyResponse, PositionAmountResponse};
use super::services;

/// Ids given to the document and currency of a quote
const QUOTE_DOCUMENT_ID: i32 = 0;
const QUOTE_CURRENCY_ID: i32 = 0;

/// Pricing API router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pricing/documents/:id/calculate", post(calculate_document))
        .route("/api/pricing/positions/:id/price", post(calculate_position_price))
        .route("/api/pricing/positions/:id/tax", post(calculate_position_tax))
        .route("/api/pricing/quote", post(quote))
        .route("/api/pricing/cache/stats", get(cache_stats))
        .route("/api/pricing/cache/invalidate", post(invalidate_cache))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Recalculate a stored document and all of its positions
async fn calculate_document(
    State(state): State<AppState>,
    Path(document_id): Path<i32>,
    Json(req): Json<CalculateDocumentRequest>,
) -> Result<Json<DocumentPricingResponse>> {
    let pricing_date = req.pricing_date.unwrap_or_else(today);
    let result =
        services::calculate_document_price(&state.db, &state.cache, document_id, pricing_date)
            .await?;

    Ok(Json(DocumentPricingResponse::new(
        &result.calculation,
        &result.currency,
        true,
    )))
}

/// Recalculate the price of a stored position
async fn calculate_position_price(
    State(state): State<AppState>,
    Path(position_id): Path<i32>,
    Json(req): Json<CalculatePositionPriceRequest>,
) -> Result<Json<PositionAmountResponse>> {
    let pricing_date = req.pricing_date.unwrap_or_else(today);
    let result = services::calculate_position_price(
        &state.db,
        &state.cache,
        position_id,
        pricing_date,
        req.contact_id,
        req.currency_id,
    )
    .await?;

    Ok(Json(PositionAmountResponse {
        position_id,
        amount: MoneyResponse::new(result.amount, &result.currency),
        price_per_unit: result.position.position_price_per_unit,
        pricing_date: result.position.last_pricing_date,
    }))
}

/// Recalculate the tax of a stored position
async fn calculate_position_tax(
    State(state): State<AppState>,
    Path(position_id): Path<i32>,
    Json(req): Json<CalculatePositionTaxRequest>,
) -> Result<Json<PositionAmountResponse>> {
    let result =
        services::calculate_position_tax(&state.db, &state.cache, position_id, req.currency_id)
            .await?;

    Ok(Json(PositionAmountResponse {
        position_id,
        amount: MoneyResponse::new(result.amount, &result.currency),
        price_per_unit: result.position.position_price_per_unit,
        pricing_date: result.position.last_pricing_date,
    }))
}

/// Price a document given entirely in the request body
async fn quote(Json(req): Json<QuoteRequest>) -> Result<Json<DocumentPricingResponse>> {
    let pricing_date = req.pricing_date.unwrap_or_else(today);

    let currency = Currency {
        id: QUOTE_CURRENCY_ID,
        short_name: req.currency.short_name,
        rounding: req.currency.rounding,
    };

    let document = SalesDocument {
        id: QUOTE_DOCUMENT_ID,
        customer_id: req.document.customer_id,
        currency_id: currency.id,
        discount: req.document.discount,
        last_calculated_price: None,
        last_calculated_tax: None,
        last_pricing_date: None,
    };

    let positions: Vec<SalesDocumentPosition> = req
        .positions
        .into_iter()
        .zip(1..)
        .map(|(p, id)| SalesDocumentPosition {
            id,
            sales_document_id: document.id,
            position_number: p.position_number.or(Some(id)),
            quantity: p.quantity,
            unit_id: p.unit_id,
            discount: p.discount,
            product_type_id: p.product_type_id,
            position_price_per_unit: p.price_per_unit,
            overwrite_product_price: p.price_per_unit.is_some(),
            last_calculated_price: None,
            last_calculated_tax: None,
            last_pricing_date: None,
        })
        .collect();

    let mut book = PriceBook::new();
    for pt in req.product_types {
        book.add_product_type(&ProductType {
            id: pt.id,
            product_type_identifier: pt.product_type_identifier,
            title: pt.title,
            tax_rate: pt.tax_rate,
        });
    }
    for (price, id) in req.prices.into_iter().zip(1..) {
        book.add_price(ProductPrice {
            id,
            product_type_id: price.product_type_id,
            unit_id: price.unit_id,
            currency_id: currency.id,
            price: price.price,
            valid_from: price.valid_from,
            valid_until: price.valid_until,
            customer_group_id: price.customer_group_id,
        });
    }
    for group_id in req.customer_groups {
        book.add_membership(document.customer_id, group_id);
    }

    let calculation =
        calculators::calculate_document_price(&document, &positions, &currency, pricing_date, &book)?;
    debug!(price = %calculation.price, tax = %calculation.tax, "Quote calculated");

    Ok(Json(DocumentPricingResponse::new(&calculation, &currency, false)))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

async fn invalidate_cache(State(state): State<AppState>) -> Json<CacheStats> {
    state.cache.invalidate_all();
    Json(state.cache.stats())
}

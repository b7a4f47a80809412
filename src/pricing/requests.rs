//! Request DTOs for pricing API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Request to recalculate a stored sales document
#[derive(Debug, Default, Deserialize)]
pub struct CalculateDocumentRequest {
    #[serde(default)]
    pub pricing_date: Option<NaiveDate>,
}

/// Request to recalculate the price of a stored position
#[derive(Debug, Deserialize)]
pub struct CalculatePositionPriceRequest {
    pub contact_id: i32,
    pub currency_id: i32,
    #[serde(default)]
    pub pricing_date: Option<NaiveDate>,
}

/// Request to recalculate the tax of a stored position
#[derive(Debug, Deserialize)]
pub struct CalculatePositionTaxRequest {
    pub currency_id: i32,
}

/// Request to price a document that is not stored.
///
/// Everything the calculation needs travels in the body; nothing is read
/// from or written to the database.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub pricing_date: Option<NaiveDate>,
    pub document: QuoteDocumentRequest,
    pub currency: QuoteCurrencyRequest,
    #[serde(default)]
    pub positions: Vec<QuotePositionRequest>,
    #[serde(default)]
    pub product_types: Vec<ProductTypeRequest>,
    #[serde(default)]
    pub prices: Vec<PriceRequest>,
    /// Customer groups the document customer is a member of
    #[serde(default)]
    pub customer_groups: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteDocumentRequest {
    pub customer_id: i32,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub discount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteCurrencyRequest {
    pub short_name: String,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub rounding: Option<Decimal>,
}

/// A position in a quote; a given `price_per_unit` overrides the price lookup
#[derive(Debug, Deserialize)]
pub struct QuotePositionRequest {
    #[serde(default)]
    pub position_number: Option<i32>,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    pub unit_id: i32,
    pub product_type_id: i32,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub discount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_per_unit: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ProductTypeRequest {
    pub id: i32,
    #[serde(default)]
    pub product_type_identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub tax_rate: Decimal,
}

/// A price row in the quote currency
#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    pub product_type_id: i32,
    pub unit_id: i32,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub customer_group_id: Option<i32>,
}

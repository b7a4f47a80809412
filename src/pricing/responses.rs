//! Response DTOs for pricing API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::calculators::DocumentCalculation;
use super::models::{Currency, SalesDocumentPosition};

/// Money value for JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct MoneyResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
}

impl MoneyResponse {
    pub fn new(amount: Decimal, currency: &Currency) -> Self {
        Self {
            amount,
            currency: currency.short_name.clone(),
        }
    }
}

/// Calculated values of one position
#[derive(Debug, Serialize)]
pub struct PositionPricingResponse {
    pub position_id: i32,
    pub position_number: Option<i32>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub price_per_unit: Option<Decimal>,
    pub price: MoneyResponse,
    pub tax: MoneyResponse,
    pub pricing_date: Option<NaiveDate>,
}

impl PositionPricingResponse {
    pub fn new(position: &SalesDocumentPosition, currency: &Currency) -> Self {
        Self {
            position_id: position.id,
            position_number: position.position_number,
            price_per_unit: position.position_price_per_unit,
            price: MoneyResponse::new(position.last_calculated_price.unwrap_or_default(), currency),
            tax: MoneyResponse::new(position.last_calculated_tax.unwrap_or_default(), currency),
            pricing_date: position.last_pricing_date,
        }
    }
}

/// Response for a document calculation or quote
#[derive(Debug, Serialize)]
pub struct DocumentPricingResponse {
    /// Absent for quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i32>,
    pub price: MoneyResponse,
    pub tax: MoneyResponse,
    pub pricing_date: Option<NaiveDate>,
    pub positions: Vec<PositionPricingResponse>,
}

impl DocumentPricingResponse {
    pub fn new(calculation: &DocumentCalculation, currency: &Currency, stored: bool) -> Self {
        Self {
            document_id: stored.then_some(calculation.document.id),
            price: MoneyResponse::new(calculation.price, currency),
            tax: MoneyResponse::new(calculation.tax, currency),
            pricing_date: calculation.document.last_pricing_date,
            positions: calculation
                .positions
                .iter()
                .map(|p| PositionPricingResponse::new(p, currency))
                .collect(),
        }
    }
}

/// Response for a single position price or tax calculation
#[derive(Debug, Serialize)]
pub struct PositionAmountResponse {
    pub position_id: i32,
    pub amount: MoneyResponse,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub price_per_unit: Option<Decimal>,
    pub pricing_date: Option<NaiveDate>,
}

/// Generic pricing error response
#[derive(Debug, Serialize)]
pub struct PricingErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

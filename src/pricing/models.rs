//! Database models for pricing queries.
//!
//! These models use sqlx's FromRow derive for direct database deserialization.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use super::errors::PricingError;

/// SalesDocument from crm_salesdocument
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct SalesDocument {
    pub id: i32,
    pub customer_id: i32,
    pub currency_id: i32,
    /// Document-level discount in percent
    pub discount: Option<Decimal>,
    pub last_calculated_price: Option<Decimal>,
    pub last_calculated_tax: Option<Decimal>,
    pub last_pricing_date: Option<NaiveDate>,
}

/// SalesDocumentPosition from crm_salesdocumentposition
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct SalesDocumentPosition {
    pub id: i32,
    pub sales_document_id: i32,
    pub position_number: Option<i32>,
    pub quantity: Decimal,
    pub unit_id: i32,
    /// Position discount in percent
    pub discount: Option<Decimal>,
    pub product_type_id: i32,
    pub position_price_per_unit: Option<Decimal>,
    pub overwrite_product_price: bool,
    pub last_calculated_price: Option<Decimal>,
    pub last_calculated_tax: Option<Decimal>,
    pub last_pricing_date: Option<NaiveDate>,
}

impl SalesDocumentPosition {
    /// Unit price currently stored on the position.
    ///
    /// Fails when the position was never priced and carries no override.
    pub fn unit_price(&self) -> Result<Decimal, PricingError> {
        self.position_price_per_unit
            .ok_or_else(|| PricingError::ConfigurationError {
                message: format!("Position {} has no price per unit", self.id),
            })
    }
}

/// Currency from crm_currency
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Currency {
    pub id: i32,
    pub short_name: String,
    pub rounding: Option<Decimal>,
}

impl Currency {
    /// Smallest increment amounts are truncated to.
    ///
    /// A currency without a positive rounding value rounds to whole units.
    pub fn rounding_unit(&self) -> Decimal {
        match self.rounding {
            Some(rounding) if rounding > Decimal::ZERO => rounding,
            _ => Decimal::ONE,
        }
    }
}

/// ProductType from crm_producttype joined with its crm_tax row
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ProductType {
    pub id: i32,
    pub product_type_identifier: String,
    pub title: String,
    /// Tax rate in percent
    pub tax_rate: Decimal,
}

/// ProductPrice from crm_productprice, with the customer group of a
/// crm_customergroupproductprice child row when there is one
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductPrice {
    pub id: i32,
    pub product_type_id: i32,
    pub unit_id: i32,
    pub currency_id: i32,
    pub price: Decimal,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub customer_group_id: Option<i32>,
}

impl ProductPrice {
    /// Check if the price is valid on the given day (both bounds inclusive)
    pub fn is_valid_at(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.valid_from {
            if date < start {
                return false;
            }
        }
        match self.valid_until {
            Some(end) => date <= end,
            None => true,
        }
    }
}

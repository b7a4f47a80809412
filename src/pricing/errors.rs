//! Pricing error types.

use chrono::NaiveDate;

/// Pricing calculation error types
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// No product price matches the date, unit, customer and currency.
    #[error(
        "No price found for product type {product_type_id} \
         (unit {unit_id}, customer {customer_id}, currency {currency_id}) on {date}"
    )]
    NoPriceFound {
        product_type_id: i32,
        unit_id: i32,
        customer_id: i32,
        currency_id: i32,
        date: NaiveDate,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PricingError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        PricingError::NotFound { entity, id }
    }

    /// Short machine-readable name used in error responses
    pub fn error_type(&self) -> &'static str {
        match self {
            PricingError::NoPriceFound { .. } => "no_price_found",
            PricingError::NotFound { .. } => "not_found",
            PricingError::ConfigurationError { .. } => "configuration_error",
            PricingError::Database(_) => "database_error",
        }
    }
}

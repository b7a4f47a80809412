//! Error handling for the application

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::pricing::responses::PricingErrorResponse;
use crate::pricing::PricingError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Pricing(PricingError::NoPriceFound { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Pricing(PricingError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Pricing(PricingError::ConfigurationError { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Pricing(PricingError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Pricing(PricingError::Database(e)) => {
                tracing::error!("Database error: {}", e);
                PricingErrorResponse {
                    error_type: "database_error".to_string(),
                    message: "Database error".to_string(),
                    details: None,
                }
            }
            AppError::Pricing(err) => {
                tracing::warn!("Pricing failed: {}", err);
                let details = match err {
                    PricingError::NoPriceFound {
                        product_type_id,
                        unit_id,
                        customer_id,
                        currency_id,
                        date,
                    } => Some(json!({
                        "product_type_id": product_type_id,
                        "unit_id": unit_id,
                        "customer_id": customer_id,
                        "currency_id": currency_id,
                        "date": date,
                    })),
                    PricingError::NotFound { entity, id } => {
                        Some(json!({ "entity": entity, "id": id }))
                    }
                    _ => None,
                };
                PricingErrorResponse {
                    error_type: err.error_type().to_string(),
                    message: err.to_string(),
                    details,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

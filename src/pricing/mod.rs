//! Pricing engine module for koalixcrm sales documents.
//!
//! Calculates price and tax of sales documents and their positions, rounded
//! down to the currency's smallest increment. The CRM calls this module via
//! HTTP/JSON whenever a document needs repricing.

pub mod calculators;
pub mod errors;
pub mod lookup;
pub mod models;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

// Re-export commonly used items
pub use calculators::{round_down_to, DocumentCalculation};
pub use errors::PricingError;
pub use lookup::{PriceBook, ProductPricing};
pub use routes::router;
pub use services::{DocumentPricingResult, PositionCalculation};

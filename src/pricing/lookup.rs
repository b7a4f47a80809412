//! Product price and tax rate resolution.
//!
//! The calculators only see the [`ProductPricing`] trait. [`PriceBook`] is the
//! in-memory implementation the services build from database rows.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::errors::PricingError;
use super::models::{ProductPrice, ProductType};

/// Source of unit prices and tax rates for product types.
pub trait ProductPricing {
    /// Unit price of a product type for the given day, unit, customer and currency.
    fn get_price(
        &self,
        product_type_id: i32,
        pricing_date: NaiveDate,
        unit_id: i32,
        customer_id: i32,
        currency_id: i32,
    ) -> Result<Decimal, PricingError>;

    /// Tax rate of a product type in percent.
    fn get_tax_rate(&self, product_type_id: i32) -> Result<Decimal, PricingError>;
}

/// Price rows, tax rates and customer group memberships held in memory.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    tax_rates: HashMap<i32, Decimal>,
    prices: Vec<ProductPrice>,
    customer_groups: HashMap<i32, HashSet<i32>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product_type(&mut self, product_type: &ProductType) {
        self.tax_rates.insert(product_type.id, product_type.tax_rate);
    }

    pub fn add_price(&mut self, price: ProductPrice) {
        self.prices.push(price);
    }

    pub fn add_membership(&mut self, customer_id: i32, customer_group_id: i32) {
        self.customer_groups
            .entry(customer_id)
            .or_default()
            .insert(customer_group_id);
    }

    fn is_member(&self, customer_id: i32, customer_group_id: i32) -> bool {
        self.customer_groups
            .get(&customer_id)
            .is_some_and(|groups| groups.contains(&customer_group_id))
    }
}

impl ProductPricing for PriceBook {
    /// Resolve the lowest matching price.
    ///
    /// A price matches when product type, unit and currency are equal, the day
    /// lies in its validity window, and it is either a general price or belongs
    /// to a customer group the customer is a member of.
    fn get_price(
        &self,
        product_type_id: i32,
        pricing_date: NaiveDate,
        unit_id: i32,
        customer_id: i32,
        currency_id: i32,
    ) -> Result<Decimal, PricingError> {
        self.prices
            .iter()
            .filter(|p| {
                p.product_type_id == product_type_id
                    && p.unit_id == unit_id
                    && p.currency_id == currency_id
                    && p.is_valid_at(pricing_date)
            })
            .filter(|p| match p.customer_group_id {
                Some(group) => self.is_member(customer_id, group),
                None => true,
            })
            .map(|p| p.price)
            .min()
            .ok_or(PricingError::NoPriceFound {
                product_type_id,
                unit_id,
                customer_id,
                currency_id,
                date: pricing_date,
            })
    }

    fn get_tax_rate(&self, product_type_id: i32) -> Result<Decimal, PricingError> {
        self.tax_rates
            .get(&product_type_id)
            .copied()
            .ok_or_else(|| PricingError::not_found("ProductType", product_type_id))
    }
}

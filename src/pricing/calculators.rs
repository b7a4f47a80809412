//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no database access. Unit prices and tax
//! rates come from a [`ProductPricing`] implementation.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::errors::PricingError;
use super::lookup::ProductPricing;
use super::models::{Currency, SalesDocument, SalesDocumentPosition};

/// Round down to a multiple of `rounding` by truncating toward zero.
///
/// A non-positive `rounding` truncates to whole units. Fails when the
/// quotient does not fit a `Decimal`.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use koalix_pricing::pricing::round_down_to;
///
/// assert_eq!(round_down_to(dec!(10.99), dec!(0.05)).unwrap(), dec!(10.95));
/// assert_eq!(round_down_to(dec!(-1.27), dec!(0.05)).unwrap(), dec!(-1.25));
/// assert_eq!(round_down_to(dec!(3.999), dec!(1)).unwrap(), dec!(3));
/// ```
pub fn round_down_to(amount: Decimal, rounding: Decimal) -> Result<Decimal, PricingError> {
    if rounding <= Decimal::ZERO {
        return Ok(amount.trunc());
    }
    let units = checked(amount.checked_div(rounding), "rounding")?;
    checked(units.trunc().checked_mul(rounding), "rounding")
}

/// Multiplier for a percentage discount; no discount leaves the amount as is.
pub fn discount_factor(discount: Option<Decimal>) -> Result<Decimal, PricingError> {
    match discount {
        Some(percent) => checked(
            Decimal::ONE.checked_sub(percent / Decimal::ONE_HUNDRED),
            "discount",
        ),
        None => Ok(Decimal::ONE),
    }
}

/// Turn an overflowed `Decimal` operation into an error.
fn checked(value: Option<Decimal>, step: &str) -> Result<Decimal, PricingError> {
    value.ok_or_else(|| PricingError::ConfigurationError {
        message: format!("Amount out of range while calculating {step}"),
    })
}

/// Unit price times quantity with the position discount applied.
fn discounted_nominal_total(position: &SalesDocumentPosition) -> Result<Decimal, PricingError> {
    let nominal_total = checked(
        position.unit_price()?.checked_mul(position.quantity),
        "nominal total",
    )?;
    checked(
        nominal_total.checked_mul(discount_factor(position.discount)?),
        "position discount",
    )
}

/// Result of a document calculation.
///
/// Holds updated copies of the document and of each of its positions. The
/// inputs are left untouched so nothing changes when a lookup fails midway.
#[derive(Debug, Clone)]
pub struct DocumentCalculation {
    pub document: SalesDocument,
    pub positions: Vec<SalesDocumentPosition>,
    pub price: Decimal,
    pub tax: Decimal,
}

/// Calculate price and tax of a whole sales document.
///
/// Sums position prices and taxes for every position belonging to the document,
/// priced for the document's customer and currency. When the document has a
/// discount, both sums are scaled by it and rounded down again.
///
/// # Errors
/// `NoPriceFound` from the price lookup is returned as is.
pub fn calculate_document_price<P: ProductPricing + ?Sized>(
    document: &SalesDocument,
    positions: &[SalesDocumentPosition],
    currency: &Currency,
    pricing_date: NaiveDate,
    pricing: &P,
) -> Result<DocumentCalculation, PricingError> {
    if document.currency_id != currency.id {
        return Err(PricingError::ConfigurationError {
            message: format!(
                "Document {} is in currency {}, not {}",
                document.id, document.currency_id, currency.id
            ),
        });
    }

    let mut price = Decimal::ZERO;
    let mut tax = Decimal::ZERO;
    let mut updated = Vec::with_capacity(positions.len());

    for position in positions
        .iter()
        .filter(|p| p.sales_document_id == document.id)
    {
        let mut position = position.clone();
        let position_price = calculate_position_price(
            &mut position,
            pricing_date,
            document.customer_id,
            currency,
            pricing,
        )?;
        let position_tax = calculate_position_tax(&mut position, currency, pricing)?;
        price = checked(price.checked_add(position_price), "document price")?;
        tax = checked(tax.checked_add(position_tax), "document tax")?;
        updated.push(position);
    }

    if !updated.is_empty() {
        if let Some(discount) = document.discount {
            let factor = discount_factor(Some(discount))?;
            let rounding = currency.rounding_unit();
            let discounted_price = checked(price.checked_mul(factor), "document discount")?;
            let discounted_tax = checked(tax.checked_mul(factor), "document discount")?;
            price = round_down_to(discounted_price, rounding)?;
            tax = round_down_to(discounted_tax, rounding)?;
        }
    }

    let mut document = document.clone();
    document.last_calculated_price = Some(price);
    document.last_calculated_tax = Some(tax);
    document.last_pricing_date = Some(pricing_date);

    Ok(DocumentCalculation {
        document,
        positions: updated,
        price,
        tax,
    })
}

/// Calculate the price of a single position.
///
/// Unless the position overrides its unit price, the price is looked up and
/// stored on the position. The discounted total is multiplied by the
/// complement of the product's tax rate and rounded down.
pub fn calculate_position_price<P: ProductPricing + ?Sized>(
    position: &mut SalesDocumentPosition,
    pricing_date: NaiveDate,
    contact_id: i32,
    currency: &Currency,
    pricing: &P,
) -> Result<Decimal, PricingError> {
    if !position.overwrite_product_price {
        let unit_price = pricing.get_price(
            position.product_type_id,
            pricing_date,
            position.unit_id,
            contact_id,
            currency.id,
        )?;
        position.position_price_per_unit = Some(unit_price);
    }

    let nominal_minus_discount = discounted_nominal_total(position)?;
    let tax_rate = pricing.get_tax_rate(position.product_type_id)?;
    let complement =
        checked(Decimal::ONE_HUNDRED.checked_sub(tax_rate), "tax rate")? / Decimal::ONE_HUNDRED;
    let total = checked(nominal_minus_discount.checked_mul(complement), "position price")?;

    let price = round_down_to(total, currency.rounding_unit())?;
    position.last_calculated_price = Some(price);
    position.last_pricing_date = Some(pricing_date);
    Ok(price)
}

/// Calculate the tax of a single position from its stored unit price.
pub fn calculate_position_tax<P: ProductPricing + ?Sized>(
    position: &mut SalesDocumentPosition,
    currency: &Currency,
    pricing: &P,
) -> Result<Decimal, PricingError> {
    let nominal_minus_discount = discounted_nominal_total(position)?;
    let tax_rate = pricing.get_tax_rate(position.product_type_id)?;
    let total_tax = checked(nominal_minus_discount.checked_mul(tax_rate), "position tax")?
        / Decimal::ONE_HUNDRED;

    let tax = round_down_to(total_tax, currency.rounding_unit())?;
    position.last_calculated_tax = Some(tax);
    Ok(tax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::lookup::PriceBook;
    use crate::pricing::models::{ProductPrice, ProductType};
    use rust_decimal_macros::dec;

    const DOC: i32 = 1;
    const CUSTOMER: i32 = 50;
    const UNIT: i32 = 1;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn currency(rounding: Decimal) -> Currency {
        Currency {
            id: 1,
            short_name: "CHF".to_string(),
            rounding: Some(rounding),
        }
    }

    fn document(discount: Option<Decimal>) -> SalesDocument {
        SalesDocument {
            id: DOC,
            customer_id: CUSTOMER,
            currency_id: 1,
            discount,
            last_calculated_price: None,
            last_calculated_tax: None,
            last_pricing_date: None,
        }
    }

    fn position(id: i32, product_type_id: i32, quantity: Decimal) -> SalesDocumentPosition {
        SalesDocumentPosition {
            id,
            sales_document_id: DOC,
            position_number: Some(id),
            quantity,
            unit_id: UNIT,
            discount: None,
            product_type_id,
            position_price_per_unit: None,
            overwrite_product_price: false,
            last_calculated_price: None,
            last_calculated_tax: None,
            last_pricing_date: None,
        }
    }

    fn book_with(product_type_id: i32, tax_rate: Decimal, price: Option<Decimal>) -> PriceBook {
        let mut book = PriceBook::new();
        add_product(&mut book, product_type_id, tax_rate, price);
        book
    }

    fn add_product(book: &mut PriceBook, product_type_id: i32, tax_rate: Decimal, price: Option<Decimal>) {
        book.add_product_type(&ProductType {
            id: product_type_id,
            product_type_identifier: format!("P-{product_type_id}"),
            title: format!("Product {product_type_id}"),
            tax_rate,
        });
        if let Some(amount) = price {
            book.add_price(ProductPrice {
                id: product_type_id,
                product_type_id,
                unit_id: UNIT,
                currency_id: 1,
                price: amount,
                valid_from: None,
                valid_until: None,
                customer_group_id: None,
            });
        }
    }

    // ==================== round_down_to tests ====================

    #[test]
    fn test_round_down_truncates_to_granularity() {
        assert_eq!(round_down_to(dec!(10.99), dec!(0.05)).unwrap(), dec!(10.95));
        assert_eq!(round_down_to(dec!(10.95), dec!(0.05)).unwrap(), dec!(10.95));
        assert_eq!(round_down_to(dec!(1.239), dec!(0.01)).unwrap(), dec!(1.23));
        assert_eq!(round_down_to(dec!(1999.99), dec!(10)).unwrap(), dec!(1990));
    }

    #[test]
    fn test_round_down_truncates_toward_zero_for_negatives() {
        assert_eq!(round_down_to(dec!(-1.27), dec!(0.05)).unwrap(), dec!(-1.25));
        assert_eq!(round_down_to(dec!(-0.999), dec!(0.01)).unwrap(), dec!(-0.99));
    }

    #[test]
    fn test_round_down_non_positive_rounding_truncates_to_units() {
        assert_eq!(round_down_to(dec!(7.89), dec!(0)).unwrap(), dec!(7));
        assert_eq!(round_down_to(dec!(7.89), dec!(-1)).unwrap(), dec!(7));
    }

    #[test]
    fn test_discount_factor() {
        assert_eq!(discount_factor(None).unwrap(), dec!(1));
        assert_eq!(discount_factor(Some(dec!(10))).unwrap(), dec!(0.9));
        assert_eq!(discount_factor(Some(dec!(0))).unwrap(), dec!(1));
        assert_eq!(discount_factor(Some(dec!(100))).unwrap(), dec!(0));
    }

    #[test]
    fn test_round_down_out_of_range_is_error() {
        let err = round_down_to(dec!(1000), dec!(0.0000000000000000000000000001)).unwrap_err();
        assert!(matches!(err, PricingError::ConfigurationError { .. }));
        assert!(err.to_string().contains("rounding"));
    }

    // ==================== position tests ====================

    #[test]
    fn test_position_price_overflow_is_error() {
        // 1e19 * 1e11 does not fit a Decimal
        let book = book_with(7, dec!(8), None);
        let chf = currency(dec!(0.05));
        let mut pos = position(1, 7, dec!(10000000000000000000));
        pos.overwrite_product_price = true;
        pos.position_price_per_unit = Some(dec!(100000000000));

        let err = calculate_position_price(&mut pos, date(), CUSTOMER, &chf, &book).unwrap_err();

        assert!(matches!(err, PricingError::ConfigurationError { .. }));
        assert_eq!(pos.last_calculated_price, None);
    }

    #[test]
    fn test_position_price_and_tax_hand_computed() {
        // 100 * 3 = 300, -10% = 270
        // price: 270 * 92% = 248.40, tax: 270 * 8% = 21.60
        let book = book_with(7, dec!(8), Some(dec!(100)));
        let chf = currency(dec!(0.05));
        let mut pos = position(1, 7, dec!(3));
        pos.discount = Some(dec!(10));

        let price = calculate_position_price(&mut pos, date(), CUSTOMER, &chf, &book).unwrap();
        let tax = calculate_position_tax(&mut pos, &chf, &book).unwrap();

        assert_eq!(price, dec!(248.40));
        assert_eq!(tax, dec!(21.60));
        assert_eq!(pos.position_price_per_unit, Some(dec!(100)));
        assert_eq!(pos.last_calculated_price, Some(dec!(248.40)));
        assert_eq!(pos.last_calculated_tax, Some(dec!(21.60)));
        assert_eq!(pos.last_pricing_date, Some(date()));
    }

    #[test]
    fn test_position_values_are_truncated_not_rounded() {
        // price: 33.33 * 92.3% = 30.76359 -> 30.75
        // tax: 33.33 * 7.7% = 2.56641 -> 2.55
        let book = book_with(7, dec!(7.7), Some(dec!(33.33)));
        let chf = currency(dec!(0.05));
        let mut pos = position(1, 7, dec!(1));

        let price = calculate_position_price(&mut pos, date(), CUSTOMER, &chf, &book).unwrap();
        let tax = calculate_position_tax(&mut pos, &chf, &book).unwrap();

        assert_eq!(price, dec!(30.75));
        assert_eq!(tax, dec!(2.55));
    }

    #[test]
    fn test_overwritten_unit_price_skips_lookup() {
        // Book has no price at all; the override must be used
        let book = book_with(7, dec!(10), None);
        let chf = currency(dec!(0.01));
        let mut pos = position(1, 7, dec!(2));
        pos.overwrite_product_price = true;
        pos.position_price_per_unit = Some(dec!(12.50));

        let price = calculate_position_price(&mut pos, date(), CUSTOMER, &chf, &book).unwrap();

        assert_eq!(price, dec!(22.50));
        assert_eq!(pos.position_price_per_unit, Some(dec!(12.50)));
    }

    #[test]
    fn test_looked_up_price_replaces_stale_unit_price() {
        let book = book_with(7, dec!(0), Some(dec!(80)));
        let chf = currency(dec!(0.01));
        let mut pos = position(1, 7, dec!(1));
        pos.position_price_per_unit = Some(dec!(65));

        let price = calculate_position_price(&mut pos, date(), CUSTOMER, &chf, &book).unwrap();

        assert_eq!(price, dec!(80));
        assert_eq!(pos.position_price_per_unit, Some(dec!(80)));
    }

    #[test]
    fn test_position_price_missing_price_propagates() {
        let book = book_with(7, dec!(8), None);
        let chf = currency(dec!(0.05));
        let mut pos = position(1, 7, dec!(1));

        let err = calculate_position_price(&mut pos, date(), CUSTOMER, &chf, &book).unwrap_err();

        assert!(matches!(
            err,
            PricingError::NoPriceFound {
                product_type_id: 7,
                customer_id: CUSTOMER,
                ..
            }
        ));
        assert_eq!(pos.last_calculated_price, None);
        assert_eq!(pos.last_pricing_date, None);
    }

    #[test]
    fn test_position_tax_without_unit_price_fails() {
        let book = book_with(7, dec!(8), None);
        let chf = currency(dec!(0.05));
        let mut pos = position(1, 7, dec!(1));

        let err = calculate_position_tax(&mut pos, &chf, &book).unwrap_err();
        assert!(matches!(err, PricingError::ConfigurationError { .. }));
    }

    // ==================== document tests ====================

    fn two_position_book() -> PriceBook {
        let mut book = PriceBook::new();
        add_product(&mut book, 7, dec!(10), Some(dec!(100)));
        add_product(&mut book, 8, dec!(10), None);
        book
    }

    fn two_positions() -> Vec<SalesDocumentPosition> {
        // 100 * 2, 10% tax -> price 180, tax 20
        let first = position(1, 7, dec!(2));
        // override 50, -20% = 40, 10% tax -> price 36, tax 4
        let mut second = position(2, 8, dec!(1));
        second.overwrite_product_price = true;
        second.position_price_per_unit = Some(dec!(50));
        second.discount = Some(dec!(20));
        vec![first, second]
    }

    #[test]
    fn test_document_without_positions_is_zero() {
        let book = PriceBook::new();
        let doc = document(Some(dec!(5)));

        let calc =
            calculate_document_price(&doc, &[], &currency(dec!(0.05)), date(), &book).unwrap();

        assert_eq!(calc.price, Decimal::ZERO);
        assert_eq!(calc.tax, Decimal::ZERO);
        assert!(calc.positions.is_empty());
        assert_eq!(calc.document.last_calculated_price, Some(Decimal::ZERO));
        assert_eq!(calc.document.last_calculated_tax, Some(Decimal::ZERO));
        assert_eq!(calc.document.last_pricing_date, Some(date()));
    }

    #[test]
    fn test_document_sums_positions() {
        let book = two_position_book();
        let doc = document(None);

        let calc = calculate_document_price(&doc, &two_positions(), &currency(dec!(0.01)), date(), &book)
            .unwrap();

        assert_eq!(calc.price, dec!(216));
        assert_eq!(calc.tax, dec!(24));
        assert_eq!(calc.positions.len(), 2);
        assert_eq!(calc.positions[0].last_calculated_price, Some(dec!(180)));
        assert_eq!(calc.positions[0].last_calculated_tax, Some(dec!(20)));
        assert_eq!(calc.positions[1].last_calculated_price, Some(dec!(36)));
        assert_eq!(calc.positions[1].last_calculated_tax, Some(dec!(4)));
    }

    #[test]
    fn test_document_discount_scales_price_and_tax_identically() {
        let book = two_position_book();
        let doc = document(Some(dec!(10)));

        let calc = calculate_document_price(&doc, &two_positions(), &currency(dec!(0.01)), date(), &book)
            .unwrap();

        assert_eq!(calc.price, dec!(194.40));
        assert_eq!(calc.tax, dec!(21.60));
        assert_eq!(calc.price / dec!(216), calc.tax / dec!(24));
        assert_eq!(calc.document.last_calculated_price, Some(dec!(194.40)));
        assert_eq!(calc.document.last_calculated_tax, Some(dec!(21.60)));
    }

    #[test]
    fn test_document_discount_result_is_truncated() {
        // 216 * 97% = 209.52 -> 209.50, 24 * 97% = 23.28 -> 23.25
        let book = two_position_book();
        let doc = document(Some(dec!(3)));

        let calc = calculate_document_price(&doc, &two_positions(), &currency(dec!(0.05)), date(), &book)
            .unwrap();

        assert_eq!(calc.price, dec!(209.50));
        assert_eq!(calc.tax, dec!(23.25));
    }

    #[test]
    fn test_document_ignores_foreign_positions() {
        let book = two_position_book();
        let doc = document(None);
        let mut positions = two_positions();
        let mut foreign = position(3, 7, dec!(100));
        foreign.sales_document_id = DOC + 1;
        positions.push(foreign);

        let calc = calculate_document_price(&doc, &positions, &currency(dec!(0.01)), date(), &book)
            .unwrap();

        assert_eq!(calc.positions.len(), 2);
        assert_eq!(calc.price, dec!(216));
    }

    #[test]
    fn test_document_missing_price_leaves_inputs_untouched() {
        let mut book = PriceBook::new();
        add_product(&mut book, 7, dec!(10), Some(dec!(100)));
        add_product(&mut book, 9, dec!(10), None);
        let doc = document(None);
        let positions = vec![position(1, 7, dec!(1)), position(2, 9, dec!(1))];
        let before = positions.clone();

        let err = calculate_document_price(&doc, &positions, &currency(dec!(0.01)), date(), &book)
            .unwrap_err();

        assert!(matches!(
            err,
            PricingError::NoPriceFound { product_type_id: 9, .. }
        ));
        assert_eq!(positions, before);
        assert_eq!(doc.last_calculated_price, None);
    }

    #[test]
    fn test_document_currency_mismatch_is_rejected() {
        let book = PriceBook::new();
        let doc = document(None);
        let eur = Currency {
            id: 2,
            short_name: "EUR".to_string(),
            rounding: Some(dec!(0.01)),
        };

        let err = calculate_document_price(&doc, &[], &eur, date(), &book).unwrap_err();
        assert!(matches!(err, PricingError::ConfigurationError { .. }));
    }
}

//! Database queries for the pricing engine.
//!
//! Reads and writes the koalixcrm tables directly. Write queries take any
//! Postgres executor so they can run inside a transaction.

use sqlx::{PgExecutor, PgPool};

use super::errors::PricingError;
use super::models::{Currency, ProductPrice, ProductType, SalesDocument, SalesDocumentPosition};

const POSITION_COLUMNS: &str = r#"
    id, sales_document_id, position_number, quantity, unit_id, discount,
    product_type_id, position_price_per_unit, overwrite_product_price,
    last_calculated_price, last_calculated_tax, last_pricing_date
"#;

const PRODUCT_TYPE_SELECT: &str = r#"
    SELECT pt.id, pt.product_type_identifier, pt.title, t.tax_rate
    FROM crm_producttype pt
    JOIN crm_tax t ON t.id = pt.tax_id
"#;

/// Get a sales document by id
pub async fn get_sales_document(
    pool: &PgPool,
    document_id: i32,
) -> Result<Option<SalesDocument>, PricingError> {
    let document = sqlx::query_as::<_, SalesDocument>(
        r#"
        SELECT
            id, customer_id, currency_id, discount,
            last_calculated_price, last_calculated_tax, last_pricing_date
        FROM crm_salesdocument
        WHERE id = $1
        "#,
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    Ok(document)
}

/// Get all positions of a sales document in position order
pub async fn get_document_positions(
    pool: &PgPool,
    document_id: i32,
) -> Result<Vec<SalesDocumentPosition>, PricingError> {
    let sql = format!(
        "SELECT {POSITION_COLUMNS} FROM crm_salesdocumentposition \
         WHERE sales_document_id = $1 \
         ORDER BY position_number NULLS LAST, id"
    );
    let positions = sqlx::query_as::<_, SalesDocumentPosition>(&sql)
        .bind(document_id)
        .fetch_all(pool)
        .await?;

    Ok(positions)
}

/// Get a single position by id
pub async fn get_position(
    pool: &PgPool,
    position_id: i32,
) -> Result<Option<SalesDocumentPosition>, PricingError> {
    let sql = format!("SELECT {POSITION_COLUMNS} FROM crm_salesdocumentposition WHERE id = $1");
    let position = sqlx::query_as::<_, SalesDocumentPosition>(&sql)
        .bind(position_id)
        .fetch_optional(pool)
        .await?;

    Ok(position)
}

/// Get a currency by id
pub async fn get_currency(pool: &PgPool, currency_id: i32) -> Result<Option<Currency>, PricingError> {
    let currency = sqlx::query_as::<_, Currency>(
        r#"
        SELECT id, short_name, rounding
        FROM crm_currency
        WHERE id = $1
        "#,
    )
    .bind(currency_id)
    .fetch_optional(pool)
    .await?;

    Ok(currency)
}

/// Get all currencies (for cache warming)
pub async fn get_all_currencies(pool: &PgPool) -> Result<Vec<Currency>, PricingError> {
    let currencies = sqlx::query_as::<_, Currency>(
        r#"
        SELECT id, short_name, rounding
        FROM crm_currency
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(currencies)
}

/// Get product types with their tax rate
pub async fn get_product_types(
    pool: &PgPool,
    product_type_ids: &[i32],
) -> Result<Vec<ProductType>, PricingError> {
    let sql = format!("{PRODUCT_TYPE_SELECT} WHERE pt.id = ANY($1)");
    let product_types = sqlx::query_as::<_, ProductType>(&sql)
        .bind(product_type_ids)
        .fetch_all(pool)
        .await?;

    Ok(product_types)
}

/// Get all product types (for cache warming)
pub async fn get_all_product_types(pool: &PgPool) -> Result<Vec<ProductType>, PricingError> {
    let product_types = sqlx::query_as::<_, ProductType>(PRODUCT_TYPE_SELECT)
        .fetch_all(pool)
        .await?;

    Ok(product_types)
}

/// Get candidate prices for product types in one currency.
///
/// Customer group prices are child rows of crm_productprice; the left join
/// leaves `customer_group_id` NULL for general prices.
pub async fn get_product_prices(
    pool: &PgPool,
    product_type_ids: &[i32],
    currency_id: i32,
) -> Result<Vec<ProductPrice>, PricingError> {
    let prices = sqlx::query_as::<_, ProductPrice>(
        r#"
        SELECT
            p.id, p.product_type_id, p.unit_id, p.currency_id, p.price,
            p.valid_from, p.valid_until,
            cg.customer_group_id
        FROM crm_productprice p
        LEFT JOIN crm_customergroupproductprice cg ON cg.productprice_ptr_id = p.id
        WHERE p.product_type_id = ANY($1)
          AND p.currency_id = $2
        "#,
    )
    .bind(product_type_ids)
    .bind(currency_id)
    .fetch_all(pool)
    .await?;

    Ok(prices)
}

/// Get the customer groups a customer is a member of
pub async fn get_customer_group_ids(pool: &PgPool, customer_id: i32) -> Result<Vec<i32>, PricingError> {
    let groups: Vec<(i32,)> = sqlx::query_as(
        r#"
        SELECT customergroup_id
        FROM crm_customer_is_member_of
        WHERE customer_id = $1
        "#,
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await?;

    Ok(groups.into_iter().map(|(id,)| id).collect())
}

/// Store the calculated values (and resolved unit price) of a position
pub async fn update_position_calculation<'e, E: PgExecutor<'e>>(
    executor: E,
    position: &SalesDocumentPosition,
) -> Result<(), PricingError> {
    sqlx::query(
        r#"
        UPDATE crm_salesdocumentposition
        SET position_price_per_unit = $2,
            last_calculated_price = $3,
            last_calculated_tax = $4,
            last_pricing_date = $5
        WHERE id = $1
        "#,
    )
    .bind(position.id)
    .bind(position.position_price_per_unit)
    .bind(position.last_calculated_price)
    .bind(position.last_calculated_tax)
    .bind(position.last_pricing_date)
    .execute(executor)
    .await?;

    Ok(())
}

/// Store the calculated totals of a document
pub async fn update_document_calculation<'e, E: PgExecutor<'e>>(
    executor: E,
    document: &SalesDocument,
) -> Result<(), PricingError> {
    sqlx::query(
        r#"
        UPDATE crm_salesdocument
        SET last_calculated_price = $2,
            last_calculated_tax = $3,
            last_pricing_date = $4
        WHERE id = $1
        "#,
    )
    .bind(document.id)
    .bind(document.last_calculated_price)
    .bind(document.last_calculated_tax)
    .bind(document.last_pricing_date)
    .execute(executor)
    .await?;

    Ok(())
}

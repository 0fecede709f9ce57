/// Product model, stock levels and derived stock status
///
/// A product is a countable campus resource (lab kits, calculators, umbrellas...).
/// `current_stock` is what can still be reserved; `total_stock` is what the
/// campus owns. The database enforces `0 <= current_stock <= total_stock`
/// (`products_stock_bounds`) and every stock change here is one conditional
/// `UPDATE`, so concurrent writers cannot push the counters out of range.
///
/// Reservation holds move stock through [`crate::inventory`], not through this
/// module.
///
/// # Stock status
///
/// [`StockStatus`] is derived from the two counters on every read and never
/// stored:
///
/// | status      | condition                                               |
/// |-------------|---------------------------------------------------------|
/// | `Out`       | `current_stock == 0`                                    |
/// | `Low`       | `current_stock * 100 <= total_stock * LOW_STOCK_PERCENT` |
/// | `Available` | otherwise                                               |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::escape_like;

/// A product counts as low when at most this share of its stock is left
pub const LOW_STOCK_PERCENT: i32 = 20;

/// Availability label derived from the stock counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Available,
    Low,
    Out,
}

impl StockStatus {
    /// Derives the status from the stock counters
    ///
    /// # Example
    ///
    /// ```
    /// use campushub_shared::models::product::StockStatus;
    ///
    /// assert_eq!(StockStatus::from_levels(0, 10), StockStatus::Out);
    /// assert_eq!(StockStatus::from_levels(2, 10), StockStatus::Low);
    /// assert_eq!(StockStatus::from_levels(3, 10), StockStatus::Available);
    /// ```
    pub fn from_levels(current_stock: i32, total_stock: i32) -> Self {
        if current_stock <= 0 {
            StockStatus::Out
        } else if i64::from(current_stock) * 100
            <= i64::from(total_stock) * i64::from(LOW_STOCK_PERCENT)
        {
            StockStatus::Low
        } else {
            StockStatus::Available
        }
    }

    /// SQL predicate over `products` matching exactly the rows [`Self::from_levels`]
    /// maps to this status
    pub fn sql_predicate(&self) -> String {
        let low = format!("current_stock * 100 <= total_stock * {}", LOW_STOCK_PERCENT);
        match self {
            StockStatus::Out => "current_stock <= 0".to_string(),
            StockStatus::Low => format!("(current_stock > 0 AND {})", low),
            StockStatus::Available => format!("(current_stock > 0 AND NOT ({}))", low),
        }
    }
}

/// Product row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub location: Option<String>,
    pub image_url: Option<String>,

    /// Units owned
    pub total_stock: i32,

    /// Units not held by a pending reservation or handed out
    pub current_stock: i32,

    /// Staff member who created the product
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Derived availability label
    pub fn status(&self) -> StockStatus {
        StockStatus::from_levels(self.current_stock, self.total_stock)
    }
}

/// Input for creating a product. The product starts fully in stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub total_stock: i32,
    pub created_by: Option<Uuid>,
}

/// Metadata update. Stock is changed with [`Product::restock`] and
/// [`Product::write_off`] only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

/// Filter for product listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub status: Option<StockStatus>,
    /// Case-insensitive substring of name or description
    pub search: Option<String>,
}

impl ProductFilter {
    /// WHERE clause with `$1` = category and `$2` = search pattern
    fn where_clause(&self) -> String {
        let mut clause = String::from(
            "WHERE ($1::text IS NULL OR LOWER(category) = LOWER($1)) \
             AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)",
        );
        if let Some(status) = self.status {
            clause.push_str(" AND ");
            clause.push_str(&status.sql_predicate());
        }
        clause
    }

    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)))
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Outcome of a stock adjustment
#[derive(Debug, Clone)]
pub enum StockChange {
    /// Applied; carries the updated product
    Applied(Box<Product>),
    /// Product doesn't exist
    NotFound,
    /// Write-off larger than the units on the shelf
    Insufficient { available: i32 },
}

/// Why a delete was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Pending reservations still hold stock of this product
    HasPendingReservations(i64),
}

/// Count of products per stock status
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockStatusCounts {
    pub available: i64,
    pub low: i64,
    pub out: i64,
}

const PRODUCT_COLUMNS: &str = "id, name, description, category, location, image_url, \
                               total_stock, current_stock, created_by, created_at, updated_at";

impl Product {
    /// Creates a product with `current_stock = total_stock`
    ///
    /// # Errors
    ///
    /// Returns a check violation if `total_stock` is negative.
    pub async fn create(pool: &PgPool, data: CreateProduct) -> Result<Self, sqlx::Error> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products
                (name, description, category, location, image_url, total_stock, current_stock, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.category)
        .bind(data.location)
        .bind(data.image_url)
        .bind(data.total_stock)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        Ok(product)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(product)
    }

    /// Lists products matching a filter, by name
    ///
    /// The status filter is evaluated in SQL with the same threshold as
    /// [`StockStatus::from_levels`].
    pub async fn list(
        pool: &PgPool,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {} ORDER BY LOWER(name), id LIMIT $3 OFFSET $4",
            filter.where_clause()
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(filter.category())
            .bind(filter.search_pattern())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(products)
    }

    pub async fn count(pool: &PgPool, filter: &ProductFilter) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM products {}", filter.where_clause());

        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(filter.category())
            .bind(filter.search_pattern())
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Updates metadata fields that are `Some`
    pub async fn update_details(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProduct,
    ) -> Result<Option<Self>, sqlx::Error> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                location = COALESCE($5, location),
                image_url = COALESCE($6, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.category)
        .bind(data.location)
        .bind(data.image_url)
        .fetch_optional(pool)
        .await?;

        Ok(product)
    }

    /// Puts `quantity` units back on the shelf
    ///
    /// `total_stock` grows only as far as needed to cover the shelf plus the
    /// units held by pending reservations, so returning collected units does
    /// not inflate the total while new units always fit. Keeps
    /// `current_stock + held <= total_stock`, which lets cancelled and expired
    /// holds go back on the shelf in full.
    pub async fn restock(
        pool: &PgPool,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Waits out any reservation in flight, so the sum below sees its row.
        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Ok(None);
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET current_stock = current_stock + $2,
                total_stock = GREATEST(
                    total_stock,
                    current_stock + $2 + (
                        SELECT COALESCE(SUM(quantity), 0)::INT
                        FROM reservations
                        WHERE product_id = $1 AND status = 'pending'
                    )
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(product))
    }

    /// Removes `quantity` damaged or lost units from both counters
    ///
    /// Refused when fewer than `quantity` units are on the shelf; units held by
    /// pending reservations cannot be written off.
    pub async fn write_off(
        pool: &PgPool,
        id: Uuid,
        quantity: i32,
    ) -> Result<StockChange, sqlx::Error> {
        let updated = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET current_stock = current_stock - $2,
                total_stock = total_stock - $2,
                updated_at = NOW()
            WHERE id = $1 AND current_stock >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(pool)
        .await?;

        if let Some(product) = updated {
            return Ok(StockChange::Applied(Box::new(product)));
        }

        Ok(match Self::find_by_id(pool, id).await? {
            Some(product) => StockChange::Insufficient {
                available: product.current_stock,
            },
            None => StockChange::NotFound,
        })
    }

    /// Deletes a product unless pending reservations still hold its stock
    ///
    /// The check and the delete share a transaction; the product row is locked
    /// so a reservation cannot slip in between.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<DeleteOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if exists.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        let (pending,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reservations WHERE product_id = $1 AND status = 'pending'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if pending > 0 {
            return Ok(DeleteOutcome::HasPendingReservations(pending));
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(DeleteOutcome::Deleted)
    }

    /// Number of products in each stock status
    pub async fn status_counts(pool: &PgPool) -> Result<StockStatusCounts, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE {}) AS available,
                COUNT(*) FILTER (WHERE {}) AS low,
                COUNT(*) FILTER (WHERE {}) AS out
            FROM products
            "#,
            StockStatus::Available.sql_predicate(),
            StockStatus::Low.sql_predicate(),
            StockStatus::Out.sql_predicate(),
        );

        let counts = sqlx::query_as::<_, StockStatusCounts>(&sql)
            .fetch_one(pool)
            .await?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_stock() {
        assert_eq!(StockStatus::from_levels(0, 10), StockStatus::Out);
        assert_eq!(StockStatus::from_levels(0, 0), StockStatus::Out);
    }

    #[test]
    fn test_low_threshold_is_inclusive() {
        assert_eq!(StockStatus::from_levels(1, 10), StockStatus::Low);
        assert_eq!(StockStatus::from_levels(2, 10), StockStatus::Low);
        assert_eq!(StockStatus::from_levels(3, 10), StockStatus::Available);
        assert_eq!(StockStatus::from_levels(20, 100), StockStatus::Low);
        assert_eq!(StockStatus::from_levels(21, 100), StockStatus::Available);
    }

    #[test]
    fn test_single_unit_products() {
        // 1 of 1 is fully stocked; 1 of 5 is the 20% boundary.
        assert_eq!(StockStatus::from_levels(1, 1), StockStatus::Available);
        assert_eq!(StockStatus::from_levels(1, 5), StockStatus::Low);
    }

    #[test]
    fn test_large_counters_do_not_overflow() {
        assert_eq!(
            StockStatus::from_levels(i32::MAX, i32::MAX),
            StockStatus::Available
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        for (status, name) in [
            (StockStatus::Available, "available"),
            (StockStatus::Low, "low"),
            (StockStatus::Out, "out"),
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), name);
        }
    }

    #[test]
    fn test_sql_predicates_use_threshold() {
        assert_eq!(StockStatus::Out.sql_predicate(), "current_stock <= 0");
        assert!(StockStatus::Low
            .sql_predicate()
            .contains(&format!("total_stock * {}", LOW_STOCK_PERCENT)));
        assert!(StockStatus::Available.sql_predicate().contains("NOT ("));
    }

    #[test]
    fn test_filter_where_clause() {
        let filter = ProductFilter::default();
        assert!(!filter.where_clause().contains("current_stock"));

        let filter = ProductFilter {
            status: Some(StockStatus::Out),
            ..Default::default()
        };
        assert!(filter.where_clause().ends_with("AND current_stock <= 0"));
    }

    #[test]
    fn test_filter_ignores_blank_values() {
        let filter = ProductFilter {
            category: Some("  ".to_string()),
            search: Some(String::new()),
            status: None,
        };
        assert!(filter.category().is_none());
        assert!(filter.search_pattern().is_none());
    }
}

//! # Order Repository
//!
//! Database operations for the order lifecycle.
//!
//! ## Guarded Status Transitions
//! Devices and customers race on the same order row: a device can be pouring
//! while the customer hits cancel. Every status mutation here is a guarded
//! UPDATE whose WHERE clause re-checks the expected prior status, and the
//! caller gets back whether the row actually moved. A transition losing the
//! race is a no-op, never an overwrite of a terminal status.
//!
//! ```text
//! UPDATE orders SET status = 'cancelled', ...
//! WHERE id = ?1 AND status IN ('pending', 'in_progress')
//!       └────────────── the guard ──────────────┘
//! rows_affected == 0  →  somebody else got there first
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use barkeep_core::{Order, OrderStatus};

const ORDER_COLUMNS: &str = "id, customer_id, device_id, cocktail_id, current_dose_id, \
     dose_progress, status, error_message, created_at, updated_at";

/// A customer-facing view of one active order, joined flat for the live
/// update feed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOrderView {
    pub order_id: String,
    pub cocktail_id: String,
    pub cocktail_name: String,
    pub status: OrderStatus,
    pub device_id: Option<String>,
    /// 1-based number of the dose being poured; null before the first poll.
    pub current_dose_number: Option<i64>,
    /// Total doses in the recipe.
    pub dose_count: i64,
    /// Milliliters poured of the current dose.
    pub dose_progress: f64,
    pub created_at: DateTime<Utc>,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a new order.
    pub async fn create(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, cocktail = %order.cocktail_id, "Creating order");

        sqlx::query(
            "INSERT INTO orders (\
                 id, customer_id, device_id, cocktail_id, current_dose_id, \
                 dose_progress, status, error_message, created_at, updated_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(&order.device_id)
        .bind(&order.cocktail_id)
        .bind(&order.current_dose_id)
        .bind(order.dose_progress)
        .bind(order.status)
        .bind(&order.error_message)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// The order a polling device should work on: its oldest active order.
    ///
    /// An in-progress order left over from a device restart is picked up
    /// again just like a pending one; ordering by creation time keeps the
    /// queue fair (FIFO).
    pub async fn next_for_device(&self, device_id: &str) -> DbResult<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE device_id = ?1 AND status IN ('pending', 'in_progress') \
             ORDER BY created_at ASC LIMIT 1"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Adopts a dose as the order's current one, resetting poured progress.
    pub async fn set_current_dose(
        &self,
        order_id: &str,
        dose_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE orders SET current_dose_id = ?2, dose_progress = 0, updated_at = ?3 \
             WHERE id = ?1",
        )
        .bind(order_id)
        .bind(dose_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records poured milliliters of the current dose (last write wins).
    pub async fn set_progress(
        &self,
        order_id: &str,
        progress_ml: f64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE orders SET dose_progress = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(progress_ml)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Moves a pending order to in_progress.
    ///
    /// ## Returns
    /// `true` if the row moved, `false` if it was not pending (already
    /// started, or terminal).
    pub async fn mark_in_progress(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'in_progress', updated_at = ?2 \
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Completes an active order. Returns `false` if it was already terminal.
    pub async fn mark_completed(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'completed', updated_at = ?2 \
             WHERE id = ?1 AND status IN ('pending', 'in_progress')",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fails an active order, recording the formatted device error.
    /// Returns `false` if it was already terminal.
    pub async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'failed', error_message = ?2, updated_at = ?3 \
             WHERE id = ?1 AND status IN ('pending', 'in_progress')",
        )
        .bind(id)
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancels an active order. Returns `false` if it was already terminal.
    pub async fn mark_cancelled(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled', updated_at = ?2 \
             WHERE id = ?1 AND status IN ('pending', 'in_progress')",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// A customer's active orders joined flat for the live feed, FIFO.
    pub async fn active_for_customer(&self, customer_id: &str) -> DbResult<Vec<ActiveOrderView>> {
        let views = sqlx::query_as::<_, ActiveOrderView>(
            "SELECT o.id AS order_id, \
                    o.cocktail_id, \
                    c.name AS cocktail_name, \
                    o.status, \
                    o.device_id, \
                    (SELECT number FROM dose WHERE id = o.current_dose_id) AS current_dose_number, \
                    (SELECT COUNT(*) FROM dose WHERE cocktail_id = o.cocktail_id) AS dose_count, \
                    o.dose_progress, \
                    o.created_at \
             FROM orders o \
             JOIN cocktail c ON c.id = o.cocktail_id \
             WHERE o.customer_id = ?1 AND o.status IN ('pending', 'in_progress') \
             ORDER BY o.created_at ASC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(views)
    }

    /// A customer's most recent orders regardless of status, newest first.
    pub async fn history_for_customer(
        &self,
        customer_id: &str,
        limit: i64,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1 \
             ORDER BY created_at DESC LIMIT ?2"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(customer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// IDs of the customer's orders that reached a terminal status at or
    /// after `since`.
    ///
    /// The live feed uses this on its first tick so a terminal transition in
    /// the window between the customer connecting and the first poll is not
    /// silently missed.
    pub async fn terminated_since(
        &self,
        customer_id: &str,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM orders \
             WHERE customer_id = ?1 \
               AND status IN ('completed', 'failed', 'cancelled') \
               AND updated_at >= ?2 \
             ORDER BY updated_at ASC",
        )
        .bind(customer_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use barkeep_core::{Cocktail, Device, Dose, Ingredient};
    use chrono::Duration;

    async fn test_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let devices = db.devices();
        devices.insert_profile("p1", "ada").await.unwrap();
        devices
            .insert(&Device {
                id: "d1".to_string(),
                profile_id: "p1".to_string(),
                name: "Bar".to_string(),
                api_token: None,
                firmware_version: "unknown".to_string(),
                is_default: true,
                needs_calibration: false,
                hx711_dt: None,
                hx711_sck: None,
                hx711_offset: 0,
                hx711_scale: 1.0,
                rgb_r_gpio: None,
                rgb_g_gpio: None,
                rgb_b_gpio: None,
                switch_gpio: None,
                added_at: Utc::now(),
                last_used_at: None,
                last_ping_at: None,
            })
            .await
            .unwrap();

        let catalog = db.catalog();
        catalog
            .insert_ingredient(&Ingredient {
                id: "i1".to_string(),
                name: "Gin".to_string(),
                alcohol_percentage: 40.0,
                density: 940.0,
                added_separately: false,
            })
            .await
            .unwrap();
        catalog
            .insert_cocktail(&Cocktail {
                id: "c1".to_string(),
                name: "Gin Shot".to_string(),
                creator_id: "p1".to_string(),
                description: None,
                instructions: None,
                image_uri: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        catalog
            .insert_dose(&Dose {
                id: "do1".to_string(),
                cocktail_id: "c1".to_string(),
                ingredient_id: "i1".to_string(),
                quantity: 40.0,
                number: 1,
            })
            .await
            .unwrap();

        db
    }

    fn order(id: &str, created_at: DateTime<Utc>) -> Order {
        Order {
            id: id.to_string(),
            customer_id: "p1".to_string(),
            device_id: Some("d1".to_string()),
            cocktail_id: "c1".to_string(),
            current_dose_id: None,
            dose_progress: 0.0,
            status: OrderStatus::Pending,
            error_message: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_next_for_device_is_fifo() {
        let db = test_db().await;
        let repo = db.orders();
        let now = Utc::now();

        repo.create(&order("o2", now)).await.unwrap();
        repo.create(&order("o1", now - Duration::minutes(5)))
            .await
            .unwrap();

        let next = repo.next_for_device("d1").await.unwrap().unwrap();
        assert_eq!(next.id, "o1");

        // A started order is still the one handed back after a device restart
        assert!(repo.mark_in_progress("o1", Utc::now()).await.unwrap());
        let next = repo.next_for_device("d1").await.unwrap().unwrap();
        assert_eq!(next.id, "o1");
        assert_eq!(next.status, OrderStatus::InProgress);
    }

    #[tokio::test]
    async fn test_guarded_transitions() {
        let db = test_db().await;
        let repo = db.orders();
        let now = Utc::now();
        repo.create(&order("o1", now)).await.unwrap();

        assert!(repo.mark_in_progress("o1", now).await.unwrap());
        // Second start attempt loses the guard
        assert!(!repo.mark_in_progress("o1", now).await.unwrap());

        assert!(repo.mark_completed("o1", now).await.unwrap());
        // Terminal: cancel, fail and complete are all rejected
        assert!(!repo.mark_cancelled("o1", now).await.unwrap());
        assert!(!repo.mark_failed("o1", "[2] scale fault: x", now).await.unwrap());
        assert!(!repo.mark_completed("o1", now).await.unwrap());

        let order = repo.get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.error_message.is_none());
    }

    #[tokio::test]
    async fn test_set_current_dose_resets_progress() {
        let db = test_db().await;
        let repo = db.orders();
        let now = Utc::now();
        repo.create(&order("o1", now)).await.unwrap();

        repo.set_current_dose("o1", "do1", now).await.unwrap();
        repo.set_progress("o1", 25.0, now).await.unwrap();
        let loaded = repo.get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(loaded.dose_progress, 25.0);

        // Adopting the next dose starts the count over
        repo.set_current_dose("o1", "do1", now).await.unwrap();
        let loaded = repo.get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(loaded.dose_progress, 0.0);
    }

    #[tokio::test]
    async fn test_active_view_and_terminated_since() {
        let db = test_db().await;
        let repo = db.orders();
        let now = Utc::now();

        repo.create(&order("o1", now)).await.unwrap();
        repo.set_current_dose("o1", "do1", now).await.unwrap();

        let views = repo.active_for_customer("p1").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].cocktail_name, "Gin Shot");
        assert_eq!(views[0].current_dose_number, Some(1));
        assert_eq!(views[0].dose_count, 1);

        repo.mark_completed("o1", now).await.unwrap();
        assert!(repo.active_for_customer("p1").await.unwrap().is_empty());

        let recent = repo
            .terminated_since("p1", now - Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(recent, vec!["o1".to_string()]);

        // Outside the lookback window
        let none = repo
            .terminated_since("p1", now + Duration::minutes(1))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let db = test_db().await;
        let repo = db.orders();
        let now = Utc::now();

        repo.create(&order("o1", now - Duration::minutes(10)))
            .await
            .unwrap();
        repo.create(&order("o2", now)).await.unwrap();
        repo.mark_cancelled("o1", now).await.unwrap();

        let history = repo.history_for_customer("p1", 10).await.unwrap();
        let ids: Vec<_> = history.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o2", "o1"]);

        let limited = repo.history_for_customer("p1", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}

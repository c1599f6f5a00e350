//! # Pump Repository
//!
//! Database operations for pump wiring and availability.
//!
//! A pump row exists as soon as the owner configures it, but only rows with
//! a GPIO pin, an assigned ingredient and a non-empty bottle count toward
//! what a device can actually dispense. The capability resolver and pour
//! pump selection both go through [`PumpRepository::usable_for_device`].

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use barkeep_core::Pump;

/// Repository for pump database operations.
#[derive(Debug, Clone)]
pub struct PumpRepository {
    pool: SqlitePool,
}

impl PumpRepository {
    /// Creates a new PumpRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PumpRepository { pool }
    }

    /// Inserts a pump record.
    ///
    /// Fails with [`DbError::UniqueViolation`] when another pump on the same
    /// device already claims the GPIO pin.
    pub async fn insert(&self, pump: &Pump) -> DbResult<()> {
        debug!(id = %pump.id, device = %pump.device_id, gpio = ?pump.gpio, "Inserting pump");

        sqlx::query(
            "INSERT INTO pump (id, device_id, gpio, ingredient_id, is_empty) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&pump.id)
        .bind(&pump.device_id)
        .bind(pump.gpio)
        .bind(&pump.ingredient_id)
        .bind(pump.is_empty)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All pumps of a device, usable or not, ordered by GPIO pin.
    pub async fn pumps_for_device(&self, device_id: &str) -> DbResult<Vec<Pump>> {
        let pumps = sqlx::query_as::<_, Pump>(
            "SELECT id, device_id, gpio, ingredient_id, is_empty \
             FROM pump WHERE device_id = ?1 ORDER BY gpio",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pumps)
    }

    /// Pumps of a device that can dispense right now: wired, assigned and
    /// not empty. Ordered by GPIO pin so selection is deterministic.
    pub async fn usable_for_device(&self, device_id: &str) -> DbResult<Vec<Pump>> {
        let pumps = sqlx::query_as::<_, Pump>(
            "SELECT id, device_id, gpio, ingredient_id, is_empty \
             FROM pump \
             WHERE device_id = ?1 \
               AND is_empty = 0 \
               AND gpio IS NOT NULL \
               AND ingredient_id IS NOT NULL \
             ORDER BY gpio",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pumps)
    }

    /// Marks a pump's bottle as empty or refilled.
    pub async fn set_empty(&self, id: &str, is_empty: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE pump SET is_empty = ?2 WHERE id = ?1")
            .bind(id)
            .bind(is_empty)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pump", id));
        }
        Ok(())
    }

    /// Assigns (or clears) the ingredient a pump dispenses.
    pub async fn assign_ingredient(&self, id: &str, ingredient_id: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE pump SET ingredient_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(ingredient_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pump", id));
        }
        Ok(())
    }

    /// Moves a pump to another GPIO pin (or unwires it with None).
    ///
    /// Subject to the same per-device pin uniqueness as [`insert`](Self::insert).
    pub async fn set_gpio(&self, id: &str, gpio: Option<i64>) -> DbResult<()> {
        let result = sqlx::query("UPDATE pump SET gpio = ?2 WHERE id = ?1")
            .bind(id)
            .bind(gpio)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pump", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Device Repository
//!
//! Database operations for devices and their owning profiles.
//!
//! ## Device Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Device Lifecycle                                  │
//! │                                                                         │
//! │  1. ENROLL                                                             │
//! │     └── insert() then issue_token() → device can authenticate          │
//! │                                                                         │
//! │  2. OPERATE                                                            │
//! │     └── get_by_token() on every poll                                   │
//! │     └── touch_ping() on every authenticated call                       │
//! │     └── record_verify() on firmware check-in                          │
//! │                                                                         │
//! │  3. DELETE                                                             │
//! │     └── delete() → active orders cancelled, historical orders          │
//! │         detached (device_id → NULL), pumps removed                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use barkeep_core::Device;

/// Column list shared by all device SELECTs so FromRow stays in sync.
const DEVICE_COLUMNS: &str = "id, profile_id, name, api_token, firmware_version, is_default, \
     needs_calibration, hx711_dt, hx711_sck, hx711_offset, hx711_scale, \
     rgb_r_gpio, rgb_g_gpio, rgb_b_gpio, switch_gpio, added_at, last_used_at, last_ping_at";

/// Repository for device database operations.
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: SqlitePool,
}

impl DeviceRepository {
    /// Creates a new DeviceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeviceRepository { pool }
    }

    /// Inserts a customer profile.
    ///
    /// The account machinery lives outside the core; this exists for the
    /// seed binary and tests, which need profiles to satisfy foreign keys.
    pub async fn insert_profile(&self, id: &str, username: &str) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query("INSERT INTO profile (id, username, created_at) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(username)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a device record.
    pub async fn insert(&self, device: &Device) -> DbResult<()> {
        debug!(id = %device.id, name = %device.name, "Inserting device");

        sqlx::query(
            "INSERT INTO device (\
                 id, profile_id, name, api_token, firmware_version, is_default, \
                 needs_calibration, hx711_dt, hx711_sck, hx711_offset, hx711_scale, \
                 rgb_r_gpio, rgb_g_gpio, rgb_b_gpio, switch_gpio, \
                 added_at, last_used_at, last_ping_at\
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        )
        .bind(&device.id)
        .bind(&device.profile_id)
        .bind(&device.name)
        .bind(&device.api_token)
        .bind(&device.firmware_version)
        .bind(device.is_default)
        .bind(device.needs_calibration)
        .bind(device.hx711_dt)
        .bind(device.hx711_sck)
        .bind(device.hx711_offset)
        .bind(device.hx711_scale)
        .bind(device.rgb_r_gpio)
        .bind(device.rgb_g_gpio)
        .bind(device.rgb_b_gpio)
        .bind(device.switch_gpio)
        .bind(device.added_at)
        .bind(device.last_used_at)
        .bind(device.last_ping_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a device by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM device WHERE id = ?1");
        let device = sqlx::query_as::<_, Device>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(device)
    }

    /// Gets a device by its bearer token.
    ///
    /// The hot path of every device call; the token column is UNIQUE.
    pub async fn get_by_token(&self, token: &str) -> DbResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM device WHERE api_token = ?1");
        let device = sqlx::query_as::<_, Device>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(device)
    }

    /// Updates the device's liveness timestamp.
    ///
    /// Called on every authenticated request.
    pub async fn touch_ping(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE device SET last_ping_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records a firmware check-in from the `verify` call.
    ///
    /// Updates firmware version and last-used time. When the device
    /// self-reports needing calibration the flag is latched on; it is never
    /// cleared here (only the calibration workflow clears it).
    pub async fn record_verify(
        &self,
        id: &str,
        firmware_version: &str,
        self_reports_calibration: bool,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, firmware = %firmware_version, "Device verify check-in");

        if self_reports_calibration {
            sqlx::query(
                "UPDATE device SET firmware_version = ?2, last_used_at = ?3, \
                 needs_calibration = 1 WHERE id = ?1",
            )
            .bind(id)
            .bind(firmware_version)
            .bind(now)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE device SET firmware_version = ?2, last_used_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(firmware_version)
                .bind(now)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Issues a fresh bearer token for a device, replacing any previous one.
    ///
    /// ## Returns
    /// The newly issued token. The old token stops working immediately.
    pub async fn issue_token(&self, id: &str) -> DbResult<String> {
        let token = Uuid::new_v4().simple().to_string();

        let result = sqlx::query("UPDATE device SET api_token = ?2 WHERE id = ?1")
            .bind(id)
            .bind(&token)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Device", id));
        }

        debug!(id = %id, "Issued new device token");
        Ok(token)
    }

    /// Sets or clears the calibration flag.
    ///
    /// The calibration workflow clears it after a successful tare + weigh;
    /// re-wiring the scale sets it again.
    pub async fn set_needs_calibration(&self, id: &str, needs_calibration: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE device SET needs_calibration = ?2 WHERE id = ?1")
            .bind(id)
            .bind(needs_calibration)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Device", id));
        }
        Ok(())
    }

    /// Stores the HX711 calibration parameters produced by the calibration
    /// workflow.
    pub async fn update_scale_calibration(
        &self,
        id: &str,
        hx711_offset: i64,
        hx711_scale: f64,
    ) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE device SET hx711_offset = ?2, hx711_scale = ?3 WHERE id = ?1")
                .bind(id)
                .bind(hx711_offset)
                .bind(hx711_scale)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Device", id));
        }
        Ok(())
    }

    /// Deletes a device while preserving order history.
    ///
    /// ## What This Does (one transaction)
    /// 1. Cancels the device's still-active orders
    /// 2. Detaches all its orders (device_id → NULL)
    /// 3. Removes its pumps and the device row
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE orders SET status = 'cancelled', updated_at = ?2 \
             WHERE device_id = ?1 AND status IN ('pending', 'in_progress')",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE orders SET device_id = NULL WHERE device_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM pump WHERE device_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM device WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Device", id));
        }

        tx.commit().await?;
        debug!(id = %id, "Device deleted, orders detached");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_device(id: &str, profile_id: &str) -> Device {
        Device {
            id: id.to_string(),
            profile_id: profile_id.to_string(),
            name: "Kitchen Bar".to_string(),
            api_token: None,
            firmware_version: "unknown".to_string(),
            is_default: true,
            needs_calibration: true,
            hx711_dt: Some(4),
            hx711_sck: Some(5),
            hx711_offset: 0,
            hx711_scale: 1.0,
            rgb_r_gpio: None,
            rgb_g_gpio: None,
            rgb_b_gpio: None,
            switch_gpio: None,
            added_at: Utc::now(),
            last_used_at: None,
            last_ping_at: None,
        }
    }

    #[tokio::test]
    async fn test_token_roundtrip() {
        let db = test_db().await;
        let repo = db.devices();

        repo.insert_profile("p1", "ada").await.unwrap();
        repo.insert(&sample_device("d1", "p1")).await.unwrap();

        // No token yet: lookups miss
        assert!(repo.get_by_token("nope").await.unwrap().is_none());

        let token = repo.issue_token("d1").await.unwrap();
        let found = repo.get_by_token(&token).await.unwrap().unwrap();
        assert_eq!(found.id, "d1");

        // Re-issuing invalidates the old token
        let token2 = repo.issue_token("d1").await.unwrap();
        assert_ne!(token, token2);
        assert!(repo.get_by_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_verify_latches_calibration() {
        let db = test_db().await;
        let repo = db.devices();

        repo.insert_profile("p1", "ada").await.unwrap();
        let mut device = sample_device("d1", "p1");
        device.needs_calibration = false;
        repo.insert(&device).await.unwrap();

        // Self-report latches the flag on
        repo.record_verify("d1", "1.2.0", true, Utc::now())
            .await
            .unwrap();
        let device = repo.get_by_id("d1").await.unwrap().unwrap();
        assert!(device.needs_calibration);
        assert_eq!(device.firmware_version, "1.2.0");

        // A later verify without the flag does NOT clear it
        repo.record_verify("d1", "1.2.1", false, Utc::now())
            .await
            .unwrap();
        let device = repo.get_by_id("d1").await.unwrap().unwrap();
        assert!(device.needs_calibration);
        assert_eq!(device.firmware_version, "1.2.1");
    }

    #[tokio::test]
    async fn test_calibration_workflow_updates() {
        let db = test_db().await;
        let repo = db.devices();

        repo.insert_profile("p1", "ada").await.unwrap();
        repo.insert(&sample_device("d1", "p1")).await.unwrap();

        repo.update_scale_calibration("d1", -42137, 213.7).await.unwrap();
        repo.set_needs_calibration("d1", false).await.unwrap();

        let device = repo.get_by_id("d1").await.unwrap().unwrap();
        assert_eq!(device.hx711_offset, -42137);
        assert_eq!(device.hx711_scale, 213.7);
        assert!(!device.needs_calibration);
    }

    #[tokio::test]
    async fn test_issue_token_unknown_device() {
        let db = test_db().await;
        let result = db.devices().issue_token("ghost").await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_cancels_and_detaches_orders() {
        use barkeep_core::{Order, OrderStatus, Pump};

        let db = test_db().await;
        let repo = db.devices();
        repo.insert_profile("p1", "ada").await.unwrap();
        repo.insert(&sample_device("d1", "p1")).await.unwrap();

        db.catalog()
            .insert_ingredient(&barkeep_core::Ingredient {
                id: "i1".to_string(),
                name: "Gin".to_string(),
                alcohol_percentage: 40.0,
                density: 940.0,
                added_separately: false,
            })
            .await
            .unwrap();
        db.catalog()
            .insert_cocktail(&barkeep_core::Cocktail {
                id: "c1".to_string(),
                name: "Shot".to_string(),
                creator_id: "p1".to_string(),
                description: None,
                instructions: None,
                image_uri: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        db.pumps()
            .insert(&Pump {
                id: "pu1".to_string(),
                device_id: "d1".to_string(),
                gpio: Some(17),
                ingredient_id: Some("i1".to_string()),
                is_empty: false,
            })
            .await
            .unwrap();

        let now = Utc::now();
        for (id, status) in [("o1", OrderStatus::Pending), ("o2", OrderStatus::Completed)] {
            db.orders()
                .create(&Order {
                    id: id.to_string(),
                    customer_id: "p1".to_string(),
                    device_id: Some("d1".to_string()),
                    cocktail_id: "c1".to_string(),
                    current_dose_id: None,
                    dose_progress: 0.0,
                    status,
                    error_message: None,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        repo.delete("d1").await.unwrap();

        assert!(repo.get_by_id("d1").await.unwrap().is_none());
        assert!(db.pumps().pumps_for_device("d1").await.unwrap().is_empty());

        // Active order cancelled, history kept, both detached
        let o1 = db.orders().get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(o1.status, OrderStatus::Cancelled);
        assert!(o1.device_id.is_none());
        let o2 = db.orders().get_by_id("o2").await.unwrap().unwrap();
        assert_eq!(o2.status, OrderStatus::Completed);
        assert!(o2.device_id.is_none());
    }
}

//! # Order Orchestrator
//!
//! The order/dose state machine driven by device polls.
//!
//! ## Poll Algorithm (`next_action`)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. oldest active order for device?  ──none──► Standby                 │
//! │  2. no current dose?  adopt dose #1 (persist, progress := 0)           │
//! │     cocktail has no doses?  ──► Standby + diagnostic                   │
//! │  3. while progress >= dose.quantity:                                    │
//! │        next dose by number?  adopt it (progress := 0)                  │
//! │        none left?            mark completed ──► Completed              │
//! │  4. Pour { quantity_left, ingredient, pump? }                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The operation is idempotent: with no intervening progress report, the
//! same poll returns the same pour instruction. State only advances when
//! stored progress has actually reached the dose target, so a device can
//! safely retry any request it lost the response to.
//!
//! Transitions themselves are validated by `barkeep_core::order_flow` and
//! then persisted through guarded UPDATEs, so a race with a customer cancel
//! resolves to a no-op rather than a terminal-status overwrite.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use barkeep_core::{
    order_flow, CoreError, Density, Device, Dose, NextAction, PumpTarget, MIN_POURABLE_ML,
};

use crate::capability;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// One progress report, in whichever unit the device measures.
#[derive(Debug, Clone, Copy)]
pub enum ProgressAmount {
    /// Flow-metered milliliters (volume-direct mode).
    VolumeMl(f64),
    /// Scale grams (weight-derived mode); converted via ingredient density.
    WeightG(f64),
}

/// Answer to a progress report.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressOutcome {
    /// False the moment the device must stop actuating.
    pub continue_pouring: bool,
    pub message: String,
}

impl ProgressOutcome {
    fn stop(message: impl Into<String>) -> Self {
        ProgressOutcome {
            continue_pouring: false,
            message: message.into(),
        }
    }
}

/// Outcome of an error report or a cancel request.
#[derive(Debug, Clone, Serialize)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Next Action
// =============================================================================

/// Decides what a polling device should do right now.
pub async fn next_action(state: &AppState, device: &Device) -> ApiResult<NextAction> {
    let orders = state.db.orders();
    let catalog = state.db.catalog();
    let now = Utc::now();

    let order = match orders.next_for_device(&device.id).await? {
        Some(order) => order,
        None => return Ok(NextAction::Standby { message: None }),
    };

    // Adopt the first dose if the order is fresh
    let (mut dose, mut progress) = match &order.current_dose_id {
        Some(dose_id) => {
            let dose = catalog
                .dose_by_id(dose_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Dose", dose_id.clone()))?;
            (dose, order.dose_progress)
        }
        None => match catalog.first_dose(&order.cocktail_id).await? {
            Some(first) => {
                orders.set_current_dose(&order.id, &first.id, now).await?;
                debug!(order = %order.id, dose = %first.id, "Adopted first dose");
                (first, 0.0)
            }
            None => {
                // Recipe misconfiguration, not a device fault
                return Ok(NextAction::Standby {
                    message: Some(CoreError::EmptyRecipe(order.cocktail_id.clone()).to_string()),
                });
            }
        },
    };

    // Advance past every exhausted dose (zero-quantity doses fold away here)
    while dose.quantity - progress < MIN_POURABLE_ML {
        match catalog.next_dose(&order.cocktail_id, dose.number).await? {
            Some(next) => {
                orders.set_current_dose(&order.id, &next.id, now).await?;
                debug!(order = %order.id, dose = %next.id, number = next.number, "Advanced to next dose");
                dose = next;
                progress = 0.0;
            }
            None => {
                if orders.mark_completed(&order.id, now).await? {
                    info!(order = %order.id, "Order completed");
                    return Ok(NextAction::Completed { order_id: order.id });
                }
                // A cancel or error report won the race; nothing left to pour
                return Ok(NextAction::Standby { message: None });
            }
        }
    }

    let pump = pump_target(state, device, &dose, progress).await?;
    Ok(NextAction::Pour {
        order_id: order.id,
        dose_id: dose.id,
        ingredient_id: dose.ingredient_id,
        quantity_left_ml: (dose.quantity - progress).max(0.0),
        pump,
    })
}

/// Resolves the pump and weight-denominated targets for a pour, when the
/// device has a usable pump for the dose's ingredient.
async fn pump_target(
    state: &AppState,
    device: &Device,
    dose: &Dose,
    progress_ml: f64,
) -> ApiResult<Option<PumpTarget>> {
    let Some(pump) = capability::find_pump(state, &device.id, &dose.ingredient_id).await? else {
        return Ok(None);
    };
    let Some(gpio) = pump.gpio else {
        return Ok(None);
    };

    let ingredient = state
        .db
        .catalog()
        .get_ingredient(&dose.ingredient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient", dose.ingredient_id.clone()))?;
    let density = Density::from_grams_per_liter(ingredient.density);

    Ok(Some(PumpTarget {
        gpio,
        dose_weight_g: density.weight_from_volume(dose.quantity),
        dose_weight_progress_g: density.weight_from_volume(progress_ml),
    }))
}

// =============================================================================
// Progress Reports
// =============================================================================

/// Records dispensing progress and answers whether the device should keep
/// pouring.
///
/// Progress is last-write-wins: a device restarting mid-pour may resend a
/// smaller absolute reading and the server takes it at face value.
pub async fn report_progress(
    state: &AppState,
    device: &Device,
    order_id: &str,
    dose_id: &str,
    amount: ProgressAmount,
) -> ApiResult<ProgressOutcome> {
    let orders = state.db.orders();
    let catalog = state.db.catalog();
    let now = Utc::now();

    let order = orders
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", order_id))?;
    if order.device_id.as_deref() != Some(device.id.as_str()) {
        return Err(ApiError::Forbidden(
            "Order is not assigned to this device".to_string(),
        ));
    }

    // A cancel/error that landed moments ago is a stop signal, not an error
    if order.status.is_terminal() {
        return Ok(ProgressOutcome::stop("Order is no longer active"));
    }

    // A lagging device reporting against a dose the order has moved past
    if order.current_dose_id.as_deref() != Some(dose_id) {
        return Err(ApiError::BadRequest(
            CoreError::DoseMismatch {
                order_id: order.id.clone(),
                reported: dose_id.to_string(),
            }
            .to_string(),
        ));
    }

    let dose = catalog
        .dose_by_id(dose_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Dose", dose_id))?;

    let volume_ml = match amount {
        ProgressAmount::VolumeMl(ml) => ml,
        ProgressAmount::WeightG(grams) => {
            let ingredient = catalog
                .get_ingredient(&dose.ingredient_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Ingredient", dose.ingredient_id.clone()))?;
            Density::from_grams_per_liter(ingredient.density).volume_from_weight(grams)
        }
    };

    // First report promotes pending → in_progress
    if order_flow::begin_dispensing(order.clone(), now).is_ok() {
        orders.mark_in_progress(&order.id, now).await?;
    }

    orders.set_progress(&order.id, volume_ml, now).await?;
    debug!(order = %order.id, dose = %dose.id, volume_ml, "Progress recorded");

    if volume_ml < dose.quantity {
        Ok(ProgressOutcome {
            continue_pouring: true,
            message: "Keep pouring".to_string(),
        })
    } else {
        Ok(ProgressOutcome::stop("Dose complete"))
    }
}

// =============================================================================
// Error Reports & Cancellation
// =============================================================================

/// Records a device-reported hardware error as a terminal failure.
pub async fn report_error(
    state: &AppState,
    device: &Device,
    order_id: &str,
    code: i64,
    message: &str,
) -> ApiResult<Acknowledgement> {
    let orders = state.db.orders();
    let now = Utc::now();

    let order = orders
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", order_id))?;
    if order.device_id.as_deref() != Some(device.id.as_str()) {
        return Err(ApiError::Forbidden(
            "Order is not assigned to this device".to_string(),
        ));
    }

    match order_flow::fail(order, code, message, now) {
        Ok(failed) => {
            let error_message = failed.error_message.unwrap_or_default();
            let moved = orders.mark_failed(order_id, &error_message, now).await?;
            if moved {
                info!(order = %order_id, code, "Order failed on device error");
                Ok(Acknowledgement {
                    success: true,
                    message: error_message,
                })
            } else {
                Ok(Acknowledgement {
                    success: false,
                    message: "Order is no longer active".to_string(),
                })
            }
        }
        Err(rejected) => Ok(Acknowledgement {
            success: false,
            message: rejected.to_string(),
        }),
    }
}

/// Cancels an active order on behalf of its device.
///
/// A device may only cancel the order assigned to it; a terminal order
/// yields `success: false` rather than an error, mirroring the progress
/// handler's treatment of lost races.
pub async fn cancel(state: &AppState, device: &Device, order_id: &str) -> ApiResult<Acknowledgement> {
    let orders = state.db.orders();
    let now = Utc::now();

    let order = orders
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", order_id))?;
    if order.device_id.as_deref() != Some(device.id.as_str()) {
        return Err(ApiError::Forbidden(
            "Order is not assigned to this device".to_string(),
        ));
    }

    match order_flow::cancel(order, now) {
        Ok(_) => {
            let moved = orders.mark_cancelled(order_id, now).await?;
            if moved {
                info!(order = %order_id, device = %device.id, "Order cancelled by device");
                Ok(Acknowledgement {
                    success: true,
                    message: "Order cancelled".to_string(),
                })
            } else {
                Ok(Acknowledgement {
                    success: false,
                    message: "Order is no longer active".to_string(),
                })
            }
        }
        Err(rejected) => Ok(Acknowledgement {
            success: false,
            message: rejected.to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use barkeep_core::{Cocktail, Ingredient, Order, OrderStatus, Pump};
    use barkeep_db::{Database, DbConfig};

    struct Fixture {
        state: AppState,
        device: Device,
    }

    /// Two-dose cocktail: 30 ml of A (density 1000), 20 ml of B (density 800),
    /// pumps on GPIO 17 (A) and 22 (B).
    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, ServerConfig::default());

        let devices = state.db.devices();
        devices.insert_profile("p1", "ada").await.unwrap();
        let device = Device {
            id: "d1".to_string(),
            profile_id: "p1".to_string(),
            name: "Bar".to_string(),
            api_token: Some("tok".to_string()),
            firmware_version: "1.0".to_string(),
            is_default: true,
            needs_calibration: false,
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
        };
        devices.insert(&device).await.unwrap();

        let catalog = state.db.catalog();
        catalog
            .insert_ingredient(&Ingredient {
                id: "a".to_string(),
                name: "A".to_string(),
                alcohol_percentage: 0.0,
                density: 1000.0,
                added_separately: false,
            })
            .await
            .unwrap();
        catalog
            .insert_ingredient(&Ingredient {
                id: "b".to_string(),
                name: "B".to_string(),
                alcohol_percentage: 40.0,
                density: 800.0,
                added_separately: false,
            })
            .await
            .unwrap();
        catalog
            .insert_cocktail(&Cocktail {
                id: "c1".to_string(),
                name: "Test Mix".to_string(),
                creator_id: "p1".to_string(),
                description: None,
                instructions: None,
                image_uri: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        for (id, ingredient, quantity, number) in [("do1", "a", 30.0, 1), ("do2", "b", 20.0, 2)] {
            catalog
                .insert_dose(&Dose {
                    id: id.to_string(),
                    cocktail_id: "c1".to_string(),
                    ingredient_id: ingredient.to_string(),
                    quantity,
                    number,
                })
                .await
                .unwrap();
        }

        for (id, gpio, ingredient) in [("pu1", 17, "a"), ("pu2", 22, "b")] {
            state
                .db
                .pumps()
                .insert(&Pump {
                    id: id.to_string(),
                    device_id: "d1".to_string(),
                    gpio: Some(gpio),
                    ingredient_id: Some(ingredient.to_string()),
                    is_empty: false,
                })
                .await
                .unwrap();
        }

        Fixture { state, device }
    }

    async fn place_order(state: &AppState, id: &str, cocktail_id: &str) {
        let now = Utc::now();
        state
            .db
            .orders()
            .create(&Order {
                id: id.to_string(),
                customer_id: "p1".to_string(),
                device_id: Some("d1".to_string()),
                cocktail_id: cocktail_id.to_string(),
                current_dose_id: None,
                dose_progress: 0.0,
                status: OrderStatus::Pending,
                error_message: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn expect_pour(action: &NextAction) -> (String, String, f64) {
        match action {
            NextAction::Pour {
                dose_id,
                ingredient_id,
                quantity_left_ml,
                ..
            } => (dose_id.clone(), ingredient_id.clone(), *quantity_left_ml),
            other => panic!("expected pour, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_two_dose_walk_to_completion() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;

        // Poll: pour dose 1, full quantity
        let action = next_action(&f.state, &f.device).await.unwrap();
        let (dose_id, ingredient_id, left) = expect_pour(&action);
        assert_eq!((dose_id.as_str(), ingredient_id.as_str(), left), ("do1", "a", 30.0));

        // Dose 1 done
        let outcome = report_progress(
            &f.state,
            &f.device,
            "o1",
            "do1",
            ProgressAmount::VolumeMl(30.0),
        )
        .await
        .unwrap();
        assert!(!outcome.continue_pouring);

        // Poll: advanced to dose 2, progress reset
        let action = next_action(&f.state, &f.device).await.unwrap();
        let (dose_id, ingredient_id, left) = expect_pour(&action);
        assert_eq!((dose_id.as_str(), ingredient_id.as_str(), left), ("do2", "b", 20.0));

        // Dose 2 done
        let outcome = report_progress(
            &f.state,
            &f.device,
            "o1",
            "do2",
            ProgressAmount::VolumeMl(20.0),
        )
        .await
        .unwrap();
        assert!(!outcome.continue_pouring);

        // Poll: sequence exhausted
        let action = next_action(&f.state, &f.device).await.unwrap();
        assert_eq!(
            action,
            NextAction::Completed {
                order_id: "o1".to_string()
            }
        );
        let order = f.state.db.orders().get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        // And afterwards the device idles
        let action = next_action(&f.state, &f.device).await.unwrap();
        assert_eq!(action, NextAction::Standby { message: None });
    }

    #[tokio::test]
    async fn test_next_action_is_idempotent() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;

        let first = next_action(&f.state, &f.device).await.unwrap();
        let second = next_action(&f.state, &f.device).await.unwrap();
        assert_eq!(first, second);

        // Partial progress does not advance the dose either
        report_progress(
            &f.state,
            &f.device,
            "o1",
            "do1",
            ProgressAmount::VolumeMl(12.0),
        )
        .await
        .unwrap();
        let (dose_id, _, left) = expect_pour(&next_action(&f.state, &f.device).await.unwrap());
        assert_eq!(dose_id, "do1");
        assert_eq!(left, 18.0);
    }

    #[tokio::test]
    async fn test_pour_carries_pump_and_weight_targets() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;

        // Walk to dose 2 (ingredient B, density 800 g/L)
        next_action(&f.state, &f.device).await.unwrap();
        report_progress(
            &f.state,
            &f.device,
            "o1",
            "do1",
            ProgressAmount::VolumeMl(30.0),
        )
        .await
        .unwrap();

        let action = next_action(&f.state, &f.device).await.unwrap();
        match action {
            NextAction::Pour { pump: Some(target), .. } => {
                assert_eq!(target.gpio, 22);
                // 20 ml at 800 g/L weighs 16 g
                assert!((target.dose_weight_g - 16.0).abs() < 1e-9);
                assert_eq!(target.dose_weight_progress_g, 0.0);
            }
            other => panic!("expected pump-addressed pour, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_weight_derived_progress() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;
        next_action(&f.state, &f.device).await.unwrap();

        // Dose 1 is ingredient A at water density: 500 g would be 500 ml,
        // but report only 15 g → 15 ml, keep pouring
        let outcome = report_progress(
            &f.state,
            &f.device,
            "o1",
            "do1",
            ProgressAmount::WeightG(15.0),
        )
        .await
        .unwrap();
        assert!(outcome.continue_pouring);
        let order = f.state.db.orders().get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.dose_progress, 15.0);
        assert_eq!(order.status, OrderStatus::InProgress);

        // 30 g of A at water density is exactly the 30 ml target
        let outcome = report_progress(
            &f.state,
            &f.device,
            "o1",
            "do1",
            ProgressAmount::WeightG(30.0),
        )
        .await
        .unwrap();
        assert!(!outcome.continue_pouring);
    }

    #[tokio::test]
    async fn test_dose_mismatch_rejected_without_mutation() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;
        next_action(&f.state, &f.device).await.unwrap();

        let result = report_progress(
            &f.state,
            &f.device,
            "o1",
            "do2",
            ProgressAmount::VolumeMl(10.0),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        let order = f.state.db.orders().get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.dose_progress, 0.0);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_race_resolves_to_stop() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;
        next_action(&f.state, &f.device).await.unwrap();
        report_progress(
            &f.state,
            &f.device,
            "o1",
            "do1",
            ProgressAmount::VolumeMl(10.0),
        )
        .await
        .unwrap();

        // Customer cancels mid-pour
        assert!(f
            .state
            .db
            .orders()
            .mark_cancelled("o1", Utc::now())
            .await
            .unwrap());

        // The device's in-flight report is answered with a stop, not an error
        let outcome = report_progress(
            &f.state,
            &f.device,
            "o1",
            "do1",
            ProgressAmount::VolumeMl(20.0),
        )
        .await
        .unwrap();
        assert!(!outcome.continue_pouring);

        // And the next poll has nothing for the device
        let action = next_action(&f.state, &f.device).await.unwrap();
        assert_eq!(action, NextAction::Standby { message: None });
    }

    #[tokio::test]
    async fn test_error_report_fails_the_order() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;
        next_action(&f.state, &f.device).await.unwrap();

        let ack = report_error(&f.state, &f.device, "o1", 3, "scale flatlined")
            .await
            .unwrap();
        assert!(ack.success);

        let order = f.state.db.orders().get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(
            order.error_message.as_deref(),
            Some("[3] No weight change: scale flatlined")
        );

        // Re-reporting is acknowledged as a no-op
        let ack = report_error(&f.state, &f.device, "o1", 3, "again")
            .await
            .unwrap();
        assert!(!ack.success);
    }

    #[tokio::test]
    async fn test_device_cannot_touch_foreign_orders() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;

        let mut stranger = f.device.clone();
        stranger.id = "d2".to_string();

        let result = report_progress(
            &f.state,
            &stranger,
            "o1",
            "do1",
            ProgressAmount::VolumeMl(1.0),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let result = cancel(&f.state, &stranger, "o1").await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_empty_recipe_yields_standby_diagnostic() {
        let f = fixture().await;
        f.state
            .db
            .catalog()
            .insert_cocktail(&Cocktail {
                id: "c-empty".to_string(),
                name: "Air".to_string(),
                creator_id: "p1".to_string(),
                description: None,
                instructions: None,
                image_uri: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        place_order(&f.state, "o1", "c-empty").await;

        let action = next_action(&f.state, &f.device).await.unwrap();
        match action {
            NextAction::Standby { message: Some(msg) } => {
                assert!(msg.contains("no doses"));
            }
            other => panic!("expected standby diagnostic, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_device_cancel() {
        let f = fixture().await;
        place_order(&f.state, "o1", "c1").await;

        let ack = cancel(&f.state, &f.device, "o1").await.unwrap();
        assert!(ack.success);
        let order = f.state.db.orders().get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        // Cancelling again is a refused no-op
        let ack = cancel(&f.state, &f.device, "o1").await.unwrap();
        assert!(!ack.success);
    }
}

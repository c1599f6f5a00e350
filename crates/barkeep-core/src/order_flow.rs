//! # Order Flow
//!
//! Status transition functions and device error-code formatting.
//!
//! ## Why Transition Functions
//! The order status used to be an implicit state machine: a status string
//! plus nullable pointers, with each call site re-checking the rules. Here
//! every transition is a function that takes the full order and returns the
//! new order value or a typed rejection, so mutating a terminal order is
//! impossible to express without going through (and being refused by) this
//! module.
//!
//! ```text
//! pending ──begin_dispensing──► in_progress ──complete──► completed
//!    │                              │
//!    ├────────────cancel────────────┼──► cancelled
//!    └────────────fail──────────────┴──► failed
//! ```
//!
//! `complete` also accepts a pending order: a cocktail whose doses are all
//! below the pourable threshold can legitimately finish before any progress
//! report arrives.

use chrono::{DateTime, Utc};

use crate::error::TransitionError;
use crate::types::{Order, OrderStatus};

// =============================================================================
// Transitions
// =============================================================================

/// Promotes a pending order to in_progress on its first progress report.
///
/// Calling this on an order that is already in_progress is a no-op rather
/// than an error - the device cannot know whether an earlier report landed.
pub fn begin_dispensing(mut order: Order, now: DateTime<Utc>) -> Result<Order, TransitionError> {
    match order.status {
        OrderStatus::Pending => {
            order.status = OrderStatus::InProgress;
            order.updated_at = now;
            Ok(order)
        }
        OrderStatus::InProgress => Ok(order),
        status => Err(TransitionError::new(status, "begin dispensing")),
    }
}

/// Marks an order completed once its final dose is exhausted.
pub fn complete(mut order: Order, now: DateTime<Utc>) -> Result<Order, TransitionError> {
    if !order.status.is_active() {
        return Err(TransitionError::new(order.status, "complete"));
    }
    order.status = OrderStatus::Completed;
    order.updated_at = now;
    Ok(order)
}

/// Records a device-reported hardware error as a terminal failure.
///
/// The error message is formatted from the device's numeric code and
/// free-text message; see [`format_error_message`].
pub fn fail(
    mut order: Order,
    code: i64,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Order, TransitionError> {
    if !order.status.is_active() {
        return Err(TransitionError::new(order.status, "fail"));
    }
    order.status = OrderStatus::Failed;
    order.error_message = Some(format_error_message(code, message));
    order.updated_at = now;
    Ok(order)
}

/// Cancels an active order.
pub fn cancel(mut order: Order, now: DateTime<Utc>) -> Result<Order, TransitionError> {
    if !order.status.is_active() {
        return Err(TransitionError::new(order.status, "cancel"));
    }
    order.status = OrderStatus::Cancelled;
    order.updated_at = now;
    Ok(order)
}

// =============================================================================
// Device Error Codes
// =============================================================================

/// Maps a device-reported numeric error code to its name.
///
/// The table is fixed by the firmware protocol; out-of-range codes fold into
/// the "unknown" entry.
pub fn error_code_name(code: i64) -> &'static str {
    match code {
        0 => "Unknown error code",
        1 => "General/unknown error",
        2 => "Weight scale error",
        3 => "No weight change",
        4 => "Negative weight change",
        5 => "Unable to report progress",
        _ => "Unknown error code",
    }
}

/// Formats a device error for storage on the order: `[code] name: message`.
pub fn format_error_message(code: i64, message: &str) -> String {
    format!("[{}] {}: {}", code, error_code_name(code), message)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_status(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: "o1".to_string(),
            customer_id: "c1".to_string(),
            device_id: Some("d1".to_string()),
            cocktail_id: "k1".to_string(),
            current_dose_id: None,
            dose_progress: 0.0,
            status,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_begin_dispensing_promotes_pending() {
        let order = order_with_status(OrderStatus::Pending);
        let order = begin_dispensing(order, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::InProgress);
    }

    #[test]
    fn test_begin_dispensing_is_idempotent_for_in_progress() {
        let order = order_with_status(OrderStatus::InProgress);
        let order = begin_dispensing(order, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::InProgress);
    }

    #[test]
    fn test_terminal_orders_reject_all_transitions() {
        for status in [
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ] {
            let now = Utc::now();
            assert!(begin_dispensing(order_with_status(status), now).is_err());
            assert!(complete(order_with_status(status), now).is_err());
            assert!(fail(order_with_status(status), 1, "x", now).is_err());
            assert!(cancel(order_with_status(status), now).is_err());
        }
    }

    #[test]
    fn test_fail_formats_error_message() {
        let order = order_with_status(OrderStatus::InProgress);
        let order = fail(order, 3, "scale flatlined", Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(
            order.error_message.as_deref(),
            Some("[3] No weight change: scale flatlined")
        );
    }

    #[test]
    fn test_cancel_from_both_active_statuses() {
        let now = Utc::now();
        let order = cancel(order_with_status(OrderStatus::Pending), now).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        let order = cancel(order_with_status(OrderStatus::InProgress), now).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_unknown_error_code_folds_to_unknown() {
        assert_eq!(error_code_name(42), "Unknown error code");
        assert_eq!(
            format_error_message(42, "??"),
            "[42] Unknown error code: ??"
        );
    }
}

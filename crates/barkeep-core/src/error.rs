//! # Error Types
//!
//! Domain-specific error types for barkeep-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  barkeep-core errors (this file)                                       │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── TransitionError  - Illegal order status transitions               │
//! │                                                                         │
//! │  barkeep-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  server errors (in app)                                                │
//! │  └── ApiError         - What the device/browser sees (HTTP + JSON)    │
//! │                                                                         │
//! │  Flow: TransitionError → CoreError → DbError → ApiError → wire         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Transition Error
// =============================================================================

/// Rejected order status transition.
///
/// ## When This Occurs
/// - A progress report arrives for an order a customer just cancelled
/// - A device retries an error report against an already-failed order
/// - Any attempt to mutate a terminal order
///
/// These are not exceptional in practice: they are the mechanism by which
/// a lagging device is told to resynchronize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} an order with status {status:?}")]
pub struct TransitionError {
    /// The status the order was in when the transition was attempted.
    pub status: OrderStatus,
    /// Human-readable name of the attempted transition.
    pub action: &'static str,
}

impl TransitionError {
    pub fn new(status: OrderStatus, action: &'static str) -> Self {
        TransitionError { status, action }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Illegal order status transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A cocktail has no doses at all.
    ///
    /// ## When This Occurs
    /// The recipe editor normally prevents this, but an order can reference
    /// a cocktail whose doses were deleted afterwards. Surfaced to devices
    /// as a standby with a diagnostic, never as a hard failure.
    #[error("cocktail {0} has no doses")]
    EmptyRecipe(String),

    /// A progress report referenced a dose that is not the order's current one.
    ///
    /// Guards against a device lagging behind a state transition it has not
    /// yet observed.
    #[error("reported dose {reported} does not match current dose for order {order_id}")]
    DoseMismatch { order_id: String, reported: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

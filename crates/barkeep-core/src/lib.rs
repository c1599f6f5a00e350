//! # barkeep-core: Pure Domain Logic for Barkeep
//!
//! This crate is the **heart** of Barkeep. It contains the order/dose state
//! machine rules, measurement conversion and recipe feasibility logic as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Barkeep Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Devices (ESP32, polling JSON API)                 │   │
//! │  │    verify ──► action ──► progress ──► weight ──► error         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/server (axum)                           │   │
//! │  │    authenticator, orchestrator, telemetry caches, SSE feeds    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ barkeep-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐ ┌────────────┐ │   │
//! │  │   │   types   │  │  volume   │  │ order_flow │ │ capability │ │   │
//! │  │   │  Device   │  │  Density  │  │ transitions│ │feasibility │ │   │
//! │  │   │   Order   │  │ g ↔ ml    │  │ error codes│ │  tagging   │ │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘ └────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    barkeep-db (Database Layer)                  │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Device, Pump, Order, Dose, etc.)
//! - [`volume`] - Density type and weight/volume conversion
//! - [`order_flow`] - Order status transitions and device error codes
//! - [`capability`] - Recipe feasibility classification
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Typed Transitions**: Terminal orders cannot be mutated - the type system
//!    rejects the transition before any persistence happens
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use barkeep_core::volume::Density;
//!
//! // A spirit at 800 g/L: 500 g on the scale is 625 ml in the glass
//! let density = Density::from_grams_per_liter(800.0);
//! let ml = density.volume_from_weight(500.0);
//! assert!((ml - 625.0).abs() < f64::EPSILON);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod capability;
pub mod error;
pub mod order_flow;
pub mod types;
pub mod volume;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use barkeep_core::Order` instead of
// `use barkeep_core::types::Order`

pub use capability::{Availability, Feasibility};
pub use error::{CoreError, TransitionError};
pub use types::*;
pub use volume::Density;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Device error codes above this value are reported as "unknown".
///
/// The firmware only emits codes 0..=5; anything else is a firmware bug or a
/// protocol mismatch and gets folded into code 0 semantics.
pub const MAX_DEVICE_ERROR_CODE: i64 = 5;

/// Smallest dose quantity (ml) the state machine considers pourable.
///
/// Doses below this are treated as already satisfied, which keeps a
/// zero-quantity dose from wedging an order in an un-advanceable state.
pub const MIN_POURABLE_ML: f64 = 0.01;

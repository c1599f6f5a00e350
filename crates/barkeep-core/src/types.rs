//! # Domain Types
//!
//! Core domain types used throughout Barkeep.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Device      │   │      Order      │   │      Dose       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  api_token      │   │  status         │   │  number (1..)   │       │
//! │  │  hx711 wiring   │   │  current_dose   │   │  quantity (ml)  │       │
//! │  └─────────────────┘   │  dose_progress  │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Pump       │   │   OrderStatus   │   │   Ingredient    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  gpio           │   │  Pending        │   │  density (g/L)  │       │
//! │  │  ingredient_id  │   │  InProgress     │   │  added_         │       │
//! │  │  is_empty       │   │  Completed      │   │    separately   │       │
//! │  └─────────────────┘   │  Failed         │   └─────────────────┘       │
//! │                        │  Cancelled      │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries a UUID v4 `id` used for database relations; devices
//! additionally carry an opaque bearer token as their wire-level identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Device
// =============================================================================

/// A physical dispensing device (embedded controller with pumps and a scale).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Device {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning profile.
    pub profile_id: String,

    /// Friendly name shown to the owner.
    pub name: String,

    /// Bearer token the device authenticates with.
    /// None until the device has been enrolled.
    pub api_token: Option<String>,

    /// Firmware version self-reported on `verify`.
    pub firmware_version: String,

    /// Whether this is the owner's default device for new orders.
    pub is_default: bool,

    /// Set when the device (or the calibration workflow) flags the scale
    /// as needing calibration. Never cleared automatically.
    pub needs_calibration: bool,

    /// HX711 data GPIO pin.
    pub hx711_dt: Option<i64>,

    /// HX711 clock GPIO pin.
    pub hx711_sck: Option<i64>,

    /// Raw-measure offset from tare calibration.
    pub hx711_offset: i64,

    /// Raw-measure scale factor from weight calibration.
    pub hx711_scale: f64,

    /// Status RGB LED GPIO pins.
    pub rgb_r_gpio: Option<i64>,
    pub rgb_g_gpio: Option<i64>,
    pub rgb_b_gpio: Option<i64>,

    /// Physical switch GPIO pin.
    pub switch_gpio: Option<i64>,

    /// When the device was enrolled.
    pub added_at: DateTime<Utc>,

    /// Last authenticated `verify` call.
    pub last_used_at: Option<DateTime<Utc>>,

    /// Last authenticated call of any kind (liveness).
    pub last_ping_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Pump
// =============================================================================

/// A pump wired to a device, optionally assigned to dispense one ingredient.
///
/// A pump with no GPIO pin or no assigned ingredient is not usable; the
/// capability resolver and pump selection skip it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Pump {
    pub id: String,
    pub device_id: String,
    /// GPIO pin driving the pump. Unique per device when set.
    pub gpio: Option<i64>,
    /// Ingredient this pump dispenses.
    pub ingredient_id: Option<String>,
    /// Marked by the owner when the bottle runs out.
    pub is_empty: bool,
}

impl Pump {
    /// A pump counts for dispensing only if it is wired, assigned and not empty.
    pub fn is_usable(&self) -> bool {
        !self.is_empty && self.gpio.is_some() && self.ingredient_id.is_some()
    }
}

// =============================================================================
// Ingredient
// =============================================================================

/// An ingredient that doses reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Ingredient {
    pub id: String,
    /// Unique display name.
    pub name: String,
    /// Alcohol percentage by volume (0 for mixers).
    pub alcohol_percentage: f64,
    /// Density in g/L. Water is 1000; used for weight → volume conversion.
    pub density: f64,
    /// Added by hand (garnish, ice, ...) - never dispensed by a pump and
    /// never blocks feasibility.
    pub added_separately: bool,
}

// =============================================================================
// Cocktail & Dose
// =============================================================================

/// A cocktail recipe: metadata plus an ordered sequence of doses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cocktail {
    pub id: String,
    pub name: String,
    /// Profile of the creator.
    pub creator_id: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    /// Optional image reference (serving is out of scope here).
    pub image_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One ingredient-quantity step within a cocktail's pour sequence.
///
/// `number` is 1-based and establishes strict serving order. The edit
/// workflow keeps numbers contiguous; the state machine tolerates gaps by
/// treating "no dose with a higher number" as completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Dose {
    pub id: String,
    pub cocktail_id: String,
    pub ingredient_id: String,
    /// Target quantity in milliliters.
    pub quantity: f64,
    /// 1-based position in the pour sequence.
    pub number: i64,
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// ## State Machine
/// ```text
/// pending ──(first progress report)──► in_progress ──(doses exhausted)──► completed
///    │                                     │
///    ├──────────────(cancel)───────────────┼──► cancelled
///    └────────────(error report)───────────┴──► failed
/// ```
/// `completed`, `failed` and `cancelled` are terminal - no further status
/// mutation is permitted once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed by the customer, no progress reported yet.
    Pending,
    /// The device has started dispensing.
    InProgress,
    /// All doses poured.
    Completed,
    /// The device reported a hardware error.
    Failed,
    /// Cancelled by the customer, the device or an admin.
    Cancelled,
}

impl OrderStatus {
    /// Terminal statuses permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Active orders are the ones a polling device may be handed.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::InProgress)
    }

    /// Wire representation, matching the stored TEXT value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// One customer's request to have a specific device prepare a specific cocktail.
///
/// The central mutable entity: created by the customer (pending, no current
/// dose) and advanced exclusively by device polling and progress reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    /// Customer profile that placed the order.
    pub customer_id: String,
    /// Target device. Null once the device has been deleted (historical
    /// orders are detached rather than removed).
    pub device_id: Option<String>,
    pub cocktail_id: String,
    /// The dose currently being poured; null before the first poll adopts one.
    pub current_dose_id: Option<String>,
    /// Milliliters already poured of the current dose.
    pub dose_progress: f64,
    pub status: OrderStatus,
    /// Formatted device error, set when the order fails.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Next Action
// =============================================================================

/// Addressing information for a pump-addressed `pour` instruction.
///
/// The firmware's weight-based mode actuates a GPIO directly and measures
/// grams on the scale, so the dose target is converted via the ingredient's
/// density before it goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpTarget {
    /// GPIO pin of the selected pump.
    pub gpio: i64,
    /// Full dose target in grams.
    pub dose_weight_g: f64,
    /// Grams already poured of the current dose.
    pub dose_weight_progress_g: f64,
}

/// The instruction handed to a polling device.
///
/// Modeled as a tagged union rather than one loosely-typed object with
/// optional fields; the wire mapping lives in the server crate.
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    /// Nothing to do. `message` carries an optional diagnostic (e.g. a
    /// cocktail with no doses).
    Standby { message: Option<String> },
    /// Pour the current dose.
    Pour {
        order_id: String,
        dose_id: String,
        ingredient_id: String,
        /// Milliliters still to pour.
        quantity_left_ml: f64,
        /// Present when a usable pump resolves for the ingredient.
        pump: Option<PumpTarget>,
    },
    /// The final dose has been exhausted; the order was just completed.
    Completed { order_id: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

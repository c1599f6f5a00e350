//! # barkeep-db: Database Layer for Barkeep
//!
//! This crate provides database access for the Barkeep server.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Barkeep Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (device poll, SSE tick)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     barkeep-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (device.rs,   │    │  (embedded)  │  │   │
//! │  │   │               │    │  order.rs,    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  pump.rs,     │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │  catalog.rs)  │    │              │  │   │
//! │  │   │ Management    │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                       SQLite Database (WAL)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (device, pump, catalog, order)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use barkeep_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/barkeep.db")).await?;
//! let device = db.devices().get_by_token("abc...").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::device::DeviceRepository;
pub use repository::order::{ActiveOrderView, OrderRepository};
pub use repository::pump::PumpRepository;

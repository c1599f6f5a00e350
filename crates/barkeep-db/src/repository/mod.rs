//! # Repository Module
//!
//! Database repository implementations for Barkeep.
//!
//! Each repository wraps the shared pool behind a typed API so SQL stays in
//! one place and handlers never touch raw queries.
//!
//! ## Available Repositories
//!
//! - [`device::DeviceRepository`] - Device identity, tokens, liveness
//! - [`pump::PumpRepository`] - Pump wiring and availability
//! - [`catalog::CatalogRepository`] - Ingredients, cocktails, doses
//! - [`order::OrderRepository`] - Order lifecycle and customer views

pub mod catalog;
pub mod device;
pub mod order;
pub mod pump;

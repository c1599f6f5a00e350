//! # Volume & Density
//!
//! Weight ↔ volume conversion for dose progress.
//!
//! ## Why This Exists
//! Doses are defined in milliliters, but a device measuring with a scale can
//! only report grams. The bridge between the two is the ingredient's density:
//!
//! ```text
//! volume_ml = weight_g / density_g_per_l * 1000
//! weight_g  = volume_ml * density_g_per_l / 1000
//! ```
//!
//! Water is 1000 g/L, so 500 g of water is exactly 500 ml. A spirit at
//! 800 g/L weighing 500 g occupies 625 ml.

use serde::{Deserialize, Serialize};

/// Milliliters per liter, used in density conversion.
const ML_PER_L: f64 = 1000.0;

/// Ingredient density in grams per liter.
///
/// Stored on the ingredient record (default 1000 = water) and carried into
/// conversion at the moment a weight-denominated progress report arrives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Density(f64);

impl Density {
    /// Density of water; the ingredient default.
    pub const WATER: Density = Density(1000.0);

    /// Creates a density from grams per liter.
    ///
    /// Non-positive values fall back to water so a misconfigured ingredient
    /// can never produce a division by zero or a negative volume.
    pub fn from_grams_per_liter(g_per_l: f64) -> Self {
        if g_per_l > 0.0 {
            Density(g_per_l)
        } else {
            Density::WATER
        }
    }

    /// Returns the density in grams per liter.
    #[inline]
    pub fn grams_per_liter(&self) -> f64 {
        self.0
    }

    /// Converts a scale reading in grams to milliliters.
    #[inline]
    pub fn volume_from_weight(&self, weight_g: f64) -> f64 {
        weight_g / self.0 * ML_PER_L
    }

    /// Converts a dose volume in milliliters to the grams the scale will see.
    #[inline]
    pub fn weight_from_volume(&self, volume_ml: f64) -> f64 {
        volume_ml * self.0 / ML_PER_L
    }
}

impl Default for Density {
    fn default() -> Self {
        Density::WATER
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_is_one_to_one() {
        let d = Density::WATER;
        assert!((d.volume_from_weight(500.0) - 500.0).abs() < f64::EPSILON);
        assert!((d.weight_from_volume(500.0) - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_spirit_density() {
        // 800 g/L: 500 g -> 625 ml
        let d = Density::from_grams_per_liter(800.0);
        assert!((d.volume_from_weight(500.0) - 625.0).abs() < 1e-9);
        // and back
        assert!((d.weight_from_volume(625.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_syrup_density() {
        // Heavy syrup at 1300 g/L: 650 g -> 500 ml
        let d = Density::from_grams_per_liter(1300.0);
        assert!((d.volume_from_weight(650.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_density_falls_back_to_water() {
        assert_eq!(Density::from_grams_per_liter(0.0), Density::WATER);
        assert_eq!(Density::from_grams_per_liter(-12.0), Density::WATER);
    }
}

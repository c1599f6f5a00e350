//! # Recipe Feasibility
//!
//! Pure classification of a cocktail's ingredient requirements against a
//! device's resolved ingredient set.
//!
//! ## Classification Rules
//! For every dose's ingredient:
//! - `added_separately` → **manual** (garnish, ice; never blocks the order)
//! - present in the device's resolved set → **available**
//! - otherwise → **missing**
//!
//! A cocktail can be made iff nothing is missing. Manual additions are
//! allowed - the device simply skips them and the customer adds them by hand.
//!
//! The I/O half (resolving which ingredients a device can actually pump,
//! with caching) lives in the server crate; this module only classifies.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::Ingredient;

// =============================================================================
// Feasibility
// =============================================================================

/// Result of checking one cocktail against one device's ingredient set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feasibility {
    /// True iff no required ingredient is missing.
    pub can_make: bool,
    /// Ingredient names the device cannot dispense.
    pub missing: Vec<String>,
    /// Ingredient names the device will pump.
    pub available: Vec<String>,
    /// Ingredient names the customer adds by hand.
    pub manual: Vec<String>,
}

impl Feasibility {
    /// A recipe with no doses is a configuration error, not a pourable drink.
    pub fn empty_recipe() -> Self {
        Feasibility {
            can_make: false,
            missing: Vec::new(),
            available: Vec::new(),
            manual: Vec::new(),
        }
    }
}

/// Classifies the ingredients of a cocktail's doses (in pour order) against
/// the set of ingredient ids the device can dispense.
pub fn classify(dose_ingredients: &[Ingredient], pumpable_ids: &HashSet<String>) -> Feasibility {
    if dose_ingredients.is_empty() {
        return Feasibility::empty_recipe();
    }

    let mut missing = Vec::new();
    let mut available = Vec::new();
    let mut manual = Vec::new();

    for ingredient in dose_ingredients {
        if ingredient.added_separately {
            manual.push(ingredient.name.clone());
        } else if pumpable_ids.contains(&ingredient.id) {
            available.push(ingredient.name.clone());
        } else {
            missing.push(ingredient.name.clone());
        }
    }

    Feasibility {
        can_make: missing.is_empty(),
        missing,
        available,
        manual,
    }
}

// =============================================================================
// Availability Tagging
// =============================================================================

/// Availability tag attached to cocktails in list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    /// Every required ingredient is pumpable.
    Available,
    /// Some required ingredients are pumpable, some are missing.
    Partial,
    /// No required ingredient is pumpable.
    Unavailable,
    /// No device capability is known; every dose defaults to manual.
    NoDevice,
}

/// Tags one cocktail given its dose ingredients and the device capability,
/// if any is known.
///
/// With no capability every dose counts as manual and the tag is `NoDevice`.
pub fn tag_availability(
    dose_ingredients: &[Ingredient],
    pumpable_ids: Option<&HashSet<String>>,
) -> Availability {
    let Some(pumpable_ids) = pumpable_ids else {
        return Availability::NoDevice;
    };

    let feasibility = classify(dose_ingredients, pumpable_ids);
    if feasibility.can_make {
        Availability::Available
    } else if feasibility.available.is_empty() {
        Availability::Unavailable
    } else {
        Availability::Partial
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(id: &str, name: &str, added_separately: bool) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            name: name.to_string(),
            alcohol_percentage: 0.0,
            density: 1000.0,
            added_separately,
        }
    }

    fn id_set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_manual_ingredient_never_blocks() {
        // One manual ingredient, zero pumps configured: still feasible.
        let doses = vec![ingredient("mint", "Mint", true)];
        let feasibility = classify(&doses, &id_set(&[]));

        assert!(feasibility.can_make);
        assert_eq!(feasibility.manual, vec!["Mint"]);
        assert!(feasibility.missing.is_empty());
    }

    #[test]
    fn test_missing_ingredient_blocks() {
        let doses = vec![
            ingredient("gin", "Gin", false),
            ingredient("tonic", "Tonic", false),
        ];
        let feasibility = classify(&doses, &id_set(&["gin"]));

        assert!(!feasibility.can_make);
        assert_eq!(feasibility.available, vec!["Gin"]);
        assert_eq!(feasibility.missing, vec!["Tonic"]);
    }

    #[test]
    fn test_empty_recipe_is_infeasible() {
        let feasibility = classify(&[], &id_set(&["gin"]));
        assert!(!feasibility.can_make);
        assert!(feasibility.missing.is_empty());
    }

    #[test]
    fn test_tagging() {
        let doses = vec![
            ingredient("gin", "Gin", false),
            ingredient("tonic", "Tonic", false),
        ];

        assert_eq!(
            tag_availability(&doses, Some(&id_set(&["gin", "tonic"]))),
            Availability::Available
        );
        assert_eq!(
            tag_availability(&doses, Some(&id_set(&["gin"]))),
            Availability::Partial
        );
        assert_eq!(
            tag_availability(&doses, Some(&id_set(&[]))),
            Availability::Unavailable
        );
        assert_eq!(tag_availability(&doses, None), Availability::NoDevice);
    }

    #[test]
    fn test_all_manual_cocktail_is_available() {
        let doses = vec![
            ingredient("mint", "Mint", true),
            ingredient("ice", "Crushed Ice", true),
        ];
        assert_eq!(
            tag_availability(&doses, Some(&id_set(&[]))),
            Availability::Available
        );
    }
}

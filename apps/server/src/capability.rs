//! # Capability Resolution
//!
//! The I/O half of recipe feasibility: resolves which ingredients a device
//! can pump right now (cached), classifies cocktails against that set and
//! picks the pump for a pour.
//!
//! The pure classification rules live in `barkeep_core::capability`; this
//! module supplies them with data from the store via the capability cache
//! (5-minute staleness, invalidated on pump configuration changes).

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use barkeep_core::capability::{classify, tag_availability, Availability, Feasibility};
use barkeep_core::{Cocktail, Pump};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::telemetry::IngredientPumps;

/// Resolves a device's pumpable ingredients: ingredient id → usable pumps
/// in GPIO order.
///
/// Cache-backed; a miss costs one store query for the device's usable pumps.
pub async fn available_ingredients(state: &AppState, device_id: &str) -> ApiResult<IngredientPumps> {
    if let Some(snapshot) = state.capabilities.get(device_id) {
        return Ok(snapshot);
    }

    let pumps = state.db.pumps().usable_for_device(device_id).await?;
    let mut by_ingredient = IngredientPumps::new();
    for pump in pumps {
        // usable pumps always carry an ingredient id
        if let Some(ingredient_id) = pump.ingredient_id.clone() {
            by_ingredient.entry(ingredient_id).or_default().push(pump);
        }
    }

    debug!(
        device = %device_id,
        ingredients = by_ingredient.len(),
        "Resolved device capabilities"
    );
    state.capabilities.store(device_id, by_ingredient.clone());
    Ok(by_ingredient)
}

/// Classifies one cocktail's recipe against one device.
pub async fn can_make(
    state: &AppState,
    device_id: &str,
    cocktail_id: &str,
) -> ApiResult<Feasibility> {
    let ingredients = state
        .db
        .catalog()
        .ingredients_for_cocktail(cocktail_id)
        .await?;
    let pumpable: HashSet<String> = available_ingredients(state, device_id)
        .await?
        .into_keys()
        .collect();
    Ok(classify(&ingredients, &pumpable))
}

/// Picks the pump to drive for an ingredient: the first usable match, which
/// with GPIO-ordered resolution means the lowest-numbered pin. Deterministic
/// so repeated polls address the same pump.
pub async fn find_pump(
    state: &AppState,
    device_id: &str,
    ingredient_id: &str,
) -> ApiResult<Option<Pump>> {
    let capabilities = available_ingredients(state, device_id).await?;
    Ok(capabilities
        .get(ingredient_id)
        .and_then(|pumps| pumps.first())
        .cloned())
}

/// A cocktail tagged with its availability for list views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedCocktail {
    #[serde(flatten)]
    pub cocktail: Cocktail,
    pub availability: Availability,
}

/// Tags a batch of cocktails against one device's capability (or against no
/// device at all, in which case every recipe is `NoDevice`).
pub async fn enhance(
    state: &AppState,
    device_id: Option<&str>,
    cocktails: Vec<Cocktail>,
) -> ApiResult<Vec<TaggedCocktail>> {
    let pumpable: Option<HashSet<String>> = match device_id {
        Some(device_id) => Some(
            available_ingredients(state, device_id)
                .await?
                .into_keys()
                .collect(),
        ),
        None => None,
    };

    let mut tagged = Vec::with_capacity(cocktails.len());
    for cocktail in cocktails {
        let ingredients = state
            .db
            .catalog()
            .ingredients_for_cocktail(&cocktail.id)
            .await?;
        let availability = tag_availability(&ingredients, pumpable.as_ref());
        tagged.push(TaggedCocktail {
            cocktail,
            availability,
        });
    }
    Ok(tagged)
}

// =============================================================================
// Unit Tests
// =============================================================================

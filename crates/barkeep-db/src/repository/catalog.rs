//! # Catalog Repository
//!
//! Database operations for the drinks catalog: ingredients, cocktails and
//! their ordered dose sequences.
//!
//! The dose queries here are what drives order advancement: the orchestrator
//! asks for the first dose when it adopts a fresh order, and for the next
//! dose by `number` when one finishes. "No dose with a higher number" is how
//! an order learns it is complete.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use barkeep_core::{Cocktail, Dose, Ingredient};

const INGREDIENT_COLUMNS: &str = "id, name, alcohol_percentage, density, added_separately";
const DOSE_COLUMNS: &str = "id, cocktail_id, ingredient_id, quantity, number";

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Ingredients
    // =========================================================================

    /// Inserts an ingredient.
    pub async fn insert_ingredient(&self, ingredient: &Ingredient) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO ingredient (id, name, alcohol_percentage, density, added_separately) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&ingredient.id)
        .bind(&ingredient.name)
        .bind(ingredient.alcohol_percentage)
        .bind(ingredient.density)
        .bind(ingredient.added_separately)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Gets an ingredient by ID.
    pub async fn get_ingredient(&self, id: &str) -> DbResult<Option<Ingredient>> {
        let sql = format!("SELECT {INGREDIENT_COLUMNS} FROM ingredient WHERE id = ?1");
        let ingredient = sqlx::query_as::<_, Ingredient>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ingredient)
    }

    /// Lists all ingredients, alphabetically.
    pub async fn list_ingredients(&self) -> DbResult<Vec<Ingredient>> {
        let sql = format!("SELECT {INGREDIENT_COLUMNS} FROM ingredient ORDER BY name");
        let ingredients = sqlx::query_as::<_, Ingredient>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(ingredients)
    }

    // =========================================================================
    // Cocktails
    // =========================================================================

    /// Inserts a cocktail (metadata only; doses are inserted separately).
    pub async fn insert_cocktail(&self, cocktail: &Cocktail) -> DbResult<()> {
        debug!(id = %cocktail.id, name = %cocktail.name, "Inserting cocktail");

        sqlx::query(
            "INSERT INTO cocktail (id, name, creator_id, description, instructions, image_uri, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&cocktail.id)
        .bind(&cocktail.name)
        .bind(&cocktail.creator_id)
        .bind(&cocktail.description)
        .bind(&cocktail.instructions)
        .bind(&cocktail.image_uri)
        .bind(cocktail.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Gets a cocktail by ID.
    pub async fn get_cocktail(&self, id: &str) -> DbResult<Option<Cocktail>> {
        let cocktail = sqlx::query_as::<_, Cocktail>(
            "SELECT id, name, creator_id, description, instructions, image_uri, created_at \
             FROM cocktail WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cocktail)
    }

    // =========================================================================
    // Doses
    // =========================================================================

    /// Inserts a dose.
    pub async fn insert_dose(&self, dose: &Dose) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO dose (id, cocktail_id, ingredient_id, quantity, number) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&dose.id)
        .bind(&dose.cocktail_id)
        .bind(&dose.ingredient_id)
        .bind(dose.quantity)
        .bind(dose.number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Gets a dose by ID.
    pub async fn dose_by_id(&self, id: &str) -> DbResult<Option<Dose>> {
        let sql = format!("SELECT {DOSE_COLUMNS} FROM dose WHERE id = ?1");
        let dose = sqlx::query_as::<_, Dose>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dose)
    }

    /// All doses of a cocktail in pour order.
    pub async fn doses_for_cocktail(&self, cocktail_id: &str) -> DbResult<Vec<Dose>> {
        let sql = format!("SELECT {DOSE_COLUMNS} FROM dose WHERE cocktail_id = ?1 ORDER BY number");
        let doses = sqlx::query_as::<_, Dose>(&sql)
            .bind(cocktail_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(doses)
    }

    /// The first dose of a cocktail's pour sequence (lowest `number`).
    ///
    /// Returns None for a cocktail with no doses.
    pub async fn first_dose(&self, cocktail_id: &str) -> DbResult<Option<Dose>> {
        let sql = format!(
            "SELECT {DOSE_COLUMNS} FROM dose WHERE cocktail_id = ?1 \
             ORDER BY number LIMIT 1"
        );
        let dose = sqlx::query_as::<_, Dose>(&sql)
            .bind(cocktail_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dose)
    }

    /// The next dose after the given sequence number.
    ///
    /// Strictly greater-than, so gaps in the numbering are tolerated.
    /// Returns None when the sequence is exhausted (order complete).
    pub async fn next_dose(&self, cocktail_id: &str, after_number: i64) -> DbResult<Option<Dose>> {
        let sql = format!(
            "SELECT {DOSE_COLUMNS} FROM dose WHERE cocktail_id = ?1 AND number > ?2 \
             ORDER BY number LIMIT 1"
        );
        let dose = sqlx::query_as::<_, Dose>(&sql)
            .bind(cocktail_id)
            .bind(after_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dose)
    }

    /// The distinct ingredients a cocktail's doses reference.
    ///
    /// Feeds the capability resolver, which decides feasibility per
    /// ingredient rather than per dose.
    pub async fn ingredients_for_cocktail(&self, cocktail_id: &str) -> DbResult<Vec<Ingredient>> {
        let ingredients = sqlx::query_as::<_, Ingredient>(
            "SELECT DISTINCT i.id, i.name, i.alcohol_percentage, i.density, i.added_separately \
             FROM ingredient i \
             JOIN dose d ON d.ingredient_id = i.id \
             WHERE d.cocktail_id = ?1 \
             ORDER BY i.name",
        )
        .bind(cocktail_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ingredients)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

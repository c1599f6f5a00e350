//! # Seed Binary
//!
//! Loads demo data into a fresh database for local development:
//! one profile, one device with three pumps, a small ingredient shelf and
//! two pourable cocktails. Prints the device token so a firmware (or curl)
//! can authenticate straight away.
//!
//! ## Usage
//! ```bash
//! cargo run -p barkeep-db --bin seed -- [path/to/barkeep.db]
//! ```
//!
//! Intended for an empty database; re-running against seeded data fails on
//! the unique profile name.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use barkeep_core::{Cocktail, Device, Dose, Ingredient, Pump};
use barkeep_db::{Database, DbConfig, DbError};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[tokio::main]
async fn main() -> Result<(), DbError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "barkeep.db".to_string());
    info!(path = %path, "Seeding demo data");

    let db = Database::new(DbConfig::new(&path)).await?;
    let now = Utc::now();

    // -------------------------------------------------------------------------
    // Profile & device
    // -------------------------------------------------------------------------

    let profile_id = new_id();
    db.devices().insert_profile(&profile_id, "demo").await?;

    let device_id = new_id();
    db.devices()
        .insert(&Device {
            id: device_id.clone(),
            profile_id: profile_id.clone(),
            name: "Living Room Bar".to_string(),
            api_token: None,
            firmware_version: "unknown".to_string(),
            is_default: true,
            needs_calibration: true,
            hx711_dt: Some(4),
            hx711_sck: Some(5),
            hx711_offset: 0,
            hx711_scale: 1.0,
            rgb_r_gpio: Some(12),
            rgb_g_gpio: Some(13),
            rgb_b_gpio: Some(14),
            switch_gpio: Some(27),
            added_at: now,
            last_used_at: None,
            last_ping_at: None,
        })
        .await?;
    let token = db.devices().issue_token(&device_id).await?;

    // -------------------------------------------------------------------------
    // Ingredients
    // -------------------------------------------------------------------------

    let gin = new_id();
    let tonic = new_id();
    let vodka = new_id();
    let orange_juice = new_id();
    let mint = new_id();

    let ingredients = [
        (&gin, "Gin", 40.0, 940.0, false),
        (&tonic, "Tonic Water", 0.0, 1030.0, false),
        (&vodka, "Vodka", 40.0, 950.0, false),
        (&orange_juice, "Orange Juice", 0.0, 1040.0, false),
        (&mint, "Mint Sprig", 0.0, 1000.0, true),
    ];
    for (id, name, alcohol, density, added_separately) in ingredients {
        db.catalog()
            .insert_ingredient(&Ingredient {
                id: id.clone(),
                name: name.to_string(),
                alcohol_percentage: alcohol,
                density,
                added_separately,
            })
            .await?;
    }

    // -------------------------------------------------------------------------
    // Pumps (gin / tonic / vodka; orange juice stays unpumped)
    // -------------------------------------------------------------------------

    for (gpio, ingredient_id) in [(17, &gin), (22, &tonic), (23, &vodka)] {
        db.pumps()
            .insert(&Pump {
                id: new_id(),
                device_id: device_id.clone(),
                gpio: Some(gpio),
                ingredient_id: Some(ingredient_id.clone()),
                is_empty: false,
            })
            .await?;
    }

    // -------------------------------------------------------------------------
    // Cocktails
    // -------------------------------------------------------------------------

    let gin_tonic = new_id();
    db.catalog()
        .insert_cocktail(&Cocktail {
            id: gin_tonic.clone(),
            name: "Gin Tonic".to_string(),
            creator_id: profile_id.clone(),
            description: Some("The classic. Garnish with mint.".to_string()),
            instructions: Some("Serve over ice.".to_string()),
            image_uri: None,
            created_at: now,
        })
        .await?;
    let gin_tonic_doses = [(&gin, 40.0, 1), (&tonic, 120.0, 2), (&mint, 1.0, 3)];
    for (ingredient_id, quantity, number) in gin_tonic_doses {
        db.catalog()
            .insert_dose(&Dose {
                id: new_id(),
                cocktail_id: gin_tonic.clone(),
                ingredient_id: ingredient_id.clone(),
                quantity,
                number,
            })
            .await?;
    }

    let screwdriver = new_id();
    db.catalog()
        .insert_cocktail(&Cocktail {
            id: screwdriver.clone(),
            name: "Screwdriver".to_string(),
            creator_id: profile_id.clone(),
            description: Some("Vodka and orange juice.".to_string()),
            instructions: None,
            image_uri: None,
            created_at: now,
        })
        .await?;
    for (ingredient_id, quantity, number) in [(&vodka, 40.0, 1), (&orange_juice, 120.0, 2)] {
        db.catalog()
            .insert_dose(&Dose {
                id: new_id(),
                cocktail_id: screwdriver.clone(),
                ingredient_id: ingredient_id.clone(),
                quantity,
                number,
            })
            .await?;
    }

    info!(device_id = %device_id, "Demo data loaded");
    println!("device id:    {device_id}");
    println!("device token: {token}");

    db.close().await;
    Ok(())
}

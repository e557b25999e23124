//! # Seed Data Generator
//!
//! Populates a database with barcoded test products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p till-db --bin seed
//!
//! # Custom amount and database path
//! cargo run -p till-db --bin seed -- --count 2000 --db ./data/till.db
//! ```

use chrono::Utc;
use std::env;
use till_core::{validation, Product};
use till_db::{Database, DbConfig};
use uuid::Uuid;

/// Product categories for realistic test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola 330ml",
            "Sparkling Water 500ml",
            "Orange Juice 1L",
            "Cold Brew Coffee",
            "Green Tea Bottle",
            "Lemonade 330ml",
        ],
    ),
    (
        "SNK",
        &[
            "Salted Crisps",
            "Dark Chocolate Bar",
            "Trail Mix 200g",
            "Gummy Bears",
            "Oat Cookies",
            "Pretzel Sticks",
        ],
    ),
    (
        "GRO",
        &[
            "Wheat Bread",
            "Spaghetti 500g",
            "Basmati Rice 1kg",
            "Canned Tomatoes",
            "Olive Oil 750ml",
            "Espresso Beans 1kg",
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./till_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tillpoint Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./till_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tillpoint Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates; delete the file to regenerate.");
        return Ok(());
    }

    println!("Generating products...");
    let start = std::time::Instant::now();

    let mut names = CATEGORIES
        .iter()
        .flat_map(|(category, names)| names.iter().map(move |name| (*category, *name)))
        .cycle();

    let mut generated = 0;
    for serial in 0..count {
        let (category, name) = names.next().expect("name cycle is infinite");
        let product = generate_product(category, name, serial);

        if let Err(e) = validation::validate_barcode(&product.barcode)
            .and_then(|_| validation::validate_product_name(&product.name))
            .and_then(|_| validation::validate_price_cents(product.price_cents))
        {
            eprintln!("Skipping invalid {}: {}", product.barcode, e);
            continue;
        }

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.barcode, e);
            continue;
        }
        generated += 1;
    }

    println!();
    println!("✓ Generated {} products in {:?}", generated, start.elapsed());

    let sample = db.products().list_active(5).await?;
    for product in &sample {
        println!(
            "  {}  {}  {}  (stock {})",
            product.barcode,
            product.name,
            product.price(),
            product.stock
        );
    }
    if let Some(first) = sample.first() {
        println!();
        println!("Sample record as JSON:");
        println!("{}", serde_json::to_string_pretty(first)?);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random price/stock.
fn generate_product(category: &str, name: &str, seed: usize) -> Product {
    let now = Utc::now();

    // EAN-13 shaped barcode (checksum not computed)
    let barcode = format!("590{:010}", seed);

    // Base 0.99 - 8.99 spread by seed
    let price_cents = 99 + ((seed * 17) % 800) as i64;

    // Stock 0-100
    let stock = (seed % 101) as i64;

    Product {
        id: Uuid::new_v4().to_string(),
        barcode,
        name: format!("{} [{}-{:03}]", name, category, seed),
        description: None,
        price_cents,
        stock,
        is_active: true,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

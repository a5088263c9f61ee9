//! # Seed Data Generator
//!
//! Populates a database with demo shop data for development.
//!
//! ## Usage
//! ```bash
//! # Seed the full demo catalog (default path ./khata_dev.db)
//! cargo run -p khata-db --bin seed
//!
//! # Custom database path
//! cargo run -p khata-db --bin seed -- --db ./data/khata.db
//!
//! # Cap the product count
//! cargo run -p khata-db --bin seed -- --count 10
//! ```
//!
//! ## Generated Data
//! - A kirana-counter catalog (tea, beverages, staples, biscuits,
//!   household) with per-category SKUs and varied stock levels
//! - Regular customers with mobile numbers
//! - Open udhaar entries with staggered due dates, so the reminder
//!   scanner has something to find on a fresh database

use chrono::Utc;
use khata_core::{Credit, Customer, Product, RecordStamp};
use khata_db::{Database, DbConfig};
use std::env;
use tracing_subscriber::EnvFilter;

/// Demo catalog: (category code, [(name, price in paisa)]).
const CATALOG: &[(&str, &[(&str, i64)])] = &[
    (
        "TEA",
        &[
            ("Tapal Danedar 190g", 60_000),
            ("Lipton Yellow Label 95g", 38_000),
            ("Vital Tea 390g", 110_000),
            ("Tapal Family Mixture 238g", 72_000),
        ],
    ),
    (
        "BEV",
        &[
            ("Pakola Ice Cream Soda 1.5L", 18_000),
            ("Coca-Cola 1.5L", 20_000),
            ("Rooh Afza 800ml", 65_000),
            ("Shezan Mango Juice 1L", 35_000),
            ("Milkpak UHT 1L", 37_000),
        ],
    ),
    (
        "STPL",
        &[
            ("Chakki Atta 10kg", 145_000),
            ("Basmati Rice 5kg", 210_000),
            ("Daal Chana 1kg", 48_000),
            ("Daal Masoor 1kg", 52_000),
            ("Cooking Oil 1L", 58_000),
            ("Sugar 1kg", 16_500),
        ],
    ),
    (
        "BISC",
        &[
            ("Sooper Classic 10-pack", 30_000),
            ("Prince Chocolate 6-pack", 24_000),
            ("Gala Egg & Milk 6-pack", 18_000),
            ("Oreo 12-pack", 42_000),
        ],
    ),
    (
        "HOME",
        &[
            ("Lifebuoy Soap 3-pack", 27_000),
            ("Surf Excel 1kg", 55_000),
            ("Colgate 100g", 28_000),
            ("Lux Soap 3-pack", 30_000),
        ],
    ),
];

/// Demo regulars: (name, mobile).
const CUSTOMERS: &[(&str, &str)] = &[
    ("Ahmed Bhai", "+923001234567"),
    ("Razia Begum", "+923214445555"),
    ("Karachi Wholesale", "+922133334444"),
    ("Imran Sahab", "+923008887777"),
    ("Shazia Apa", "+923335556666"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = usize::MAX;
    let mut db_path = String::from("./khata_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(usize::MAX);
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
                println!("Khata Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Limit products seeded (default: full catalog)");
                println!("  -d, --db <PATH>    Database file path (default: ./khata_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Khata Seed Data Generator");
    println!("=========================");
    println!("Database: {}", db_path);
    println!();

    // Connect to database
    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding...");

    let start = std::time::Instant::now();

    // Everything lands in one transaction
    let mut w = db.writer().await?;

    let mut generated = 0usize;
    'catalog: for (category, items) in CATALOG {
        for (idx, (name, price_cents)) in items.iter().enumerate() {
            if generated >= count {
                break 'catalog;
            }
            let product = make_product(category, idx, name, *price_cents, generated);
            db.products().insert(&mut w, &product).await?;
            generated += 1;
        }
    }

    let today = Utc::now().date_naive();
    let mut credits = 0usize;
    for (idx, (name, mobile)) in CUSTOMERS.iter().enumerate() {
        let customer = make_customer(name, mobile);
        db.customers().insert(&mut w, &customer).await?;

        // Every second regular carries an open udhaar entry; the offsets
        // leave one overdue, one due soon, one comfortably out
        if idx % 2 == 0 {
            let amount = 25_000 + idx as i64 * 20_000;
            let due_on = today + chrono::Duration::days(idx as i64 * 5 - 3);
            let credit = make_credit(&customer.id, amount, due_on);
            db.credits().open(&mut w, &credit).await?;
            credits += 1;
        }
    }

    w.commit().await?;

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Seeded {} products, {} customers, {} udhaar entries in {:?}",
        generated,
        CUSTOMERS.len(),
        credits,
        elapsed
    );

    // Verify the search path over the fresh rows
    let hits = db.products().search("tapal", 10).await?;
    println!("  Search 'tapal': {} results", hits.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one catalog product with a category SKU and varied stock.
fn make_product(category: &str, idx: usize, name: &str, price_cents: i64, seed: usize) -> Product {
    let stamp = RecordStamp::mint();
    Product {
        id: stamp.id,
        name: name.to_string(),
        sku: format!("{}-{:03}", category, idx + 1),
        price_cents,
        quantity_on_hand: ((seed * 7) % 40 + 5) as i64,
        is_active: true,
        created_at: stamp.at,
        updated_at: stamp.at,
    }
}

fn make_customer(name: &str, mobile: &str) -> Customer {
    let stamp = RecordStamp::mint();
    Customer {
        id: stamp.id,
        name: name.to_string(),
        mobile: mobile.to_string(),
        note: None,
        is_active: true,
        created_at: stamp.at,
        updated_at: stamp.at,
    }
}

fn make_credit(customer_id: &str, total_cents: i64, due_on: chrono::NaiveDate) -> Credit {
    let stamp = RecordStamp::mint();
    Credit {
        id: stamp.id,
        customer_id: Some(customer_id.to_string()),
        receipt_id: None,
        total_cents,
        paid_cents: 0,
        due_on,
        note: None,
        created_at: stamp.at,
        updated_at: stamp.at,
    }
}

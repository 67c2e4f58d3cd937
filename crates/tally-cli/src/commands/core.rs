//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Learning config from --config, the data dir, or defaults
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::config::{default_config_path, LearningConfig};
use tally_core::db::Database;

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Explicit path first, then the platform override, then built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<LearningConfig> {
    match config_path {
        Some(path) => LearningConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => LearningConfig::load().context("Failed to load learning config"),
    }
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;

    let seeded = db
        .seed_default_rules()
        .context("Failed to seed default rules")?;
    if seeded > 0 {
        println!("   Seeded {} default rules", seeded);
    } else {
        println!("   Default rules already present");
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            println!("   ⚙️  Config override: {}", path.display());
        } else {
            println!("   ⚙️  Config: built-in defaults (override at {})", path.display());
        }
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add transactions: tally transactions add \"스타벅스 라떼\" 5000");
    println!("  2. Classify them:    tally classify --apply");
    println!("  3. Fix mistakes:     tally correct <id> category 식비");

    Ok(())
}

//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Classify transactions and learn from your corrections
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Rule-based transaction classifier that learns from corrections", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Learning config file (defaults to the platform data dir, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed default rules
    Init,

    /// Manage transactions (list, add)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage classification rules
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Classify stored transactions with the active rules
    Classify {
        /// Rule type: category, payment_method, filter (all types if omitted)
        #[arg(short = 't', long = "type")]
        rule_type: Option<String>,

        /// Only consider the most recent N transactions
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Write the results back to the transactions
        #[arg(long)]
        apply: bool,
    },

    /// Correct a transaction field and learn from it
    Correct {
        /// Transaction ID
        id: i64,

        /// Field: category, payment_method, is_excluded
        field: String,

        /// Corrected value
        value: String,
    },

    /// Promote pending learned patterns into rules
    Promote {
        /// Pattern type: category, payment_method, filter (all types if omitted)
        #[arg(short = 't', long = "type")]
        pattern_type: Option<String>,

        /// Minimum confidence: low, medium, high (config default if omitted)
        #[arg(long)]
        min_confidence: Option<String>,
    },

    /// List learned patterns
    Patterns {
        /// Pattern type filter
        #[arg(short = 't', long = "type")]
        pattern_type: Option<String>,

        /// Status filter: pending, applied, rejected
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of patterns to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Detect recurring charges
    Recurring {
        /// Look-back window in days (config default if omitted)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Compare recent spending patterns against the previous window
    Changes,

    /// Generate dynamic filters from applied patterns
    Filters,

    /// Show learning statistics
    Stats,
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recent transactions
    List {
        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only transactions containing this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Add a transaction manually
    Add {
        /// Description as shown on the statement
        description: String,

        /// Amount (positive)
        amount: f64,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// External transaction ID (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Data source
        #[arg(long, default_value = "manual")]
        source: String,

        /// Record as income instead of expense
        #[arg(long)]
        income: bool,

        /// Category
        #[arg(long)]
        category: Option<String>,

        /// Payment method
        #[arg(long)]
        payment_method: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List rules
    List {
        /// Rule type filter
        #[arg(short = 't', long = "type")]
        rule_type: Option<String>,

        /// Include inactive rules
        #[arg(long)]
        all: bool,
    },

    /// Add a rule
    Add {
        /// Rule type: category, payment_method, filter
        rule_type: String,

        /// Condition value (keyword, regex, exact text, or "min:max")
        condition: String,

        /// Outcome assigned when the condition matches
        target: String,

        /// Condition type: contains, equals, regex, amount_range
        #[arg(short, long, default_value = "contains")]
        condition_type: String,

        /// Priority (higher is checked first)
        #[arg(short, long, default_value = "0")]
        priority: i32,

        /// Rule name (defaults to "<target>-<condition>")
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a rule
    Delete {
        /// Rule ID
        id: i64,
    },

    /// Change a rule's priority
    Priority {
        /// Rule ID
        id: i64,

        /// New priority
        priority: i32,
    },

    /// Enable a rule
    Enable {
        /// Rule ID
        id: i64,
    },

    /// Disable a rule
    Disable {
        /// Rule ID
        id: i64,
    },

    /// Show which rules match a description
    Test {
        /// Description to test
        description: String,

        /// Amount (for amount_range rules)
        #[arg(long, default_value = "0")]
        amount: f64,

        /// Rule type
        #[arg(short = 't', long = "type", default_value = "category")]
        rule_type: String,
    },

    /// Report rules with the same condition but different targets
    Conflicts {
        /// Rule type
        #[arg(short = 't', long = "type", default_value = "category")]
        rule_type: String,
    },

    /// Summarize active rules
    Stats {
        /// Rule type
        #[arg(short = 't', long = "type", default_value = "category")]
        rule_type: String,
    },
}

//! Tally CLI - Transaction classifier that learns from corrections
//!
//! Usage:
//!   tally init                          Initialize database and seed rules
//!   tally transactions add DESC AMOUNT  Add a transaction
//!   tally classify --apply              Classify stored transactions
//!   tally correct ID category 식비       Correct a transaction and learn from it
//!   tally promote                       Promote learned patterns into rules

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let output = commands::Output { json: cli.json };

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Transactions { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_transactions_list(&db, &output, 20, None),
                Some(TransactionsAction::List { limit, search }) => {
                    commands::cmd_transactions_list(&db, &output, limit, search.as_deref())
                }
                Some(TransactionsAction::Add {
                    description,
                    amount,
                    date,
                    id,
                    source,
                    income,
                    category,
                    payment_method,
                }) => commands::cmd_transactions_add(
                    &db,
                    commands::ManualTransaction {
                        description,
                        amount,
                        date,
                        external_id: id,
                        source,
                        income,
                        category,
                        payment_method,
                    },
                ),
            }
        }
        Commands::Rules { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_rules_list(&db, &output, None, false),
                Some(RulesAction::List { rule_type, all }) => {
                    commands::cmd_rules_list(&db, &output, rule_type.as_deref(), all)
                }
                Some(RulesAction::Add {
                    rule_type,
                    condition,
                    target,
                    condition_type,
                    priority,
                    name,
                }) => commands::cmd_rules_add(
                    &db,
                    &rule_type,
                    &condition_type,
                    &condition,
                    &target,
                    priority,
                    name.as_deref(),
                ),
                Some(RulesAction::Delete { id }) => commands::cmd_rules_delete(&db, id),
                Some(RulesAction::Priority { id, priority }) => {
                    commands::cmd_rules_priority(&db, id, priority)
                }
                Some(RulesAction::Enable { id }) => commands::cmd_rules_set_active(&db, id, true),
                Some(RulesAction::Disable { id }) => {
                    commands::cmd_rules_set_active(&db, id, false)
                }
                Some(RulesAction::Test {
                    description,
                    amount,
                    rule_type,
                }) => commands::cmd_rules_test(&db, &output, &rule_type, &description, amount),
                Some(RulesAction::Conflicts { rule_type }) => {
                    commands::cmd_rules_conflicts(&db, &output, &rule_type)
                }
                Some(RulesAction::Stats { rule_type }) => {
                    commands::cmd_rules_stats(&db, &output, &rule_type)
                }
            }
        }
        Commands::Classify {
            rule_type,
            limit,
            apply,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_classify(&db, &output, rule_type.as_deref(), limit, apply)
        }
        Commands::Correct { id, field, value } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_correct(&db, config, id, &field, &value)
        }
        Commands::Promote {
            pattern_type,
            min_confidence,
        } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_promote(
                &db,
                config,
                pattern_type.as_deref(),
                min_confidence.as_deref(),
            )
        }
        Commands::Patterns {
            pattern_type,
            status,
            limit,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_patterns(
                &db,
                &output,
                pattern_type.as_deref(),
                status.as_deref(),
                limit,
            )
        }
        Commands::Recurring { days } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_recurring(&db, &output, config, days)
        }
        Commands::Changes => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_changes(&db, &output, config)
        }
        Commands::Filters => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_filters(&db, &output, config)
        }
        Commands::Stats => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_stats(&db, &output, config)
        }
    }
}

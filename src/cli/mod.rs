use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::application::{AppError, LedgerOptions, LedgerService};
use crate::domain::{
    Cents, DEFAULT_WINDOW_DAYS, DailyAggregates, MAX_WINDOW_DAYS, format_cents, parse_amount,
};
use crate::storage::{JsonFileStore, SqliteStore, Store};

/// Width of the longest bar in the trend chart.
const CHART_WIDTH: usize = 24;

/// Tally - income and expense tracker
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "A local-first income and expense tracker with a running balance")]
#[command(version)]
pub struct Cli {
    /// Database file path (directory for the json backend)
    #[arg(short, long, env = "TALLY_DATABASE", default_value = "tally.db")]
    pub database: String,

    /// Storage backend
    #[arg(long, env = "TALLY_BACKEND", value_enum, default_value_t = Backend::Sqlite)]
    pub backend: Backend,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// SQLite database file
    Sqlite,
    /// Directory of JSON files
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a transaction (income unless --expense is given)
    Add {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Category label (e.g., "Salary", "Food")
        category: String,

        /// Record an expense instead of income
        #[arg(short, long)]
        expense: bool,
    },

    /// List all transactions in the order they were entered
    List,

    /// Show the current balance
    Balance,

    /// Show daily income and expense totals for the last days
    Trend {
        /// Number of days to show, ending today (1-366)
        #[arg(short, long, default_value_t = DEFAULT_WINDOW_DAYS, value_parser = parse_window_days)]
        days: usize,
    },

    /// Delete a single transaction
    Delete {
        /// Transaction ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete all transactions
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Install the log subscriber. `RUST_LOG` overrides the default level.
    pub fn init_logging(&self) {
        let default_level = if self.verbose { "debug" } else { "warn" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    }

    pub async fn run(self) -> Result<()> {
        match self.backend {
            Backend::Sqlite => {
                let store = SqliteStore::open(&self.database)
                    .await
                    .with_context(|| format!("Failed to open database {}", self.database))?;
                run_command(store, self.command).await
            }
            Backend::Json => run_command(JsonFileStore::new(&self.database), self.command).await,
        }
    }
}

async fn run_command<S: Store>(store: S, command: Commands) -> Result<()> {
    let options = match &command {
        Commands::Trend { days } => LedgerOptions {
            trend_window_days: *days,
            ..LedgerOptions::default()
        },
        _ => LedgerOptions::default(),
    };
    let mut service = LedgerService::open_with(store, options).await?;

    match command {
        Commands::Add {
            amount,
            category,
            expense,
        } => {
            let amount = parse_amount(&amount).map_err(AppError::from)?;
            let transaction = service.add_transaction(amount, &category, !expense)?;
            println!(
                "Recorded {}: {} {} ({})",
                if transaction.is_income {
                    "income"
                } else {
                    "expense"
                },
                format_cents(transaction.amount),
                transaction.category,
                transaction.id
            );
            println!("Current balance: {}", format_cents(service.balance()));
        }

        Commands::List => run_list_command(&service),

        Commands::Balance => {
            println!("Current balance: {}", format_cents(service.balance()));
        }

        Commands::Trend { .. } => print_trend(&service.trend()),

        Commands::Delete { id, yes } => {
            let Some(transaction) = service.get_transaction(&id) else {
                println!("No transaction with ID {}", id);
                return Ok(());
            };
            let prompt = format!(
                "Delete {} {} ({})?",
                transaction.category,
                format_cents(transaction.amount),
                transaction.id
            );
            if !yes && !confirm(&prompt)? {
                println!("Cancelled.");
                return Ok(());
            }

            if let Some(removed) = service.delete_transaction(&id) {
                println!("Deleted transaction {}", removed.id);
                println!("Current balance: {}", format_cents(service.balance()));
            }
        }

        Commands::Clear { yes } => {
            if service.transactions().is_empty() {
                println!("No transactions to delete.");
                return Ok(());
            }
            let prompt = format!(
                "Delete ALL {} transactions?",
                service.transactions().len()
            );
            if !yes && !confirm(&prompt)? {
                println!("Cancelled.");
                return Ok(());
            }

            let removed = service.clear_all();
            println!("Deleted {} transactions", removed);
        }
    }

    service.flush().await?;
    Ok(())
}

fn run_list_command<S: Store>(service: &LedgerService<S>) {
    let transactions = service.transactions();
    if transactions.is_empty() {
        println!("No transactions found.");
        return;
    }

    println!(
        "{:<15} {:<18} {:<20} {:>12}",
        "ID", "DATE", "CATEGORY", "AMOUNT"
    );
    println!("{}", "-".repeat(68));
    for transaction in transactions {
        println!(
            "{:<15} {:<18} {:<20} {:>12}",
            transaction.id,
            transaction
                .date
                .with_timezone(&Local)
                .format("%d/%m/%Y, %H:%M")
                .to_string(),
            truncate(&transaction.category, 20),
            signed(transaction.is_income, transaction.amount)
        );
    }
    println!("{}", "-".repeat(68));
    println!(
        "{:<55} {:>12}",
        "Balance",
        format_cents(service.balance())
    );
}

fn print_trend(trend: &DailyAggregates) {
    if trend.is_empty() {
        println!("No days to show.");
        return;
    }

    let peak = trend.peak();
    println!("{:<6} {:>12} {:>12}  CHART", "DAY", "INCOME", "EXPENSE");
    for i in 0..trend.len() {
        println!(
            "{:<6} {:>12} {:>12}  {}{}",
            trend.labels[i],
            format_cents(trend.income[i]),
            format_cents(trend.expense[i]),
            "+".repeat(bar_length(trend.income[i], peak)),
            "-".repeat(bar_length(trend.expense[i], peak))
        );
    }
    println!(
        "{:<6} {:>12} {:>12}",
        "Total",
        format_cents(trend.total_income()),
        format_cents(trend.total_expense())
    );
    println!("As of {}", Local::now().format("%d/%m/%Y, %H:%M"));
}

fn parse_window_days(s: &str) -> Result<usize, String> {
    let days: usize = s.parse().map_err(|_| format!("'{}' is not a number of days", s))?;
    if (1..=MAX_WINDOW_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(format!("must be between 1 and {}", MAX_WINDOW_DAYS))
    }
}

fn bar_length(value: Cents, peak: Cents) -> usize {
    if peak <= 0 || value <= 0 {
        return 0;
    }
    let scaled = (value as f64 / peak as f64 * CHART_WIDTH as f64).round() as usize;
    scaled.max(1)
}

fn signed(is_income: bool, amount: Cents) -> String {
    if is_income {
        format!("+{}", format_cents(amount))
    } else {
        format!("-{}", format_cents(amount))
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Ask a yes/no question on stdin. Anything but "y"/"yes" means no.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

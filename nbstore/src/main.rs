//! nbstore - CLI for training and inspecting Naive Bayes token counts
//!
//! Input is pre-tokenized: pass tokens as arguments, or pipe one token per
//! line on stdin (no tokens, or a single `-`). Stdin lines are taken verbatim,
//! surrounding whitespace included; only empty lines are skipped.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/nbstore/counts.db (~/.local/share/nbstore/counts.db)
//! - Logs: $XDG_STATE_HOME/nbstore/nbstore.log (~/.local/state/nbstore/nbstore.log)
//! - Config: $XDG_CONFIG_HOME/nbstore/config.toml (~/.config/nbstore/config.toml)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nbstore_core::{
    Config, CounterDescriptions, CounterName, CounterStore, Direction, Polarity, Trainer,
    TrainingReport,
};
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nbstore")]
#[command(about = "Persistent token counts for a binary Naive Bayes classifier")]
#[command(version)]
struct Args {
    /// Database file (default: from config, else XDG data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbose output (also echoes log lines to stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the store if it does not exist (existing data is kept)
    Init {
        /// Description for global_counter
        #[arg(long)]
        global_description: Option<String>,

        /// Description for positive_counter
        #[arg(long)]
        positive_description: Option<String>,

        /// Description for negative_counter
        #[arg(long)]
        negative_description: Option<String>,
    },

    /// Record one document's tokens under a polarity
    Train {
        #[arg(value_parser = parse_polarity)]
        polarity: Polarity,

        /// Tokens (reads stdin when empty or `-`, one verbatim token per line)
        tokens: Vec<String>,
    },

    /// Reverse one document's tokens under a polarity
    Untrain {
        #[arg(value_parser = parse_polarity)]
        polarity: Polarity,

        /// Tokens (reads stdin when empty or `-`, one verbatim token per line)
        tokens: Vec<String>,
    },

    /// Print the count used for a token (unseen tokens get the default)
    Count {
        #[arg(value_parser = parse_polarity)]
        polarity: Polarity,

        token: String,
    },

    /// Print the number of documents trained under a polarity (0 reported as 1)
    Total {
        #[arg(value_parser = parse_polarity)]
        polarity: Polarity,
    },

    /// Overwrite a document counter (global, positive or negative)
    Reset {
        #[arg(value_parser = parse_counter)]
        counter: CounterName,

        /// New value
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        value: i64,
    },

    /// Show counters and vocabulary sizes
    Stats {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also list the N most frequent tokens per polarity
        #[arg(long, default_value = "0")]
        top: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_polarity(s: &str) -> std::result::Result<Polarity, String> {
    s.parse().map_err(|e: nbstore_core::Error| e.to_string())
}

fn parse_counter(s: &str) -> std::result::Result<CounterName, String> {
    s.parse().map_err(|e: nbstore_core::Error| e.to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        nbstore_core::logging::init(&config.logging, args.verbose).context("failed to initialize logging")?;

    let db_path = args.db.clone().unwrap_or_else(|| config.database_path());
    tracing::info!(path = %db_path.display(), "Opening counter store");

    let descriptions = match &args.command {
        Command::Init {
            global_description,
            positive_description,
            negative_description,
        } => {
            let defaults = config.descriptions();
            CounterDescriptions {
                global: global_description.clone().unwrap_or(defaults.global),
                positive: positive_description.clone().unwrap_or(defaults.positive),
                negative: negative_description.clone().unwrap_or(defaults.negative),
            }
        }
        _ => config.descriptions(),
    };

    let store = CounterStore::open_or_initialize(&db_path, &descriptions)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?
        .with_unseen_defaults(config.query.unseen_defaults());
    let trainer = Trainer::with_policy(store, config.training.batch_policy);

    match args.command {
        Command::Init { .. } => {
            println!("Store: {}", db_path.display());
            for counter in trainer.store().counters()? {
                println!(
                    "  {:<18} {:>8}  {}",
                    counter.name.as_str(),
                    counter.value,
                    counter.description
                );
            }
        }
        Command::Train { polarity, tokens } => {
            let tokens = collect_tokens(tokens)?;
            let report = trainer.apply(&tokens, polarity, Direction::Train)?;
            print_report(&report, args.verbose);
        }
        Command::Untrain { polarity, tokens } => {
            let tokens = collect_tokens(tokens)?;
            let report = trainer.apply(&tokens, polarity, Direction::Untrain)?;
            print_report(&report, args.verbose);
        }
        Command::Count { polarity, token } => {
            println!("{}", trainer.token_count(&token, polarity)?);
        }
        Command::Total { polarity } => {
            println!("{}", trainer.polarity_total(polarity)?);
        }
        Command::Reset { counter, value } => {
            trainer.store().set_counter(counter, value)?;
            println!("{} = {}", counter.as_str(), value);
        }
        Command::Stats { format, top } => {
            print_stats(&trainer, format, top)?;
        }
    }

    Ok(())
}

/// Tokens from the command line, or from stdin (one per line) when none are given.
///
/// Stdin lines are not trimmed; empty lines are skipped.
fn collect_tokens(tokens: Vec<String>) -> Result<Vec<String>> {
    if !(tokens.is_empty() || tokens == ["-"]) {
        return Ok(tokens);
    }

    let stdin = std::io::stdin();
    let mut collected = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read tokens from stdin")?;
        if !line.is_empty() {
            collected.push(line);
        }
    }
    Ok(collected)
}

fn print_report(report: &TrainingReport, verbose: bool) {
    let verb = match report.direction {
        Direction::Train => "Trained",
        Direction::Untrain => "Untrained",
    };
    println!(
        "{} {}: {} token(s) applied, {} skipped",
        verb, report.polarity, report.tokens_applied, report.tokens_skipped
    );
    if verbose && report.tokens_skipped > 0 {
        println!("  See {} for skipped tokens", nbstore_core::logging::log_file_path().display());
    }
}

fn print_stats(trainer: &Trainer, format: OutputFormat, top: usize) -> Result<()> {
    let stats = trainer.stats()?;
    let store = trainer.store();

    if format == OutputFormat::Json {
        let mut output = serde_json::to_value(&stats)?;
        if top > 0 {
            output["top_positive"] = serde_json::to_value(store.tokens(Polarity::Positive, top)?)?;
            output["top_negative"] = serde_json::to_value(store.tokens(Polarity::Negative, top)?)?;
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Store: {}", store.path().display());
    println!("  global_counter:   {}", stats.global_counter);
    println!("  positive_counter: {}", stats.positive_counter);
    println!("  negative_counter: {}", stats.negative_counter);
    println!("  positive tokens:  {}", stats.positive_tokens);
    println!("  negative tokens:  {}", stats.negative_tokens);

    if top > 0 {
        for polarity in Polarity::ALL {
            println!("\nTop {} {} tokens:", top, polarity);
            for entry in store.tokens(polarity, top)? {
                println!("  {:>8}  {}", entry.count, entry.token);
            }
        }
    }

    Ok(())
}

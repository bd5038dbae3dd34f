use std::path::PathBuf;

use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};

use crate::error::{GuardError, Result};

/// Default number of transaction rows per load window.
pub const DEFAULT_WINDOW_SIZE: usize = 25_000;

/// Default report cache freshness window, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Older `DB_*` names read when the matching `POSTGRES_*` setting is left at
/// its default.
const FALLBACK_DB_ENV: &[(&str, &str)] = &[
    ("db_host", "DB_HOST"),
    ("db_port", "DB_PORT"),
    ("db_user", "DB_USER"),
    ("db_password", "DB_PASSWORD"),
    ("db_name", "DB_NAME"),
];

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Load card transaction data and report on transaction risk and volume
#[derive(Parser, Debug, Clone)]
#[command(
    name = "transguard",
    about = "Load card transaction data and report on transaction risk and volume",
    version
)]
pub struct Settings {
    #[command(flatten)]
    pub database: DatabaseSettings,

    /// Logging level
    #[arg(long, global = true, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection parameters for the relational store.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Full connection URL (`postgres://…` or `sqlite:…`); overrides the individual parameters
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Database host
    #[arg(long, global = true, env = "POSTGRES_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long, global = true, env = "POSTGRES_PORT", default_value = "5432")]
    pub db_port: u16,

    /// Database user
    #[arg(long, global = true, env = "POSTGRES_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password
    #[arg(long, global = true, env = "POSTGRES_PASSWORD", default_value = "postgres", hide_env_values = true)]
    pub db_password: String,

    /// Database name
    #[arg(long, global = true, env = "POSTGRES_DB", default_value = "transguard")]
    pub db_name: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load users, cards and transactions from CSV files into the store
    Load(LoadSettings),
    /// Print aggregate reports from the transaction fact table
    Report(ReportSettings),
}

#[derive(Args, Debug, Clone)]
pub struct LoadSettings {
    /// Directory holding users_data.csv, cards_data.csv and transactions_data.csv
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Transaction rows per append window
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE, value_parser = parse_window_size)]
    pub window_size: usize,

    /// Create the destination tables if they do not exist
    #[arg(long)]
    pub create_tables: bool,

    /// Normalize the sources and report counts without writing to the store
    #[arg(long, conflicts_with = "create_tables")]
    pub dry_run: bool,

    /// Output format for the load summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ReportSettings {
    /// First day of the range (inclusive); defaults to the earliest date in the fact table
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the range (inclusive); defaults to the latest date in the fact table
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Merchant state filter; repeat for several states, omit for all
    #[arg(long = "state", value_name = "STATE")]
    pub states: Vec<String>,

    /// Minimum transactions per merchant for the leaderboard (10-200)
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u64).range(10..=200))]
    pub min_txns: u64,

    /// Number of merchants on the leaderboard (5-50)
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(5..=50))]
    pub limit: u64,

    /// Schema holding fact_transactions; pass an empty string for none
    #[arg(long, env = "FACT_SCHEMA", default_value = "analytics_warehouse")]
    pub fact_schema: String,

    /// Seconds a cached aggregate stays fresh
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl: u64,

    /// List the merchant states present in the fact table and exit
    #[arg(long)]
    pub list_states: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments (with environment fallbacks) and apply `--debug`.
    pub fn load() -> Self {
        Self::load_from(std::env::args_os())
    }

    /// Same as [`Settings::load`] but accepts an explicit argument list.
    pub fn load_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::load_with_env(args, |key| std::env::var(key).ok())
    }

    /// Parse `args`, resolving the `DB_*` fallbacks through `lookup`.
    pub fn load_with_env<I, T, F>(args: I, lookup: F) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
        F: Fn(&str) -> Option<String>,
    {
        let matches = Settings::command().get_matches_from(args);
        let mut settings = Settings::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
        settings
            .database
            .apply_fallback_env(&matches, lookup)
            .unwrap_or_else(|e| e.exit());
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

impl DatabaseSettings {
    /// Connection target for log lines, without credentials.
    pub fn describe(&self) -> String {
        match &self.database_url {
            Some(url) => match url.rsplit_once('@') {
                Some((_, host)) => host.to_string(),
                None => url.clone(),
            },
            None => format!(
                "{}@{}:{}/{}",
                self.db_user, self.db_host, self.db_port, self.db_name
            ),
        }
    }

    /// Fill parameters still at their defaults from the `DB_*` variables.
    fn apply_fallback_env<F>(&mut self, matches: &ArgMatches, lookup: F) -> clap::error::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (id, var) in FALLBACK_DB_ENV {
            if matches.value_source(id) != Some(ValueSource::DefaultValue) {
                continue;
            }
            let Some(value) = lookup(var) else {
                continue;
            };
            match *id {
                "db_host" => self.db_host = value,
                "db_port" => {
                    self.db_port = value.parse().map_err(|_| {
                        clap::Error::raw(
                            ErrorKind::InvalidValue,
                            format!("invalid port in {var}: {value:?}\n"),
                        )
                    })?
                }
                "db_user" => self.db_user = value,
                "db_password" => self.db_password = value,
                _ => self.db_name = value,
            }
        }
        Ok(())
    }

    /// Which store backend the configuration points at.
    pub fn backend(&self) -> Result<Backend> {
        match &self.database_url {
            None => Ok(Backend::Postgres),
            Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
                Ok(Backend::Postgres)
            }
            Some(url) if url.starts_with("sqlite:") => Ok(Backend::Sqlite),
            Some(url) => Err(GuardError::Config(format!(
                "unsupported database URL scheme in {:?}",
                url.split(':').next().unwrap_or_default()
            ))),
        }
    }
}

/// Supported relational store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl ReportSettings {
    /// The fact-table schema, `None` when configured empty.
    pub fn fact_schema(&self) -> Option<&str> {
        let schema = self.fact_schema.trim();
        (!schema.is_empty()).then_some(schema)
    }
}

/// Window sizes must be positive.
fn parse_window_size(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("window size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

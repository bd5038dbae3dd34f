mod bootstrap;
mod render;

use anyhow::{Context, Result};
use guard_core::models::LoadReport;
use guard_core::settings::{
    Backend, Command, DatabaseSettings, LoadSettings, OutputFormat, ReportSettings, Settings,
};
use guard_data::loader::Loader;
use guard_data::store::memory::MemorySink;
use guard_data::store::{postgres, sqlite, RecordSink};
use guard_runtime::aggregator::Aggregator;
use guard_runtime::cache::ReportCache;
use guard_runtime::fact_source::{FactSource, SqlFactSource};
use guard_runtime::query::{LeaderboardParams, QueryBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("TransGuard v{} starting", env!("CARGO_PKG_VERSION"));

    let output = run(&settings).await?;
    print!("{output}");
    Ok(())
}

/// Execute the selected command and return what it prints.
async fn run(settings: &Settings) -> Result<String> {
    match &settings.command {
        Command::Load(load) => run_load(&settings.database, load).await,
        Command::Report(report) => run_report(&settings.database, report).await,
    }
}

// ── load ───────────────────────────────────────────────────────────────────────

async fn run_load(db: &DatabaseSettings, load: &LoadSettings) -> Result<String> {
    tracing::info!(
        "Loading from {} (window size {})",
        load.data_dir.display(),
        load.window_size
    );

    let reports = if load.dry_run {
        tracing::info!("Dry run: nothing will be written");
        load_into(MemorySink::new(), load).await?
    } else {
        match db.backend()? {
            Backend::Postgres => {
                let store = postgres::connect(db).await?;
                if load.create_tables {
                    store.create_tables().await?;
                }
                load_into(store, load).await?
            }
            Backend::Sqlite => {
                let store = sqlite::connect(sqlite_url(db)).await?;
                if load.create_tables {
                    store.create_tables().await?;
                }
                load_into(store, load).await?
            }
        }
    };

    match load.format {
        OutputFormat::Table => Ok(render::render_load_reports(&reports, load.dry_run)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&reports)? + "\n"),
    }
}

async fn load_into<S: RecordSink>(sink: S, load: &LoadSettings) -> Result<Vec<LoadReport>> {
    let loader = Loader::new(sink, load.window_size);
    let reports = loader
        .load_all(&load.data_dir)
        .await
        .with_context(|| format!("loading {}", load.data_dir.display()))?;
    Ok(reports)
}

// ── report ─────────────────────────────────────────────────────────────────────

async fn run_report(db: &DatabaseSettings, report: &ReportSettings) -> Result<String> {
    let queries = QueryBuilder::new(report.fact_schema());
    let cache = ReportCache::new(report.cache_ttl);

    match db.backend()? {
        Backend::Postgres => {
            let store = postgres::connect(db).await?;
            report_from(Aggregator::new(SqlFactSource::new(store, queries), cache), report).await
        }
        Backend::Sqlite => {
            let store = sqlite::connect(sqlite_url(db)).await?;
            report_from(Aggregator::new(SqlFactSource::new(store, queries), cache), report).await
        }
    }
}

async fn report_from<S: FactSource>(
    mut aggregator: Aggregator<S>,
    settings: &ReportSettings,
) -> Result<String> {
    if settings.list_states {
        let states = aggregator.states().await?;
        return match settings.format {
            OutputFormat::Table => Ok(render::render_states(&states)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&states)? + "\n"),
        };
    }

    let params = LeaderboardParams::new(settings.min_txns, settings.limit)?;
    let Some(filter) = aggregator
        .resolve_filter(settings.start, settings.end, &settings.states)
        .await?
    else {
        tracing::warn!("fact table is empty");
        return Ok(format!("{}\n", render::NO_DATA));
    };

    let report = aggregator.dashboard(&filter, params).await?;
    match settings.format {
        OutputFormat::Table => Ok(render::render_report(&report)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&report)? + "\n"),
    }
}

fn sqlite_url(db: &DatabaseSettings) -> &str {
    db.database_url.as_deref().unwrap_or("sqlite::memory:")
}

// ── Tests ──────────────────────────────────────────────────────────────────────

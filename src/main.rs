use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod cache;
mod classify;
mod comparison;
mod db;
mod error;
mod metrics;
mod models;
mod orchestrator;
mod periods;
mod report;
mod scorecard;

use models::{ClientSelector, ComparisonRequest, ComparisonType, DataCategory};
use orchestrator::{AggregateCache, FetchOrchestrator, OrchestratorConfig};

/// Window aggregates stay warm this long before a re-fetch.
const CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(name = "callcenter-analytics")]
#[command(about = "Period-over-period call center analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import call events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compare a period against its baseline
    #[command(group(
        ArgGroup::new("scope")
            .args(["client", "exclude"])
            .multiple(false)
    ))]
    Compare {
        /// month-over-month, week-over-week, month-to-date or week-to-date
        #[arg(long, default_value = "week-over-week")]
        period: ComparisonType,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        exclude: Option<String>,
        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Limit output to collections, inbound, welcome or verification
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Score every client's week against its 4-week average
    #[command(group(
        ArgGroup::new("scope")
            .args(["client", "exclude"])
            .multiple(false)
    ))]
    Scorecard {
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        exclude: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown comparison report
    #[command(group(
        ArgGroup::new("scope")
            .args(["client", "exclude"])
            .multiple(false)
    ))]
    Report {
        #[arg(long, default_value = "week-over-week")]
        period: ComparisonType,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        exclude: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn selector_from(client: Option<String>, exclude: Option<String>) -> ClientSelector {
    match (client, exclude) {
        (Some(name), _) => ClientSelector::One(name),
        (None, Some(excluded)) => ClientSelector::AllExcept(excluded),
        (None, None) => ClientSelector::All,
    }
}

fn reference_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} call events from {}.", csv.display());
        }
        Commands::Compare {
            period,
            client,
            exclude,
            date,
            category,
            json,
        } => {
            let category = match category {
                Some(raw) => Some(
                    DataCategory::parse(&raw)
                        .with_context(|| format!("unknown category '{raw}'"))?,
                ),
                None => None,
            };
            let request = ComparisonRequest {
                comparison_type: period,
                reference_date: reference_or_today(date),
                clients: selector_from(client, exclude),
                category,
            };

            let store = Arc::new(db::PgCallStore::new(pool.clone()));
            let orchestrator = FetchOrchestrator::new(store, OrchestratorConfig::default())
                .with_cache(Arc::new(AggregateCache::new(CACHE_TTL)));
            let result = comparison::compare_periods(&orchestrator, &request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", report::build_comparison_report(&result, request.category));
            }
        }
        Commands::Scorecard {
            client,
            exclude,
            date,
            json,
        } => {
            let selector = selector_from(client, exclude);
            let store = Arc::new(db::PgCallStore::new(pool.clone()));
            let orchestrator = FetchOrchestrator::new(store, OrchestratorConfig::scorecard())
                .with_cache(Arc::new(AggregateCache::new(CACHE_TTL)));
            let cards =
                scorecard::scorecard_for_clients(&orchestrator, &selector, reference_or_today(date))
                    .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
            } else {
                print!("{}", report::build_scorecard_report(&cards));
            }
        }
        Commands::Report {
            period,
            client,
            exclude,
            date,
            out,
        } => {
            let request = ComparisonRequest {
                comparison_type: period,
                reference_date: reference_or_today(date),
                clients: selector_from(client, exclude),
                category: None,
            };

            let store = Arc::new(db::PgCallStore::new(pool.clone()));
            let orchestrator = FetchOrchestrator::new(store, OrchestratorConfig::default())
                .with_cache(Arc::new(AggregateCache::new(CACHE_TTL)));
            let result = comparison::compare_periods(&orchestrator, &request).await?;
            let report = report::build_comparison_report(&result, None);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

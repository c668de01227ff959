//! Linked Events search CLI
//!
//! Runs or explains a search request (JSON) against a fixture file or a
//! PostGIS database.

mod logging;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use linkedevents_query::{
    EventStore, Fixture, MemoryEventStore, PgEventStore, QueryConfig, SearchEngine, SearchRequest,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "linkedevents-search", version, about = "Run and explain Linked Events searches")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "LINKEDEVENTS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a search and print the result as JSON
    Search {
        #[command(flatten)]
        source: Source,

        /// Search request JSON file; an empty request when omitted
        #[arg(long)]
        request: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },
    /// Print the query plan for a request without fetching anything
    Plan {
        #[command(flatten)]
        source: Source,

        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Apply the bundled schema migrations
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[derive(Args, Debug)]
struct Source {
    /// Catalogue fixture (JSON) served from memory
    #[arg(long, conflicts_with = "database_url")]
    fixture: Option<PathBuf>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let logging_config = logging::LoggingConfig::load(cli.config.as_deref())
        .context("Failed to load logging configuration")?;
    let _logging_guard =
        logging::init_logging(&logging_config).context("Failed to initialize logging")?;

    let config = QueryConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    match cli.command {
        Command::Search {
            source,
            request,
            pretty,
        } => {
            let engine = SearchEngine::new(open_store(&source, &config).await?, config);
            let request = read_request(request.as_deref())?;
            let result = engine.search(&request).await?;
            for advisory in &result.advisories {
                tracing::warn!(%advisory, "Search advisory");
            }
            let output = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{output}");
        }
        Command::Plan { source, request } => {
            let engine = SearchEngine::new(open_store(&source, &config).await?, config);
            let request = read_request(request.as_deref())?;
            print!("{}", engine.plan(&request)?.explain());
        }
        Command::Migrate { database_url } => {
            let store = PgEventStore::connect(&database_url, &config)
                .await
                .context("Failed to connect to database")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
        }
    }

    Ok(())
}

async fn open_store(source: &Source, config: &QueryConfig) -> anyhow::Result<Arc<dyn EventStore>> {
    if let Some(path) = &source.fixture {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))?;
        let store = MemoryEventStore::from_fixture(fixture).context("Invalid fixture")?;
        tracing::info!(events = store.len(), fixture = %path.display(), "Loaded fixture");
        return Ok(Arc::new(store));
    }

    let database_url = source
        .database_url
        .as_deref()
        .context("Either --fixture or --database-url (DATABASE_URL) is required")?;
    let store = PgEventStore::connect(database_url, config)
        .await
        .context("Failed to connect to database")?;
    Ok(Arc::new(store))
}

fn read_request(path: Option<&Path>) -> anyhow::Result<SearchRequest> {
    let Some(path) = path else {
        return Ok(SearchRequest::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse request {}", path.display()))
}

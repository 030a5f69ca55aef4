use anyhow::{Context, Result};
use clap::Parser;
use release_index_server::background_jobs::jobs::{CatalogueIndexJob, SelectorSourceFactory};
use release_index_server::background_jobs::create_scheduler;
use release_index_server::config::{AppConfig, CliConfig, FileConfig, DEFAULT_ANTHROPIC_BASE_URL};
use release_index_server::indexer::{CatalogueIndexer, PolitenessDelay};
use release_index_server::server::{run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use release_index_server::verification::llm::AnthropicProviderFactory;
use release_index_server::verification::{seed_agent, AiVerificationEngine, DecisionResolver};
use release_index_server::SqliteCatalogueStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(
        &CliConfig {
            db_path: cli_args.db_path,
            port: cli_args.port,
            logging_level: cli_args.logging_level,
        },
        file_config,
    )?;

    info!("Opening SQLite database at {:?}...", config.db_path);
    let store = Arc::new(SqliteCatalogueStore::open(&config.db_path)?);

    let (providers, llm_timeout) = match &config.llm {
        Some(llm) => {
            seed_agent(store.as_ref(), llm)?;
            (
                AnthropicProviderFactory::new(llm.base_url.clone()),
                Duration::from_secs(llm.request_timeout_secs),
            )
        }
        None => {
            warn!("No [llm] section configured, verification uses the stored active agent");
            (
                AnthropicProviderFactory::new(DEFAULT_ANTHROPIC_BASE_URL),
                Duration::from_secs(120),
            )
        }
    };
    let engine = Arc::new(AiVerificationEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(providers),
        llm_timeout,
    ));

    let shutdown_token = CancellationToken::new();

    let indexer = Arc::new(CatalogueIndexer::new(
        store.clone(),
        store.clone(),
        PolitenessDelay::from_settings(&config.crawl),
    ));
    let index_interval = config
        .crawl
        .index_interval_hours
        .map(|hours| Duration::from_secs(hours * 60 * 60));
    match index_interval {
        Some(_) => info!(
            "Periodic indexing every {} hours",
            config.crawl.index_interval_hours.unwrap_or_default()
        ),
        None => info!("Indexing runs on demand only"),
    }
    let index_job = CatalogueIndexJob::new(
        indexer,
        config.distributors.clone(),
        Arc::new(SelectorSourceFactory::new(config.crawl.request_timeout())),
        index_interval,
    );

    let (mut scheduler, scheduler_handle) = create_scheduler(shutdown_token.clone());
    scheduler.register_job(Arc::new(index_job)).await;
    let scheduler_task = tokio::spawn(async move { scheduler.run().await });

    let ctrl_c_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
        ctrl_c_token.cancel();
    });

    let state = ServerState {
        config: ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
        },
        start_time: Instant::now(),
        hash: env!("GIT_HASH").to_string(),
        catalogue_store: store.clone(),
        verification_store: store.clone(),
        agent_store: store.clone(),
        verification_engine: engine,
        decision_resolver: Arc::new(DecisionResolver::new(store)),
        scheduler_handle: Some(scheduler_handle),
        shutdown_token: shutdown_token.clone(),
    };

    let served = run_server(state).await;
    shutdown_token.cancel();
    if let Err(e) = scheduler_task.await {
        error!("Job scheduler task failed: {}", e);
    }
    served
}

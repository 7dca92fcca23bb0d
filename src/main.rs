use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crossmodal::config::Config;
use crossmodal::db::models::{FeedbackEvent, Verdict};
use crossmodal::db::{FeedbackStore, ResultStore};
use crossmodal::feedback::{CoordinatorSettings, FeedbackCoordinator, SimulatedRetrainer};
use crossmodal::metrics::Metrics;
use crossmodal::pipeline::orchestrator::{ModerationRequest, Orchestrator, OrchestratorSettings};
use crossmodal::scoring::context::ContextMap;
use crossmodal::signals::image::HttpImageAnalyzer;
use crossmodal::signals::text::HttpTextAnalyzer;

/// crossmodal: cross-modal content moderation.
///
/// Fuses image labels, text sentiment and request context into one risk
/// score, and retrains on reviewer feedback.
#[derive(Parser)]
#[command(name = "crossmodal", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run the HTTP API
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Address to bind (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Moderate one image/text pair
    Analyze {
        /// Path to the image file
        image: PathBuf,

        /// Text that accompanies the image
        text: String,

        /// Request context as a JSON object (e.g. '{"platform":"forum"}')
        #[arg(long)]
        context: Option<String>,
    },

    /// Submit reviewer feedback on a past decision
    Feedback {
        /// The analysis_id of the decision being reviewed
        prediction_id: String,

        /// correct, partial or incorrect
        verdict: Verdict,

        /// What the risk score should have been (0.0 to 1.0)
        #[arg(long)]
        corrected_score: Option<f64>,
    },

    /// Show feedback and retraining counters
    Stats,

    /// Run retraining now and wait for it to finish
    Retrain,

    /// Probe the analysis services and stores
    Health,

    /// Show system status (DB size, decisions, feedback)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crossmodal=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing crossmodal database...");
            let config = Config::load()?;
            init_database(&config).await?;
        }

        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            let stores = open_stores(&config)?;
            let metrics = Arc::new(Metrics::new()?);
            let (orchestrator, coordinator) = build_services(&config, &stores, &metrics).await?;

            let state = crossmodal::web::AppState {
                orchestrator,
                coordinator,
                metrics,
                health_timeout: config.health_timeout,
            };
            crossmodal::web::run_server(state, port, &bind).await?;
        }

        Commands::Analyze {
            image,
            text,
            context,
        } => {
            let config = Config::load()?;
            let stores = open_stores(&config)?;
            let metrics = Arc::new(Metrics::new()?);
            let (orchestrator, _) = build_services(&config, &stores, &metrics).await?;

            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let context: ContextMap = match context {
                Some(raw) => serde_json::from_str(&raw)
                    .context("--context must be a JSON object")?,
                None => ContextMap::new(),
            };

            let request = ModerationRequest::new(bytes, text.clone(), context)?;
            let outcome = orchestrator.handle(request).await?;
            crossmodal::output::terminal::display_decision(&outcome, &text);
            println!(
                "\nReview it with: crossmodal feedback {} <correct|partial|incorrect>",
                outcome.decision.analysis_id
            );
        }

        Commands::Feedback {
            prediction_id,
            verdict,
            corrected_score,
        } => {
            let config = Config::load()?;
            let stores = open_stores(&config)?;
            let metrics = Arc::new(Metrics::new()?);
            let (_, coordinator) = build_services(&config, &stores, &metrics).await?;

            let mut event = FeedbackEvent::new(prediction_id, verdict);
            event.corrected_risk_score = corrected_score;

            let receipt = coordinator.submit(event).await?;
            crossmodal::output::terminal::display_receipt(&receipt);

            // The run is a detached task; keep the process alive until it ends
            if receipt.retraining_triggered {
                wait_for_retraining(&coordinator).await;
                crossmodal::output::terminal::display_feedback_stats(&coordinator.stats().await);
            }
        }

        Commands::Stats => {
            let config = Config::load()?;
            let stores = open_stores(&config)?;
            let metrics = Arc::new(Metrics::new()?);
            let (_, coordinator) = build_services(&config, &stores, &metrics).await?;
            crossmodal::output::terminal::display_feedback_stats(&coordinator.stats().await);
        }

        Commands::Retrain => {
            let config = Config::load()?;
            let stores = open_stores(&config)?;
            let metrics = Arc::new(Metrics::new()?);
            let (_, coordinator) = build_services(&config, &stores, &metrics).await?;

            println!("Retraining...");
            let handle = coordinator.retrain().await?;
            handle.await.context("Retraining task panicked")?;

            let stats = coordinator.stats().await;
            match &stats.last_error {
                Some(err) => println!("{} Retraining failed: {}", "!!".red().bold(), err),
                None => println!("{}", "Retraining complete".green().bold()),
            }
            crossmodal::output::terminal::display_feedback_stats(&stats);
        }

        Commands::Health => {
            let config = Config::load()?;
            let stores = open_stores(&config)?;
            let metrics = Arc::new(Metrics::new()?);
            let (orchestrator, coordinator) = build_services(&config, &stores, &metrics).await?;

            let report = crossmodal::pipeline::health::check(
                &orchestrator,
                &coordinator,
                config.health_timeout,
            )
            .await;
            crossmodal::output::terminal::display_health(&report);
        }

        Commands::Status => {
            let config = Config::load()?;
            if !std::path::Path::new(&config.db_path).exists() {
                println!("Database: not initialized");
                println!("\nRun `crossmodal init` to set up the database.");
                return Ok(());
            }
            let stores = open_stores(&config)?;
            crossmodal::status::show(
                stores.results.as_ref(),
                stores.feedback.as_ref(),
                &config.db_path,
            )
            .await?;
        }
    }

    Ok(())
}

/// The result store and the feedback store. With SQLite both are the same
/// database.
struct Stores {
    results: Arc<dyn ResultStore>,
    feedback: Arc<dyn FeedbackStore>,
}

#[cfg(feature = "sqlite")]
async fn init_database(config: &Config) -> Result<()> {
    let store = crossmodal::db::initialize_sqlite(&config.db_path)?;
    let table_count = store.table_count().await?;
    println!("Database initialized at: {}", config.db_path);
    println!("Tables created: {table_count}");
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn init_database(_config: &Config) -> Result<()> {
    anyhow::bail!(
        "The 'sqlite' feature is not compiled in; there is no database to initialize.\n\
         Rebuild with: cargo build --features sqlite"
    )
}

/// Open the configured stores.
#[cfg(feature = "sqlite")]
fn open_stores(config: &Config) -> Result<Stores> {
    let store = Arc::new(crossmodal::db::open_sqlite(&config.db_path)?);
    Ok(Stores {
        results: store.clone(),
        feedback: store,
    })
}

#[cfg(not(feature = "sqlite"))]
fn open_stores(_config: &Config) -> Result<Stores> {
    tracing::warn!("'sqlite' feature not compiled in; decisions and feedback are kept in memory only");
    let store = Arc::new(crossmodal::db::memory::MemoryStore::new());
    Ok(Stores {
        results: store.clone(),
        feedback: store,
    })
}

/// Wire the analyzer clients, orchestrator and feedback coordinator.
async fn build_services(
    config: &Config,
    stores: &Stores,
    metrics: &Arc<Metrics>,
) -> Result<(Arc<Orchestrator>, Arc<FeedbackCoordinator>)> {
    let image = HttpImageAnalyzer::new(&config.image_url, config.signal_timeout, config.health_timeout)?;
    let text = HttpTextAnalyzer::new(&config.text_url, config.signal_timeout, config.health_timeout)?;

    let orchestrator = Orchestrator::new(
        Arc::new(image),
        Arc::new(text),
        stores.results.clone(),
        metrics.clone(),
        OrchestratorSettings {
            signal_timeout: config.signal_timeout,
            ..Default::default()
        },
    );

    let coordinator = FeedbackCoordinator::initialize(
        stores.feedback.clone(),
        Arc::new(SimulatedRetrainer::new(config.retrain_phase_delay)),
        metrics.clone(),
        CoordinatorSettings {
            threshold: config.retrain_threshold,
        },
    )
    .await?;

    Ok((Arc::new(orchestrator), Arc::new(coordinator)))
}

async fn wait_for_retraining(coordinator: &FeedbackCoordinator) {
    println!("Waiting for retraining to finish...");
    loop {
        if !coordinator.stats().await.in_flight {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

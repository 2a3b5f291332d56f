//! cupscore CLI - coffee quality score server and client
//!
//! # Commands
//!
//! - `serve` - Load artifacts and start the prediction server
//! - `predict` - Submit one row of attribute values to a running server
//! - `info` - Show version and input schema

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use cupscore::{
    api::{create_router, AppState},
    coerce::RawValue,
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    error::{CupError, Result},
    http_client::PredictionClient,
    predict::ServiceContext,
    schema::{FieldSchema, CLEAN_CUP_HELP},
    submission::{submit_table, FormTable},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// cupscore - coffee quality score prediction
#[derive(Parser)]
#[command(name = "cupscore")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the prediction server
    Serve {
        /// YAML config file (defaults apply if it does not exist)
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Preprocessor artifact (overrides config)
        #[arg(long)]
        preprocessor: Option<PathBuf>,

        /// Model artifact (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
    /// Submit attribute values to a running server
    ///
    /// Values are taken in schema order; leave trailing ones off or pass ""
    /// for unknowns.
    ///
    /// Example:
    ///   cupscore predict 7.5 8 "" 7.75
    Predict {
        /// YAML config file (defaults apply if it does not exist)
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Prediction endpoint (overrides config)
        #[arg(short, long)]
        url: Option<String>,

        /// Request timeout in seconds (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Attribute values in schema order
        #[arg(value_name = "VALUE")]
        values: Vec<String>,
    },
    /// Show version and input schema
    Info,
}

/// `RUST_LOG` directives if they parse, otherwise `info`
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            preprocessor,
            model,
        } => {
            let mut config = AppConfig::load(&config)?;
            if let Some(path) = preprocessor {
                config.artifacts.preprocessor = path;
            }
            if let Some(path) = model {
                config.artifacts.model = path;
            }
            serve(&config, &host, port).await?;
        },
        Commands::Predict {
            config,
            url,
            timeout_secs,
            values,
        } => {
            let mut config = AppConfig::load(&config)?;
            if let Some(url) = url {
                config.client.endpoint = url;
            }
            if let Some(secs) = timeout_secs {
                config.client.timeout_secs = secs;
            }
            // Blocking client must stay off the async workers
            tokio::task::spawn_blocking(move || predict(&config, values))
                .await
                .map_err(|e| CupError::Connection(format!("predict task failed: {e}")))??;
        },
        Commands::Info => print_info(),
    }

    Ok(())
}

async fn serve(config: &AppConfig, host: &str, port: u16) -> Result<()> {
    println!("Starting cupscore prediction server...");

    let ctx = ServiceContext::load(config);
    println!("  Mode: {}", ctx.mode().as_str());
    println!("  Preprocessor loaded: {}", ctx.transform_status().loaded);
    println!("  Model loaded: {}", ctx.predictor_status().loaded);

    let app = create_router(AppState::new(ctx));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| CupError::invalid_input(format!("Invalid address: {e}")))?;

    println!("Server listening on http://{addr}");
    println!();
    println!("Endpoints:");
    println!("  GET  /health         - Health check");
    println!("  GET  /metrics        - Prometheus metrics");
    println!("  POST /predict        - Positional batch");
    println!("  POST /predict_row    - Positional single row");
    println!("  POST /predict_named  - Named batch");
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CupError::Connection(format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CupError::Connection(format!("Server error: {e}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed
        std::future::pending::<()>().await;
    }
}

fn predict(config: &AppConfig, values: Vec<String>) -> Result<()> {
    let client = PredictionClient::with_timeout(&config.client.endpoint, config.client.timeout_secs)?;
    let table = FormTable::Positional(vec![values.into_iter().map(RawValue::from).collect()]);
    let outcome = submit_table(&table, &FieldSchema::coffee(), &client);

    if !outcome.message.is_empty() {
        println!("{}", outcome.message);
        println!();
    }
    println!("Debug (payload + raw response):");
    println!("{}", outcome.debug);
    Ok(())
}

fn print_info() {
    println!("cupscore {}", cupscore::VERSION);
    println!("Coffee quality score prediction server");
    println!();
    println!("Input attributes:");
    for field in FieldSchema::coffee().fields() {
        println!("  {:<12} [{}, {}]", field.name, field.range.lo(), field.range.hi());
    }
    println!();
    println!("Note: {CLEAN_CUP_HELP}");
}

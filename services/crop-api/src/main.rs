//! Crop API service.
//!
//! Serves crop requests over HTTP, or runs a single crop, coordinate
//! inspection or catalog migration from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use catalog::PgCatalog;
use crop_api::server::{run_job, start_server};
use crop_api::{AppState, CropApiConfig};
use subset::{BoundingBox, CropOptions};

#[derive(Parser, Debug)]
#[command(name = "crop-api")]
#[command(about = "Geographic subsetting of chunked array files")]
struct Args {
    /// Configuration file (YAML); environment variables are used when absent
    #[arg(short, long, env = "CROP_API_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Listen address (overrides configuration)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Crop one file and print the report as JSON
    Crop {
        /// Catalog file name
        file_name: String,

        #[arg(long, allow_hyphen_values = true)]
        lat_min: f64,

        #[arg(long, allow_hyphen_values = true)]
        lat_max: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon_min: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon_max: f64,

        /// Dataset to copy, absolute or relative to the data group (repeatable)
        #[arg(long = "var")]
        data_vars: Vec<String>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        data_group: Option<String>,

        #[arg(long)]
        output_name: Option<String>,
    },

    /// Print the inferred coordinate binding of a file
    Inspect {
        file_name: String,

        #[arg(long)]
        data_group: Option<String>,
    },

    /// Create the catalog tables
    Migrate,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    // Initialize tracing; stdout stays free for command output
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let mut config = CropApiConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.listen = listen;
            }
            serve(config).await
        }
        Command::Crop {
            file_name,
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            data_vars,
            output_dir,
            data_group,
            output_name,
        } => {
            let bbox = BoundingBox::new(lat_min, lat_max, lon_min, lon_max)?;
            let options = CropOptions {
                file_name,
                bbox,
                data_vars: (!data_vars.is_empty()).then_some(data_vars),
                output_dir,
                data_group,
                output_name,
            };

            let state = AppState::from_config(&config).await?;
            let report = run_job(&state, &options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Inspect {
            file_name,
            data_group,
        } => {
            let state = AppState::from_config(&config).await?;
            let (file, binding) = state
                .cropper
                .inspect(&file_name, data_group.as_deref())
                .await?;
            let output = serde_json::json!({
                "file": file,
                "binding": binding,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Command::Migrate => {
            let Some(url) = &config.database_url else {
                bail!("DATABASE_URL is required for migrate");
            };
            let catalog = PgCatalog::connect(url, config.database_max_connections).await?;
            catalog.migrate().await?;
            info!("Catalog migrations applied");
            Ok(())
        }
    }
}

async fn serve(config: CropApiConfig) -> Result<()> {
    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    info!(
        listen = %config.listen,
        output_dir = %config.crop.output_dir.display(),
        timeout_secs = ?config.job_timeout_secs,
        "Starting crop-api"
    );

    let state = AppState::from_config(&config)
        .await?
        .with_prometheus(prometheus_handle);
    start_server(Arc::new(state), &config.listen).await
}

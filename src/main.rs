pub mod types;
pub mod config;
pub mod error;
pub mod stats;
pub mod chart;
pub mod fetcher;
pub mod map_host;
pub mod presenter;
pub mod pipeline;
pub mod server;
pub mod html;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fetcher::{ArcGisClient, AttributeFetcher};
use map_host::MapHost;
use presenter::{Outcome, SelectionPresenter};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the census viewer
    Serve {
        /// Viewer settings; the stock Census service is used without one
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Select the region under one point and print what the viewer would show
    Query {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        /// Write the donut chart here
        #[arg(long, value_name = "FILE")]
        svg: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load(config.as_deref())?;
            let client = ArcGisClient::new(&app_config.service)
                .context("Failed to build HTTP client")?;

            // A failed load leaves a blank map; the server still comes up.
            let host = match MapHost::initialize(&app_config, &client).await {
                Ok(host) => host,
                Err(e) => {
                    error!("map initialization failed: {e}");
                    MapHost::unavailable(&app_config.map)
                }
            };

            let map = host.describe();
            let pipeline = pipeline::SelectionPipeline::new(
                host,
                client,
                SelectionPresenter::new(&app_config),
                app_config.service.layer_endpoint(),
            )
            .spawn();

            server::start_server(&app_config, map, pipeline).await?;
        }
        Commands::Query { config, x, y, svg } => {
            let app_config = config::AppConfig::load(config.as_deref())?;
            let client = ArcGisClient::new(&app_config.service)
                .context("Failed to build HTTP client")?;
            let mut host = MapHost::initialize(&app_config, &client)
                .await
                .context("Map initialization failed")?;

            let point = types::Point::new(x, y);
            let feature = client
                .query_at(point, &app_config.service.layer_endpoint())
                .await
                .context("Attribute query failed")?;

            let mut presenter = SelectionPresenter::new(&app_config);
            match presenter.present(1, feature, &mut host)? {
                Outcome::Applied => {}
                Outcome::NoFeature | Outcome::Stale => {
                    info!(x, y, "no feature at point");
                    return Ok(());
                }
            }

            if let Some(selection) = presenter.state().selection() {
                println!("{}", serde_json::to_string_pretty(&selection.modal)?);
            }
            if let (Some(path), Some(chart)) = (svg, presenter.surface().to_svg()) {
                std::fs::write(&path, chart)
                    .with_context(|| format!("Failed to write chart: {:?}", path))?;
                info!("chart written to {:?}", path);
            }
        }
    }

    Ok(())
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal front end for the outbreak surveillance dashboard.
//!
//! Every subcommand runs the same coordinator the dashboard uses and prints
//! what the corresponding panel would show.

mod render;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use outbreak_watch_cluster::map::ClusterMap;
use outbreak_watch_dashboard::config::DEFAULT_CONFIG_TOML;
use outbreak_watch_dashboard::{DashboardConfig, DashboardCoordinator};

#[derive(Parser)]
#[command(name = "outbreak_watch", about = "Outbreak surveillance dashboard")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// API base URL (overrides the config file and `OUTBREAK_WATCH_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch everything and print the headline stats
    Summary,
    /// Print village clusters and water-source markers for the map
    Clusters,
    /// Print reports, water sources and alerts near a point
    Nearby {
        /// Latitude of the point
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude of the point
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Select a village cluster and print what is near it
    Select {
        /// Village name, exactly as reported
        village: String,
    },
    /// Broadcast a public alert to subscribed recipients
    SendAlert {
        /// Alert text
        message: String,
    },
    /// Print the default configuration file
    Config,
}

/// Loads configuration (file, environment, then `--api-url`) and builds
/// an HTTP-backed coordinator.
fn connect(
    config_path: Option<&Path>,
    api_url: Option<&str>,
) -> Result<DashboardCoordinator, Box<dyn std::error::Error>> {
    let mut config = DashboardConfig::load(config_path)?;
    if let Some(url) = api_url {
        config.api_base_url = url.to_string();
        config.validate()?;
    }
    log::debug!("Using API at {}", config.api_base_url);

    Ok(DashboardCoordinator::from_config(&config)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let open = || connect(cli.config.as_deref(), cli.api_url.as_deref());

    match cli.command {
        Commands::Config => print!("{DEFAULT_CONFIG_TOML}"),
        Commands::Summary => {
            let coordinator = open()?;
            coordinator.mount().await;
            let data = coordinator.snapshot();
            println!("{}", render::summary(render::loaded(&data)?));
        }
        Commands::Clusters => {
            let coordinator = open()?;
            coordinator.mount().await;
            let data = coordinator.snapshot();
            let data = render::loaded(&data)?;

            let mut map = ClusterMap::new(None);
            map.update(
                data.symptom_reports_map.data.as_deref().unwrap_or_default(),
                data.water_sources_map.data.as_deref().unwrap_or_default(),
            );
            println!("{}", render::clusters(map.clusters()));
            println!();
            println!("{}", render::water_markers(map.water_markers()));
        }
        Commands::Nearby { lat, lon } => {
            let coordinator = open()?;
            coordinator.set_center_of_interest(lat, lon);
            coordinator.refetch_scoped().await;
            let data = coordinator.snapshot();
            println!("{}", render::nearby(render::loaded(&data)?));
        }
        Commands::Select { village } => {
            let coordinator = open()?;
            coordinator.mount().await;
            let data = coordinator.snapshot();
            let data = render::loaded(&data)?;

            let mut map = ClusterMap::new(Some(coordinator.center().click_callback()));
            map.update(
                data.symptom_reports_map.data.as_deref().unwrap_or_default(),
                data.water_sources_map.data.as_deref().unwrap_or_default(),
            );

            let Some(summary) = map.select(&village).cloned() else {
                return Err(format!("No reports from village \"{village}\"").into());
            };

            coordinator.refetch_scoped().await;
            let nearby = coordinator.snapshot();
            let nearby = render::loaded(&nearby)?;
            println!("{}", render::selection(&summary));
            println!();
            println!("{}", render::nearby(nearby));
        }
        Commands::SendAlert { message } => {
            let sent = open()?.send_alert(&message).await?;
            println!("{sent}");
        }
    }

    Ok(())
}

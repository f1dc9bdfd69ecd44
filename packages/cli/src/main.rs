#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for retrieving street trees and computing their
//! construction protection zones.
//!
//! Uses `indicatif-log-bridge` (via [`tree_zones_cli_utils::init_logger`])
//! so log lines and the retrieval progress bar share the terminal.

mod fetch;
mod zones;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tree_zones::io::{DEFAULT_LOCAL_FILE, load_feature_collection};
use tree_zones_arcgis::registry::{self, DEFAULT_SERVICE_ID};
use tree_zones_arcgis_models::ServiceDefinition;

#[derive(Parser)]
#[command(
    name = "tree_zones",
    about = "Street tree retrieval and construction protection zones"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in tree services
    Services,
    /// Retrieve every tree feature from a service and save it as `GeoJSON`
    Fetch {
        #[command(flatten)]
        fetch: fetch::FetchArgs,
    },
    /// Compute protection zones from a saved feature collection
    Zones {
        /// Feature collection to read
        #[arg(long, default_value = DEFAULT_LOCAL_FILE)]
        input: PathBuf,
        #[command(flatten)]
        service: ServiceArgs,
        #[command(flatten)]
        zones: zones::ZoneArgs,
    },
    /// Retrieve from a service, save the collection, then compute zones
    Run {
        #[command(flatten)]
        fetch: fetch::FetchArgs,
        #[command(flatten)]
        zones: zones::ZoneArgs,
    },
}

/// Which service definition to use.
#[derive(Args)]
struct ServiceArgs {
    /// Built-in service ID (see `services`)
    #[arg(long, default_value = DEFAULT_SERVICE_ID)]
    service: String,
    /// Service definition TOML to use instead of a built-in one
    #[arg(long, conflicts_with = "service")]
    service_file: Option<PathBuf>,
}

impl ServiceArgs {
    fn resolve(&self) -> Result<ServiceDefinition, Box<dyn std::error::Error>> {
        if let Some(path) = &self.service_file {
            return Ok(registry::load_service_file(path)?);
        }
        Ok(registry::service(&self.service)
            .ok_or_else(|| format!("Unknown service: {}", self.service))?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tree_zones_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Services => {
            let services = registry::all_services();
            println!("{:<24} NAME", "ID");
            println!("{}", "-".repeat(60));
            for service in &services {
                println!("{:<24} {}", service.id, service.name);
            }
        }
        Commands::Fetch { fetch: args } => {
            let definition = args.definition()?;
            fetch::run(&args, &definition, &multi).await?;
        }
        Commands::Zones {
            input,
            service,
            zones: args,
        } => {
            let definition = service.resolve()?;
            let collection = load_feature_collection(&input)?;
            zones::run(&args, &collection, &definition.fields)?;
        }
        Commands::Run {
            fetch: fetch_args,
            zones: zone_args,
        } => {
            let definition = fetch_args.definition()?;
            let Some(collection) = fetch::run(&fetch_args, &definition, &multi).await? else {
                return Ok(());
            };
            zones::run(&zone_args, &collection, &definition.fields)?;
        }
    }

    Ok(())
}

//! confsync command line client.
//!
//! # Architecture Overview
//!
//! ```text
//!   get(ns, key)      ┌────────────────┐
//!  ──────────────────▶│ NamespaceCache │◀─────── install_if_newer ───────┐
//!                     └────────────────┘                                 │
//!                                                                ┌───────┴──────┐  fetch  ┌───────────────┐
//!                                                                │  SyncEngine  │────────▶│ RemoteFetcher │
//!                                                                │ (1 task / ns)│◀────────│    (HTTP)     │
//!                                                                └──┬────────┬──┘         └───────────────┘
//!                                                       save / load │        │ diff + notify
//!                                                  ┌────────────────▼─┐   ┌──▼─────────────┐
//!                                                  │  DiskCacheStore  │   │ ChangeNotifier │
//!                                                  └──────────────────┘   └────────────────┘
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use confsync::config::load_config;
use confsync::observability::{logging, metrics};
use confsync::{ConfigClient, DiskCacheStore};

#[derive(Parser)]
#[command(name = "confsync")]
#[command(about = "Read namespaced configuration from a remote configuration service", long_about = None)]
struct Cli {
    /// Client configuration file (TOML).
    #[arg(short, long, default_value = "confsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a single value
    Get {
        key: String,
        #[arg(short, long, default_value = "application")]
        namespace: String,
        #[arg(short, long, default_value = "")]
        default: String,
    },
    /// Print every key of one or all namespaces as JSON
    Dump {
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// Keep syncing and print change events until Ctrl-C
    Watch,
    /// Delete the disk fallback of one or all namespaces
    Purge {
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability.log_level);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Commands::Purge { namespace } = &cli.command {
        let store = DiskCacheStore::new(&config.cache.dir, &config.app.app_id)?;
        let namespaces: Vec<String> = match namespace {
            Some(ns) => vec![ns.clone()],
            None => config.namespaces.clone(),
        };
        for ns in &namespaces {
            store.remove(ns)?;
            tracing::info!(namespace = %ns, "Removed disk fallback");
        }
        println!("purged {} namespace(s) in {}", namespaces.len(), store.dir().display());
        return Ok(());
    }

    let client = ConfigClient::new(config)?;

    match cli.command {
        Commands::Get { key, namespace, default } => {
            client.start().await;
            println!("{}", client.get(&namespace, &key, &default));
        }
        Commands::Dump { namespace } => {
            client.start().await;
            let namespaces: Vec<String> = match namespace {
                Some(ns) => vec![ns],
                None => client.namespaces().to_vec(),
            };
            let mut dump: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
            for ns in namespaces {
                let entries = client
                    .snapshot(&ns)
                    .map(|s| s.entries().clone().into_iter().collect())
                    .unwrap_or_default();
                dump.insert(ns, entries);
            }
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        Commands::Watch => {
            for ns in client.namespaces() {
                client.on_change(ns, |namespace, event| {
                    match serde_json::to_string(event) {
                        Ok(json) => println!("{}: {}", namespace, json),
                        Err(e) => tracing::warn!(error = %e, "Failed to render change event"),
                    }
                    Ok(())
                });
            }
            client.start().await;
            tracing::info!("Watching for configuration changes, press Ctrl-C to exit");
            tokio::signal::ctrl_c().await?;
        }
        Commands::Purge { .. } => {}
    }

    client.stop().await;
    Ok(())
}

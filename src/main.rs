// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dpsync::catalog::{CatalogClient, HttpCatalog};
use dpsync::config::{CatalogConfig, DEFAULT_TIMEOUT, HOST_ENV, KEY_ENV};
use dpsync::package::{self, Package};
use dpsync::sync::{self, RemoteState, SyncOptions, SyncOutcome, UpdateOutcome};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "dpsync")]
#[command(author, version, about = "Publish and update data packages on a CKAN catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Catalog connection flags shared by every remote command
#[derive(clap::Args)]
struct CatalogArgs {
    /// Catalog base URL
    #[arg(long, env = HOST_ENV)]
    host: String,
    /// Catalog API key
    #[arg(long, env = KEY_ENV, hide_env_values = true)]
    key: Option<String>,
    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,
}

impl CatalogArgs {
    fn connect(&self) -> Result<HttpCatalog> {
        let config = CatalogConfig::new(&self.host, self.key.clone())?
            .with_timeout(Duration::from_secs(self.timeout));
        Ok(HttpCatalog::new(config)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dataset and all of its resources
    Publish {
        /// Manifest file, package directory or URL
        #[arg(default_value = "datapackage.json")]
        source: String,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Do not register resource schemas with the datastore
        #[arg(long)]
        no_datastore: bool,
    },
    /// Push only the resources that changed since the last run
    Update {
        /// Manifest file, package directory or URL
        #[arg(default_value = "datapackage.json")]
        source: String,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Do not register resource schemas with the datastore
        #[arg(long)]
        no_datastore: bool,
    },
    /// Publish if the dataset is absent, update otherwise
    Sync {
        /// Manifest file, package directory or URL
        #[arg(default_value = "datapackage.json")]
        source: String,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Do not register resource schemas with the datastore
        #[arg(long)]
        no_datastore: bool,
    },
    /// Show which resources differ from the published dataset
    Diff {
        /// Manifest file, package directory or URL
        #[arg(default_value = "datapackage.json")]
        source: String,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

fn options(no_datastore: bool) -> SyncOptions {
    SyncOptions {
        datastore: !no_datastore,
    }
}

fn print_update(catalog: &dyn CatalogClient, package: &Package, outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::NothingToUpdate => {
            println!(
                "Nothing to be updated in dataset {}",
                catalog.dataset_url(&package.name)
            );
        }
        UpdateOutcome::Updated(diff) => {
            println!("Dataset {} updated", catalog.dataset_url(&package.name));
            for change in &diff.changes {
                println!(
                    "  {} (data: {}, metadata: {})",
                    change.name, change.data_changed, change.metadata_changed
                );
            }
            if diff.manifest_changed {
                println!("  dataset metadata");
            }
        }
    }
}

fn print_published(catalog: &dyn CatalogClient, package: &Package, ids: &sync::ResourceIdMap) {
    println!("Published dataset {}", catalog.dataset_url(&package.name));
    for (name, id) in ids.iter() {
        println!("  {} -> {}", name, id);
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Publish {
            source,
            catalog,
            no_datastore,
        }) => {
            let package = package::load(&source)?;
            let catalog = catalog.connect()?;
            let ids = sync::publish(&catalog, &package, &options(no_datastore))?;
            print_published(&catalog, &package, &ids);
            Ok(())
        }
        Some(Commands::Update {
            source,
            catalog,
            no_datastore,
        }) => {
            let package = package::load(&source)?;
            let catalog = catalog.connect()?;
            let outcome = sync::update(&catalog, &package, &options(no_datastore))?;
            print_update(&catalog, &package, &outcome);
            Ok(())
        }
        Some(Commands::Sync {
            source,
            catalog,
            no_datastore,
        }) => {
            let package = package::load(&source)?;
            let catalog = catalog.connect()?;
            match sync::sync(&catalog, &package, &options(no_datastore))? {
                SyncOutcome::Published(ids) => print_published(&catalog, &package, &ids),
                SyncOutcome::Updated(outcome) => print_update(&catalog, &package, &outcome),
            }
            Ok(())
        }
        Some(Commands::Diff { source, catalog }) => {
            let package = package::load(&source)?;
            let catalog = catalog.connect()?;

            info!("Comparing {} with {}", source, catalog.dataset_url(&package.name));
            let remote = RemoteState::read(&catalog, &package.name)?;
            let diff = sync::diff(&catalog, &package, &remote)?;

            if diff.is_empty() {
                println!("Dataset {} is up to date", catalog.dataset_url(&package.name));
            } else {
                for change in &diff.changes {
                    println!(
                        "{} [{}] data: {}, metadata: {}",
                        change.name, change.id, change.data_changed, change.metadata_changed
                    );
                }
                if diff.manifest_changed {
                    println!("{} dataset metadata changed", package::MANIFEST_NAME);
                }
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "dpsync", &mut std::io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("dpsync v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'dpsync --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_publish_defaults() {
        let cli = Cli::try_parse_from(["dpsync", "publish", "--host", "https://ckan.example.org"])
            .unwrap();
        match cli.command {
            Some(Commands::Publish {
                source,
                catalog,
                no_datastore,
            }) => {
                assert_eq!(source, "datapackage.json");
                assert_eq!(catalog.host, "https://ckan.example.org");
                assert_eq!(catalog.timeout, DEFAULT_TIMEOUT.as_secs());
                assert!(!no_datastore);
            }
            _ => panic!("expected publish command"),
        }
    }

    #[test]
    fn test_no_datastore_flag() {
        let cli = Cli::try_parse_from([
            "dpsync",
            "update",
            "pkg/",
            "--host",
            "https://ckan.example.org",
            "--no-datastore",
            "--timeout",
            "5",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Update {
                source,
                catalog,
                no_datastore,
            }) => {
                assert_eq!(source, "pkg/");
                assert_eq!(catalog.timeout, 5);
                assert!(!options(no_datastore).datastore);
            }
            _ => panic!("expected update command"),
        }
    }
}

// ABOUTME: CLI entry point for adaptive-replicator
// ABOUTME: Parses commands, loads configuration, and routes to handlers

use std::path::PathBuf;

use adaptive_replicator::commands::{self, CloudCredentials};
use adaptive_replicator::config::SyncConfig;
use adaptive_replicator::sync::SyncReport;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adaptive-replicator")]
#[command(about = "Schema-adaptive record sync into PostgreSQL", long_about = None)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    /// Path to config.toml (defaults to ~/.adaptive-replicator/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Destination PostgreSQL URL
    #[arg(long, env = "TARGET_DATABASE_URL")]
    target: String,
}

#[derive(Args)]
struct CloudArgs {
    /// Cloud store base URL
    #[arg(long = "cloud-url", env = "CLOUD_STORE_URL")]
    cloud_url: Option<String>,
    /// Cloud store API key
    #[arg(long = "cloud-key", env = "CLOUD_STORE_KEY", hide_env_values = true)]
    cloud_key: Option<String>,
}

impl CloudArgs {
    fn credentials(self) -> Option<CloudCredentials> {
        match (self.cloud_url, self.cloud_key) {
            (Some(url), Some(key)) => Some(CloudCredentials { url, key }),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every configured table from the cloud store into PostgreSQL
    Migrate {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        cloud: CloudArgs,
        /// Only these tables, in this order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
        /// Only insert rows missing locally instead of replacing each table
        #[arg(long)]
        incremental: bool,
        /// Column that identifies a row for --incremental [default: id]
        #[arg(long, requires = "incremental")]
        key: Option<String>,
        /// Write the JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Scrape school listings and add new schools to PostgreSQL and the cloud store
    Scrape {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        cloud: CloudArgs,
        /// Only these listings (comma-separated rede names)
        #[arg(long, value_delimiter = ',')]
        rede: Vec<String>,
        /// Write to PostgreSQL only
        #[arg(long)]
        no_cloud: bool,
        /// Write the JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Compare row counts between PostgreSQL and the cloud store
    Verify {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        cloud: CloudArgs,
        /// Only these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --log
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = SyncConfig::resolve(cli.config.as_deref())?;

    let success = match cli.command {
        Commands::Migrate {
            target,
            cloud,
            tables,
            incremental,
            key,
            report,
        } => {
            let cloud = cloud.credentials().ok_or_else(|| {
                anyhow::anyhow!("migrate needs --cloud-url and --cloud-key (or CLOUD_STORE_URL / CLOUD_STORE_KEY)")
            })?;
            let run = commands::migrate(
                &config,
                commands::migrate::MigrateOptions {
                    target: target.target,
                    cloud,
                    tables,
                    incremental_key: incremental.then(|| key.unwrap_or_else(|| "id".to_string())),
                },
            )
            .await?;
            finish_run(run, report.as_deref()).await?
        }
        Commands::Scrape {
            target,
            cloud,
            rede,
            no_cloud,
            report,
        } => {
            let cloud = if no_cloud {
                None
            } else {
                let credentials = cloud.credentials();
                if credentials.is_none() {
                    anyhow::bail!(
                        "scrape writes to the cloud store too: pass --cloud-url and --cloud-key, or --no-cloud"
                    );
                }
                credentials
            };
            let run = commands::scrape(
                &config,
                commands::scrape::ScrapeOptions {
                    target: target.target,
                    cloud,
                    redes: rede,
                },
            )
            .await?;
            finish_run(run, report.as_deref()).await?
        }
        Commands::Verify {
            target,
            cloud,
            tables,
        } => {
            let cloud = cloud.credentials();
            let cloud_checked = cloud.is_some();
            let counts = commands::verify(
                &config,
                commands::verify::VerifyOptions {
                    target: target.target,
                    cloud,
                    tables,
                },
            )
            .await?;

            for table in &counts {
                println!("{}", table.render(cloud_checked));
            }
            counts.iter().all(|t| t.is_consistent(cloud_checked))
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the summary, save the report if asked, and tell whether every batch succeeded.
async fn finish_run(report: SyncReport, path: Option<&std::path::Path>) -> anyhow::Result<bool> {
    println!("{}", report.render_summary());
    if let Some(path) = path {
        report.save(path).await?;
        tracing::info!("Report written to {:?}", path);
    }
    Ok(report.is_success())
}

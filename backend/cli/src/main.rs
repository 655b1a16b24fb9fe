mod app;
mod check_config_cmd;
mod status_cmd;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use examlens_config::{load_and_prepare, resolve_config_path};

#[derive(Parser)]
#[command(name = "examlens")]
#[command(about = "examlens: exam image analysis relay")]
#[command(version)]
struct Cli {
    /// Config file (default: $EXAMLENS_CONFIG or ~/.examlens/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay HTTP server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Query the health endpoint of a running server
    Status,
    /// Print the effective config (secrets redacted) and validation report
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Serve { port } => {
            let (mut config, report) = load_and_prepare(&path).await?;
            examlens_logging::init_logger(&config.logging.dir, &config.logging.level);

            // The loader ran before the subscriber existed.
            for w in &report.warnings {
                warn!(path = %w.path, message = %w.message, "Config warning");
            }
            if !report.is_valid() {
                for e in &report.errors {
                    error!(path = %e.path, message = %e.message, "Config error");
                }
                bail!(
                    "Config at {} has {} error(s); run `examlens check-config`",
                    path.display(),
                    report.errors.len()
                );
            }

            if let Some(port) = port {
                config.server.port = port;
            }
            app::run_server(config).await?;
        }
        Commands::Status => {
            let (config, _) = load_and_prepare(&path).await?;
            status_cmd::run(&config).await?;
        }
        Commands::CheckConfig => {
            if !check_config_cmd::run(&path).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

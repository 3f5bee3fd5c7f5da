// crates/hopchain-cli/src/main.rs
//
// CLI entrypoint for the Hopchain audit ledger tools.
//
// Provides subcommands for verifying hop chains and export documents,
// signing, sharing and executing packets, reading the packet audit log,
// evaluating routing rules, matching templates, and running an end-to-end
// demo against the local repository.

mod commands;
mod config;
mod output;
mod repository;

use clap::{Parser, Subcommand};
use commands::audit::AuditCmd;
use commands::demo::DemoCmd;
use commands::export::ExportCmd;
use commands::packet::PacketCmd;
use commands::replay::ReplayCmd;
use commands::route::RouteCmd;
use commands::templates::TemplatesCmd;
use commands::verify_chain::VerifyChainCmd;
use commands::verify_export::VerifyExportCmd;
use config::HopchainConfig;
use output::OutputFormat;

/// Hopchain CLI: tamper-evident hop ledgers, packet signatures, routing.
#[derive(Parser, Debug)]
#[command(
    name = "hopchain",
    version = "0.1.0",
    about = "Hopchain CLI: record, replay and independently verify multi-step command executions"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value_t = config::default_config_path())]
    config: String,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Recompute and check a stored session's hop chain.
    VerifyChain(VerifyChainCmd),

    /// Re-verify an export document file offline.
    VerifyExport(VerifyExportCmd),

    /// Export a stored session as a signed document.
    Export(ExportCmd),

    /// Packet signatures, share envelopes and executions.
    #[command(subcommand)]
    Packet(PacketCmd),

    /// List the packet audit log.
    Audit(AuditCmd),

    /// Evaluate the configured routing rules for a prompt.
    Route(RouteCmd),

    /// Replay a stored session's routing decisions against the current rules.
    Replay(ReplayCmd),

    /// Rank templates against a free-text intent.
    Templates(TemplatesCmd),

    /// Run a prompt end to end with a local echo model, then export it.
    Demo(DemoCmd),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Configuration decides the fallback log level, so read it before
    // initializing tracing and report a failed load afterwards.
    let loaded = HopchainConfig::load(&cli.config);
    let log_level = match &loaded {
        Ok(cfg) => cfg.log_level.clone(),
        Err(_) => "info".to_string(),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    let config = match loaded {
        Ok(cfg) => {
            tracing::debug!("Loaded configuration from {}", cli.config);
            cfg
        }
        Err(e) => {
            tracing::warn!(
                "Could not load config from {}: {}. Using defaults.",
                cli.config,
                e
            );
            HopchainConfig::default()
        }
    };

    let format = OutputFormat::from_flag(cli.json);

    match &cli.command {
        Commands::VerifyChain(cmd) => commands::verify_chain::run(cmd, &config, format).await?,
        Commands::VerifyExport(cmd) => commands::verify_export::run(cmd, format)?,
        Commands::Export(cmd) => commands::export::run(cmd, &config).await?,
        Commands::Packet(cmd) => commands::packet::run(cmd, &config, format).await?,
        Commands::Audit(cmd) => commands::audit::run(cmd, &config, format).await?,
        Commands::Route(cmd) => commands::route::run(cmd, &config, format)?,
        Commands::Replay(cmd) => commands::replay::run(cmd, &config, format).await?,
        Commands::Templates(cmd) => commands::templates::run(cmd, &config, format).await?,
        Commands::Demo(cmd) => commands::demo::run(cmd, &config, format).await?,
    }

    Ok(())
}

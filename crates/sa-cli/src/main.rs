use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sa_wire::Protocol;

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "sa")]
#[command(about = "Progress stream client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one streaming session and render progress until it ends.
    /// Ctrl-C once requests a cancel; twice force-closes.
    Stream {
        /// Layered config paths in merge order (defaults apply when omitted)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Wire variant: structured | line
        #[arg(long)]
        protocol: Option<Protocol>,

        /// Issue the start command with this per-subject timeout (seconds)
        #[arg(long)]
        timeout: Option<u32>,

        /// Subject ids to show as pending before the first event
        #[arg(long = "subject")]
        subjects: Vec<String>,

        /// Print every published view as one JSON line instead of text
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Fail on unknown config keys instead of warning
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Ask the server to stop the running job
    Stop {
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Check node health once, or keep polling with --watch
    Health {
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[arg(long, default_value_t = false)]
        watch: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overlay ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env.local if present (dev convenience); silent when absent.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Stream {
            config_paths,
            protocol,
            timeout,
            subjects,
            json,
            strict_config,
        } => {
            let mut cfg = commands::load_client_config(&config_paths, strict_config)?;
            if let Some(p) = protocol {
                cfg.stream.protocol = p;
            }
            if timeout.is_some() {
                cfg.session.job_timeout_secs = timeout;
            }
            if !subjects.is_empty() {
                cfg.session.subjects = subjects;
            }
            cfg.validate()?;
            commands::stream::run(cfg, json).await
        }

        Commands::Stop { config_paths } => {
            let cfg = commands::load_client_config(&config_paths, false)?;
            commands::health::stop(&cfg).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Health {
            config_paths,
            watch,
        } => {
            let cfg = commands::load_client_config(&config_paths, false)?;
            if watch {
                commands::health::watch(&cfg).await?;
            } else {
                commands::health::once(&cfg).await?;
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = sa_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr; stdout carries rendered progress.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

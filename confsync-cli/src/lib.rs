//! The confsync CLI.

mod cmd;
mod config;
mod status;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use confsync::{RetryPolicy, Transport, DEFAULT_REQUEST_TIMEOUT, MAX_ATTEMPTS};
use structopt::StructOpt;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub use config::{Config, DeploymentEnv, TargetEnv};
pub use status::RunStatus;

/// Copy configuration objects from the template deployment to worker groups of the UAT or
/// production deployment.
#[derive(StructOpt)]
#[structopt(name = "confsync")]
pub struct Confsync {
    #[structopt(subcommand)]
    action: ConfsyncSubcommands,
    /// Enable debug logging.
    #[structopt(short)]
    verbose: bool,
    /// The target environment, either `uat` or `prod`.
    #[structopt(long, default_value = "uat")]
    env: TargetEnv,
    /// A dotenv file to load before reading configuration from the environment.
    #[structopt(long, default_value = ".env", parse(from_os_str))]
    env_file: PathBuf,
    /// Per-attempt request timeout in seconds. Defaults to 30.
    #[structopt(long)]
    timeout_secs: Option<u64>,
    /// Delay in milliseconds between attempts of a request failing at the network level.
    #[structopt(long, default_value = "0")]
    retry_delay_ms: u64,
}

impl Confsync {
    pub async fn run(self) -> Result<RunStatus> {
        // Initialize logging based on CLI config.
        let fmt_layer = fmt::layer().with_target(true);
        let filter_layer;
        let level_filter;
        if self.verbose {
            filter_layer = EnvFilter::new("debug");
            level_filter = LevelFilter::DEBUG;
        } else {
            filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            level_filter = LevelFilter::INFO;
        }
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(level_filter)
            .try_init()
            .context("error initializing logging/tracing system")?;

        match &self.action {
            ConfsyncSubcommands::Replicate(inner) => inner.run(&self).await,
            ConfsyncSubcommands::Groups(inner) => inner.run(&self).await,
        }
    }

    /// Load the runtime config for the selected environment.
    pub fn config(&self) -> Result<Config> {
        config::load_env_file(&self.env_file)?;
        Config::new(self.env)
    }

    /// Build a new transport based on runtime config.
    pub fn transport(&self) -> Result<Transport> {
        let policy = RetryPolicy {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::from_millis(self.retry_delay_ms),
        };
        let timeout = self.timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        Transport::with_reqwest(timeout, policy)
    }
}

#[derive(StructOpt)]
pub enum ConfsyncSubcommands {
    /// Replicate a configuration object to target worker groups.
    #[structopt(name = "replicate")]
    Replicate(cmd::replicate::Replicate),
    /// List the worker groups of a deployment.
    #[structopt(name = "groups")]
    Groups(cmd::groups::Groups),
}

//! Runtime configuration.
//!
//! Each deployment is described by a block of env vars sharing a prefix: `TEMPLATE_` for the
//! source deployment, and `UAT_` or `PROD_` for the target deployment. An optional dotenv file
//! is loaded first, values already present in the environment take precedence.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use confsync::{validate_worker_group, DeploymentCredentials};
use serde::Deserialize;

const TEMPLATE_PREFIX: &str = "TEMPLATE_";

/// The environment objects are replicated to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetEnv {
    Uat,
    Prod,
}

impl TargetEnv {
    /// The env var prefix of this environment's deployment block.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Uat => "UAT_",
            Self::Prod => "PROD_",
        }
    }
}

impl FromStr for TargetEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uat" => Ok(Self::Uat),
            "prod" => Ok(Self::Prod),
            _ => bail!("invalid env '{}', valid options are: uat or prod", s),
        }
    }
}

impl fmt::Display for TargetEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uat => f.write_str("uat"),
            Self::Prod => f.write_str("prod"),
        }
    }
}

/// A block of deployment env vars.
#[derive(Clone, Deserialize)]
pub struct DeploymentEnv {
    /// The API protocol, `http` or `https`.
    pub api_protocol: String,
    pub host: String,
    /// The API port. Blank or absent values use the protocol's default port.
    #[serde(default)]
    pub port: Option<String>,
    pub api_username: String,
    pub api_password: String,
    /// The worker group objects are read from. Only used for the template deployment.
    #[serde(default)]
    pub worker_group: Option<String>,
}

impl DeploymentEnv {
    /// The base URL of the deployment.
    pub fn base_url(&self) -> String {
        let mut url = format!("{}://{}", self.api_protocol.trim(), self.host.trim());
        if let Some(port) = self.port.as_deref().map(str::trim).filter(|port| !port.is_empty()) {
            url.push(':');
            url.push_str(port);
        }
        url
    }

    pub fn credentials(&self) -> DeploymentCredentials {
        DeploymentCredentials {
            base_url: self.base_url(),
            username: self.api_username.clone(),
            password: self.api_password.clone(),
        }
    }
}

/// Runtime configuration data.
#[derive(Clone)]
pub struct Config {
    /// The selected target environment.
    pub env: TargetEnv,
    /// The template deployment objects are copied from.
    pub template: DeploymentEnv,
    /// The template worker group objects are copied from.
    pub template_worker_group: String,
    /// The deployment of the selected target environment.
    pub target: DeploymentEnv,
}

impl Config {
    /// Create a new config instance from the runtime environment.
    pub fn new(env: TargetEnv) -> Result<Self> {
        Self::from_vars(env, std::env::vars())
    }

    /// Create a new config instance from the given env var pairs.
    pub fn from_vars<I>(env: TargetEnv, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let template: DeploymentEnv = envy::prefixed(TEMPLATE_PREFIX)
            .from_iter(vars.clone())
            .context("error building template deployment config from env")?;
        let target: DeploymentEnv = envy::prefixed(env.prefix())
            .from_iter(vars)
            .with_context(|| format!("error building {} deployment config from env", env))?;
        let template_worker_group = template
            .worker_group
            .as_deref()
            .context("TEMPLATE_WORKER_GROUP must be set to the worker group objects are copied from")
            .and_then(|group| validate_worker_group(group).context("invalid TEMPLATE_WORKER_GROUP"))?;
        Ok(Self {
            env,
            template,
            template_worker_group,
            target,
        })
    }
}

/// Load the given dotenv file into the process environment, if it exists.
pub fn load_env_file(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "loaded env file");
            Ok(())
        }
        Err(err) if err.not_found() => {
            tracing::info!(path = %path.display(), "no env file found, relying on environment variables alone");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("error loading env file {}", path.display())),
    }
}

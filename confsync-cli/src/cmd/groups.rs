//! List the worker groups of a deployment.

use anyhow::{Context, Result};
use structopt::StructOpt;

use crate::{Confsync, RunStatus};

/// List the worker groups of a deployment.
#[derive(StructOpt)]
#[structopt(name = "groups")]
pub struct Groups {
    /// List the groups of the template deployment instead of the target deployment.
    #[structopt(short, long)]
    template: bool,
}

impl Groups {
    pub async fn run(&self, base: &Confsync) -> Result<RunStatus> {
        let config = base.config()?;
        let deployment = if self.template { &config.template } else { &config.target };
        let creds = deployment.credentials();
        tracing::debug!(url = %creds.base_url, "listing worker groups");

        let client = creds.login(base.transport()?).await.context("error logging into deployment")?;
        let groups = client.groups().list().await.context("error listing worker groups")?;
        for group in groups.iter() {
            println!("{}", group);
        }
        Ok(RunStatus::Complete)
    }
}

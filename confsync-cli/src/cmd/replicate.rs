//! Replicate a configuration object to target worker groups.

use anyhow::{Context, Result};
use structopt::StructOpt;

use crate::{Confsync, RunStatus};
use confsync::{Action, Job, OutcomeStatus, ReplicationReport, Replicator, ReplicatorConfig, WorkerGroupSet};

/// Replicate a configuration object to target worker groups.
#[derive(StructOpt)]
#[structopt(name = "replicate")]
pub struct Replicate {
    /// The object type: source, destination, pipeline, globalvariable or lookup.
    #[structopt(short, long)]
    kind: String,
    /// The ID of the object. Lookup IDs are file names ending in `.csv`.
    #[structopt(short, long)]
    id: String,
    /// A comma separated list of target worker groups.
    #[structopt(short, long)]
    groups: WorkerGroupSet,
    /// Update an existing object, or create a new one. Ignored for lookups.
    #[structopt(short, long, default_value = "update")]
    action: Action,
    /// The number of target worker groups to apply to at the same time.
    #[structopt(long, default_value = "1")]
    concurrency: usize,
}

impl Replicate {
    pub async fn run(&self, base: &Confsync) -> Result<RunStatus> {
        let config = base.config()?;
        tracing::info!(
            env = %config.env,
            kind = %self.kind,
            id = %self.id,
            action = %self.action,
            groups = %self.groups,
            "replicating object from template worker group {}",
            config.template_worker_group,
        );

        let replicator = Replicator::new(
            ReplicatorConfig {
                source: config.template.credentials(),
                source_worker_group: config.template_worker_group.clone(),
                target: config.target.credentials(),
                concurrency: self.concurrency,
            },
            base.transport()?,
        );
        let job = Job {
            kind: self.kind.clone(),
            id: self.id.clone(),
            action: self.action,
            target_groups: self.groups.clone(),
        };
        let report = replicator
            .run(&job)
            .await
            .with_context(|| format!("error replicating {} '{}'", self.kind, self.id))?;

        log_report(&report);
        Ok(RunStatus::from_report(&report))
    }
}

fn log_report(report: &ReplicationReport) {
    for outcome in report.outcomes.iter() {
        match &outcome.status {
            OutcomeStatus::Success => tracing::info!(worker_group = %outcome.worker_group, "updated"),
            OutcomeStatus::Skipped(err) => tracing::warn!(worker_group = %outcome.worker_group, error = %err, "skipped"),
        }
    }
    tracing::info!(
        kind = %report.kind,
        id = %report.object_id,
        successes = report.successes(),
        skipped = report.skipped(),
        "replication finished"
    );
}

//! Replication orchestration.
//!
//! A run moves through a fixed sequence of states:
//!
//! ```text
//! validate -> login(source) -> login(target) -> fetch(source) -> apply(group)* -> report
//! ```
//!
//! Any failure up to and including the source fetch aborts the run before a single target worker
//! group is touched, and is returned as an `Err`. Failures while applying to a target worker group
//! are isolated to that group: they are recorded as skipped in the report and the fan-out always
//! continues with the remaining groups.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};

use crate::client::{Client, ConfigObject};
use crate::error::{Error, Result};
use crate::models::{Action, ConfigKind, LookupId, ObjectId, ObjectKind, Subject, WorkerGroupSet};
use crate::transport::Transport;

/// Location & login details of a deployment.
#[derive(Clone)]
pub struct DeploymentCredentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl DeploymentCredentials {
    /// Log into the deployment, returning an authenticated client.
    pub async fn login(&self, transport: Transport) -> Result<Client> {
        Client::login(transport, &self.base_url, &self.username, &self.password).await
    }
}

impl fmt::Debug for DeploymentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Replicator configuration, built once from validated inputs.
#[derive(Clone, Debug)]
pub struct ReplicatorConfig {
    /// The template deployment objects are copied from.
    pub source: DeploymentCredentials,
    /// The worker group of the template deployment objects are copied from.
    pub source_worker_group: String,
    /// The deployment objects are copied to.
    pub target: DeploymentCredentials,
    /// The maximum number of target worker groups applied to at the same time.
    ///
    /// A value of `1` applies to groups strictly one after another.
    pub concurrency: usize,
}

/// A request to replicate a single object.
///
/// The object type & ID are kept in their raw form and validated when the job is run.
#[derive(Clone, Debug)]
pub struct Job {
    pub kind: String,
    pub id: String,
    pub action: Action,
    pub target_groups: WorkerGroupSet,
}

/// The status of replicating an object to a single target worker group.
#[derive(Clone, Debug)]
pub enum OutcomeStatus {
    Success,
    Skipped(Error),
}

/// The result of replicating an object to a single target worker group.
#[derive(Clone, Debug)]
pub struct ReplicationOutcome {
    pub object_id: String,
    pub worker_group: String,
    pub status: OutcomeStatus,
}

impl ReplicationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success)
    }
}

/// The report of a completed run, with one outcome per target worker group in request order.
#[derive(Clone, Debug)]
pub struct ReplicationReport {
    pub kind: ObjectKind,
    pub object_id: String,
    pub outcomes: Vec<ReplicationOutcome>,
}

impl ReplicationReport {
    /// The number of worker groups which were successfully updated.
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    /// The number of worker groups which were skipped due to an error.
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    /// Check if every target worker group was updated.
    pub fn all_succeeded(&self) -> bool {
        self.skipped() == 0
    }
}

/// Content fetched from the source, ready to be applied to target worker groups.
enum Fetched {
    Config { kind: ConfigKind, id: ObjectId, object: ConfigObject },
    Lookup { id: LookupId, content: Bytes },
}

/// The replication engine.
#[derive(Clone)]
pub struct Replicator {
    config: Arc<ReplicatorConfig>,
    transport: Transport,
}

impl Replicator {
    /// Create a new instance.
    pub fn new(config: ReplicatorConfig, transport: Transport) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    /// Run the given job.
    ///
    /// Returns `Err` only for fatal errors. Per worker group failures are reported in the
    /// returned report.
    #[tracing::instrument(level = "debug", skip(self, job), fields(kind = %job.kind, id = %job.id))]
    pub async fn run(&self, job: &Job) -> Result<ReplicationReport> {
        let subject = Subject::parse(&job.kind, &job.id)?;

        let source = self.config.source.login(self.transport.clone()).await?;
        let target = self.config.target.login(self.transport.clone()).await?;
        tracing::debug!(source = %source.base_url(), target = %target.base_url(), "authenticated against source and target deployments");

        let fetched = self.fetch(&source, subject).await?;
        let outcomes: Vec<ReplicationOutcome> = stream::iter(job.target_groups.iter())
            .map(|group| apply_to_group(&target, &fetched, job.action, group))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let (kind, object_id) = match &fetched {
            Fetched::Config { kind, id, .. } => (ObjectKind::Config(*kind), id.to_string()),
            Fetched::Lookup { id, .. } => (ObjectKind::Lookup, id.to_string()),
        };
        Ok(ReplicationReport { kind, object_id, outcomes })
    }

    /// Fetch the subject from the source worker group.
    async fn fetch(&self, source: &Client, subject: Subject) -> Result<Fetched> {
        let group = &self.config.source_worker_group;
        match subject {
            Subject::Config { kind, id } => {
                let object = source.objects(group).fetch(kind, id.as_str()).await?;
                tracing::info!(%kind, %id, worker_group = %group, "fetched object from source");
                Ok(Fetched::Config { kind, id, object })
            }
            Subject::Lookup { id } => {
                let content = source.lookups(group).fetch(&id).await?;
                tracing::info!(%id, worker_group = %group, len = content.len(), "fetched lookup content from source");
                Ok(Fetched::Lookup { id, content })
            }
        }
    }
}

/// Apply fetched content to a single target worker group, capturing any failure.
async fn apply_to_group(target: &Client, fetched: &Fetched, action: Action, group: &str) -> ReplicationOutcome {
    let (object_id, res) = match fetched {
        Fetched::Config { kind, id, object } => (id.to_string(), target.objects(group).apply(*kind, id.as_str(), object, action).await),
        Fetched::Lookup { id, content } => (id.to_string(), target.lookups(group).replace(id, content.clone()).await),
    };
    let status = match res {
        Ok(()) => {
            tracing::info!(id = %object_id, worker_group = %group, %action, "successfully replicated");
            OutcomeStatus::Success
        }
        Err(err) => {
            tracing::warn!(id = %object_id, worker_group = %group, error = %err, "skipped worker group due to error");
            OutcomeStatus::Skipped(err)
        }
    };
    ReplicationOutcome {
        object_id,
        worker_group: group.to_string(),
        status,
    }
}

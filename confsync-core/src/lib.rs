//! Replication engine for copying worker group configuration between log-routing deployments.
//!
//! A configuration object (source, destination, pipeline, global variable or CSV lookup table) is
//! fetched once from a template deployment's worker group, then applied independently to each
//! target worker group of another deployment. See `Replicator` for the run lifecycle.

mod client;
mod error;
#[cfg(test)]
mod fixtures;
mod models;
mod replicator;
mod transport;

pub use crate::client::{BearerToken, Client, ConfigObject, GroupsClient, LookupFileInfo, LookupPatch, LookupsClient, ObjectsClient};
pub use crate::error::{Error, Result};
pub use crate::models::{validate_worker_group, Action, ConfigKind, LookupId, ObjectId, ObjectKind, Subject, WorkerGroupSet};
pub use crate::replicator::{DeploymentCredentials, Job, OutcomeStatus, ReplicationOutcome, ReplicationReport, Replicator, ReplicatorConfig};
pub use crate::transport::{HttpExchange, HttpRequest, HttpResponse, ReqwestExchange, RetryPolicy, Transport, DEFAULT_REQUEST_TIMEOUT, MAX_ATTEMPTS};
pub use async_trait::async_trait;

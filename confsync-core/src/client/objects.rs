//! Configuration object management.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::models::{Action, ConfigKind};

/// Server computed fields which must never be replayed onto another deployment.
pub const SERVER_COMPUTED_FIELDS: [&str; 2] = ["status", "notifications"];

impl Client {
    /// Configuration object client scoped to the given worker group.
    pub fn objects(&self, worker_group: &str) -> ObjectsClient {
        ObjectsClient {
            inner: self.clone(),
            worker_group: worker_group.to_string(),
        }
    }
}

/// A configuration object, kept as an ordered bag of fields.
///
/// Schemas differ per kind, so fields are never interpreted here. The only guarantee is that
/// server computed fields have been removed.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigObject(Map<String, Value>);

impl ConfigObject {
    /// Create a new instance from the given fields, removing server computed fields.
    pub fn new(mut fields: Map<String, Value>) -> Self {
        for key in SERVER_COMPUTED_FIELDS {
            fields.shift_remove(key);
        }
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Serialize this object as a JSON request body.
    pub fn to_bytes(&self) -> Result<Bytes> {
        serde_json::to_vec(&self.0)
            .map(Bytes::from)
            .map_err(|err| Error::InvalidInput(format!("unable to serialize object: {}", err)))
    }
}

/// The envelope returned by object GET requests.
#[derive(Deserialize)]
struct ItemsEnvelope {
    items: Vec<Map<String, Value>>,
}

/// Configuration object management for a single worker group.
#[derive(Clone)]
pub struct ObjectsClient {
    inner: Client,
    worker_group: String,
}

impl ObjectsClient {
    /// Fetch an object by ID, with server computed fields removed.
    #[tracing::instrument(level = "debug", skip(self), fields(worker_group = %self.worker_group))]
    pub async fn fetch(&self, kind: ConfigKind, id: &str) -> Result<ConfigObject> {
        let url = self.object_url(kind, id);
        let res = self.inner.send(self.inner.request(Method::GET, url.clone())).await?;
        if !res.status.is_success() {
            return Err(Error::ResponseParse {
                url,
                reason: res.describe_failure(),
            });
        }

        let envelope: ItemsEnvelope = serde_json::from_slice(&res.body).map_err(|err| Error::ResponseParse {
            url: url.clone(),
            reason: format!("unable to extract {} from response body: {}", kind, err),
        })?;
        match envelope.items.into_iter().next() {
            Some(fields) => Ok(ConfigObject::new(fields)),
            None => Err(Error::ObjectNotFound {
                kind,
                id: id.to_string(),
                url,
            }),
        }
    }

    /// Apply the given object to this worker group.
    ///
    /// `Action::Update` patches the object in place, `Action::Create` posts it to the collection
    /// root. Every failure is reported as `Error::Apply`.
    #[tracing::instrument(level = "debug", skip(self, object), fields(worker_group = %self.worker_group))]
    pub async fn apply(&self, kind: ConfigKind, id: &str, object: &ConfigObject, action: Action) -> Result<()> {
        let apply_err = |cause: String| Error::Apply {
            kind,
            id: id.to_string(),
            worker_group: self.worker_group.clone(),
            cause,
        };
        let body = object.to_bytes().map_err(|err| apply_err(err.to_string()))?;
        let req = match action {
            Action::Update => self.inner.request(Method::PATCH, self.object_url(kind, id)),
            Action::Create => self.inner.request(Method::POST, self.collection_url(kind)),
        }
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(body);

        let res = self.inner.send(req).await.map_err(|err| apply_err(err.to_string()))?;
        if !res.status.is_success() {
            return Err(apply_err(res.describe_failure()));
        }
        Ok(())
    }

    fn collection_url(&self, kind: ConfigKind) -> String {
        self.inner.group_url(&self.worker_group, kind.collection_path())
    }

    fn object_url(&self, kind: ConfigKind, id: &str) -> String {
        format!("{}/{}", self.collection_url(kind), id)
    }
}

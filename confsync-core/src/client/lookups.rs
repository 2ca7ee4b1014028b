//! Lookup table management.
//!
//! Lookup tables are raw CSV payloads rather than JSON objects. Replacing one on a worker group
//! takes two requests: the content is uploaded to a staging file, then the lookup is patched to
//! point at the staged file. The patch is only meaningful after a successful upload.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::models::LookupId;

impl Client {
    /// Lookup table client scoped to the given worker group.
    pub fn lookups(&self, worker_group: &str) -> LookupsClient {
        LookupsClient {
            inner: self.clone(),
            worker_group: worker_group.to_string(),
        }
    }
}

/// The payload which registers an uploaded file as the active content of a lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupPatch {
    pub id: String,
    #[serde(rename = "fileInfo")]
    pub file_info: LookupFileInfo,
}

/// File details of an uploaded lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFileInfo {
    pub filename: String,
}

/// The response body of a lookup upload.
#[derive(Deserialize)]
struct UploadResponse {
    filename: String,
}

/// Lookup table management for a single worker group.
#[derive(Clone)]
pub struct LookupsClient {
    inner: Client,
    worker_group: String,
}

impl LookupsClient {
    /// Fetch the raw content of a lookup.
    #[tracing::instrument(level = "debug", skip(self), fields(worker_group = %self.worker_group))]
    pub async fn fetch(&self, id: &LookupId) -> Result<Bytes> {
        let url = format!("{}/content?raw=0", self.lookup_url(id));
        let res = self.inner.send(self.inner.request(Method::GET, url.clone())).await?;
        if !res.status.is_success() {
            return Err(Error::ResponseParse {
                url,
                reason: res.describe_failure(),
            });
        }
        Ok(res.body)
    }

    /// Upload raw lookup content, returning the patch which will commit it.
    #[tracing::instrument(level = "debug", skip(self, content), fields(worker_group = %self.worker_group, len = content.len()))]
    pub async fn upload(&self, id: &LookupId, content: Bytes) -> Result<LookupPatch> {
        let upload_err = |cause: String| Error::Upload {
            id: id.to_string(),
            worker_group: self.worker_group.clone(),
            cause,
        };
        let url = format!("{}/?filename={}", self.inner.group_url(&self.worker_group, "system/lookups"), id);
        let req = self
            .inner
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/csv"))
            .body(content);

        let res = self.inner.send(req).await.map_err(|err| upload_err(err.to_string()))?;
        if !res.status.is_success() {
            return Err(upload_err(res.describe_failure()));
        }
        let upload: UploadResponse = serde_json::from_slice(&res.body)
            .map_err(|err| upload_err(format!("unable to extract upload details from response body: {}", err)))?;
        Ok(LookupPatch {
            id: id.to_string(),
            file_info: LookupFileInfo { filename: upload.filename },
        })
    }

    /// Register previously uploaded content as the active content of the lookup.
    #[tracing::instrument(level = "debug", skip(self, patch), fields(worker_group = %self.worker_group))]
    pub async fn commit(&self, id: &LookupId, patch: &LookupPatch) -> Result<()> {
        let commit_err = |cause: String| Error::Commit {
            id: id.to_string(),
            worker_group: self.worker_group.clone(),
            cause,
        };
        let body = serde_json::to_vec(patch).map_err(|err| commit_err(format!("unable to encode patch payload: {}", err)))?;
        let req = self
            .inner
            .request(Method::PATCH, self.lookup_url(id))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body);

        let res = self.inner.send(req).await.map_err(|err| commit_err(err.to_string()))?;
        if !res.status.is_success() {
            return Err(commit_err(res.describe_failure()));
        }
        Ok(())
    }

    /// Upload the given content then commit it.
    ///
    /// A failed upload returns early, so no commit is ever attempted without staged content.
    pub async fn replace(&self, id: &LookupId, content: Bytes) -> Result<()> {
        let patch = self.upload(id, content).await?;
        self.commit(id, &patch).await
    }

    fn lookup_url(&self, id: &LookupId) -> String {
        self.inner.group_url(&self.worker_group, &format!("system/lookups/{}", id))
    }
}

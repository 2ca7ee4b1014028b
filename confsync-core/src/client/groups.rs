//! Worker group discovery.

use http::Method;
use serde::Deserialize;

use crate::client::Client;
use crate::error::{Error, Result};

impl Client {
    /// Worker group discovery client.
    pub fn groups(&self) -> GroupsClient {
        GroupsClient { inner: self.clone() }
    }
}

#[derive(Deserialize)]
struct GroupsEnvelope {
    items: Vec<GroupItem>,
}

#[derive(Deserialize)]
struct GroupItem {
    id: String,
}

/// Worker group discovery for a deployment.
#[derive(Clone)]
pub struct GroupsClient {
    inner: Client,
}

impl GroupsClient {
    /// List the IDs of all worker groups of the deployment, in server order.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list(&self) -> Result<Vec<String>> {
        let url = self.inner.api_url("master/groups");
        let res = self.inner.send(self.inner.request(Method::GET, url.clone())).await?;
        if !res.status.is_success() {
            return Err(Error::ResponseParse {
                url,
                reason: res.describe_failure(),
            });
        }
        let envelope: GroupsEnvelope = serde_json::from_slice(&res.body).map_err(|err| Error::ResponseParse {
            url,
            reason: format!("unable to extract worker groups from response body: {}", err),
        })?;
        Ok(envelope.items.into_iter().map(|group| group.id).collect())
    }
}

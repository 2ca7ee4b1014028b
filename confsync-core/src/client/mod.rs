//! Deployment clients.

mod auth;
mod groups;
mod lookups;
mod objects;

use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::Method;

use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, Transport};
pub use auth::BearerToken;
pub use groups::GroupsClient;
pub use lookups::{LookupFileInfo, LookupPatch, LookupsClient};
pub use objects::{ConfigObject, ObjectsClient};

/// An authenticated client of a single deployment.
///
/// The client is cheap to clone and every clone shares the same credentials and transport, so a
/// client may be freely handed to concurrent worker group tasks. Credentials are obtained once and
/// never refreshed, as tokens carry no client visible expiry.
#[derive(Clone)]
pub struct Client(pub(crate) Arc<ClientInner>);

/// The inner state of the client.
pub(crate) struct ClientInner {
    /// The base URL of the deployment, without a trailing slash.
    pub(crate) base_url: String,
    /// The bearer credentials sent with every request.
    pub(crate) token: BearerToken,
    /// The transport used for all requests.
    pub(crate) transport: Transport,
}

impl Client {
    /// Log into the deployment at the given URL, returning an authenticated client.
    pub async fn login(transport: Transport, base_url: &str, username: &str, password: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        let token = auth::login(&transport, base_url, username, password).await?;
        Ok(Self::with_token(transport, base_url, token))
    }

    /// Construct a new client using an already acquired token.
    pub fn with_token(transport: Transport, base_url: &str, token: BearerToken) -> Self {
        Self(Arc::new(ClientInner {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            transport,
        }))
    }

    pub fn base_url(&self) -> &str {
        &self.0.base_url
    }

    pub fn token(&self) -> &BearerToken {
        &self.0.token
    }

    /// The URL of the given API path, relative to `/api/v1/`.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.0.base_url, path)
    }

    /// The URL of the given path scoped to a worker group.
    pub(crate) fn group_url(&self, worker_group: &str, path: &str) -> String {
        self.api_url(&format!("m/{}/{}", worker_group, path))
    }

    /// Build a new request carrying this client's credentials.
    pub(crate) fn request(&self, method: Method, url: String) -> HttpRequest {
        HttpRequest::new(method, url).header(AUTHORIZATION, self.0.token.header_value().clone())
    }

    pub(crate) async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        self.0.transport.send(req).await
    }
}

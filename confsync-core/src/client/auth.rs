//! Deployment authentication.

use std::fmt;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, Transport};

/// The authorization header bearer prefix.
const BEARER_PREFIX: &str = "Bearer ";

/// Bearer credentials of a deployment, used verbatim as the `Authorization` header.
#[derive(Clone)]
pub struct BearerToken {
    value: String,
    header: HeaderValue,
}

impl BearerToken {
    /// Create a new instance from the raw token returned by a deployment.
    pub fn new(token: &str) -> Result<Self> {
        let value = format!("{}{}", BEARER_PREFIX, token);
        let header = HeaderValue::from_str(&value).map_err(|_| Error::InvalidInput("token is not a valid header value".into()))?;
        Ok(Self { value, header })
    }

    /// The full header value, including the `Bearer ` prefix.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub(crate) fn header_value(&self) -> &HeaderValue {
        &self.header
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Exchange the given username & password for a bearer token.
#[tracing::instrument(level = "debug", skip(transport, password))]
pub(super) async fn login(transport: &Transport, base_url: &str, username: &str, password: &str) -> Result<BearerToken> {
    let url = format!("{}/api/v1/auth/login", base_url);
    let body = serde_json::to_vec(&LoginRequest { username, password }).map_err(|err| Error::Auth {
        url: url.clone(),
        reason: format!("error encoding login request: {}", err),
    })?;
    let req = HttpRequest::new(Method::POST, url.clone())
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(body);

    let res = transport.send(req).await.map_err(|err| Error::Auth {
        url: url.clone(),
        reason: err.to_string(),
    })?;
    if !res.status.is_success() {
        return Err(Error::Auth {
            url,
            reason: res.describe_failure(),
        });
    }

    let login: LoginResponse = serde_json::from_slice(&res.body).map_err(|err| Error::ResponseParse {
        url: url.clone(),
        reason: format!("unable to extract token from response body: {}", err),
    })?;
    let token = BearerToken::new(&login.token).map_err(|err| Error::ResponseParse {
        url: url.clone(),
        reason: err.to_string(),
    })?;
    tracing::debug!(%url, "login successful");
    Ok(token)
}

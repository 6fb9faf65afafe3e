//! Transport used to pull the address and monitoring feeds.
//!
//! The monitoring system sits behind HTTP authentication. A request carrying
//! [`Credentials`] is first sent without them. On `401` the challenge decides
//! the scheme: a `Digest` challenge is answered with a digest response,
//! anything else falls back to Basic.

use std::{
    fmt,
    time::Duration,
};

use async_trait::async_trait;
use digest_auth::AuthContext;
use reqwest::{
    Client,
    RequestBuilder,
    StatusCode,
    header::{
        AUTHORIZATION,
        HeaderMap,
        WWW_AUTHENTICATE,
    },
};
use sliver_sync_core::MonitoringConfig;
use url::{
    Position,
    Url,
};

use crate::error::FetchError;

/// Credentials for the monitoring system.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl From<&MonitoringConfig> for Credentials {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

/// Retrieves the text body of a feed.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, auth: Option<&Credentials>) -> Result<String, FetchError>;
}

/// [`FeedFetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Request answering the server's authentication challenge.
    fn authenticated(
        &self,
        url: &Url,
        credentials: &Credentials,
        digest_challenge: Option<&str>,
    ) -> Result<RequestBuilder, FetchError> {
        let request = self.client.get(url.clone());
        let Some(challenge) = digest_challenge else {
            return Ok(request.basic_auth(&credentials.username, Some(&credentials.password)));
        };

        let mut prompt = digest_auth::parse(challenge)?;
        let context = AuthContext::new(
            credentials.username.as_str(),
            credentials.password.as_str(),
            &url[Position::BeforePath..],
        );
        let answer = prompt.respond(&context)?;
        Ok(request.header(AUTHORIZATION, answer.to_header_string()))
    }
}

/// First `WWW-Authenticate` value offering the Digest scheme.
fn digest_challenge(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| {
            value
                .trim_start()
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        })
        .map(str::to_owned)
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, auth: Option<&Credentials>) -> Result<String, FetchError> {
        let mut response = self.client.get(url.clone()).send().await?;

        if let Some(credentials) = auth
            && response.status() == StatusCode::UNAUTHORIZED
        {
            let challenge = digest_challenge(response.headers());
            response = self
                .authenticated(url, credentials, challenge.as_deref())?
                .send()
                .await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response.text().await?)
    }
}

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::CanvasEnv;

/// An enum to represent possible transport-level failures when talking to
/// Canvas. No variant is retried automatically; callers re-invoke the whole
/// operation if they want another attempt.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The request never produced a usable response (connection, TLS, or
    /// body-read failure).
    #[error("Request to `{path}` failed: {source}")]
    Request {
        /// Path the request was issued against.
        path:   String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Canvas answered with a non-2xx status.
    #[error("Canvas returned {status} for `{path}`")]
    Status {
        /// Path the request was issued against.
        path:   String,
        /// HTTP status code received.
        status: u16,
        /// Response body, kept for diagnostics.
        body:   String,
    },
    /// The response body did not decode as the expected type.
    #[error("Could not decode response from `{path}`: {message}")]
    Decode {
        /// Path the request was issued against.
        path:    String,
        /// Decoder error message.
        message: String,
        /// Raw payload, kept for diagnostics.
        payload: Value,
    },
    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

/// Authenticated JSON transport to the Canvas REST API.
///
/// The seam exists so tests and embedding hosts can substitute a scripted
/// implementation; [`CanvasClient`] is the production one. Paths are given
/// relative to the API base URL, query string included.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Issues a GET and returns the decoded JSON body.
    async fn get_json(&self, path: &str) -> Result<Value, TransportError>;

    /// Issues a POST with a JSON body and returns the decoded JSON body.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    /// Issues a PUT with a JSON body and returns the decoded JSON body.
    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, TransportError>;

    /// Issues a DELETE and returns the decoded JSON body.
    async fn delete_json(&self, path: &str) -> Result<Value, TransportError>;
}

/// Reqwest-backed [`Transport`] carrying bearer-token auth for every call.
pub struct CanvasClient {
    /// Shared reqwest HTTP client reused across requests.
    http:         reqwest::Client,
    /// Canvas REST base URL.
    base_url:     String,
    /// Bearer token attached to every request.
    access_token: String,
}

impl CanvasClient {
    /// Builds a client from a credential bundle.
    pub fn new(env: &CanvasEnv) -> Result<Self> {
        let http = reqwest::Client::builder()
            // Avoid macOS dynamic store lookups that fail in sandboxed environments.
            .no_proxy()
            .build()
            .context("Failed to construct shared HTTP client")?;

        Ok(Self {
            http,
            base_url: env.base_url().to_owned(),
            access_token: env.access_token().to_owned(),
        })
    }

    /// Joins a relative path onto the base URL.
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a prepared request, mapping non-2xx and decode failures into
    /// [`TransportError`].
    async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<Value, TransportError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                path: path.to_owned(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| TransportError::Request {
                path: path.to_owned(),
                source,
            })
    }
}

impl Transport for CanvasClient {
    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        self.dispatch(self.http.get(self.endpoint(path)), path).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.dispatch(self.http.post(self.endpoint(path)).json(body), path)
            .await
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.dispatch(self.http.put(self.endpoint(path)).json(body), path)
            .await
    }

    async fn delete_json(&self, path: &str) -> Result<Value, TransportError> {
        self.dispatch(self.http.delete(self.endpoint(path)), path)
            .await
    }
}

/// Assembles a complete collection from a paginating Canvas list endpoint.
///
/// Pages are requested sequentially as `?per_page=N&page=k` for `k = 1, 2,
/// …` (`&`-joined when `base_path` already carries a query string) until a
/// page returns fewer than `N` items. A full page is always followed by one
/// more request, so a trailing empty page is normal termination, not an
/// error. Server ordering is preserved; any transport failure aborts the
/// whole fetch with no partial result.
pub async fn fetch_all_pages<T, C>(
    transport: &C,
    base_path: &str,
    page_size: usize,
) -> Result<Vec<T>, TransportError>
where
    T: DeserializeOwned,
    C: Transport,
{
    let separator = if base_path.contains('?') { '&' } else { '?' };

    let mut all = Vec::new();
    let mut page = 1usize;
    loop {
        let path = format!("{base_path}{separator}per_page={page_size}&page={page}");
        let payload = transport.get_json(&path).await?;

        let items: Vec<T> = serde_json::from_value(payload.clone()).map_err(|e| {
            TransportError::Decode {
                path:    path.clone(),
                message: e.to_string(),
                payload,
            }
        })?;

        let count = items.len();
        tracing::debug!(page, count, "fetched page from {base_path}");
        all.extend(items);

        if count < page_size {
            break;
        }
        page += 1;
    }

    Ok(all)
}

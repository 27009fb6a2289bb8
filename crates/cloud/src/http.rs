//! HTTP client wrapper with auth signing and retry logic.

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON/HTTP client for the export service.
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    request_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(request_timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries,
            request_timeout,
        })
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(&self, url: &str, body: &B, auth: &dyn CloudAuth) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.client.post(url).json(body);
        let resp = self.send(req, Method::POST, url, auth).await?;
        decode_json(resp).await
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, auth: &dyn CloudAuth) -> Result<T> {
        let req = self.client.get(url);
        let resp = self.send(req, Method::GET, url, auth).await?;
        decode_json(resp).await
    }

    /// Download `url` to `dest`.
    ///
    /// The body is written to a sibling `.part` file first and renamed into
    /// place, so `dest` never holds a partial download.
    pub async fn download_to(&self, url: &str, dest: &Path, auth: &dyn CloudAuth) -> Result<u64> {
        let req = self.client.get(url);
        let resp = self.send(req, Method::GET, url, auth).await?;
        let bytes = resp.bytes().await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut part = dest.as_os_str().to_owned();
        part.push(".part");
        tokio::fs::write(&part, &bytes).await?;
        tokio::fs::rename(&part, dest).await?;

        debug!(url, path = %dest.display(), bytes = bytes.len(), "download complete");
        Ok(bytes.len() as u64)
    }

    /// Sign and execute a request with exponential back-off retry.
    ///
    /// Connection failures, timeouts and 5xx responses are retried; 4xx
    /// responses fail immediately (401/403 as [`CloudError::Auth`]).
    async fn send(
        &self,
        request: RequestBuilder,
        method: Method,
        url: &str,
        auth: &dyn CloudAuth,
    ) -> Result<Response> {
        let mut auth_headers = Vec::new();
        auth.sign_request(url, method.as_str(), &mut auth_headers)?;
        let mut request = request;
        for (key, value) in &auth_headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // 500ms, 1s, 2s, ...
                let delay = Duration::from_millis(500 * (1 << (attempt - 1).min(6)));
                tokio::time::sleep(delay).await;
            }

            let Some(cloned) = request.try_clone() else {
                return Err(CloudError::Network(format!(
                    "{method} {url}: request body cannot be retried"
                )));
            };

            match cloned.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let body: String = body.chars().take(500).collect();
                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(CloudError::Auth(format!("HTTP {status} from {url}: {body}")));
                    }
                    let err = CloudError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                        body,
                    };
                    if status.is_client_error() {
                        return Err(err);
                    }
                    warn!(%method, url, attempt, status = status.as_u16(), "server error, retrying");
                    last_err = Some(err);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(%method, url, attempt, error = %e, "request failed, retrying");
                    last_err = Some(CloudError::Request(e));
                }
                Err(e) => return Err(CloudError::Request(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network(format!("{method} {url} failed"))))
    }

    /// Getter for the timeout duration.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp
        .text()
        .await
        .map_err(|e| CloudError::Network(format!("reading response body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| {
        CloudError::InvalidResponse(format!(
            "{e}: {}",
            body.chars().take(200).collect::<String>()
        ))
    })
}

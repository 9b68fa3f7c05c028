use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;
use tracing::warn;

use super::{Connector, Tier};
use crate::error::{error_chain_text, truncate_text};
use crate::settings::Settings;

const RETRY_BACKOFF_S: f64 = 1.2;
const API_KEY_HEADER: &str = "x-goog-api-key";
const REDACTED: &str = "[redacted]";

/// One `generateContent` call against a model; timeouts and transport
/// retries belong here, never in the orchestrators above.
pub trait ContentTransport: Send + Sync {
    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value>;
}

pub struct GeminiHttpTransport {
    api_base: String,
    api_key: String,
    http: HttpClient,
    timeout: Duration,
    max_retries: usize,
    retry_backoff: Duration,
}

impl GeminiHttpTransport {
    pub fn new(
        api_base: &str,
        api_key: &str,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
            timeout,
            max_retries,
            retry_backoff: Duration::from_secs_f64(RETRY_BACKOFF_S),
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn post_with_transport_retries(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse> {
        let mut attempt = 0;
        loop {
            let response = self
                .http
                .post(endpoint)
                .header(API_KEY_HEADER, self.api_key.as_str())
                .timeout(self.timeout)
                .json(payload)
                .send();

            match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let err = anyhow::Error::new(raw.without_url())
                        .context(format!("Gemini request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        "Gemini transport retry after transient request failure"
                    );
                    thread::sleep(self.retry_backoff.mul_f64(attempt as f64));
                }
            }
        }
    }
}

impl ContentTransport for GeminiHttpTransport {
    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model);
        self.post_with_transport_retries(&endpoint, payload)
            .and_then(|response| response_json_or_error("Gemini", response))
            .map_err(|err| redact_secret(err, &self.api_key))
    }
}

/// Connects each tier to the Gemini REST API with that tier's key.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    api_base: String,
    timeout: Duration,
    max_retries: usize,
}

impl HttpConnector {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_base: settings.api_base.clone(),
            timeout: Duration::from_secs_f64(settings.request_timeout_s),
            max_retries: settings.transport_retries,
        }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, _tier: Tier, credential: &str) -> Result<Arc<dyn ContentTransport>> {
        let transport =
            GeminiHttpTransport::new(&self.api_base, credential, self.timeout, self.max_retries)?;
        Ok(Arc::new(transport))
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Error text leaves the transport without the credential, even when a
/// proxy or the API echoes it back.
fn redact_secret(err: anyhow::Error, secret: &str) -> anyhow::Error {
    if secret.is_empty() {
        return err;
    }
    let text = error_chain_text(&err, 4096);
    if !text.contains(secret) {
        return err;
    }
    anyhow!(text.replace(secret, REDACTED))
}

fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| reqwest_err.is_timeout() || reqwest_err.is_connect())
            .unwrap_or(false)
    })
}

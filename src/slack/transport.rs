//! HTTP transport for the Slack Web API
//!
//! [`HttpBackend`] does the raw form POST; [`Transport`] owns the token and the
//! rate-limit gate and turns a raw response into either the parsed JSON body or
//! a [`SlackError`].

use crate::config::ClientConfig;
use crate::error::{Result, SlackError};
use crate::logging::Timer;
use crate::slack::{Params, RateLimitGate};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// What the transport needs back from a single HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Raw `retry-after` header value, if present
    pub retry_after: Option<String>,
    pub body: String,
}

impl RawResponse {
    /// A 200 response with `body`
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    /// A 429 response with an optional `retry-after` value
    pub fn too_many_requests(retry_after: Option<&str>) -> Self {
        Self {
            status: 429,
            retry_after: retry_after.map(str::to_string),
            body: String::new(),
        }
    }

    /// `retry-after` in whole seconds; `None` when absent or not an integer
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after
            .as_deref()
            .and_then(|v| v.trim().parse::<u64>().ok())
    }
}

/// Performs one form-encoded HTTP POST
pub trait HttpBackend: Send + Sync {
    fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// reqwest-backed [`HttpBackend`]
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Create a backend with the timeout and TLS settings from `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()?;

        if !config.verify_certs {
            tracing::warn!("TLS certificate verification is disabled");
        }

        Ok(Self { client })
    }

    /// Wrap a preconfigured reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpBackend for ReqwestBackend {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<RawResponse> {
        let response = self.client.post(url).form(form).send().await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

pub struct Transport<B> {
    backend: B,
    base_url: String,
    token: String,
    gate: RateLimitGate,
}

impl<B: HttpBackend> Transport<B> {
    /// Create a transport for `base_url`, authenticating with `token`
    pub fn new(
        backend: B,
        base_url: impl Into<String>,
        token: impl Into<String>,
        gate: RateLimitGate,
    ) -> Self {
        Self {
            backend,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            gate,
        }
    }

    pub fn gate(&self) -> &RateLimitGate {
        &self.gate
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Full URL for an API method
    pub fn url_for(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Call `method` with `params`, returning the parsed body when Slack says `ok`
    pub async fn post(&self, method: &str, params: Params) -> Result<Value> {
        self.gate.check()?;

        let mut form = params;
        form.insert("token", &self.token);

        let url = self.url_for(method);
        tracing::debug!(method = %method, params = form.len() - 1, "Calling Slack API");

        let response = {
            let _timer = Timer::new(method);
            self.backend.post_form(&url, form.as_pairs()).await?
        };

        if response.status == 429 {
            let until = self.gate.record_limit(response.retry_after_secs());
            return Err(SlackError::RateLimited { until });
        }

        let result: Value = serde_json::from_str(&response.body)?;
        match result.get("ok").and_then(Value::as_bool) {
            Some(true) => Ok(result),
            Some(false) => {
                let code = result
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown_error")
                    .to_string();
                tracing::debug!(method = %method, error = %code, "Slack API returned an error");
                Err(SlackError::Api(code))
            }
            None => Err(SlackError::InvalidResponse(format!(
                "{method} response has no boolean 'ok' field (HTTP {})",
                response.status
            ))),
        }
    }
}

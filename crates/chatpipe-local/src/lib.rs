use chatpipe_core::{Error, FetchBackend, FetchRequest, FetchResponse, HttpMethod, Result};
use serde::Serialize;
use std::time::Duration;

pub mod dispatch;
pub mod extract;
pub mod search;
pub mod stream;

/// Fixed browser-identity header applied to every outbound request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn user_agent_from_env() -> String {
    env("CHATPIPE_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
}

/// Hard timeout for outbound calls. Callers can pass something huge via the
/// env override; keep a conservative cap either way.
pub fn timeout_ms_from_env() -> u64 {
    env("CHATPIPE_TIMEOUT_MS")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_MS)
        .clamp(1_000, 60_000)
}

/// Effective outbound-client configuration, for the `doctor` diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct ClientConfig {
    pub user_agent: String,
    pub timeout_ms: u64,
    pub search_endpoint: String,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            user_agent: user_agent_from_env(),
            timeout_ms: timeout_ms_from_env(),
            search_endpoint: search::search_endpoint_from_env(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl LocalFetcher {
    pub fn new() -> Result<Self> {
        let default_timeout = Duration::from_millis(timeout_ms_from_env());
        let client = reqwest::Client::builder()
            .user_agent(user_agent_from_env())
            .redirect(reqwest::redirect::Policy::limited(10))
            // Avoid "hang forever" on DNS/TLS stalls even when the caller
            // passes no per-request timeout.
            .connect_timeout(Duration::from_secs(10))
            .timeout(default_timeout)
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            default_timeout,
        })
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    /// Single attempt, no retries. Transport, DNS, TLS, and timeout failures
    /// all collapse into `Error::Fetch` with the proximate cause string.
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let url = url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut rb = match req.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => {
                let mut rb = self.client.post(url);
                if let Some(form) = &req.form {
                    rb = rb.form(form);
                }
                rb
            }
        };
        rb = rb.timeout(req.timeout().unwrap_or(self.default_timeout));

        let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?
            .to_vec();

        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status,
            content_type,
            bytes,
        })
    }
}

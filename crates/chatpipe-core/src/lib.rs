use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of tools the dispatcher may invoke on behalf of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    FetchUrl,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::FetchUrl => "fetch_url",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Safesearch {
    Off,
    #[default]
    Moderate,
    Strict,
}

impl Safesearch {
    /// Fixed provider-side encoding for the `kp` form parameter.
    pub fn provider_code(&self) -> &'static str {
        match self {
            Safesearch::Off => "-2",
            Safesearch::Moderate => "-1",
            Safesearch::Strict => "1",
        }
    }
}

fn default_max_results() -> usize {
    3
}

fn default_region() -> String {
    "wt-wt".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// User prompt or search query. Must be non-empty.
    pub message: String,
    /// Optional tool to invoke; absent means "no tool".
    #[serde(default)]
    pub tool: Option<ToolKind>,
    /// URL to fetch when tool=fetch_url.
    #[serde(default)]
    pub url: Option<String>,
    /// Cap on search results, [1, 10].
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Search region, e.g. "us-en", "wt-wt".
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub safesearch: Safesearch,
}

impl ToolRequest {
    /// The one rule the core enforces itself: tool=fetch_url requires an
    /// absolute `url`. Absence (or a relative/garbled value) is a validation
    /// failure surfaced before any network call, never a runtime error.
    pub fn fetch_url(&self) -> Result<url::Url> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::Validation("field 'url' is required when using tool='fetch_url'".to_string())
            })?;
        url::Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub href: String,
    /// Snippet text. Empty string (not absent) when the provider markup has
    /// no snippet for a structurally-present result.
    pub body: String,
}

/// Lightweight metadata extracted from a fetched page.
///
/// Every optional field is `None` when extraction found nothing non-empty;
/// an empty string or empty list is never encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    /// Final resolved URL after redirects.
    pub url: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// At most 5 non-empty h1/h2 texts in document order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headings: Option<Vec<String>>,
    /// At most 500 characters of space-joined paragraph text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub reply: String,
    pub used_tool: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResultItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_content: Option<PageContent>,
}

/// One frame of a streamed reply. All `token` events precede the single
/// `message` event carrying the full response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StreamEvent {
    Token(String),
    Message(ToolResponse),
}

/// Request-scoped record of tool invocations and their raw outputs.
///
/// Threaded through dispatch as a plain value and returned to the caller
/// for diagnostic logging. Discarded after the request; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AuditTrail {
    pub user_message: String,
    pub invocations: Vec<ToolInvocation>,
    pub raw_outputs: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ToolResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub tool: ToolKind,
    pub params: serde_json::Value,
}

impl AuditTrail {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            invocations: Vec::new(),
            raw_outputs: Vec::new(),
            response: None,
        }
    }

    pub fn record_invocation(&mut self, tool: ToolKind, params: serde_json::Value) {
        self.invocations.push(ToolInvocation { tool, params });
    }

    pub fn record_raw_output(&mut self, raw: serde_json::Value) {
        self.raw_outputs.push(raw);
    }

    pub fn record_response(&mut self, response: &ToolResponse) {
        self.response = Some(response.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Form-encoded body for POST requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Vec<(String, String)>>,
    /// Per-request timeout override (network + body read).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            form: None,
            timeout_ms: None,
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            form: Some(form),
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Single-shot outbound HTTP. One attempt per call; resilience (retries,
/// backoff, fallback content) is deliberately out of scope and must be
/// layered outside this trait if a deployment needs it.
#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

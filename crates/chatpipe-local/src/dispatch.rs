use chatpipe_core::{
    AuditTrail, Error, FetchBackend, FetchRequest, FetchResponse, Result, Safesearch, ToolKind,
    ToolRequest, ToolResponse,
};

use crate::search::MAX_RESULTS_CAP;
use crate::{extract, search, timeout_ms_from_env};

/// Static guidance reply for requests that name no tool.
pub const NO_TOOL_REPLY: &str = "No tool requested. Provide tool='web_search' for web search \
or tool='fetch_url' with a 'url' to pull page content.";

/// What a request asks the dispatcher to do, with exactly the parameters
/// that branch needs. Derived once per request; exhaustively matched.
#[derive(Debug, Clone)]
pub enum Directive {
    NoTool,
    Search {
        query: String,
        max_results: usize,
        region: String,
        safesearch: Safesearch,
    },
    Fetch {
        url: url::Url,
    },
}

impl Directive {
    /// Derive the directive. The url-required-when-fetch rule is enforced
    /// here, before any network call is possible.
    pub fn from_request(req: &ToolRequest) -> Result<Self> {
        match req.tool {
            None => Ok(Directive::NoTool),
            Some(ToolKind::WebSearch) => Ok(Directive::Search {
                query: req.message.clone(),
                max_results: req.max_results.clamp(1, MAX_RESULTS_CAP),
                region: req.region.clone(),
                safesearch: req.safesearch,
            }),
            Some(ToolKind::FetchUrl) => Ok(Directive::Fetch {
                url: req.fetch_url()?,
            }),
        }
    }
}

fn raw_transport_output(resp: &FetchResponse) -> serde_json::Value {
    serde_json::json!({
        "status": resp.status,
        "final_url": resp.final_url,
        "content_type": resp.content_type,
        "body": resp.text_lossy(),
    })
}

/// Single-shot dispatch: interpret the directive, run at most one outbound
/// call, normalize its output, and return the response together with the
/// request's audit trail. Validation failures reject the request before the
/// trail records any tool call.
pub async fn dispatch(
    backend: &dyn FetchBackend,
    req: &ToolRequest,
) -> Result<(ToolResponse, AuditTrail)> {
    let mut trail = AuditTrail::new(&req.message);
    let directive = Directive::from_request(req)?;

    let response = match directive {
        Directive::NoTool => ToolResponse {
            reply: NO_TOOL_REPLY.to_string(),
            used_tool: false,
            tool: None,
            results: None,
            url_content: None,
        },
        Directive::Search {
            query,
            max_results,
            region,
            safesearch,
        } => {
            trail.record_invocation(
                ToolKind::WebSearch,
                serde_json::json!({
                    "query": query,
                    "max_results": max_results,
                    "region": region,
                    "safesearch": safesearch,
                }),
            );
            let (items, raw) =
                search::web_search(backend, &query, max_results, &region, safesearch).await?;
            trail.record_raw_output(raw_transport_output(&raw));

            let tool = ToolKind::WebSearch.as_str();
            let prefix = if items.is_empty() {
                format!("{tool} returned no results")
            } else {
                format!("{tool} found {} result(s)", items.len())
            };
            ToolResponse {
                reply: format!("{prefix} for query: {}", req.message),
                used_tool: true,
                tool: Some(ToolKind::WebSearch),
                results: if items.is_empty() { None } else { Some(items) },
                url_content: None,
            }
        }
        Directive::Fetch { url } => {
            trail.record_invocation(
                ToolKind::FetchUrl,
                serde_json::json!({ "url": url.as_str() }),
            );
            let mut freq = FetchRequest::get(url.as_str());
            freq.timeout_ms = Some(timeout_ms_from_env());
            let resp = backend.fetch(&freq).await.map_err(|e| match e {
                Error::Fetch(cause) => Error::Fetch(format!("{url}: {cause}")),
                other => other,
            })?;
            if !resp.is_success() {
                return Err(Error::Fetch(format!("{url}: HTTP {}", resp.status)));
            }
            trail.record_raw_output(raw_transport_output(&resp));

            let content = extract::extract(
                &resp.text_lossy(),
                &resp.final_url,
                resp.status,
                resp.content_type.as_deref(),
            );
            ToolResponse {
                reply: format!("Fetched and parsed {}", content.url),
                used_tool: true,
                tool: Some(ToolKind::FetchUrl),
                results: None,
                url_content: Some(content),
            }
        }
    };

    trail.record_response(&response);
    Ok((response, trail))
}

use chatpipe_core::{
    Error, FetchBackend, FetchRequest, FetchResponse, Result, Safesearch, SearchResultItem,
};
use scraper::{Html, Selector};

use crate::timeout_ms_from_env;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

pub const MAX_RESULTS_CAP: usize = 10;

pub fn search_endpoint_from_env() -> String {
    std::env::var("CHATPIPE_SEARCH_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SEARCH_ENDPOINT.to_string())
}

/// Form-encoded parameters for the provider's HTML endpoint:
/// `q` query, `kl` region, `kp` safesearch code.
pub fn search_form(query: &str, region: &str, safesearch: Safesearch) -> Vec<(String, String)> {
    vec![
        ("q".to_string(), query.to_string()),
        ("kl".to_string(), region.to_string()),
        ("kp".to_string(), safesearch.provider_code().to_string()),
    ]
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| panic!("bad selector: {css}"))
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The provider wraps result links in a `//duckduckgo.com/l/?uddg=<target>`
/// redirect. Decode to the target URL when present; otherwise keep the raw
/// href untouched.
fn decode_redirect_href(raw: &str) -> String {
    let absolute = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };
    if let Ok(u) = url::Url::parse(&absolute) {
        let is_redirect = u
            .domain()
            .is_some_and(|d| d == "duckduckgo.com" || d.ends_with(".duckduckgo.com"))
            && u.path().starts_with("/l/");
        if is_redirect {
            if let Some((_, target)) = u.query_pairs().find(|(k, _)| k == "uddg") {
                return target.into_owned();
            }
        }
    }
    raw.to_string()
}

/// Parse provider result HTML into ordered result records.
///
/// Scans `div.result` containers in document order. A container without a
/// titled link anchor is skipped entirely and does not count toward the cap.
/// Snippets default to the empty string: search records are structurally
/// present even when the snippet element is missing. Scanning stops at
/// `max_results` valid candidates.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchResultItem> {
    let doc = Html::parse_document(html);
    let result_sel = sel("div.result");
    let link_sel = sel("a.result__a");
    let snippet_sel = sel("a.result__snippet, .result__snippet");

    let mut out = Vec::new();
    for container in doc.select(&result_sel) {
        if out.len() >= max_results {
            break;
        }
        let Some(anchor) = container.select(&link_sel).next() else {
            continue;
        };
        let title = norm_ws(&anchor.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() {
            continue;
        }
        let href = anchor
            .value()
            .attr("href")
            .map(decode_redirect_href)
            .unwrap_or_default();
        let body = container
            .select(&snippet_sel)
            .next()
            .map(|el| norm_ws(&el.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();
        out.push(SearchResultItem { title, href, body });
    }
    out
}

/// One search round trip: POST the query form, parse the result HTML.
///
/// Returns the parsed items together with the raw transport response so the
/// caller can record the unnormalized output in its audit trail. Any
/// transport failure or non-2xx status aggregates into `Error::Search` with
/// the proximate cause; there is no retry and no partial recovery.
pub async fn web_search(
    backend: &dyn FetchBackend,
    query: &str,
    max_results: usize,
    region: &str,
    safesearch: Safesearch,
) -> Result<(Vec<SearchResultItem>, FetchResponse)> {
    let max_results = max_results.clamp(1, MAX_RESULTS_CAP);
    let mut req = FetchRequest::post_form(
        search_endpoint_from_env(),
        search_form(query, region, safesearch),
    );
    req.timeout_ms = Some(timeout_ms_from_env());

    let resp = backend
        .fetch(&req)
        .await
        .map_err(|e| Error::Search(e.to_string()))?;
    if !resp.is_success() {
        return Err(Error::Search(format!(
            "search endpoint HTTP {} for query: {query}",
            resp.status
        )));
    }

    let items = parse_results(&resp.text_lossy(), max_results);
    Ok((items, resp))
}

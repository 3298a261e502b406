use chatpipe_core::PageContent;
use scraper::{Html, Selector};

/// Cap on headings kept from a page, document order.
pub const MAX_HEADINGS: usize = 5;
/// Cap on preview characters (character truncation, not word-aware).
pub const MAX_PREVIEW_CHARS: usize = 500;

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sel(css: &str) -> Selector {
    // All selectors here are static strings; a parse failure is a programmer
    // error, not a runtime condition.
    Selector::parse(css).unwrap_or_else(|_| panic!("bad selector: {css}"))
}

fn element_text(el: &scraper::ElementRef) -> String {
    norm_ws(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    doc.select(&sel(css))
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

fn first_meta_content(doc: &Html, selectors: &[&str]) -> Option<String> {
    // Priority list: the first selector that yields non-empty content wins.
    for css in selectors {
        let found = doc
            .select(&sel(css))
            .filter_map(|el| el.value().attr("content"))
            .map(norm_ws)
            .find(|t| !t.is_empty());
        if found.is_some() {
            return found;
        }
    }
    None
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Extract lightweight metadata from raw page HTML.
///
/// Best-effort by design: a missing or empty structural element resolves to
/// `None`, never an error. Pure text/attribute reads over the parsed tree;
/// no script execution, no subresource loading.
pub fn extract(
    html: &str,
    final_url: &str,
    status_code: u16,
    content_type: Option<&str>,
) -> PageContent {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, "title");
    let description = first_meta_content(
        &doc,
        &[
            r#"meta[name="description"]"#,
            r#"meta[property="og:description"]"#,
        ],
    );

    // h1 and h2 interleaved in document order, not grouped by level.
    let headings: Vec<String> = doc
        .select(&sel("h1, h2"))
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .take(MAX_HEADINGS)
        .collect();

    let preview_full = doc
        .select(&sel("p"))
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let preview = if preview_full.is_empty() {
        None
    } else {
        Some(truncate_chars(&preview_full, MAX_PREVIEW_CHARS))
    };

    PageContent {
        url: final_url.to_string(),
        status_code,
        content_type: content_type.map(|s| s.to_string()),
        title,
        description,
        headings: if headings.is_empty() {
            None
        } else {
            Some(headings)
        },
        preview,
    }
}

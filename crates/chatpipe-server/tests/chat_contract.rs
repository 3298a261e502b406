use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use chatpipe_core::{Error, FetchBackend, FetchRequest, FetchResponse, Result};
use chatpipe_server::build_router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

struct CannedBackend {
    calls: AtomicUsize,
    reply: Box<dyn Fn() -> Result<FetchResponse> + Send + Sync>,
}

impl CannedBackend {
    fn html(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Box::new(move || {
                Ok(FetchResponse {
                    url: "http://mock/".to_string(),
                    final_url: "http://mock/final".to_string(),
                    status,
                    content_type: Some("text/html".to_string()),
                    bytes: body.clone().into_bytes(),
                })
            }),
        })
    }

    fn failing(cause: &str) -> Arc<Self> {
        let cause = cause.to_string();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Box::new(move || Err(Error::Fetch(cause.clone()))),
        })
    }
}

#[async_trait::async_trait]
impl FetchBackend for CannedBackend {
    async fn fetch(&self, _req: &FetchRequest) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)()
    }
}

fn post_chat(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn hello_greets_with_the_path_segment() {
    let app = build_router(CannedBackend::html(200, ""));
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/hello/user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["message"], "Hello, World user");
}

#[tokio::test]
async fn no_tool_chat_returns_guidance() {
    let backend = CannedBackend::html(200, "unused");
    let app = build_router(backend.clone());
    let resp = app
        .oneshot(post_chat(r#"{"message":"hi there"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["used_tool"], false);
    assert!(v["reply"].as_str().unwrap().contains("No tool requested"));
    assert!(v.get("results").is_none());
    assert!(v.get("url_content").is_none());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn search_chat_returns_normalized_results() {
    let html = r#"
<div class="result"><a class="result__a" href="https://one.example/">One</a>
  <a class="result__snippet">Snippet.</a></div>
<div class="result"><a class="result__a" href="https://two.example/">Two</a></div>
"#;
    let app = build_router(CannedBackend::html(200, html));
    let resp = app
        .oneshot(post_chat(
            r#"{"message":"rust web","tool":"web_search","max_results":2}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["used_tool"], true);
    assert_eq!(v["tool"], "web_search");
    assert_eq!(
        v["reply"],
        "web_search found 2 result(s) for query: rust web"
    );
    assert_eq!(v["results"].as_array().unwrap().len(), 2);
    assert_eq!(v["results"][1]["body"], "");
}

#[tokio::test]
async fn fetch_chat_returns_page_content() {
    let html = "<title>Mock</title><h1>H</h1><p>Paragraph.</p>";
    let app = build_router(CannedBackend::html(200, html));
    let resp = app
        .oneshot(post_chat(
            r#"{"message":"summarize","tool":"fetch_url","url":"https://site.example/"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["reply"], "Fetched and parsed http://mock/final");
    assert_eq!(v["tool"], "fetch_url");
    assert_eq!(v["url_content"]["title"], "Mock");
    assert_eq!(v["url_content"]["preview"], "Paragraph.");
    assert_eq!(v["url_content"]["status_code"], 200);
    assert!(v.get("results").is_none());
}

#[tokio::test]
async fn fetch_without_url_is_422_and_makes_no_call() {
    let backend = CannedBackend::html(200, "unused");
    let app = build_router(backend.clone());
    let resp = app
        .oneshot(post_chat(r#"{"message":"get it","tool":"fetch_url"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let v = body_json(resp).await;
    assert!(v["detail"].as_str().unwrap().contains("'url'"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_message_is_422() {
    let app = build_router(CannedBackend::html(200, "unused"));
    let resp = app.oneshot(post_chat(r#"{"message":"  "}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn out_of_range_max_results_is_422() {
    let app = build_router(CannedBackend::html(200, "unused"));
    let resp = app
        .oneshot(post_chat(r#"{"message":"q","tool":"web_search","max_results":11}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn upstream_failure_is_502_with_cause_detail() {
    let app = build_router(CannedBackend::failing("connection refused"));
    let resp = app
        .oneshot(post_chat(
            r#"{"message":"get it","tool":"fetch_url","url":"https://down.example/"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let v = body_json(resp).await;
    let detail = v["detail"].as_str().unwrap();
    assert!(detail.contains("https://down.example/"));
    assert!(detail.contains("connection refused"));
    assert!(!detail.contains("backtrace"));
}

#[tokio::test]
async fn search_upstream_failure_is_502() {
    let app = build_router(CannedBackend::failing("timed out"));
    let resp = app
        .oneshot(post_chat(r#"{"message":"q","tool":"web_search"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let v = body_json(resp).await;
    assert!(v["detail"].as_str().unwrap().contains("timed out"));
}

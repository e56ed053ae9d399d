//! HttpFetcher against a local HTTP server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use larder::scrapers::{FetchConfig, FetchError, HttpFetcher, PageFetcher, RetryPolicy};

#[derive(Clone, Default)]
struct Hits(Arc<Mutex<HashMap<String, usize>>>);

impl Hits {
    fn record(&self, route: &str) -> usize {
        let mut hits = self.0.lock().unwrap();
        let count = hits.entry(route.to_string()).or_default();
        *count += 1;
        *count
    }

    fn get(&self, route: &str) -> usize {
        self.0.lock().unwrap().get(route).copied().unwrap_or(0)
    }
}

const PAGE: &str = "<html><head><title>Soup</title></head><body>Soup</body></html>";

async fn route(State(hits): State<Hits>, Path(name): Path<String>) -> Response {
    let n = hits.record(&name);
    match name.as_str() {
        "ok" => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], PAGE).into_response(),
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "forbidden" => StatusCode::FORBIDDEN.into_response(),
        "teapot" => StatusCode::IM_A_TEAPOT.into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "flaky" if n == 1 => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "flaky" => ([(header::CONTENT_TYPE, "text/html")], PAGE).into_response(),
        "gzipped" => (
            [
                (header::CONTENT_TYPE, "text/html"),
                (header::CONTENT_ENCODING, "gzip"),
            ],
            gzip_stored(PAGE.as_bytes()),
        )
            .into_response(),
        "image" => ([(header::CONTENT_TYPE, "image/png")], vec![0u8, 1, 2, 3]).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// Gzip member holding one uncompressed deflate block.
fn gzip_stored(data: &[u8]) -> Vec<u8> {
    let len = data.len() as u16;
    let mut out = vec![0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];
    out.push(0x01);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&(!len).to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&crc32(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out
}

async fn serve() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/:name", get(route))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hits)
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(&FetchConfig {
        timeout: Duration::from_secs(5),
        user_agent: Some("larder-test/1.0".to_string()),
        retry: RetryPolicy {
            max_attempts: 3,
            network_backoff: Duration::from_millis(5),
            server_backoff: Duration::from_millis(5),
        },
    })
    .unwrap()
}

#[tokio::test]
async fn fetches_html_page() {
    let (base, hits) = serve().await;
    let url = format!("{}/ok", base);

    let page = fetcher().fetch(&url).await.unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.url, url);
    assert!(page.body.contains("<title>Soup</title>"));
    assert_eq!(hits.get("ok"), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (base, hits) = serve().await;
    let fetcher = fetcher();

    for (route, status) in [("missing", 404), ("forbidden", 403), ("teapot", 418)] {
        let url = format!("{}/{}", base, route);
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err, FetchError::HttpStatus { url, status });
        assert_eq!(hits.get(route), 1, "{} was retried", route);
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let (base, hits) = serve().await;
    let fetcher = fetcher();

    let page = fetcher.fetch(&format!("{}/flaky", base)).await.unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(hits.get("flaky"), 2);

    let err = fetcher.fetch(&format!("{}/broken", base)).await.unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
    assert_eq!(hits.get("broken"), 3);
}

#[tokio::test]
async fn gzip_bodies_are_decoded() {
    let (base, _) = serve().await;
    let page = fetcher().fetch(&format!("{}/gzipped", base)).await.unwrap();
    assert_eq!(page.body, PAGE);
}

#[test]
fn crc32_check_value() {
    assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
}

#[tokio::test]
async fn non_html_bodies_are_parse_errors() {
    let (base, _) = serve().await;
    let err = fetcher().fetch(&format!("{}/image", base)).await.unwrap_err();
    assert!(matches!(err, FetchError::Parse { .. }));
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher()
        .fetch(&format!("http://{}/ok", addr))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }));
}

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::server::router::{router, TRUNCATED_HEADER};
use crate::server::state::AppState;
use crate::store::images::LocalImageStore;
use crate::store::paginate::PaginationOptions;
use crate::tests::support::{scenario, VecStore};

struct TestApp {
    state: Arc<AppState>,
    _gallery: TempDir,
}

fn app_with(store: VecStore, page_size: usize, images: usize) -> TestApp {
    let gallery = tempfile::tempdir().unwrap();
    for i in 0..images {
        std::fs::write(gallery.path().join(format!("{i:02}.png")), b"png").unwrap();
    }
    std::fs::write(gallery.path().join("readme.txt"), b"txt").unwrap();
    let state = Arc::new(AppState {
        messages: Arc::new(store),
        images: Arc::new(LocalImageStore::new(gallery.path(), "/img")),
        pagination: PaginationOptions {
            page_size,
            fetch_all: false,
        },
    });
    TestApp {
        state,
        _gallery: gallery,
    }
}

async fn get(app: &TestApp, uri: &str) -> Response {
    router(app.state.clone())
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = app_with(VecStore::new(vec![]), 10, 0);
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn messages_by_author() {
    let app = app_with(VecStore::new(scenario()), 10, 0);

    let response = get(&app, "/api/messages?author=A").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(TRUNCATED_HEADER).is_none());
    assert_eq!(
        body_json(response).await,
        serde_json::json!([
            {"author": "A", "created_date": "t2", "text": "world"},
            {"author": "A", "created_date": "t1", "text": "hello"}
        ])
    );
}

#[tokio::test]
async fn messages_search_with_ascending_sort() {
    let app = app_with(VecStore::new(scenario()), 1, 0);

    let response = get(&app, "/api/messages?search=hello&sort=asc").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let texts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["hello", "hello world"]);
}

#[tokio::test]
async fn truncated_listing_is_flagged() {
    let app = app_with(VecStore::new(scenario()), 2, 0);

    let response = get(&app, "/api/messages").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[TRUNCATED_HEADER], "true");
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn store_failure_is_a_json_500() {
    let app = app_with(VecStore::new(scenario()).failing_on(1), 10, 0);

    let response = get(&app, "/api/messages").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("store unavailable"));
}

#[tokio::test]
async fn stream_emits_messages_then_completion() {
    let app = app_with(VecStore::new(scenario()), 10, 0);

    let response = get(&app, "/api/messages/stream?search=hello").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let body = body_text(response).await;
    let data: Vec<&str> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect();
    assert_eq!(
        data,
        vec![
            r#"{"text":"hello world","created_date":"t3","creator":{"name":"B"}}"#,
            r#"{"text":"hello","created_date":"t1","creator":{"name":"A"}}"#,
            r#"{"message":"Processing complete"}"#,
        ]
    );
    assert!(body.contains("event: complete"));
}

#[tokio::test]
async fn stream_failure_ends_with_error_event() {
    let app = app_with(VecStore::new(scenario()).failing_on(1), 10, 0);

    let body = body_text(get(&app, "/api/messages/stream?author=B").await).await;
    assert!(body.contains("event: error"));
    assert!(!body.contains("event: complete"));
}

#[tokio::test]
async fn images_default_listing() {
    let app = app_with(VecStore::new(vec![]), 10, 3);

    let response = get(&app, "/api/images").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({
            "images": ["/img/00.png", "/img/01.png", "/img/02.png"],
            "isTruncated": false
        })
    );
}

#[tokio::test]
async fn images_limit_is_validated() {
    let app = app_with(VecStore::new(vec![]), 10, 3);

    for uri in ["/api/images?limit=150", "/api/images?limit=0", "/api/images?limit=x"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(body_json(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn images_are_paged_with_next_token() {
    let app = app_with(VecStore::new(vec![]), 10, 12);

    let response = get(&app, "/api/images?limit=10").await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["images"].as_array().unwrap().len(), 10);
    assert_eq!(first["isTruncated"], true);
    let token = first["nextToken"].as_str().unwrap();

    let response = get(&app, &format!("/api/images?limit=10&nextToken={token}")).await;
    let second = body_json(response).await;
    assert_eq!(
        second["images"],
        serde_json::json!(["/img/10.png", "/img/11.png"])
    );
    assert_eq!(second["isTruncated"], false);
    assert!(second.get("nextToken").is_none());
}

#[tokio::test]
async fn images_reject_foreign_token() {
    let app = app_with(VecStore::new(vec![]), 10, 3);

    let response = get(&app, "/api/images?nextToken=%21%21").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

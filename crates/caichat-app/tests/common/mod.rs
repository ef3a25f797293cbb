#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::*;
use wiremock::{Mock, MockServer, ResponseTemplate};

use caichat::web::{create_router, AppState};
use caichat_api::{HttpUpstreamClient, UpstreamClient};
use caichat_chat::{SessionManager, StreamPacing};
use caichat_types::Credentials;

/// Mock upstream gateway plus a router wired to it
pub struct TestApp {
    pub gateway: MockServer,
    pub session: Arc<SessionManager>,
    pub router: Router,
    _static_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let gateway = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/session"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&gateway)
            .await;
        Mock::given(method("GET"))
            .and(path("/account/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "username": "ada",
                "name": "Ada L",
                "bio": "Counting engines",
                "avatar_url": null
            })))
            .mount(&gateway)
            .await;

        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>caichat ui</h1>").unwrap();
        std::fs::write(static_dir.path().join("app.js"), "console.log('hi');").unwrap();

        let client: Arc<dyn UpstreamClient> = Arc::new(HttpUpstreamClient::new(gateway.uri()));
        let session = Arc::new(SessionManager::new(client));
        session
            .open(&Credentials::new("test-token", None))
            .await
            .unwrap();

        let state = AppState::new(session.clone(), StreamPacing::none()).unwrap();
        let router = create_router(state, static_dir.path());

        Self {
            gateway,
            session,
            router,
            _static_dir: static_dir,
        }
    }

    pub async fn mock(&self, http_method: &str, route: &str, response: ResponseTemplate) {
        Mock::given(method(http_method))
            .and(path(route))
            .respond_with(response)
            .mount(&self.gateway)
            .await;
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

pub fn ndjson(events: &[Value]) -> ResponseTemplate {
    let body = events
        .iter()
        .map(|event| event.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson")
}

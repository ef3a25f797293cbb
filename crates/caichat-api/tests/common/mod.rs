#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::*;
use wiremock::matchers::body_partial_json as body_json_partial;
use wiremock::{Mock, MockServer, ResponseTemplate};

use caichat_api::HttpUpstreamClient;
use caichat_types::Credentials;

pub const TEST_TOKEN: &str = "test-token";

/// Mock gateway for exercising the HTTP upstream client
pub struct UpstreamMockServer {
    server: MockServer,
}

impl UpstreamMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn client(&self) -> HttpUpstreamClient {
        HttpUpstreamClient::new(self.uri())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(TEST_TOKEN, None)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Accept the session and answer /account/me for `username`
    pub async fn mock_login(&self, username: &str) {
        Mock::given(method("POST"))
            .and(path("/auth/session"))
            .and(body_json_partial(json!({ "token": TEST_TOKEN })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/account/me"))
            .and(header("authorization", format!("Token {}", TEST_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "username": username,
                "name": "Test User",
                "bio": "Just testing",
                "avatar_url": null
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_login_rejected(&self) {
        Mock::given(method("POST"))
            .and(path("/auth/session"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_logout(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_json(&self, http_method: &str, route: &str, status: u16, body: Value) {
        Mock::given(method(http_method))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer a turn on `chat_id` with the given newline-delimited events
    pub async fn mock_turn(&self, chat_id: &str, events: &[Value]) {
        let body = events
            .iter()
            .map(|event| event.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.mock_turn_raw(chat_id, 200, body).await;
    }

    pub async fn mock_turn_raw(&self, chat_id: &str, status: u16, body: String) {
        Mock::given(method("POST"))
            .and(path(format!("/chats/{}/turns", chat_id)))
            .and(body_json_partial(json!({ "streaming": true })))
            .respond_with(
                ResponseTemplate::new(status).set_body_raw(body, "application/x-ndjson"),
            )
            .mount(&self.server)
            .await;
    }
}

pub fn snapshot(author: &str, text: &str) -> Value {
    json!({ "type": "snapshot", "author_name": author, "text": text })
}

pub fn done() -> Value {
    json!({ "type": "done" })
}

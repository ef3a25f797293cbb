//! reqwest implementation of [`UpstreamClient`].
//!
//! Gateway contract (all paths relative to the configured base URL):
//!
//! | call | request | response |
//! |---|---|---|
//! | open | `POST /auth/session` `{token, web_next_auth?}` | 2xx |
//! | fetch_me | `GET /account/me` | `Identity` |
//! | fetch_my_characters | `GET /account/characters` | `{characters: [..]}` |
//! | search_characters | `GET /characters/search?query=` | `{characters: [..]}` |
//! | fetch_recent_chats | `GET /chats/recent` | `{chats: [..]}` |
//! | create_chat | `POST /chats` `{character_id}` | `{chat: {chat_id}, greeting: {author_name, text}}` |
//! | send_message | `POST /chats/{chat_id}/turns` | newline-delimited JSON turn events |
//! | create_character | `POST /characters` | `CharacterSummary` |
//! | close | `POST /auth/logout` | 2xx |
//!
//! Turn events are `{"type":"snapshot","author_name":..,"text":..}`,
//! `{"type":"done"}`, `{"type":"session_closed"}` and
//! `{"type":"error","message":..}`. A body that ends without `done` is
//! treated as a complete answer.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::{IntoUrl, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

use caichat_types::{
    CandidateSnapshot, CharacterSummary, Conversation, Credentials, Identity, NewCharacter,
    RecentChat, UpstreamError,
};

use crate::{SnapshotStream, UpstreamClient, UpstreamResult};

#[derive(Serialize)]
struct OpenRequest<'a> {
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_next_auth: Option<&'a str>,
}

#[derive(Deserialize)]
struct CharacterList {
    #[serde(default)]
    characters: Vec<CharacterSummary>,
}

#[derive(Deserialize)]
struct RecentChatList {
    #[serde(default)]
    chats: Vec<RecentChat>,
}

#[derive(Serialize)]
struct CreateChatRequest<'a> {
    character_id: &'a str,
}

#[derive(Deserialize)]
struct ChatRef {
    chat_id: String,
    #[serde(default)]
    character_id: Option<String>,
}

#[derive(Deserialize)]
struct CreateChatResponse {
    chat: ChatRef,
    greeting: CandidateSnapshot,
}

#[derive(Serialize)]
struct TurnRequest<'a> {
    character_id: &'a str,
    text: &'a str,
    streaming: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TurnEvent {
    Snapshot {
        #[serde(default)]
        author_name: String,
        #[serde(default)]
        text: String,
    },
    Done,
    SessionClosed,
    Error {
        #[serde(default)]
        message: String,
    },
}

/// HTTP upstream client. One instance per process, shared behind an `Arc`.
pub struct HttpUpstreamClient {
    base_url: String,
    client: reqwest::Client,
    credentials: RwLock<Option<Credentials>>,
    closed: AtomicBool,
}

impl HttpUpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        // Ensure base_url doesn't end with a slash
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client,
            credentials: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/chats/{chat_id}/turns`, with `chat_id` kept as one encoded
    /// path segment.
    fn turns_url(&self, chat_id: &str) -> UpstreamResult<Url> {
        if matches!(chat_id, "" | "." | "..") {
            return Err(UpstreamError::InvalidArgument(format!(
                "invalid chat id: {:?}",
                chat_id
            )));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::Other(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Other("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["chats", chat_id, "turns"]);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        let builder = builder.header(AUTHORIZATION, format!("Token {}", credentials.token));
        match &credentials.web_next_auth {
            Some(cookie) => builder.header(COOKIE, format!("web-next-auth={}", cookie)),
            None => builder,
        }
    }

    fn stored_credentials(&self) -> UpstreamResult<Credentials> {
        let guard = self
            .credentials
            .read()
            .map_err(|_| UpstreamError::Other("credential store poisoned".to_string()))?;
        guard
            .clone()
            .ok_or_else(|| UpstreamError::Auth("client has not been opened".to_string()))
    }

    fn request(&self, method: Method, path: &str) -> UpstreamResult<RequestBuilder> {
        self.request_url(method, self.url(path))
    }

    fn request_url(&self, method: Method, url: impl IntoUrl) -> UpstreamResult<RequestBuilder> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(UpstreamError::SessionClosed);
        }
        let credentials = self.stored_credentials()?;
        Ok(self.authorized(self.client.request(method, url), &credentials))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> UpstreamResult<T> {
        let response = self
            .request(Method::GET, path)?
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(response).await?).await
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn open(&self, credentials: &Credentials) -> UpstreamResult<Identity> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(UpstreamError::SessionClosed);
        }

        let body = OpenRequest {
            token: &credentials.token,
            web_next_auth: credentials.web_next_auth.as_deref(),
        };
        let response = self
            .authorized(self.client.post(self.url("/auth/session")), credentials)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;

        match self.credentials.write() {
            Ok(mut guard) => *guard = Some(credentials.clone()),
            Err(_) => return Err(UpstreamError::Other("credential store poisoned".to_string())),
        }
        info!(base_url = %self.base_url, "upstream session established");

        self.fetch_me().await
    }

    async fn fetch_me(&self) -> UpstreamResult<Identity> {
        self.get_json("/account/me").await
    }

    async fn search_characters(&self, query: &str) -> UpstreamResult<Vec<CharacterSummary>> {
        let response = self
            .request(Method::GET, "/characters/search")?
            .query(&[("query", query)])
            .send()
            .await
            .map_err(transport)?;
        let list: CharacterList = decode(check_status(response).await?).await?;
        Ok(list.characters)
    }

    async fn fetch_my_characters(&self) -> UpstreamResult<Vec<CharacterSummary>> {
        let list: CharacterList = self.get_json("/account/characters").await?;
        Ok(list.characters)
    }

    async fn fetch_recent_chats(&self) -> UpstreamResult<Vec<RecentChat>> {
        let list: RecentChatList = self.get_json("/chats/recent").await?;
        Ok(list.chats)
    }

    async fn create_chat(
        &self,
        character_id: &str,
    ) -> UpstreamResult<(Conversation, CandidateSnapshot)> {
        let response = self
            .request(Method::POST, "/chats")?
            .json(&CreateChatRequest { character_id })
            .send()
            .await
            .map_err(transport)?;
        let created: CreateChatResponse = decode(check_status(response).await?).await?;

        let conversation = Conversation {
            chat_id: created.chat.chat_id,
            character_id: created
                .chat
                .character_id
                .unwrap_or_else(|| character_id.to_string()),
            character_name: created.greeting.author_name.clone(),
        };
        debug!(chat_id = %conversation.chat_id, character_id, "chat created");
        Ok((conversation, created.greeting))
    }

    async fn send_message(
        &self,
        character_id: &str,
        chat_id: &str,
        text: &str,
    ) -> UpstreamResult<SnapshotStream> {
        let url = self.turns_url(chat_id)?;
        let response = self
            .request_url(Method::POST, url)?
            .json(&TurnRequest {
                character_id,
                text,
                streaming: true,
            })
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        debug!(chat_id, character_id, "turn stream opened");
        Ok(turn_stream(response))
    }

    async fn create_character(&self, character: &NewCharacter) -> UpstreamResult<CharacterSummary> {
        let response = self
            .request(Method::POST, "/characters")?
            .json(character)
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(response).await?).await
    }

    async fn close(&self) -> UpstreamResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let credentials = match self.credentials.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(credentials) = credentials else {
            // Never opened: nothing to log out of
            return Ok(());
        };

        let response = self
            .authorized(self.client.post(self.url("/auth/logout")), &credentials)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        info!("upstream session released");
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport(err.to_string())
}

async fn check_status(response: Response) -> UpstreamResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::Auth(body),
        StatusCode::GONE => UpstreamError::SessionClosed,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            UpstreamError::InvalidArgument(body)
        }
        _ => UpstreamError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> UpstreamResult<T> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
}

fn parse_turn_line(line: &[u8]) -> UpstreamResult<Option<TurnEvent>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| UpstreamError::Decode(format!("{}: {}", e, line)))
}

/// Turn a newline-delimited JSON body into a snapshot stream.
///
/// The response body is owned by the stream, so dropping the stream aborts
/// the HTTP transfer.
fn turn_stream(response: Response) -> SnapshotStream {
    let mut body = Box::pin(response.bytes_stream());

    Box::pin(async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();

        'read: loop {
            let finished = match body.next().await {
                Some(Ok(bytes)) => {
                    buffer.extend_from_slice(&bytes);
                    false
                }
                Some(Err(e)) => {
                    yield Err(transport(e));
                    break 'read;
                }
                None => {
                    // Flush a final line that lacks its newline
                    buffer.push(b'\n');
                    true
                }
            };

            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                match parse_turn_line(&line) {
                    Ok(None) => {}
                    Ok(Some(TurnEvent::Snapshot { author_name, text })) => {
                        yield Ok(CandidateSnapshot { text, author_name });
                    }
                    Ok(Some(TurnEvent::Done)) => break 'read,
                    Ok(Some(TurnEvent::SessionClosed)) => {
                        yield Err(UpstreamError::SessionClosed);
                        break 'read;
                    }
                    Ok(Some(TurnEvent::Error { message })) => {
                        yield Err(UpstreamError::Other(message));
                        break 'read;
                    }
                    Err(err) => {
                        yield Err(err);
                        break 'read;
                    }
                }
            }

            if finished {
                break;
            }
        }
    })
}

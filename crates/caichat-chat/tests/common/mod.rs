#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use caichat_api::{SnapshotStream, UpstreamClient, UpstreamResult};
use caichat_chat::{SessionManager, StreamPacing};
use caichat_types::{
    CandidateSnapshot, CharacterSummary, Conversation, Credentials, Identity, NewCharacter,
    RecentChat, UpstreamError,
};

pub const CHARACTER_NAME: &str = "Merlin";

/// One step of a scripted answer
#[derive(Clone)]
pub enum Step {
    Snapshot(String),
    SessionClosed,
    Fail(String),
    /// Signal another scripted answer
    Notify(Arc<Notify>),
    /// Wait for another scripted answer's signal
    Await(Arc<Notify>),
}

pub fn snap(text: &str) -> Step {
    Step::Snapshot(text.to_string())
}

#[derive(Clone)]
enum Script {
    Reject(UpstreamError),
    Steps(Vec<Step>),
}

struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted in-memory upstream
pub struct FakeUpstream {
    fail_open: bool,
    scripts: Mutex<HashMap<String, Script>>,
    pub open_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub released_streams: Arc<AtomicUsize>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub recent: Mutex<UpstreamResult<Vec<RecentChat>>>,
    pub mine: Mutex<UpstreamResult<Vec<CharacterSummary>>>,
    pub search_results: Mutex<UpstreamResult<Vec<CharacterSummary>>>,
    pub created: Mutex<Vec<NewCharacter>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self {
            fail_open: false,
            scripts: Mutex::new(HashMap::new()),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            released_streams: Arc::new(AtomicUsize::new(0)),
            sent: Mutex::new(Vec::new()),
            recent: Mutex::new(Ok(Vec::new())),
            mine: Mutex::new(Ok(Vec::new())),
            search_results: Mutex::new(Ok(Vec::new())),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting_login() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    pub fn script(&self, chat_id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), Script::Steps(steps));
    }

    pub fn reject_send(&self, chat_id: &str, err: UpstreamError) {
        self.scripts
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), Script::Reject(err));
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.released_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn open(&self, _credentials: &Credentials) -> UpstreamResult<Identity> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(UpstreamError::Auth("invalid token".to_string()));
        }
        self.fetch_me().await
    }

    async fn fetch_me(&self) -> UpstreamResult<Identity> {
        Ok(Identity {
            username: "tester".to_string(),
            display_name: "Test User".to_string(),
            bio: None,
            avatar_url: None,
        })
    }

    async fn search_characters(&self, _query: &str) -> UpstreamResult<Vec<CharacterSummary>> {
        self.search_results.lock().unwrap().clone()
    }

    async fn fetch_my_characters(&self) -> UpstreamResult<Vec<CharacterSummary>> {
        self.mine.lock().unwrap().clone()
    }

    async fn fetch_recent_chats(&self) -> UpstreamResult<Vec<RecentChat>> {
        self.recent.lock().unwrap().clone()
    }

    async fn create_chat(
        &self,
        character_id: &str,
    ) -> UpstreamResult<(Conversation, CandidateSnapshot)> {
        if character_id == "missing" {
            return Err(UpstreamError::Status {
                status: 404,
                body: "no such character".to_string(),
            });
        }
        Ok((
            Conversation {
                chat_id: format!("chat-{}", character_id),
                character_id: character_id.to_string(),
                character_name: CHARACTER_NAME.to_string(),
            },
            CandidateSnapshot::new("Greetings, traveller.", CHARACTER_NAME),
        ))
    }

    async fn send_message(
        &self,
        _character_id: &str,
        chat_id: &str,
        text: &str,
    ) -> UpstreamResult<SnapshotStream> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(chat_id)
            .cloned()
            .unwrap_or(Script::Steps(Vec::new()));

        let steps = match script {
            Script::Reject(err) => return Err(err),
            Script::Steps(steps) => steps,
        };

        let guard = ReleaseGuard(Arc::clone(&self.released_streams));
        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for step in steps {
                match step {
                    Step::Snapshot(text) => {
                        yield Ok(CandidateSnapshot::new(text, CHARACTER_NAME));
                    }
                    Step::SessionClosed => {
                        yield Err(UpstreamError::SessionClosed);
                        return;
                    }
                    Step::Fail(message) => {
                        yield Err(UpstreamError::Other(message));
                        return;
                    }
                    Step::Notify(notify) => notify.notify_one(),
                    Step::Await(notify) => notify.notified().await,
                }
            }
        }))
    }

    async fn create_character(&self, character: &NewCharacter) -> UpstreamResult<CharacterSummary> {
        self.created.lock().unwrap().push(character.clone());
        Ok(CharacterSummary {
            character_id: "new-char".to_string(),
            name: character.name.clone(),
            title: None,
            description: None,
            author_username: Some("tester".to_string()),
        })
    }

    async fn close(&self) -> UpstreamResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("test-token", None)
}

/// A fake upstream plus an open session over it
pub async fn open_session(upstream: FakeUpstream) -> (Arc<FakeUpstream>, SessionManager) {
    let upstream = Arc::new(upstream);
    let session = SessionManager::new(upstream.clone());
    session.open(&credentials()).await.unwrap();
    (upstream, session)
}

pub fn no_pacing() -> StreamPacing {
    StreamPacing::none()
}

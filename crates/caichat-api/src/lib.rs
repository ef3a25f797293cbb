//! # caichat-api
//!
//! The upstream client handle: one authenticated connection to the
//! conversational service, shared by every conversation the relay drives.
//!
//! - **`UpstreamClient`**: the interface the relay consumes
//! - **`HttpUpstreamClient`**: a reqwest implementation speaking the JSON
//!   gateway contract described in [`http`]
//!
//! Streaming replies are exposed as a [`SnapshotStream`] of cumulative
//! snapshots. Dropping the stream releases the underlying upstream call.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use caichat_types::{
    CandidateSnapshot, CharacterSummary, Conversation, Credentials, Identity, NewCharacter,
    RecentChat, UpstreamError,
};

pub mod http;

pub use http::HttpUpstreamClient;

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Lazy sequence of cumulative snapshots for one answer
pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = UpstreamResult<CandidateSnapshot>> + Send + 'static>>;

/// Upstream client trait - everything the relay needs from the service.
///
/// Implementations must tolerate concurrent independent calls through a
/// shared reference; the relay adds no locking of its own.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Authenticate and return the account identity
    async fn open(&self, credentials: &Credentials) -> UpstreamResult<Identity>;

    async fn fetch_me(&self) -> UpstreamResult<Identity>;

    async fn search_characters(&self, query: &str) -> UpstreamResult<Vec<CharacterSummary>>;

    async fn fetch_my_characters(&self) -> UpstreamResult<Vec<CharacterSummary>>;

    async fn fetch_recent_chats(&self) -> UpstreamResult<Vec<RecentChat>>;

    /// Create a conversation; the snapshot is the character's greeting
    async fn create_chat(
        &self,
        character_id: &str,
    ) -> UpstreamResult<(Conversation, CandidateSnapshot)>;

    /// Send a user turn and stream the answer back
    async fn send_message(
        &self,
        character_id: &str,
        chat_id: &str,
        text: &str,
    ) -> UpstreamResult<SnapshotStream>;

    async fn create_character(&self, character: &NewCharacter) -> UpstreamResult<CharacterSummary>;

    /// Release the connection. Calls after the first are no-ops.
    async fn close(&self) -> UpstreamResult<()>;
}

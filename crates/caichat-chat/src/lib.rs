//! # caichat-chat
//!
//! The relay core: owns the upstream session lifecycle, turns cumulative
//! answer snapshots into incremental chunks, and exposes conversations and
//! character listings to the front-ends.
//!
//! - **`SessionManager`**: open/close of the single upstream connection
//! - **`SnapshotDiffer`** / **`diff_stream`**: snapshot-to-chunk conversion with pacing
//! - **`ChatOrchestrator`**: conversations and streamed replies
//! - **`Directory`**: recent chats, own characters, search and creation

pub mod diff;
pub mod directory;
pub mod orchestrator;
pub mod session;

pub use diff::{diff_stream, SnapshotDiffer, StreamPacing};
pub use directory::Directory;
pub use orchestrator::{AnswerState, ChatOrchestrator, ReplyStream};
pub use session::SessionManager;

pub type RelayResult<T> = Result<T, caichat_types::RelayError>;

//! Core types and structures for caichat
//!
//! This crate provides the data model shared by the upstream client, the chat
//! relay and the application front-ends, plus the error taxonomy.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;

pub use error::{RelayError, UpstreamError};

// ============================================================================
// Constants
// ============================================================================

/// Default pause between two delivered chunks, in milliseconds
pub const DEFAULT_STREAM_DELAY_MS: u64 = 30;

/// Text appended to a reply when the upstream session went away mid-answer
pub const SESSION_CLOSED_SENTINEL: &str = " [Session closed]";

// ============================================================================
// Account
// ============================================================================

/// Helper function to deserialize string or null values
pub fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        _ => Ok(String::new()),
    }
}

/// The authenticated upstream account. Fetched once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(alias = "name", deserialize_with = "deserialize_string_or_null", default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Secrets used to open the upstream session
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub web_next_auth: Option<String>,
}

impl Credentials {
    pub fn new(token: impl Into<String>, web_next_auth: Option<String>) -> Self {
        Self {
            token: token.into(),
            web_next_auth,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"***")
            .field("web_next_auth", &self.web_next_auth.as_ref().map(|_| "***"))
            .finish()
    }
}

// ============================================================================
// Conversations and streaming
// ============================================================================

/// A character-scoped exchange. Upstream owns it; we only hold references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub chat_id: String,
    pub character_id: String,
    #[serde(default)]
    pub character_name: String,
}

/// One cumulative rendering of an in-progress answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub text: String,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub author_name: String,
}

impl CandidateSnapshot {
    pub fn new(text: impl Into<String>, author_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author_name: author_name.into(),
        }
    }
}

/// The character's opening message for a fresh conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub author_name: String,
    pub text: String,
}

impl From<CandidateSnapshot> for Greeting {
    fn from(snapshot: CandidateSnapshot) -> Self {
        Self {
            author_name: snapshot.author_name,
            text: snapshot.text,
        }
    }
}

/// Incremental text handed to a caller. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredChunk {
    pub text: String,
}

impl DeliveredChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Why a reply stream stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Complete,
    SessionClosed,
    Failed(String),
}

impl EndReason {
    /// Text rendering for transports that only carry text
    pub fn sentinel(&self) -> Option<String> {
        match self {
            EndReason::Complete => None,
            EndReason::SessionClosed => Some(SESSION_CLOSED_SENTINEL.to_string()),
            EndReason::Failed(message) => Some(format!(" [Error: {}]", message)),
        }
    }
}

/// One element of a reply stream. `End` is always the last element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(DeliveredChunk),
    End(EndReason),
}

impl StreamEvent {
    pub fn into_text(self) -> Option<String> {
        match self {
            StreamEvent::Chunk(chunk) => Some(chunk.text),
            StreamEvent::End(reason) => reason.sentinel(),
        }
    }
}

// ============================================================================
// Character directory
// ============================================================================

/// A character as the upstream describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub character_id: String,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author_username: Option<String>,
}

/// An entry of the account's recent chats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentChat {
    #[serde(default)]
    pub chat_id: String,
    pub character_id: String,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub character_name: String,
}

/// Uniform view of a character, whichever listing it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCard {
    pub character_id: String,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author_username: Option<String>,
}

// ============================================================================
// Character creation
// ============================================================================

pub const NAME_CHARS: (usize, usize) = (3, 20);
pub const GREETING_CHARS: (usize, usize) = (3, 4096);
pub const TITLE_CHARS: (usize, usize) = (3, 50);
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const DEFINITION_MAX_CHARS: usize = 32_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "unlisted" => Ok(Visibility::Unlisted),
            "public" => Ok(Visibility::Public),
            other => Err(RelayError::InvalidArgument(format!(
                "visibility must be one of: private, unlisted, public (got '{}')",
                other
            ))),
        }
    }
}

/// Request to create a character owned by the authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCharacter {
    pub name: String,
    pub greeting: String,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub title: String,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub description: String,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub definition: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub copyable: bool,
}

impl NewCharacter {
    /// Check field lengths. Optional fields may be empty.
    pub fn validate(&self) -> Result<(), RelayError> {
        check_range("name", &self.name, NAME_CHARS)?;
        check_range("greeting", &self.greeting, GREETING_CHARS)?;
        if !self.title.is_empty() {
            check_range("title", &self.title, TITLE_CHARS)?;
        }
        check_max("description", &self.description, DESCRIPTION_MAX_CHARS)?;
        check_max("definition", &self.definition, DEFINITION_MAX_CHARS)?;
        Ok(())
    }
}

fn check_range(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), RelayError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(RelayError::InvalidArgument(format!(
            "{} must be between {} and {} characters (got {})",
            field, min, max, len
        )));
    }
    Ok(())
}

fn check_max(field: &str, value: &str, max: usize) -> Result<(), RelayError> {
    let len = value.chars().count();
    if len > max {
        return Err(RelayError::InvalidArgument(format!(
            "{} must be at most {} characters (got {})",
            field, max, len
        )));
    }
    Ok(())
}

use serde::{Deserialize, Serialize};

use caichat_types::{CharacterSummary, Greeting, Identity};

/// Response of `GET /me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<Identity> for MeResponse {
    fn from(identity: Identity) -> Self {
        Self {
            username: identity.username,
            name: identity.display_name,
            bio: identity.bio,
            avatar_url: identity.avatar_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatParams {
    pub character_id: String,
}

/// Response of `POST /chat/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub chat_id: String,
    pub character_name: String,
    pub greeting: String,
}

impl CreateChatResponse {
    pub fn new(chat_id: String, greeting: Greeting) -> Self {
        Self {
            chat_id,
            character_name: greeting.author_name,
            greeting: greeting.text,
        }
    }
}

/// Body of `POST /chat/send`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessageRequest {
    pub character_id: String,
    pub chat_id: String,
    pub message: String,
}

/// Response of `POST /characters/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCharacter {
    pub character_id: String,
    pub name: String,
}

impl From<CharacterSummary> for CreatedCharacter {
    fn from(summary: CharacterSummary) -> Self {
        Self {
            character_id: summary.character_id,
            name: summary.name,
        }
    }
}

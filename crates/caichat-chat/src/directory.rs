use std::sync::Arc;
use tracing::{debug, info};

use caichat_api::UpstreamClient;
use caichat_types::{CharacterCard, CharacterSummary, NewCharacter, RelayError};

use crate::session::SessionManager;
use crate::RelayResult;

/// Author shown for search results that carry none
const UNKNOWN_AUTHOR: &str = "unknown";

/// Character listings normalized into [`CharacterCard`]s
pub struct Directory {
    client: Arc<dyn UpstreamClient>,
    owner: String,
}

impl Directory {
    pub fn new(session: &SessionManager) -> RelayResult<Self> {
        let identity = session.identity()?;
        Ok(Self {
            client: session.client()?,
            owner: identity.username,
        })
    }

    /// Characters of the account's recent chats
    pub async fn recent(&self) -> RelayResult<Vec<CharacterCard>> {
        let chats = self.client.fetch_recent_chats().await?;
        debug!(count = chats.len(), "fetched recent chats");
        Ok(chats
            .into_iter()
            .map(|chat| CharacterCard {
                character_id: chat.character_id,
                name: chat.character_name,
                title: None,
                description: None,
                author_username: None,
            })
            .collect())
    }

    /// Characters authored by the account
    pub async fn mine(&self) -> RelayResult<Vec<CharacterCard>> {
        let characters = self.client.fetch_my_characters().await?;
        debug!(count = characters.len(), "fetched own characters");
        Ok(characters
            .into_iter()
            .map(|character| card(character, Some(self.owner.clone())))
            .collect())
    }

    /// Search by free text; only an empty query is refused
    pub async fn search(&self, query: &str) -> RelayResult<Vec<CharacterCard>> {
        if query.is_empty() {
            return Err(RelayError::InvalidArgument(
                "search query must not be empty".to_string(),
            ));
        }

        let characters = self.client.search_characters(query).await?;
        debug!(query, count = characters.len(), "character search");
        Ok(characters
            .into_iter()
            .map(|character| {
                let author = character
                    .author_username
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
                card(character, Some(author))
            })
            .collect())
    }

    /// Validate and create a character owned by the account
    pub async fn create_character(&self, character: &NewCharacter) -> RelayResult<CharacterSummary> {
        character.validate()?;
        let created = self.client.create_character(character).await?;
        info!(
            character_id = %created.character_id,
            name = %created.name,
            visibility = character.visibility.as_str(),
            "character created"
        );
        Ok(created)
    }
}

fn card(character: CharacterSummary, author_username: Option<String>) -> CharacterCard {
    CharacterCard {
        character_id: character.character_id,
        name: character.name,
        title: character.title,
        description: character.description,
        author_username,
    }
}

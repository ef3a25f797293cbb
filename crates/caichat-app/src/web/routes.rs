use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::StreamExt;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing::warn;

use caichat_chat::{ChatOrchestrator, Directory, RelayResult, SessionManager, StreamPacing};
use caichat_types::{CharacterCard, NewCharacter, RelayError};

use crate::web::protocol::{
    ChatMessageRequest, CreateChatParams, CreateChatResponse, CreatedCharacter, MeResponse,
    SearchParams,
};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub orchestrator: ChatOrchestrator,
    pub directory: Arc<Directory>,
}

impl AppState {
    /// Requires an open session
    pub fn new(session: Arc<SessionManager>, pacing: StreamPacing) -> RelayResult<Self> {
        let orchestrator = ChatOrchestrator::new(&session, pacing)?;
        let directory = Arc::new(Directory::new(&session)?);
        Ok(Self {
            session,
            orchestrator,
            directory,
        })
    }
}

/// Create router with all routes
pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route("/me", get(get_me))
        .route("/characters/recent", get(recent_characters))
        .route("/characters/my", get(my_characters))
        .route("/characters/search", get(search_characters))
        .route("/characters/create", post(create_character))
        .route("/chat/create", post(create_chat))
        .route("/chat/send", post(send_message))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// GET /me - Authenticated account
async fn get_me(State(state): State<AppState>) -> Result<Json<MeResponse>, AppError> {
    let identity = state.session.identity()?;
    Ok(Json(identity.into()))
}

/// GET /characters/recent
async fn recent_characters(State(state): State<AppState>) -> Json<Vec<CharacterCard>> {
    Json(or_empty("recent", state.directory.recent().await))
}

/// GET /characters/my
async fn my_characters(State(state): State<AppState>) -> Json<Vec<CharacterCard>> {
    Json(or_empty("my", state.directory.mine().await))
}

/// GET /characters/search?query=
async fn search_characters(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<CharacterCard>>, AppError> {
    let query = params.query.unwrap_or_default();
    if query.is_empty() {
        return Err(AppError::Relay(RelayError::InvalidArgument(
            "query must be at least 1 character".to_string(),
        )));
    }
    let result = state.directory.search(&query).await;
    Ok(Json(or_empty("search", result)))
}

/// POST /chat/create?character_id= - Start a conversation
async fn create_chat(
    State(state): State<AppState>,
    Query(params): Query<CreateChatParams>,
) -> Result<Json<CreateChatResponse>, AppError> {
    let (conversation, greeting) = state
        .orchestrator
        .start_conversation(&params.character_id)
        .await?;
    Ok(Json(CreateChatResponse::new(conversation.chat_id, greeting)))
}

/// POST /chat/send - Stream the reply as plain text
async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<ChatMessageRequest>,
) -> Response {
    let conversation =
        state
            .orchestrator
            .resume_conversation(request.character_id, request.chat_id, String::new());
    let text = state
        .orchestrator
        .send_and_stream(&conversation, &request.message)
        .into_text_stream()
        .map(Ok::<_, Infallible>);

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(text),
    )
        .into_response()
}

/// POST /characters/create
async fn create_character(
    State(state): State<AppState>,
    Json(character): Json<NewCharacter>,
) -> Result<Json<CreatedCharacter>, AppError> {
    let created = state.directory.create_character(&character).await?;
    Ok(Json(created.into()))
}

fn or_empty(listing: &str, result: RelayResult<Vec<CharacterCard>>) -> Vec<CharacterCard> {
    result.unwrap_or_else(|e| {
        warn!(listing, error = %e, "character listing failed");
        Vec::new()
    })
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    Relay(RelayError),
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        AppError::Relay(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError::Relay(err) = self;
        let status = match &err {
            RelayError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            RelayError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "detail": err.to_string(),
        }));

        (status, body).into_response()
    }
}

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, info, warn};

use caichat_api::UpstreamClient;
use caichat_types::{
    Conversation, EndReason, Greeting, RelayError, StreamEvent, UpstreamError,
};

use crate::diff::{diff_stream, StreamPacing};
use crate::session::SessionManager;
use crate::RelayResult;

/// Drives conversations over the shared upstream handle.
///
/// Cheap to clone; every clone talks through the same connection.
#[derive(Clone)]
pub struct ChatOrchestrator {
    client: Arc<dyn UpstreamClient>,
    pacing: StreamPacing,
}

impl ChatOrchestrator {
    pub fn new(session: &SessionManager, pacing: StreamPacing) -> RelayResult<Self> {
        Ok(Self {
            client: session.client()?,
            pacing,
        })
    }

    pub fn pacing(&self) -> StreamPacing {
        self.pacing
    }

    /// Create a new conversation with `character_id` and return its greeting
    pub async fn start_conversation(
        &self,
        character_id: &str,
    ) -> RelayResult<(Conversation, Greeting)> {
        let (conversation, greeting) = self
            .client
            .create_chat(character_id)
            .await
            .map_err(|e| {
                warn!(character_id, error = %e, "failed to create conversation");
                RelayError::from(e)
            })?;

        info!(
            chat_id = %conversation.chat_id,
            character = %conversation.character_name,
            "conversation started"
        );
        Ok((conversation, greeting.into()))
    }

    /// Reference an existing conversation by its ids without calling upstream
    pub fn resume_conversation(
        &self,
        character_id: impl Into<String>,
        chat_id: impl Into<String>,
        character_name: impl Into<String>,
    ) -> Conversation {
        Conversation {
            chat_id: chat_id.into(),
            character_id: character_id.into(),
            character_name: character_name.into(),
        }
    }

    /// Send `text` and stream the character's answer.
    ///
    /// Nothing is sent until the returned stream is first polled. The stream
    /// always finishes with exactly one [`StreamEvent::End`]; dropping it
    /// early releases the upstream call.
    ///
    /// Two sends on the same conversation are not serialized here; callers
    /// that allow it must order them themselves.
    pub fn send_and_stream(&self, conversation: &Conversation, text: &str) -> ReplyStream {
        let client = Arc::clone(&self.client);
        let conversation = conversation.clone();
        let text = text.to_string();
        let pacing = self.pacing;
        let chat_id = conversation.chat_id.clone();

        let events = async_stream::stream! {
            let snapshots = match client
                .send_message(&conversation.character_id, &conversation.chat_id, &text)
                .await
            {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    yield StreamEvent::End(end_reason(&conversation.chat_id, e));
                    return;
                }
            };

            let mut chunks = Box::pin(diff_stream(snapshots, pacing));
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        yield StreamEvent::Chunk(chunk);
                    }
                    Err(e) => {
                        yield StreamEvent::End(end_reason(&conversation.chat_id, e));
                        return;
                    }
                }
            }
            yield StreamEvent::End(EndReason::Complete);
        };

        ReplyStream::new(chat_id, Box::pin(events))
    }
}

fn end_reason(chat_id: &str, err: UpstreamError) -> EndReason {
    match err {
        UpstreamError::SessionClosed => {
            warn!(chat_id, "upstream session closed during reply");
            EndReason::SessionClosed
        }
        other => {
            warn!(chat_id, error = %other, "reply failed");
            EndReason::Failed(other.to_string())
        }
    }
}

/// Lifecycle of one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerState {
    Pending,
    Streaming,
    Complete,
    Closed,
    Failed,
}

impl AnswerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnswerState::Complete | AnswerState::Closed | AnswerState::Failed
        )
    }

    fn after(event: &StreamEvent) -> Self {
        match event {
            StreamEvent::Chunk(_) => AnswerState::Streaming,
            StreamEvent::End(EndReason::Complete) => AnswerState::Complete,
            StreamEvent::End(EndReason::SessionClosed) => AnswerState::Closed,
            StreamEvent::End(EndReason::Failed(_)) => AnswerState::Failed,
        }
    }
}

/// Stream of reply events for one answer. Fused after its `End` event.
pub struct ReplyStream {
    chat_id: String,
    inner: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
    state: AnswerState,
}

impl ReplyStream {
    fn new(chat_id: String, inner: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>) -> Self {
        Self {
            chat_id,
            inner,
            state: AnswerState::Pending,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn state(&self) -> AnswerState {
        self.state
    }

    /// Render as plain text: chunk text, then the end reason's sentinel
    pub fn into_text_stream(self) -> impl Stream<Item = String> + Send {
        self.filter_map(|event| futures::future::ready(event.into_text()))
    }

    fn transition(&mut self, next: AnswerState) {
        if next != self.state {
            debug!(chat_id = %self.chat_id, from = ?self.state, to = ?next, "answer state");
            self.state = next;
        }
    }
}

impl Stream for ReplyStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state.is_terminal() {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(event)) => {
                this.transition(AnswerState::after(&event));
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                // Producer ended without an End event
                this.transition(AnswerState::Complete);
                Poll::Ready(Some(StreamEvent::End(EndReason::Complete)))
            }
        }
    }
}

impl futures::stream::FusedStream for ReplyStream {
    fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }
}

//! Snapshot-to-chunk conversion.
//!
//! Upstream answers arrive as cumulative snapshots ("H", "He", "Hel", ...).
//! Callers want only the new text of each snapshot, paced so that terminal
//! and browser clients render it as typing.

use futures::{Stream, StreamExt};
use std::time::Duration;

use caichat_types::{CandidateSnapshot, DeliveredChunk, UpstreamError, DEFAULT_STREAM_DELAY_MS};

/// Incremental differ over one answer's snapshots
#[derive(Debug, Default)]
pub struct SnapshotDiffer {
    last_text: String,
}

impl SnapshotDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new text of `snapshot`, or `None` if there is none.
    ///
    /// A snapshot that does not extend the previous one is delivered whole.
    pub fn push(&mut self, snapshot: &CandidateSnapshot) -> Option<DeliveredChunk> {
        let chunk = match snapshot.text.strip_prefix(self.last_text.as_str()) {
            Some(suffix) => suffix.to_string(),
            None => snapshot.text.clone(),
        };
        self.last_text.clone_from(&snapshot.text);

        if chunk.is_empty() {
            None
        } else {
            Some(DeliveredChunk::new(chunk))
        }
    }

    pub fn last_text(&self) -> &str {
        &self.last_text
    }
}

/// Pause inserted after every delivered chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPacing(Duration);

impl Default for StreamPacing {
    fn default() -> Self {
        Self::from_millis(DEFAULT_STREAM_DELAY_MS)
    }
}

impl StreamPacing {
    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn none() -> Self {
        Self(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.0
    }

    pub async fn wait(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Adapt a snapshot stream into a paced chunk stream.
///
/// Errors pass through unchanged and end the stream.
pub fn diff_stream<S>(
    snapshots: S,
    pacing: StreamPacing,
) -> impl Stream<Item = Result<DeliveredChunk, UpstreamError>> + Send + 'static
where
    S: Stream<Item = Result<CandidateSnapshot, UpstreamError>> + Send + 'static,
{
    async_stream::stream! {
        let mut snapshots = Box::pin(snapshots);
        let mut differ = SnapshotDiffer::new();

        while let Some(item) = snapshots.next().await {
            match item {
                Ok(snapshot) => {
                    if let Some(chunk) = differ.push(&snapshot) {
                        yield Ok(chunk);
                        pacing.wait().await;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

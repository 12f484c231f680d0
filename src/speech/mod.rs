//! Speech ports
//!
//! The dialog talks to the user through [`SpeechOutput`] and hears them
//! through [`SpeechInput`]. Both are awaitable: `speak` resolves once playback
//! has finished, `recognize_once` once a transcript is available, and a
//! [`CaptureSession`] streams interim and final transcript chunks until it is
//! stopped.

pub mod console;
pub mod remote;

pub use console::{ConsoleSpeechInput, ConsoleSpeechOutput, LineSpeechInput};
pub use remote::{
    AudioPlayer, ClipSource, CommandClipSource, RemoteSpeechOutput, Synthesizer, Transcriber,
    TranscribingSpeechInput,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Speech recognition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    /// Recognition was stopped by its owner before producing a result
    #[error("Recognition superseded")]
    Superseded,

    #[error("No speech detected")]
    NoSpeech,

    #[error("Audio input error: {0}")]
    Device(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),
}

impl RecognitionError {
    /// Whether this is the cancellation signal from stopping our own session
    pub fn is_benign(&self) -> bool {
        matches!(self, RecognitionError::Superseded)
    }
}

/// Speech output failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Audio playback failed: {0}")]
    Playback(String),
}

/// One piece of a streamed transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptChunk {
    pub text: String,
    /// Final chunks are settled; interim ones may still be revised
    pub is_final: bool,
}

impl TranscriptChunk {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

type ChunkResult = Result<TranscriptChunk, RecognitionError>;

/// Consumer side of a streaming capture
///
/// Dropping the session stops the capture.
pub struct CaptureSession {
    chunks: mpsc::Receiver<ChunkResult>,
    stop: Option<oneshot::Sender<()>>,
}

/// Producer side of a streaming capture, held by the speech adapter
pub struct CaptureFeed {
    chunks: mpsc::Sender<ChunkResult>,
    stop: oneshot::Receiver<()>,
    stopped: bool,
}

impl CaptureSession {
    /// Create a connected feed/session pair
    pub fn channel(capacity: usize) -> (CaptureFeed, CaptureSession) {
        let (chunk_tx, chunk_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = oneshot::channel();
        (
            CaptureFeed {
                chunks: chunk_tx,
                stop: stop_rx,
                stopped: false,
            },
            CaptureSession {
                chunks: chunk_rx,
                stop: Some(stop_tx),
            },
        )
    }

    /// Next chunk, or `None` once the producer has finished or capture stopped
    pub async fn next_chunk(&mut self) -> Option<ChunkResult> {
        if self.stop.is_none() {
            return None;
        }
        self.chunks.recv().await
    }

    /// Stop capture; nothing is delivered after this returns
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
            self.chunks.close();
            tracing::debug!("Capture session stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_none()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl CaptureFeed {
    /// Deliver a chunk; returns false once the session no longer listens
    pub async fn push(&self, chunk: ChunkResult) -> bool {
        self.chunks.send(chunk).await.is_ok()
    }

    /// Resolves when the consumer stops or drops the session
    pub async fn stopped(&mut self) {
        if self.stopped {
            return;
        }
        // Either an explicit stop or a dropped sender means the same thing
        let _ = (&mut self.stop).await;
        self.stopped = true;
    }
}

/// Plays prompts to the user
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`, resolving after playback completes
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

/// Captures the user's speech as text
#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// Listen for a single utterance and return its transcript
    async fn recognize_once(&self) -> Result<String, RecognitionError>;

    /// Begin a streaming capture
    async fn start_capture(&self) -> Result<CaptureSession, RecognitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_superseded_is_benign() {
        assert!(RecognitionError::Superseded.is_benign());
        assert!(!RecognitionError::NoSpeech.is_benign());
        assert!(!RecognitionError::Device("mic unplugged".into()).is_benign());
    }

    #[tokio::test]
    async fn test_capture_delivers_chunks_in_order() {
        let (feed, mut session) = CaptureSession::channel(8);

        assert!(feed.push(Ok(TranscriptChunk::interim("hel"))).await);
        assert!(feed.push(Ok(TranscriptChunk::final_text("hello"))).await);
        drop(feed);

        assert_eq!(
            session.next_chunk().await,
            Some(Ok(TranscriptChunk::interim("hel")))
        );
        assert_eq!(
            session.next_chunk().await,
            Some(Ok(TranscriptChunk::final_text("hello")))
        );
        assert_eq!(session.next_chunk().await, None);
    }

    #[tokio::test]
    async fn test_stop_blocks_further_delivery() {
        let (mut feed, mut session) = CaptureSession::channel(8);

        assert!(feed.push(Ok(TranscriptChunk::final_text("before"))).await);
        session.stop();

        assert!(session.is_stopped());
        assert_eq!(session.next_chunk().await, None);
        assert!(!feed.push(Ok(TranscriptChunk::final_text("after"))).await);
        feed.stopped().await;
    }

    #[tokio::test]
    async fn test_dropping_session_signals_feed() {
        let (mut feed, session) = CaptureSession::channel(8);
        drop(session);
        feed.stopped().await;
        assert!(!feed.push(Ok(TranscriptChunk::final_text("late"))).await);
    }
}

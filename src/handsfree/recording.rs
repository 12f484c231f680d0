//! Recording sub-protocol
//!
//! Turns one spoken turn into a transcript using either a fixed wall-clock
//! window or silence-timeout endpointing. In both cases the buffer is cleared
//! before capture starts and the capture is stopped before the text is handed
//! back. Timers live inside [`record`], so nothing can fire once it returns.

use crate::config::{DialogConfig, RecordingMode};
use crate::speech::{RecognitionError, SpeechInput, TranscriptChunk};
use std::time::Duration;
use tokio::time::Instant;

/// Accumulates finalised transcript chunks for one recording
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureBuffer {
    parts: Vec<String>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }

    /// Append a final chunk; blank chunks are ignored
    pub fn push_final(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.parts.push(text.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Joined, trimmed text of everything captured so far
    pub fn trimmed(&self) -> String {
        self.parts.join(" ").trim().to_string()
    }
}

/// Endpointing strategy for a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStrategy {
    /// Stop unconditionally after `window`
    FixedDuration { window: Duration },
    /// Stop once no chunk has arrived for `silence`, optionally capped at `max`
    SilenceTimeout {
        silence: Duration,
        max: Option<Duration>,
    },
}

impl RecordingStrategy {
    pub fn from_config(config: &DialogConfig) -> Self {
        match config.recording_mode {
            RecordingMode::FixedDuration => RecordingStrategy::FixedDuration {
                window: config.fixed_duration(),
            },
            RecordingMode::SilenceTimeout => RecordingStrategy::SilenceTimeout {
                silence: config.silence_timeout(),
                max: config.max_recording_ms.map(Duration::from_millis),
            },
        }
    }
}

/// Outcome of a recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Speech(String),
    /// Nothing was said before capture stopped
    Empty,
}

/// Record one turn into `buffer` using `strategy`
pub async fn record(
    input: &dyn SpeechInput,
    strategy: &RecordingStrategy,
    buffer: &mut CaptureBuffer,
) -> Result<Capture, RecognitionError> {
    buffer.clear();
    let mut session = input.start_capture().await?;
    let started = Instant::now();

    let result = match *strategy {
        RecordingStrategy::FixedDuration { window } => {
            let deadline = tokio::time::sleep(window);
            tokio::pin!(deadline);
            let mut open = true;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut deadline => break Ok(()),
                    chunk = session.next_chunk(), if open => match chunk {
                        Some(Ok(chunk)) => accept(buffer, &chunk, false),
                        Some(Err(e)) if e.is_benign() => open = false,
                        Some(Err(e)) => break Err(e),
                        // The window is wall-clock; keep waiting for it
                        None => open = false,
                    },
                }
            }
        }
        RecordingStrategy::SilenceTimeout { silence, max } => {
            let idle = tokio::time::sleep(silence);
            tokio::pin!(idle);
            let cap = tokio::time::sleep(max.unwrap_or(Duration::MAX / 4));
            tokio::pin!(cap);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut idle => {
                        tracing::debug!("Silence timeout reached");
                        break Ok(());
                    }
                    _ = &mut cap, if max.is_some() => {
                        tracing::debug!("Maximum recording length reached");
                        break Ok(());
                    }
                    chunk = session.next_chunk() => match chunk {
                        Some(Ok(chunk)) => {
                            accept(buffer, &chunk, true);
                            idle.as_mut().reset(Instant::now() + silence);
                        }
                        Some(Err(e)) if e.is_benign() => break Ok(()),
                        Some(Err(e)) => break Err(e),
                        None => break Ok(()),
                    },
                }
            }
        }
    };

    session.stop();
    result?;

    let text = buffer.trimmed();
    tracing::info!(
        "Recording finished after {:?} ({} chars)",
        started.elapsed(),
        text.len()
    );

    if text.is_empty() {
        Ok(Capture::Empty)
    } else {
        Ok(Capture::Speech(text))
    }
}

fn accept(buffer: &mut CaptureBuffer, chunk: &TranscriptChunk, log_interim: bool) {
    if chunk.is_final {
        buffer.push_final(&chunk.text);
    } else if log_interim {
        tracing::trace!("Interim transcript: {}", chunk.text);
    }
}

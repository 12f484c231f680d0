//! Backend-assisted speech adapters
//!
//! [`RemoteSpeechOutput`] synthesises prompts through the backend and plays
//! them with the system audio player, falling back to a local output when
//! synthesis or playback fails. [`TranscribingSpeechInput`] turns recorded
//! clips into transcripts through the backend's transcription endpoint, with
//! clips recorded by an external command through [`CommandClipSource`].

use super::{
    CaptureSession, RecognitionError, SpeechError, SpeechInput, SpeechOutput, TranscriptChunk,
};
use crate::backend::{BackendClient, ServiceError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Turns text into playable audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Turns recorded audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, ServiceError>;
}

/// Supplies recorded audio clips, one per spoken turn
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// Next clip, or `None` when the source is exhausted
    async fn next_clip(&self) -> Result<Option<Vec<u8>>, RecognitionError>;
}

#[async_trait]
impl Synthesizer for BackendClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        self.synthesize_speech(text).await
    }
}

#[async_trait]
impl Transcriber for BackendClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, ServiceError> {
        self.transcribe_audio(audio).await
    }
}

/// Plays audio bytes through an external player command
#[derive(Debug, Clone)]
pub struct AudioPlayer {
    command: String,
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AudioPlayer {
    /// Create a player, using the platform default when `command` is None
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.unwrap_or_else(|| Self::default_command().to_string()),
        }
    }

    fn default_command() -> &'static str {
        if cfg!(target_os = "macos") {
            "afplay"
        } else {
            "paplay"
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Play `audio` to completion
    pub async fn play(&self, audio: &[u8]) -> Result<(), SpeechError> {
        let path: PathBuf =
            std::env::temp_dir().join(format!("parley_prompt_{}.wav", uuid::Uuid::new_v4()));

        tokio::fs::write(&path, audio)
            .await
            .map_err(|e| SpeechError::Playback(format!("Failed to write audio: {}", e)))?;

        let status = tokio::process::Command::new(&self.command)
            .arg(&path)
            .status()
            .await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!("Failed to remove prompt audio {:?}: {}", path, e);
        }

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(SpeechError::Playback(format!(
                "{} exited with {}",
                self.command, status
            ))),
            Err(e) => Err(SpeechError::Playback(format!(
                "Failed to run {}: {}",
                self.command, e
            ))),
        }
    }
}

/// Records one clip per call by running an external recorder
///
/// The command line is split on whitespace and must write a WAV clip to
/// stdout, e.g. `arecord -q -d 4 -f cd -t wav` or `sox -q -d -t wav - trim 0 4`.
#[derive(Debug, Clone)]
pub struct CommandClipSource {
    program: String,
    args: Vec<String>,
}

impl CommandClipSource {
    /// Parse a recorder command line; `None` when it is blank
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ClipSource for CommandClipSource {
    async fn next_clip(&self) -> Result<Option<Vec<u8>>, RecognitionError> {
        // Stopping a capture drops this future; the recorder must not outlive it
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RecognitionError::Device(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(RecognitionError::Device(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        tracing::debug!("Recorded clip of {} bytes", output.stdout.len());
        Ok(Some(output.stdout))
    }
}

/// Speech output that synthesises remotely with a local fallback
pub struct RemoteSpeechOutput {
    synthesizer: Arc<dyn Synthesizer>,
    player: AudioPlayer,
    fallback: Arc<dyn SpeechOutput>,
}

impl RemoteSpeechOutput {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        player: AudioPlayer,
        fallback: Arc<dyn SpeechOutput>,
    ) -> Self {
        Self {
            synthesizer,
            player,
            fallback,
        }
    }

    async fn speak_remote(&self, text: &str) -> Result<(), SpeechError> {
        let audio = self
            .synthesizer
            .synthesize(text)
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;
        self.player.play(&audio).await
    }
}

#[async_trait]
impl SpeechOutput for RemoteSpeechOutput {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        match self.speak_remote(text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("Remote speech failed, using local output: {}", e);
                self.fallback.speak(text).await
            }
        }
    }
}

/// Speech input that transcribes recorded clips through a [`Transcriber`]
pub struct TranscribingSpeechInput {
    clips: Arc<dyn ClipSource>,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscribingSpeechInput {
    pub fn new(clips: Arc<dyn ClipSource>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self { clips, transcriber }
    }
}

async fn transcribe_clip(
    transcriber: &dyn Transcriber,
    clip: &[u8],
) -> Result<String, RecognitionError> {
    if clip.is_empty() {
        return Ok(String::new());
    }
    transcriber
        .transcribe(clip)
        .await
        .map_err(|e| RecognitionError::Transcription(e.to_string()))
}

#[async_trait]
impl SpeechInput for TranscribingSpeechInput {
    async fn recognize_once(&self) -> Result<String, RecognitionError> {
        let clip = self
            .clips
            .next_clip()
            .await?
            .ok_or(RecognitionError::NoSpeech)?;
        transcribe_clip(self.transcriber.as_ref(), &clip).await
    }

    async fn start_capture(&self) -> Result<CaptureSession, RecognitionError> {
        let (mut feed, session) = CaptureSession::channel(16);
        let clips = self.clips.clone();
        let transcriber = self.transcriber.clone();

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = feed.stopped() => break,
                    next = clips.next_clip() => next,
                };

                let chunk = match next {
                    Ok(Some(clip)) if clip.is_empty() => continue,
                    Ok(Some(clip)) => transcribe_clip(transcriber.as_ref(), &clip)
                        .await
                        .map(TranscriptChunk::final_text),
                    Ok(None) => break,
                    Err(e) => Err(e),
                };

                let failed = chunk.is_err();
                if !feed.push(chunk).await || failed {
                    break;
                }
            }
            tracing::debug!("Clip capture finished");
        });

        Ok(session)
    }
}

//! Terminal speech adapters
//!
//! Local stand-ins for the speech ports: prompts are printed, and every line
//! read from the input is treated as one final transcript. These keep the
//! dialog fully usable without audio hardware, and are the local fallback
//! for remote synthesis.

use super::{
    CaptureSession, RecognitionError, SpeechError, SpeechInput, SpeechOutput, TranscriptChunk,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Prints prompts to stdout
#[derive(Debug, Default, Clone)]
pub struct ConsoleSpeechOutput;

#[async_trait]
impl SpeechOutput for ConsoleSpeechOutput {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("assistant: {}\n", text).as_bytes())
            .await
            .map_err(|e| SpeechError::Playback(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| SpeechError::Playback(e.to_string()))
    }
}

/// Speech input backed by a line-oriented reader
pub struct LineSpeechInput<R> {
    lines: Arc<Mutex<Lines<R>>>,
}

/// Speech input that reads typed lines from stdin
pub type ConsoleSpeechInput = LineSpeechInput<BufReader<Stdin>>;

impl ConsoleSpeechInput {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> LineSpeechInput<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: Arc::new(Mutex::new(reader.lines())),
        }
    }
}

#[async_trait]
impl<R> SpeechInput for LineSpeechInput<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn recognize_once(&self) -> Result<String, RecognitionError> {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(RecognitionError::Device("input closed".to_string())),
            Err(e) => Err(RecognitionError::Device(e.to_string())),
        }
    }

    async fn start_capture(&self) -> Result<CaptureSession, RecognitionError> {
        let (mut feed, session) = CaptureSession::channel(32);
        let lines = self.lines.clone();

        tokio::spawn(async move {
            let mut lines = lines.lock().await;
            loop {
                tokio::select! {
                    _ = feed.stopped() => break,
                    line = lines.next_line() => {
                        let delivered = match line {
                            Ok(Some(line)) => feed.push(Ok(TranscriptChunk::final_text(line))).await,
                            Ok(None) => break,
                            Err(e) => {
                                feed.push(Err(RecognitionError::Device(e.to_string()))).await;
                                break;
                            }
                        };
                        if !delivered {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Line capture finished");
        });

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &'static str) -> LineSpeechInput<BufReader<&'static [u8]>> {
        LineSpeechInput::new(BufReader::new(text.as_bytes()))
    }

    #[tokio::test]
    async fn test_recognize_once_reads_one_line() {
        let input = input("yes please\nno\n");
        assert_eq!(input.recognize_once().await.unwrap(), "yes please");
        assert_eq!(input.recognize_once().await.unwrap(), "no");
    }

    #[tokio::test]
    async fn test_recognize_once_at_end_of_input_fails() {
        let input = input("");
        assert!(matches!(
            input.recognize_once().await,
            Err(RecognitionError::Device(_))
        ));
    }

    #[tokio::test]
    async fn test_capture_streams_lines_as_final_chunks() {
        let input = input("confirm the meeting\nat noon\n");
        let mut session = input.start_capture().await.unwrap();

        assert_eq!(
            session.next_chunk().await,
            Some(Ok(TranscriptChunk::final_text("confirm the meeting")))
        );
        assert_eq!(
            session.next_chunk().await,
            Some(Ok(TranscriptChunk::final_text("at noon")))
        );
        assert_eq!(session.next_chunk().await, None);
    }
}

//! Parley - Hands-free email replies
//!
//! Reads pending email aloud, takes a dictated reply, drafts it through the
//! backend, and sends it once the user confirms, all by voice.

pub mod backend;
pub mod config;
pub mod handsfree;
pub mod inbox;
pub mod logging;
pub mod speech;

use backend::{BackendClient, ServiceError};
use handsfree::{DialogPorts, EventSink, HandsfreeManager};
use speech::{
    AudioPlayer, CommandClipSource, ConsoleSpeechOutput, RemoteSpeechOutput, SpeechInput,
    SpeechOutput, TranscribingSpeechInput,
};
use std::sync::Arc;

/// Wire the speech ports and the HTTP backend into a manager
///
/// Prompts are printed to the terminal. With `speech.remote_synthesis`
/// enabled they are synthesised by the backend and played locally instead,
/// falling back to printed text. Answers come from `input` unless
/// `speech.record_command` names a recorder, in which case each clip it
/// records is transcribed by the backend.
pub fn build_manager(
    config: &config::Config,
    input: Arc<dyn SpeechInput>,
    events: Arc<dyn EventSink>,
) -> Result<HandsfreeManager, ServiceError> {
    let client = Arc::new(BackendClient::new(&config.backend)?);
    let login_url = client.login_url();

    let console: Arc<dyn SpeechOutput> = Arc::new(ConsoleSpeechOutput);
    let output: Arc<dyn SpeechOutput> = if config.speech.remote_synthesis {
        tracing::info!("Using backend speech synthesis");
        Arc::new(RemoteSpeechOutput::new(
            client.clone(),
            AudioPlayer::new(config.speech.player_command.clone()),
            console,
        ))
    } else {
        console
    };

    let input: Arc<dyn SpeechInput> = match config
        .speech
        .record_command
        .as_deref()
        .and_then(CommandClipSource::parse)
    {
        Some(recorder) => {
            tracing::info!("Recording answers with {}", recorder.program());
            Arc::new(TranscribingSpeechInput::new(
                Arc::new(recorder),
                client.clone(),
            ))
        }
        None => input,
    };

    let ports = DialogPorts {
        output,
        input,
        queue: client.clone(),
        replies: client,
        events,
    };

    Ok(
        HandsfreeManager::new(ports, config.dialog.clone(), config.prompts.clone())
            .with_login_url(login_url),
    )
}

//! Terminal front end for the hands-free reply dialog.
//!
//! Each line typed stands in for one spoken answer, unless a recorder command
//! is configured. Press Enter on an empty prompt to start a conversation
//! about the current message.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use parley_lib::config::{self, Config, RecordingMode};
use parley_lib::handsfree::{ChannelSink, DialogEvent, DialogState, SessionOutcome};
use parley_lib::speech::{ConsoleSpeechInput, RecognitionError, SpeechInput};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RecordingArg {
    /// Stop after a fixed window
    Fixed,
    /// Stop after a pause in speech
    Silence,
}

#[derive(Debug, Parser)]
#[command(name = "parley", version, about = "Hands-free email replies by voice")]
struct Cli {
    /// Config file to use instead of ~/.parley/config.json
    #[arg(long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, env = "PARLEY_BASE_URL")]
    base_url: Option<String>,

    /// Session cookie sent with every backend request
    #[arg(long, env = "PARLEY_SESSION_COOKIE", hide_env_values = true)]
    session_cookie: Option<String>,

    /// Recording endpointing strategy
    #[arg(long, value_enum)]
    recording: Option<RecordingArg>,

    /// Move straight on to the next message after sending or skipping
    #[arg(long)]
    auto_continue: bool,

    /// Synthesise prompts through the backend and play them aloud
    #[arg(long)]
    remote_speech: bool,

    /// Recorder command writing a WAV clip to stdout; answers are then
    /// spoken and transcribed by the backend instead of typed
    #[arg(long, env = "PARLEY_RECORD_COMMAND")]
    record_command: Option<String>,

    /// Write the default configuration and exit
    #[arg(long)]
    reset_config: bool,

    /// Save the effective configuration (including overrides) and exit
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => config::load_from_path(path)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => config::get_config(),
        };

        if let Some(base_url) = &self.base_url {
            config.backend.base_url = base_url.clone();
        }
        if let Some(cookie) = &self.session_cookie {
            config.backend.session_cookie = Some(cookie.clone());
        }
        if let Some(recording) = self.recording {
            config.dialog.recording_mode = match recording {
                RecordingArg::Fixed => RecordingMode::FixedDuration,
                RecordingArg::Silence => RecordingMode::SilenceTimeout,
            };
        }
        if self.auto_continue {
            config.dialog.auto_continue = true;
        }
        if self.remote_speech {
            config.speech.remote_synthesis = true;
        }
        if let Some(command) = &self.record_command {
            config.speech.record_command = Some(command.clone());
        }

        Ok(config)
    }

    fn save_config(&self, config: &Config) -> Result<PathBuf> {
        match &self.config {
            Some(path) => {
                config::save_to_path(path, config).map_err(anyhow::Error::msg)?;
                Ok(path.clone())
            }
            None => {
                config::set_config(config.clone()).map_err(anyhow::Error::msg)?;
                Ok(config::get_config_path())
            }
        }
    }
}

/// Show what a browser front end would render
fn render_event(event: &DialogEvent) {
    match event {
        DialogEvent::MessageLoaded {
            subject,
            body,
            position,
            total,
            ..
        } => {
            println!("\n--- Message {}/{}: {} ---\n{}\n", position, total, subject, body);
        }
        DialogEvent::DraftUpdated { text, .. } => println!("\n--- Draft ---\n{}\n", text),
        DialogEvent::Unauthorized { login_url } => match login_url {
            Some(url) => println!("You are signed out. Sign in at {} and try again.", url),
            None => println!("You are signed out."),
        },
        DialogEvent::StateChanged { new, .. } if *new == DialogState::Idle => {
            println!("(press Enter to continue, or type quit)");
        }
        other => tracing::debug!("Dialog event: {:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    parley_lib::logging::init();

    if cli.reset_config {
        let defaults = Config::default();
        let path = cli.save_config(&defaults)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = cli.load_config()?;
    if cli.write_config {
        let path = cli.save_config(&config)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    tracing::info!(
        "Parley starting (backend: {}, recording: {:?})",
        config.backend.base_url,
        config.dialog.recording_mode
    );

    let input = Arc::new(ConsoleSpeechInput::stdin());
    let (sink, mut events) = ChannelSink::new();
    let manager = parley_lib::build_manager(&config, input.clone(), Arc::new(sink))
        .context("failed to set up backend client")?;

    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render_event(&event);
        }
    });

    println!("Press Enter to start, or type quit to exit.");
    loop {
        let line = match input.recognize_once().await {
            Ok(line) => line,
            Err(RecognitionError::Device(reason)) => {
                tracing::info!("Input finished: {}", reason);
                break;
            }
            Err(e) => return Err(e.into()),
        };

        match line.trim().to_lowercase().as_str() {
            "quit" | "exit" => break,
            "status" => {
                println!("{}", serde_json::to_string_pretty(&manager.status())?);
                continue;
            }
            _ => {}
        }

        match manager.start().await {
            Ok(SessionOutcome::QueueComplete) => {
                println!("Nothing left to reply to.");
            }
            Ok(outcome) => tracing::info!("Conversation ended: {:?}", outcome),
            Err(e) => eprintln!("Conversation ended with an error: {}", e),
        }
    }

    drop(manager);
    renderer.abort();
    Ok(())
}

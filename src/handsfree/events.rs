//! Dialog events
//!
//! Everything a front end needs to mirror the conversation: state changes,
//! the loaded message, draft updates and failures. Events are delivered
//! through an [`EventSink`].

use super::state::{DialogState, TransitionReason};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogEvent {
    /// Emitted on every state transition
    StateChanged {
        previous: DialogState,
        new: DialogState,
        reason: TransitionReason,
        description: String,
    },
    /// A message was fetched and is now current
    MessageLoaded {
        message_id: String,
        subject: String,
        body: String,
        summary: String,
        /// 1-based position in the queue
        position: usize,
        total: usize,
    },
    DraftUpdated {
        message_id: String,
        text: String,
    },
    /// An answer was not understood or a recording was empty
    Reprompt {
        state: DialogState,
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
        attempt: u32,
    },
    ReplySent {
        message_id: String,
    },
    QueueAdvanced {
        cursor: usize,
        remaining: usize,
    },
    QueueComplete,
    /// The backend rejected our credentials; message content must be hidden
    Unauthorized {
        #[serde(skip_serializing_if = "Option::is_none")]
        login_url: Option<String>,
    },
    Error {
        message: String,
    },
}

impl DialogEvent {
    pub fn state_changed(
        previous: DialogState,
        new: DialogState,
        reason: TransitionReason,
    ) -> Self {
        DialogEvent::StateChanged {
            previous,
            new,
            reason,
            description: new.description().to_string(),
        }
    }
}

/// Receives dialog events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DialogEvent);
}

/// Logs events; used when nothing else is listening
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: DialogEvent) {
        match &event {
            DialogEvent::StateChanged { previous, new, .. } => {
                tracing::debug!("Dialog state: {:?} -> {:?}", previous, new);
            }
            DialogEvent::Error { message } => tracing::warn!("Dialog error: {}", message),
            other => tracing::debug!("Dialog event: {:?}", other),
        }
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DialogEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DialogEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: DialogEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Dialog event dropped, receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_changed_serialisation() {
        let event = DialogEvent::state_changed(
            DialogState::Idle,
            DialogState::AskReplaySummary,
            TransitionReason::UserActivation,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["new"], "ask_replay_summary");
        assert_eq!(json["reason"]["kind"], "user_activation");
        assert_eq!(json["description"], "Offering to read the summary");
    }

    #[test]
    fn test_unauthorized_omits_missing_login_url() {
        let json = serde_json::to_string(&DialogEvent::Unauthorized { login_url: None }).unwrap();
        assert_eq!(json, r#"{"type":"unauthorized"}"#);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(DialogEvent::QueueComplete);
        assert_eq!(rx.recv().await, Some(DialogEvent::QueueComplete));

        drop(rx);
        // Emitting after the receiver is gone is harmless
        sink.emit(DialogEvent::QueueComplete);
    }
}

//! Hands-free dialog state machine
//!
//! Defines the dialog states and the transition table that maps a classified
//! user intent in a listening state to the next state plus the side effect to
//! run on the way. The table is pure; the manager executes the effects.

use super::intent::Intent;
use serde::{Deserialize, Serialize};

/// Dialog state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// No conversation running
    #[default]
    Idle,
    /// Asking whether to read the message summary
    AskReplaySummary,
    /// Asking whether to dictate a reply
    AskRecordReply,
    /// Capturing the reply instructions
    RecordingReply,
    /// Asking whether to read the drafted reply
    ConfirmReadReply,
    /// Asking whether to send, edit, read or skip the draft
    AskEditOrSend,
    /// Capturing edit instructions
    RecordingEdit,
    /// Final yes/no before sending
    ConfirmSendFinal,
}

impl DialogState {
    /// Returns a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            DialogState::Idle => "Waiting to start",
            DialogState::AskReplaySummary => "Offering to read the summary",
            DialogState::AskRecordReply => "Offering to record a reply",
            DialogState::RecordingReply => "Recording reply",
            DialogState::ConfirmReadReply => "Offering to read the draft",
            DialogState::AskEditOrSend => "Asking to send, edit or skip",
            DialogState::RecordingEdit => "Recording edit instructions",
            DialogState::ConfirmSendFinal => "Confirming send",
        }
    }

    /// Whether a recording sub-protocol runs in this state
    pub fn is_recording(&self) -> bool {
        matches!(self, DialogState::RecordingReply | DialogState::RecordingEdit)
    }

    /// Whether this state listens for a classified answer
    pub fn is_listening(&self) -> bool {
        !matches!(self, DialogState::Idle) && !self.is_recording()
    }
}

/// Side effect to run while taking a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Speak the message summary
    ReadSummary,
    /// Speak the current draft
    ReadDraft,
    /// Send the current draft, then advance the queue
    SendReply,
    /// Leave the message unanswered and advance the queue
    AdvanceQueue,
}

/// Reason for entering a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionReason {
    /// User started the dialog
    UserActivation,
    /// User answered with a recognised intent
    UserIntent { intent: Intent },
    /// A recording finished and its result was processed
    CaptureComplete,
    /// User declined to continue
    Aborted,
    /// Reply delivered
    ReplySent,
    /// Message left unanswered
    MessageSkipped,
    /// Too many re-prompts in one state
    RetriesExhausted,
    /// Error occurred during the dialog
    Error { message: String },
}

/// Result of looking up a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: DialogState,
    pub effect: Effect,
}

const fn to(next: DialogState, effect: Effect) -> Option<Transition> {
    Some(Transition { next, effect })
}

/// Look up the transition for `intent` in `state`
///
/// Returns `None` when the intent is not meaningful in this state; the caller
/// re-prompts and stays put.
pub fn transition(state: DialogState, intent: Intent) -> Option<Transition> {
    use DialogState::*;
    use Intent::*;

    match (state, intent) {
        (AskReplaySummary, Yes) => to(AskRecordReply, Effect::ReadSummary),
        (AskReplaySummary, No) => to(Idle, Effect::None),

        (AskRecordReply, Yes) => to(RecordingReply, Effect::None),
        (AskRecordReply, No) => to(Idle, Effect::None),
        (AskRecordReply, Skip) => to(Idle, Effect::AdvanceQueue),

        (ConfirmReadReply, Yes) => to(AskEditOrSend, Effect::ReadDraft),
        (ConfirmReadReply, No) => to(AskEditOrSend, Effect::None),

        (AskEditOrSend, Send) => to(ConfirmSendFinal, Effect::None),
        (AskEditOrSend, Read) => to(AskEditOrSend, Effect::ReadDraft),
        (AskEditOrSend, No | Skip) => to(Idle, Effect::AdvanceQueue),
        (AskEditOrSend, Edit) => to(RecordingEdit, Effect::None),

        (ConfirmSendFinal, Yes) => to(Idle, Effect::SendReply),
        (ConfirmSendFinal, No | Skip) => to(Idle, Effect::AdvanceQueue),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(DialogState::default(), DialogState::Idle);
    }

    #[test]
    fn test_summary_yes_reads_summary_then_offers_recording() {
        let t = transition(DialogState::AskReplaySummary, Intent::Yes).unwrap();
        assert_eq!(t.next, DialogState::AskRecordReply);
        assert_eq!(t.effect, Effect::ReadSummary);
    }

    #[test]
    fn test_summary_no_aborts_without_touching_queue() {
        let t = transition(DialogState::AskReplaySummary, Intent::No).unwrap();
        assert_eq!(t.next, DialogState::Idle);
        assert_eq!(t.effect, Effect::None);
    }

    #[test]
    fn test_record_reply_no_aborts_but_skip_advances() {
        let no = transition(DialogState::AskRecordReply, Intent::No).unwrap();
        assert_eq!(no.effect, Effect::None);

        let skip = transition(DialogState::AskRecordReply, Intent::Skip).unwrap();
        assert_eq!(skip.next, DialogState::Idle);
        assert_eq!(skip.effect, Effect::AdvanceQueue);
    }

    #[test]
    fn test_confirm_read_reply_always_reaches_edit_or_send() {
        let yes = transition(DialogState::ConfirmReadReply, Intent::Yes).unwrap();
        assert_eq!(yes.next, DialogState::AskEditOrSend);
        assert_eq!(yes.effect, Effect::ReadDraft);

        let no = transition(DialogState::ConfirmReadReply, Intent::No).unwrap();
        assert_eq!(no.next, DialogState::AskEditOrSend);
        assert_eq!(no.effect, Effect::None);
    }

    #[test]
    fn test_edit_or_send_branches() {
        assert_eq!(
            transition(DialogState::AskEditOrSend, Intent::Edit).unwrap().next,
            DialogState::RecordingEdit
        );
        assert_eq!(
            transition(DialogState::AskEditOrSend, Intent::Send).unwrap().next,
            DialogState::ConfirmSendFinal
        );
        assert_eq!(
            transition(DialogState::AskEditOrSend, Intent::Skip)
                .unwrap()
                .effect,
            Effect::AdvanceQueue
        );
        let read = transition(DialogState::AskEditOrSend, Intent::Read).unwrap();
        assert_eq!(read.next, DialogState::AskEditOrSend);
        assert_eq!(read.effect, Effect::ReadDraft);
    }

    #[test]
    fn test_confirm_send_final() {
        assert_eq!(
            transition(DialogState::ConfirmSendFinal, Intent::Yes),
            Some(Transition {
                next: DialogState::Idle,
                effect: Effect::SendReply
            })
        );
        assert_eq!(
            transition(DialogState::ConfirmSendFinal, Intent::No),
            Some(Transition {
                next: DialogState::Idle,
                effect: Effect::AdvanceQueue
            })
        );
        // Editing is not offered at the final confirmation
        assert_eq!(transition(DialogState::ConfirmSendFinal, Intent::Edit), None);
    }

    #[test]
    fn test_unrecognized_never_transitions() {
        for state in [
            DialogState::Idle,
            DialogState::AskReplaySummary,
            DialogState::AskRecordReply,
            DialogState::RecordingReply,
            DialogState::ConfirmReadReply,
            DialogState::AskEditOrSend,
            DialogState::RecordingEdit,
            DialogState::ConfirmSendFinal,
        ] {
            assert_eq!(transition(state, Intent::Unrecognized), None, "{:?}", state);
        }
    }

    #[test]
    fn test_recording_states_are_not_intent_driven() {
        assert_eq!(transition(DialogState::RecordingReply, Intent::Yes), None);
        assert_eq!(transition(DialogState::RecordingEdit, Intent::Edit), None);
        assert!(DialogState::RecordingReply.is_recording());
        assert!(!DialogState::RecordingEdit.is_listening());
        assert!(DialogState::ConfirmSendFinal.is_listening());
        assert!(!DialogState::Idle.is_listening());
    }

    #[test]
    fn test_reason_serialisation() {
        let reason = TransitionReason::UserIntent {
            intent: Intent::Yes,
        };
        let json = serde_json::to_string(&reason).unwrap();
        assert_eq!(json, r#"{"kind":"user_intent","intent":"yes"}"#);
    }
}

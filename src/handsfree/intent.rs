//! Intent classification
//!
//! Transcripts are matched against an ordered keyword rule list for the
//! current state. Matching is substring containment on the lower-cased,
//! trimmed transcript, so one transcript can contain several keywords; the
//! first rule in the list wins. Per state the order is: affirmative
//! ("yes", or "send" where it plays that role), then "no"/"skip", then
//! "edit", then "next", then anything else.

use super::state::DialogState;
use serde::{Deserialize, Serialize};

/// Classified meaning of an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Yes,
    No,
    /// Move on to the next message ("skip" or "next")
    Skip,
    Edit,
    Read,
    Send,
    Unrecognized,
}

/// One keyword-to-intent rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentRule {
    pub keyword: &'static str,
    pub intent: Intent,
}

const fn rule(keyword: &'static str, intent: Intent) -> IntentRule {
    IntentRule { keyword, intent }
}

const YES_NO: &[IntentRule] = &[rule("yes", Intent::Yes), rule("no", Intent::No)];

const YES_NO_NEXT: &[IntentRule] = &[
    rule("yes", Intent::Yes),
    rule("no", Intent::No),
    rule("skip", Intent::Skip),
    rule("next", Intent::Skip),
];

const EDIT_OR_SEND: &[IntentRule] = &[
    rule("send", Intent::Send),
    rule("no", Intent::No),
    rule("skip", Intent::Skip),
    rule("edit", Intent::Edit),
    rule("next", Intent::Skip),
    rule("read", Intent::Read),
];

// "send" is only a fallback for yes; any refusal outranks it
const CONFIRM_SEND: &[IntentRule] = &[
    rule("yes", Intent::Yes),
    rule("no", Intent::No),
    rule("skip", Intent::Skip),
    rule("next", Intent::Skip),
    rule("send", Intent::Yes),
];

/// Ordered rules consulted in `state`; empty where no answer is expected
pub fn rules_for(state: DialogState) -> &'static [IntentRule] {
    match state {
        DialogState::AskReplaySummary | DialogState::ConfirmReadReply => YES_NO,
        DialogState::AskRecordReply => YES_NO_NEXT,
        DialogState::AskEditOrSend => EDIT_OR_SEND,
        DialogState::ConfirmSendFinal => CONFIRM_SEND,
        DialogState::Idle | DialogState::RecordingReply | DialogState::RecordingEdit => &[],
    }
}

pub fn normalize(transcript: &str) -> String {
    transcript.trim().to_lowercase()
}

/// Classify a transcript heard in `state`
pub fn classify(state: DialogState, transcript: &str) -> Intent {
    let normalized = normalize(transcript);
    if normalized.is_empty() {
        return Intent::Unrecognized;
    }

    rules_for(state)
        .iter()
        .find(|rule| normalized.contains(rule.keyword))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::Unrecognized)
}

/// A transcript together with its classified intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub transcript: String,
    pub intent: Intent,
}

impl Utterance {
    pub fn classify(state: DialogState, transcript: impl Into<String>) -> Self {
        let transcript = transcript.into();
        let intent = classify(state, &transcript);
        Self { transcript, intent }
    }
}

//! Hands-free reply dialog
//!
//! Walks the user through the pending messages by voice: offer to read the
//! summary, record a reply, draft it through the backend, offer to read it
//! back, then send, edit, or skip.
//!
//! ## States
//!
//! 1. **IDLE** - Waiting for the user to start a conversation
//! 2. **ASK_REPLAY_SUMMARY** - "Read the summary?" (yes / no)
//! 3. **ASK_RECORD_REPLY** - "Record a reply?" (yes / no / next)
//! 4. **RECORDING_REPLY** - Capturing reply instructions
//! 5. **CONFIRM_READ_REPLY** - "Read the draft?" (yes / no)
//! 6. **ASK_EDIT_OR_SEND** - send / edit / read / skip
//! 7. **RECORDING_EDIT** - Capturing edit instructions
//! 8. **CONFIRM_SEND_FINAL** - "Send it?" (yes / no)
//!
//! ## State Transitions
//!
//! ```text
//! ┌──────┐ start ┌──────────────────┐ yes ┌────────────────┐ yes ┌─────────────────┐
//! │ IDLE │──────►│ASK_REPLAY_SUMMARY│────►│ASK_RECORD_REPLY│────►│ RECORDING_REPLY │
//! └──────┘       └──────────────────┘     └────────────────┘     └─────────────────┘
//!    ▲                  │ no                 │ no    │ next               │ drafted
//!    │◄─────────────────┴────────────────────┘       │                    ▼
//!    │                                       advance │          ┌──────────────────┐
//!    │◄──────────────────────────────────────────────┘          │CONFIRM_READ_REPLY│
//!    │                                                          └──────────────────┘
//!    │                                                                    │ yes / no
//!    │                 no / skip      ┌────────────────┐◄─────────────────┘
//!    │◄───────────────────────────────│ASK_EDIT_OR_SEND│◄─┐ read
//!    │                                └────────────────┘──┘
//!    │                                 │ edit       │ send
//!    │                                 ▼            ▼
//!    │                      ┌──────────────┐ revised ┌──────────────────┐
//!    │                      │RECORDING_EDIT│────────►│CONFIRM_SEND_FINAL│
//!    │                      └──────────────┘         └──────────────────┘
//!    │               send (yes) / skip (no)                   │
//!    │◄───────────────────────────────────────────────────────┘
//! ```
//!
//! Unrecognised answers re-ask the same question, up to `max_retries` times.
//! An empty recording re-asks for the recording. Backend and recognition
//! failures drop the conversation back to IDLE.
//!
//! ## Events
//!
//! Every transition is reported as a [`DialogEvent::StateChanged`], alongside
//! message, draft, and queue events, through the configured [`EventSink`].

pub mod events;
pub mod intent;
pub mod manager;
pub mod recording;
pub mod session;
pub mod state;

pub use events::{ChannelSink, DialogEvent, EventSink, TracingSink};
pub use intent::{classify, Intent, IntentRule, Utterance};
pub use manager::{DialogError, DialogPorts, HandsfreeManager, HandsfreeStatus, SessionOutcome};
pub use recording::{Capture, CaptureBuffer, RecordingStrategy};
pub use session::DialogSession;
pub use state::{transition, DialogState, Effect, Transition, TransitionReason};

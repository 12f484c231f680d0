//! Hands-free dialog manager
//!
//! Runs one conversation at a time over the speech ports and the email
//! backend: prompt, listen, classify, branch, and finally send or skip the
//! current message before moving the queue forward.

use super::events::{DialogEvent, EventSink};
use super::intent::{Intent, Utterance};
use super::recording::{self, Capture, RecordingStrategy};
use super::session::DialogSession;
use super::state::{transition, DialogState, Effect, Transition, TransitionReason};
use crate::backend::{EmailQueue, ReplyService, RevisionRequest, ServiceError};
use crate::config::{DialogConfig, PromptConfig};
use crate::inbox::{ActiveMessage, Inbox};
use crate::speech::{RecognitionError, SpeechError, SpeechInput, SpeechOutput};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Errors that end a conversation
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error("No message is loaded")]
    NoActiveMessage,

    #[error("No draft to {0}")]
    NoDraft(&'static str),
}

/// How a call to [`HandsfreeManager::start`] ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// A conversation was already running; nothing happened
    Busy,
    /// The user declined; the message stays current
    Aborted,
    Sent { message_id: String },
    Skipped { message_id: String },
    /// No messages left
    QueueComplete,
    /// Too many unrecognised answers in `state`
    GaveUp { state: DialogState },
}

impl SessionOutcome {
    /// Whether the current message was dealt with and the queue moved on
    pub fn disposed(&self) -> bool {
        matches!(
            self,
            SessionOutcome::Sent { .. } | SessionOutcome::Skipped { .. }
        )
    }
}

/// Snapshot of the manager for status displays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandsfreeStatus {
    pub running: bool,
    pub state: DialogState,
    pub description: String,
    /// Queue cursor and length, when known and not locked by a conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<(usize, usize)>,
}

/// Everything the dialog talks to
#[derive(Clone)]
pub struct DialogPorts {
    pub output: Arc<dyn SpeechOutput>,
    pub input: Arc<dyn SpeechInput>,
    pub queue: Arc<dyn EmailQueue>,
    pub replies: Arc<dyn ReplyService>,
    pub events: Arc<dyn EventSink>,
}

/// Hands-free manager
///
/// Owns the message queue across conversations and guarantees that only one
/// conversation runs at a time.
pub struct HandsfreeManager {
    ports: DialogPorts,
    config: DialogConfig,
    prompts: PromptConfig,
    login_url: Option<String>,
    running: AtomicBool,
    state: Mutex<DialogState>,
    inbox: tokio::sync::Mutex<Inbox>,
}

/// Clears the running flag when a conversation ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl HandsfreeManager {
    pub fn new(ports: DialogPorts, config: DialogConfig, prompts: PromptConfig) -> Self {
        Self {
            ports,
            config,
            prompts,
            login_url: None,
            running: AtomicBool::new(false),
            state: Mutex::new(DialogState::Idle),
            inbox: tokio::sync::Mutex::new(Inbox::new()),
        }
    }

    /// Where to send the user when the backend reports them signed out
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = Some(login_url.into());
        self
    }

    pub fn current_state(&self) -> DialogState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> HandsfreeStatus {
        let state = self.current_state();
        let position = self.inbox.try_lock().ok().and_then(|inbox| {
            inbox
                .queue()
                .map(|queue| (queue.cursor(), queue.len()))
        });
        HandsfreeStatus {
            running: self.is_running(),
            state,
            description: state.description().to_string(),
            position,
        }
    }

    /// Begin a hands-free conversation about the current message
    ///
    /// Returns `SessionOutcome::Busy` without speaking or changing state if a
    /// conversation is already running. With `auto_continue` set, a message
    /// that was sent or skipped is followed straight away by a conversation
    /// about the next one.
    pub async fn start(&self) -> Result<SessionOutcome, DialogError> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::info!("Hands-free dialog already running, ignoring start");
            return Ok(SessionOutcome::Busy);
        }
        let _guard = RunningGuard(&self.running);

        let mut inbox = self.inbox.lock().await;
        loop {
            let outcome = Conversation::new(self, &mut inbox).run().await?;
            tracing::info!("Hands-free dialog finished: {:?}", outcome);

            // A sign-out while loading the next message forgets the queue
            let has_next = inbox.is_loaded() && !inbox.is_complete();
            if !(self.config.auto_continue && outcome.disposed() && has_next) {
                return Ok(outcome);
            }
        }
    }

    fn set_state(&self, state: DialogState) {
        *self.state.lock() = state;
    }
}

/// Spoken prompt that opens `state`
fn prompt_for(prompts: &PromptConfig, state: DialogState) -> Option<&str> {
    let text = match state {
        DialogState::Idle => return None,
        DialogState::AskReplaySummary => &prompts.ask_replay_summary,
        DialogState::AskRecordReply => &prompts.ask_record_reply,
        DialogState::RecordingReply => &prompts.start_recording_reply,
        DialogState::ConfirmReadReply => &prompts.confirm_read_reply,
        DialogState::AskEditOrSend => &prompts.ask_edit_or_send,
        DialogState::RecordingEdit => &prompts.start_recording_edit,
        DialogState::ConfirmSendFinal => &prompts.confirm_send_final,
    };
    Some(text.as_str())
}

/// One run from `Idle` back to `Idle`
struct Conversation<'a> {
    manager: &'a HandsfreeManager,
    inbox: &'a mut Inbox,
    session: DialogSession,
}

/// `Some` ends the conversation, `None` keeps listening
type Step = Result<Option<SessionOutcome>, DialogError>;

impl<'a> Conversation<'a> {
    fn new(manager: &'a HandsfreeManager, inbox: &'a mut Inbox) -> Self {
        Self {
            manager,
            inbox,
            session: DialogSession::new(),
        }
    }

    async fn run(mut self) -> Result<SessionOutcome, DialogError> {
        match self.drive().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<SessionOutcome, DialogError> {
        let manager = self.manager;

        if !self.inbox.is_loaded() {
            let ids = manager.ports.queue.fetch_queue().await?;
            self.inbox.load(ids);
        }

        if self.inbox.is_complete() {
            tracing::info!("No messages left in the queue");
            self.emit(DialogEvent::QueueComplete);
            self.speak(&manager.prompts.queue_complete).await?;
            return Ok(SessionOutcome::QueueComplete);
        }

        if self.inbox.active().is_none() {
            self.load_current().await?;
        }

        self.enter(DialogState::AskReplaySummary, TransitionReason::UserActivation);
        self.speak_prompt(DialogState::AskReplaySummary).await?;

        loop {
            let state = self.session.state();
            let step = if state.is_recording() {
                self.record_turn(state).await?
            } else {
                self.converse(state).await?
            };
            if let Some(outcome) = step {
                return Ok(outcome);
            }
        }
    }

    /// Listen for one answer in `state` and act on it
    async fn converse(&mut self, state: DialogState) -> Step {
        let transcript = match self.manager.ports.input.recognize_once().await {
            Ok(transcript) => transcript,
            Err(e) if e.is_benign() => return self.reprompt(state, None).await,
            Err(e) => return Err(e.into()),
        };

        let utterance = Utterance::classify(state, transcript);
        tracing::info!(
            "Heard {:?} in {:?}: {:?}",
            utterance.intent,
            state,
            utterance.transcript
        );

        match transition(state, utterance.intent) {
            Some(next) => self.apply(utterance.intent, next).await,
            None => self.reprompt(state, Some(utterance.transcript)).await,
        }
    }

    async fn apply(&mut self, intent: Intent, transition: Transition) -> Step {
        match transition.effect {
            Effect::None => {}
            Effect::ReadSummary => {
                let summary = self.active()?.content.summary.clone();
                self.speak(&summary).await?;
            }
            Effect::ReadDraft => {
                let draft = self.draft("read")?;
                self.speak(&draft).await?;
            }
            Effect::SendReply => return self.send_reply().await.map(Some),
            Effect::AdvanceQueue => return self.skip_message().await.map(Some),
        }

        if transition.next == DialogState::Idle {
            tracing::info!("Dialog aborted by user");
            self.enter(DialogState::Idle, TransitionReason::Aborted);
            return Ok(Some(SessionOutcome::Aborted));
        }

        self.enter(transition.next, TransitionReason::UserIntent { intent });
        self.speak_prompt(transition.next).await?;
        Ok(None)
    }

    /// Re-ask the current question, or give up once retries run out
    async fn reprompt(&mut self, state: DialogState, transcript: Option<String>) -> Step {
        let manager = self.manager;
        let attempt = self.session.record_retry();

        if let Some(max) = manager.config.max_retries {
            if attempt > max {
                tracing::warn!("Giving up in {:?} after {} retries", state, max);
                self.speak(&manager.prompts.gave_up).await?;
                self.enter(DialogState::Idle, TransitionReason::RetriesExhausted);
                return Ok(Some(SessionOutcome::GaveUp { state }));
            }
        }

        tracing::debug!("Re-prompting in {:?} (attempt {})", state, attempt);
        self.emit(DialogEvent::Reprompt {
            state,
            transcript,
            attempt,
        });

        let lead = if state.is_recording() {
            &manager.prompts.no_speech
        } else {
            &manager.prompts.not_understood
        };
        let text = match prompt_for(&manager.prompts, state) {
            Some(prompt) => format!("{} {}", lead, prompt),
            None => lead.clone(),
        };
        self.speak(&text).await?;
        Ok(None)
    }

    /// Record reply or edit instructions and hand them to the backend
    async fn record_turn(&mut self, state: DialogState) -> Step {
        let manager = self.manager;
        let strategy = RecordingStrategy::from_config(&manager.config);

        let capture = recording::record(
            manager.ports.input.as_ref(),
            &strategy,
            self.session.buffer_mut(),
        )
        .await?;

        let instructions = match capture {
            Capture::Speech(text) => text,
            Capture::Empty => {
                tracing::info!("No speech captured in {:?}", state);
                return self.reprompt(state, None).await;
            }
        };

        let message = self.active()?.clone();

        if state == DialogState::RecordingEdit {
            let request = RevisionRequest {
                message_id: message.id.clone(),
                original_body: message.content.body.clone(),
                prior_draft: self.draft("revise")?,
                instructions,
            };
            let revised = manager.ports.replies.revise_reply(&request).await?;
            self.update_draft(&message, revised.clone());

            self.enter(DialogState::ConfirmSendFinal, TransitionReason::CaptureComplete);
            self.speak(&revised).await?;
            self.speak_prompt(DialogState::ConfirmSendFinal).await?;
        } else {
            let draft = manager
                .ports
                .replies
                .draft_reply(&instructions, &message.id)
                .await?;
            self.update_draft(&message, draft);

            self.enter(DialogState::ConfirmReadReply, TransitionReason::CaptureComplete);
            self.speak_prompt(DialogState::ConfirmReadReply).await?;
        }

        Ok(None)
    }

    async fn send_reply(&mut self) -> Result<SessionOutcome, DialogError> {
        let manager = self.manager;
        let message_id = self.active()?.id.clone();
        let draft = self.draft("send")?;

        let sent = manager.ports.replies.send_reply(&draft, &message_id).await?;
        if !sent {
            return Err(ServiceError::Rejected("the reply was not sent".to_string()).into());
        }

        tracing::info!("Reply sent for message {}", message_id);
        self.emit(DialogEvent::ReplySent {
            message_id: message_id.clone(),
        });
        self.speak(&manager.prompts.reply_sent).await?;
        self.advance().await;
        self.enter(DialogState::Idle, TransitionReason::ReplySent);

        Ok(SessionOutcome::Sent { message_id })
    }

    async fn skip_message(&mut self) -> Result<SessionOutcome, DialogError> {
        let message_id = self.active()?.id.clone();

        tracing::info!("Skipping message {}", message_id);
        self.speak(&self.manager.prompts.reply_skipped).await?;
        self.advance().await;
        self.enter(DialogState::Idle, TransitionReason::MessageSkipped);

        Ok(SessionOutcome::Skipped { message_id })
    }

    /// Move the queue forward and load the next message
    ///
    /// The current message is already dealt with, so failures here are only
    /// reported; the next conversation retries the load. A sign-out still
    /// clears the inbox like any other unauthorized call.
    async fn advance(&mut self) {
        let next = self.inbox.advance();
        if let Some(queue) = self.inbox.queue() {
            self.emit(DialogEvent::QueueAdvanced {
                cursor: queue.cursor(),
                remaining: queue.remaining(),
            });
        }

        if next.is_some() {
            match self.load_current().await {
                Ok(()) => {}
                Err(DialogError::Service(ServiceError::Unauthorized)) => {
                    tracing::warn!("Signed out while loading the next message");
                    self.signed_out();
                }
                Err(e) => {
                    tracing::warn!("Failed to load next message: {}", e);
                    self.emit(DialogEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            return;
        }

        tracing::info!("Message queue complete");
        self.emit(DialogEvent::QueueComplete);
        if let Err(e) = self.speak(&self.manager.prompts.queue_complete).await {
            tracing::warn!("Failed to announce end of queue: {}", e);
        }
    }

    async fn load_current(&mut self) -> Result<(), DialogError> {
        let id = self
            .inbox
            .current_id()
            .ok_or(DialogError::NoActiveMessage)?
            .to_string();
        let content = self.manager.ports.queue.fetch_message(&id).await?;

        let (position, total) = self
            .inbox
            .queue()
            .map(|queue| (queue.cursor() + 1, queue.len()))
            .unwrap_or((1, 1));
        tracing::info!("Loaded message {} ({}/{})", id, position, total);
        self.emit(DialogEvent::MessageLoaded {
            message_id: id.clone(),
            subject: content.subject.clone(),
            body: content.body.clone(),
            summary: content.summary.clone(),
            position,
            total,
        });

        self.inbox.set_active(id, content);
        Ok(())
    }

    /// Report a failure and drop back to `Idle`
    async fn fail(&mut self, error: &DialogError) {
        let manager = self.manager;
        tracing::error!(
            "Hands-free dialog failed in {:?}: {}",
            self.session.state(),
            error
        );

        match error {
            DialogError::Service(ServiceError::Unauthorized) => self.signed_out(),
            other => self.emit(DialogEvent::Error {
                message: other.to_string(),
            }),
        }

        if matches!(error, DialogError::Service(_)) {
            if let Err(e) = self.speak(&manager.prompts.service_error).await {
                tracing::warn!("Failed to announce service error: {}", e);
            }
        }

        if self.session.state() != DialogState::Idle {
            self.enter(
                DialogState::Idle,
                TransitionReason::Error {
                    message: error.to_string(),
                },
            );
        }
    }

    /// Tell the front end to sign in again and drop everything fetched
    fn signed_out(&mut self) {
        self.emit(DialogEvent::Unauthorized {
            login_url: self.manager.login_url.clone(),
        });
        self.inbox.reset();
    }

    fn enter(&mut self, next: DialogState, reason: TransitionReason) {
        let spent = self.session.time_in_state();
        let previous = self.session.enter(next);
        if next == DialogState::Idle {
            self.session.reset();
        }
        self.manager.set_state(next);

        tracing::debug!(
            "Dialog {:?} -> {:?} after {:?} ({:?})",
            previous,
            next,
            spent,
            reason
        );
        self.emit(DialogEvent::state_changed(previous, next, reason));
    }

    fn update_draft(&mut self, message: &ActiveMessage, text: String) {
        self.emit(DialogEvent::DraftUpdated {
            message_id: message.id.clone(),
            text: text.clone(),
        });
        self.session.set_draft(text);
    }

    fn active(&self) -> Result<&ActiveMessage, DialogError> {
        self.inbox.active().ok_or(DialogError::NoActiveMessage)
    }

    fn draft(&self, purpose: &'static str) -> Result<String, DialogError> {
        self.session
            .draft()
            .map(str::to_string)
            .ok_or(DialogError::NoDraft(purpose))
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.manager.ports.output.speak(text).await
    }

    async fn speak_prompt(&self, state: DialogState) -> Result<(), SpeechError> {
        match prompt_for(&self.manager.prompts, state) {
            Some(text) => self.speak(text).await,
            None => Ok(()),
        }
    }

    fn emit(&self, event: DialogEvent) {
        self.manager.ports.events.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sent_and_skipped_dispose_of_the_message() {
        assert!(SessionOutcome::Sent {
            message_id: "m1".into()
        }
        .disposed());
        assert!(SessionOutcome::Skipped {
            message_id: "m1".into()
        }
        .disposed());
        assert!(!SessionOutcome::Aborted.disposed());
        assert!(!SessionOutcome::Busy.disposed());
        assert!(!SessionOutcome::GaveUp {
            state: DialogState::AskRecordReply
        }
        .disposed());
    }

    #[test]
    fn test_every_active_state_has_a_prompt() {
        let prompts = PromptConfig::default();
        assert_eq!(prompt_for(&prompts, DialogState::Idle), None);
        assert_eq!(
            prompt_for(&prompts, DialogState::RecordingEdit),
            Some(prompts.start_recording_edit.as_str())
        );
        for state in [
            DialogState::AskReplaySummary,
            DialogState::AskRecordReply,
            DialogState::RecordingReply,
            DialogState::ConfirmReadReply,
            DialogState::AskEditOrSend,
            DialogState::ConfirmSendFinal,
        ] {
            assert!(prompt_for(&prompts, state).is_some(), "{:?}", state);
        }
    }

    #[test]
    fn test_dialog_error_messages() {
        let err: DialogError = ServiceError::Unauthorized.into();
        assert_eq!(err.to_string(), "Not signed in");
        assert_eq!(
            DialogError::NoDraft("send").to_string(),
            "No draft to send"
        );
    }

    #[test]
    fn test_outcome_serialisation() {
        let json = serde_json::to_string(&SessionOutcome::GaveUp {
            state: DialogState::ConfirmSendFinal,
        })
        .unwrap();
        assert_eq!(json, r#"{"outcome":"gave_up","state":"confirm_send_final"}"#);
    }
}

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::channels::Cue;
use crate::config::{Language, Settings};
use crate::errors::{ClientError, ValidationError, INIT_FAILED};
use crate::export::{export_messages, ExportFormat, DEFAULT_EXPORT_TITLE};
use crate::models::{AttachedImage, ConversationId, Message, MessageId, SentimentSummary, IMAGE_ONLY_PROMPT};
use crate::session::intent::{ApiCall, Completion, Effect, Intent, RequestId};
use crate::session::view::{SessionState, ViewModel};
use crate::stats::ConversationStats;

const TRANSITION_LOG_LEN: usize = 32;
const CREATE_FAILED: &str = "Failed to create new conversation. Please try again.";

/// An in-flight send. At most one exists at a time.
#[derive(Debug, Clone)]
struct PendingSend {
    request: RequestId,
    conversation_id: ConversationId,
    /// Composer text exactly as submitted, restored on failure.
    draft: String,
    image: Option<AttachedImage>,
    submitted_at: DateTime<Utc>,
}

/// Owns one open conversation and decides, for every intent and every
/// completed operation, how the state changes and which effects to run.
///
/// The controller performs no I/O. Network calls and side effects are
/// returned as [`Effect`]s; their results come back as [`Completion`]s and are
/// accepted only if they still belong to the active slot (the stale-response
/// guard compares both the conversation id and the request id).
#[derive(Debug)]
pub struct SessionController {
    settings: Settings,
    state: SessionState,
    conversation_id: Option<ConversationId>,
    messages: Vec<Message>,

    draft: String,
    attachment: Option<AttachedImage>,
    pending_send: Option<PendingSend>,
    send_error: Option<String>,

    summary: Option<SentimentSummary>,
    summary_visible: bool,
    summary_request: Option<RequestId>,
    summary_error: Option<String>,

    history_request: Option<RequestId>,
    create_request: Option<RequestId>,
    listen_request: Option<RequestId>,
    notice: Option<String>,
    fatal_error: Option<String>,

    next_request: u64,
    transitions: VecDeque<(SessionState, SessionState)>,
}

impl SessionController {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: SessionState::Idle,
            conversation_id: None,
            messages: Vec::new(),
            draft: String::new(),
            attachment: None,
            pending_send: None,
            send_error: None,
            summary: None,
            summary_visible: false,
            summary_request: None,
            summary_error: None,
            history_request: None,
            create_request: None,
            listen_request: None,
            notice: None,
            fatal_error: None,
            next_request: 0,
            transitions: VecDeque::with_capacity(TRANSITION_LOG_LEN),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Most recent state changes, oldest first.
    pub fn transitions(&self) -> Vec<(SessionState, SessionState)> {
        self.transitions.iter().copied().collect()
    }

    /// How long the current send has been outstanding.
    pub fn pending_since(&self) -> Option<DateTime<Utc>> {
        self.pending_send.as_ref().map(|p| p.submitted_at)
    }

    pub fn view(&self) -> ViewModel {
        ViewModel {
            conversation_id: self.conversation_id.clone(),
            state: self.state,
            messages: self.messages.clone(),
            draft: self.draft.clone(),
            attachment: self.attachment.as_ref().map(|a| a.name.clone()),
            is_sending: self.pending_send.is_some(),
            is_listening: self.listen_request.is_some(),
            send_error: self.send_error.clone(),
            summary_visible: self.summary_visible,
            summary_loading: self.summary_request.is_some(),
            summary: self.summary.clone(),
            stats: self
                .summary_visible
                .then(|| ConversationStats::from_messages(&self.messages)),
            summary_error: self.summary_error.clone(),
            notice: self.notice.clone(),
            fatal_error: self.fatal_error.clone(),
            settings: self.settings.clone(),
        }
    }

    // ── Intents ──────────────────────────────────────────────────────────────

    /// Applies a user intent. Validation failures are returned synchronously
    /// and never produce effects.
    pub fn dispatch(&mut self, intent: Intent) -> Result<Vec<Effect>, ValidationError> {
        match intent {
            Intent::SwitchConversation(id) => Ok(self.open(id)),
            Intent::NewConversation => Ok(self.create_conversation()),
            Intent::DeleteConversation(id) => Ok(self.delete_conversation(id)),
            Intent::Reload => Ok(self.reload()),

            Intent::EditDraft(text) => {
                self.draft = text;
                Ok(Vec::new())
            }
            Intent::AttachImage(image) => {
                self.attachment = Some(image);
                Ok(Vec::new())
            }
            Intent::RemoveImage => {
                self.attachment = None;
                Ok(Vec::new())
            }
            Intent::StartVoiceInput => Ok(self.start_voice_input()),
            Intent::SubmitSend => self.submit_send(),
            Intent::RetrySend => {
                if self.send_error.is_none() {
                    return Err(ValidationError::NothingToRetry);
                }
                self.submit_send()
            }

            Intent::DeleteMessage(id) => {
                self.delete_message(&id);
                Ok(Vec::new())
            }
            Intent::SetReaction { id, emoji } => {
                self.set_reaction(&id, emoji);
                Ok(Vec::new())
            }
            Intent::ToggleSummary => self.toggle_summary(),
            Intent::Export(format) => self.export(format),

            Intent::DismissSendError => {
                self.send_error = None;
                Ok(Vec::new())
            }
            Intent::DismissSummaryError => {
                self.summary_error = None;
                Ok(Vec::new())
            }
            Intent::DismissNotice => {
                self.notice = None;
                Ok(Vec::new())
            }

            Intent::SetLanguage(code) => {
                self.settings.language = Language::from_code(&code).code().to_string();
                Ok(vec![Effect::PersistSettings(self.settings.clone())])
            }
            Intent::SetAudioEnabled(enabled) => {
                self.settings.audio_enabled = enabled;
                let mut effects = vec![Effect::PersistSettings(self.settings.clone())];
                if enabled {
                    effects.push(Effect::Cue(Cue::Receive));
                }
                Ok(effects)
            }
            Intent::SetSpeechOutputEnabled(enabled) => {
                self.settings.speech_output_enabled = enabled;
                let language = self.settings.language();
                let confirmation = if enabled {
                    Effect::Speak {
                        text: language.speech_enabled_phrase().to_string(),
                        language,
                    }
                } else {
                    Effect::StopSpeech
                };
                Ok(vec![Effect::PersistSettings(self.settings.clone()), confirmation])
            }
            Intent::SetSpeechInputEnabled(enabled) => {
                self.settings.speech_input_enabled = enabled;
                Ok(vec![Effect::PersistSettings(self.settings.clone())])
            }
        }
    }

    fn open(&mut self, id: ConversationId) -> Vec<Effect> {
        info!("Opening conversation {id}");
        self.teardown();
        let request = self.next_request_id();
        self.conversation_id = Some(id.clone());
        self.history_request = Some(request);
        self.transition(SessionState::LoadingHistory);
        vec![
            Effect::StopSpeech,
            Effect::Call { request, call: ApiCall::GetConversation { conversation_id: id } },
        ]
    }

    /// Drops everything tied to the current conversation. In-flight requests
    /// are not cancelled; their results no longer match any slot.
    fn teardown(&mut self) {
        if let Some(pending) = self.pending_send.take() {
            debug!(
                "Abandoning send {} for conversation {}",
                pending.request, pending.conversation_id
            );
        }
        self.conversation_id = None;
        self.messages.clear();
        self.draft.clear();
        self.attachment = None;
        self.send_error = None;
        self.summary = None;
        self.summary_visible = false;
        self.summary_request = None;
        self.summary_error = None;
        self.history_request = None;
        self.listen_request = None;
        self.notice = None;
        self.fatal_error = None;
    }

    fn create_conversation(&mut self) -> Vec<Effect> {
        if self.create_request.is_some() {
            return Vec::new();
        }
        let request = self.next_request_id();
        self.create_request = Some(request);
        vec![Effect::Call { request, call: ApiCall::CreateConversation }]
    }

    fn delete_conversation(&mut self, id: ConversationId) -> Vec<Effect> {
        let request = self.next_request_id();
        vec![Effect::Call { request, call: ApiCall::DeleteConversation { conversation_id: id } }]
    }

    fn reload(&mut self) -> Vec<Effect> {
        self.fatal_error = None;
        match self.conversation_id.clone() {
            Some(id) => self.open(id),
            None => self.create_conversation(),
        }
    }

    fn submit_send(&mut self) -> Result<Vec<Effect>, ValidationError> {
        let conversation_id = self
            .conversation_id
            .clone()
            .ok_or(ValidationError::NoActiveConversation)?;
        if self.pending_send.is_some() {
            return Err(ValidationError::SendInFlight);
        }
        if self.state != SessionState::Ready {
            return Err(ValidationError::NotReady);
        }

        let trimmed = self.draft.trim();
        if trimmed.is_empty() && self.attachment.is_none() {
            return Err(ValidationError::EmptyMessage);
        }
        let text = if trimmed.is_empty() { IMAGE_ONLY_PROMPT } else { trimmed }.to_string();

        let draft = std::mem::take(&mut self.draft);
        let image = self.attachment.take();
        let request = self.next_request_id();
        let call = ApiCall::SendMessage {
            conversation_id: conversation_id.clone(),
            text,
            image: image.as_ref().map(|i| i.data_uri.clone()),
        };

        self.send_error = None;
        self.pending_send = Some(PendingSend {
            request,
            conversation_id,
            draft,
            image,
            submitted_at: Utc::now(),
        });
        self.transition(SessionState::Sending);

        Ok(vec![Effect::Cue(Cue::Send), Effect::Call { request, call }])
    }

    fn start_voice_input(&mut self) -> Vec<Effect> {
        if !self.settings.speech_input_enabled || self.listen_request.is_some() {
            return Vec::new();
        }
        let request = self.next_request_id();
        self.listen_request = Some(request);
        vec![Effect::Listen { request, language: self.settings.language() }]
    }

    fn delete_message(&mut self, id: &MessageId) {
        let before = self.messages.len();
        self.messages.retain(|m| m.id.as_ref() != Some(id));
        if self.messages.len() == before {
            debug!("Delete ignored: no message {id}");
        }
    }

    fn set_reaction(&mut self, id: &MessageId, emoji: String) {
        match self.messages.iter_mut().find(|m| m.id.as_ref() == Some(id)) {
            Some(msg) => msg.reaction = Some(emoji),
            None => debug!("Reaction ignored: no message {id}"),
        }
    }

    fn toggle_summary(&mut self) -> Result<Vec<Effect>, ValidationError> {
        if self.summary_visible {
            self.summary_visible = false;
            return Ok(Vec::new());
        }
        if self.messages.is_empty() {
            let err = ValidationError::NothingToSummarize;
            self.summary_error = Some(err.to_string());
            return Err(err);
        }
        let conversation_id = self
            .conversation_id
            .clone()
            .ok_or(ValidationError::NoActiveConversation)?;
        if self.summary_request.is_some() {
            return Ok(Vec::new());
        }

        let request = self.next_request_id();
        self.summary_request = Some(request);
        self.summary_error = None;
        Ok(vec![Effect::Call { request, call: ApiCall::GetSentiment { conversation_id } }])
    }

    fn export(&mut self, format: ExportFormat) -> Result<Vec<Effect>, ValidationError> {
        match export_messages(&self.messages, DEFAULT_EXPORT_TITLE, format, Utc::now()) {
            Ok(file) => Ok(vec![Effect::WriteExport(file)]),
            Err(ClientError::Validation(err)) => {
                self.notice = Some(err.to_string());
                Err(err)
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.notice = Some(format!("Export failed: {e}"));
                Ok(Vec::new())
            }
        }
    }

    // ── Completions ──────────────────────────────────────────────────────────

    /// Applies the result of an earlier effect. Results for a conversation or
    /// request that is no longer current are dropped.
    pub fn complete(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::ConversationCreated { request, result } => {
                if self.create_request != Some(request) {
                    debug!("Discarding stale conversation create {request}");
                    return Vec::new();
                }
                self.create_request = None;
                match result {
                    Ok(created) => self.open(created.conversation_id),
                    Err(e) => {
                        warn!("Failed to create conversation: {e}");
                        if self.conversation_id.is_none() {
                            self.fatal_error = Some(INIT_FAILED.to_string());
                        } else {
                            self.notice = Some(CREATE_FAILED.to_string());
                        }
                        Vec::new()
                    }
                }
            }

            Completion::HistoryLoaded { request, conversation_id, result } => {
                if !self.is_current(self.history_request, request, &conversation_id) {
                    debug!("Discarding stale history {request} for {conversation_id}");
                    return Vec::new();
                }
                self.history_request = None;
                match result {
                    Ok(detail) => {
                        self.summary = detail.cached_summary();
                        self.messages = detail.messages;
                        info!("Loaded {} messages for {conversation_id}", self.messages.len());
                    }
                    Err(e) => {
                        // A broken history must not block sending; show an empty conversation.
                        warn!("History load failed for {conversation_id}, showing empty: {e}");
                        self.messages.clear();
                    }
                }
                self.transition(SessionState::Ready);
                Vec::new()
            }

            Completion::MessageSent { request, conversation_id, result } => {
                let current = self.pending_send.as_ref().map(|p| p.request);
                if !self.is_current(current, request, &conversation_id) {
                    debug!("Discarding stale send {request} for {conversation_id}");
                    return Vec::new();
                }
                let Some(pending) = self.pending_send.take() else {
                    return Vec::new();
                };
                match result {
                    Ok(response) => {
                        let (user, bot) = response.into_pair(Utc::now());
                        let reply = bot.text.clone();
                        self.messages.push(user);
                        self.messages.push(bot);
                        self.transition(SessionState::Ready);
                        vec![
                            Effect::Cue(Cue::Receive),
                            Effect::Speak { text: reply, language: self.settings.language() },
                        ]
                    }
                    Err(e) => {
                        warn!("Send {request} failed: {e}");
                        self.transition(SessionState::Error);
                        self.send_error = Some(e.to_string());
                        self.draft = pending.draft;
                        self.attachment = pending.image;
                        self.transition(SessionState::Ready);
                        vec![Effect::Cue(Cue::Error)]
                    }
                }
            }

            Completion::SummaryLoaded { request, conversation_id, result } => {
                if !self.is_current(self.summary_request, request, &conversation_id) {
                    debug!("Discarding stale summary {request} for {conversation_id}");
                    return Vec::new();
                }
                self.summary_request = None;
                match result {
                    Ok(summary) => {
                        self.summary = Some(summary);
                        self.summary_visible = true;
                    }
                    Err(e) => {
                        warn!("Summary load failed for {conversation_id}: {e}");
                        self.summary_error = Some(e.to_string());
                    }
                }
                Vec::new()
            }

            Completion::ConversationDeleted { request, conversation_id, result } => match result {
                Ok(()) => {
                    info!("Deleted conversation {conversation_id} ({request})");
                    if self.conversation_id.as_deref() == Some(conversation_id.as_str()) {
                        self.teardown();
                        self.transition(SessionState::Idle);
                        self.create_conversation()
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    warn!("Failed to delete conversation {conversation_id}: {e}");
                    self.notice = Some(e.to_string());
                    Vec::new()
                }
            },

            Completion::Transcribed { request, result } => {
                if self.listen_request != Some(request) {
                    debug!("Discarding stale transcript {request}");
                    return Vec::new();
                }
                self.listen_request = None;
                match result {
                    Ok(transcript) => self.draft = transcript,
                    Err(e) => warn!("Voice input unavailable: {e}"),
                }
                Vec::new()
            }

            Completion::ExportWritten { result } => {
                self.notice = Some(match result {
                    Ok(path) => format!("Exported to {}", path.display()),
                    Err(e) => format!("Export failed: {e}"),
                });
                Vec::new()
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn is_current(&self, slot: Option<RequestId>, request: RequestId, conversation_id: &str) -> bool {
        slot == Some(request) && self.conversation_id.as_deref() == Some(conversation_id)
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!("Session {from:?} -> {to:?}");
        if self.transitions.len() == TRANSITION_LOG_LEN {
            self.transitions.pop_front();
        }
        self.transitions.push_back((from, to));
        self.state = to;
    }
}

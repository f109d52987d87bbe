use std::path::PathBuf;

use crate::channels::Cue;
use crate::config::{Language, Settings};
use crate::errors::{ClientError, SideEffectError};
use crate::export::{ExportFile, ExportFormat};
use crate::models::{
    AttachedImage, ConversationDetail, ConversationId, CreateConversationResponse, MessageId,
    SendMessageResponse, SentimentSummary,
};

/// Identifies one asynchronous operation so its result can be matched back
/// to the slot that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the presentation layer can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    // ── Conversation lifecycle ───────────────────────────────────────────────
    SwitchConversation(ConversationId),
    NewConversation,
    DeleteConversation(ConversationId),
    Reload,

    // ── Composer ─────────────────────────────────────────────────────────────
    EditDraft(String),
    AttachImage(AttachedImage),
    RemoveImage,
    StartVoiceInput,
    SubmitSend,
    RetrySend,

    // ── Message list ─────────────────────────────────────────────────────────
    DeleteMessage(MessageId),
    SetReaction { id: MessageId, emoji: String },
    ToggleSummary,
    Export(ExportFormat),

    // ── Error surfaces ───────────────────────────────────────────────────────
    DismissSendError,
    DismissSummaryError,
    DismissNotice,

    // ── Settings ─────────────────────────────────────────────────────────────
    SetLanguage(String),
    SetAudioEnabled(bool),
    SetSpeechOutputEnabled(bool),
    SetSpeechInputEnabled(bool),
}

/// A call against the remote conversation service.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    CreateConversation,
    GetConversation { conversation_id: ConversationId },
    SendMessage { conversation_id: ConversationId, text: String, image: Option<String> },
    GetSentiment { conversation_id: ConversationId },
    DeleteConversation { conversation_id: ConversationId },
}

/// Work requested by the controller. The driver performs it.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Call { request: RequestId, call: ApiCall },
    Listen { request: RequestId, language: Language },
    Cue(Cue),
    Speak { text: String, language: Language },
    StopSpeech,
    PersistSettings(Settings),
    WriteExport(ExportFile),
}

/// The resolution of an effect, fed back into the controller.
#[derive(Debug)]
pub enum Completion {
    ConversationCreated {
        request: RequestId,
        result: Result<CreateConversationResponse, ClientError>,
    },
    HistoryLoaded {
        request: RequestId,
        conversation_id: ConversationId,
        result: Result<ConversationDetail, ClientError>,
    },
    MessageSent {
        request: RequestId,
        conversation_id: ConversationId,
        result: Result<SendMessageResponse, ClientError>,
    },
    SummaryLoaded {
        request: RequestId,
        conversation_id: ConversationId,
        result: Result<SentimentSummary, ClientError>,
    },
    ConversationDeleted {
        request: RequestId,
        conversation_id: ConversationId,
        result: Result<(), ClientError>,
    },
    Transcribed {
        request: RequestId,
        result: Result<String, SideEffectError>,
    },
    ExportWritten {
        result: Result<PathBuf, ClientError>,
    },
}

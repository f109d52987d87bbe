use crate::config::Settings;
use crate::models::{ConversationId, Message, SentimentSummary};
use crate::stats::ConversationStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    LoadingHistory,
    Ready,
    Sending,
    /// Entered when a send fails and left straight away for `Ready`; the
    /// failure stays visible through `send_error`.
    Error,
}

/// Read-only snapshot handed to the presentation layer after every event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub conversation_id: Option<ConversationId>,
    pub state: SessionState,
    pub messages: Vec<Message>,

    pub draft: String,
    /// Name of the attached image, if any.
    pub attachment: Option<String>,
    pub is_sending: bool,
    pub is_listening: bool,
    pub send_error: Option<String>,

    pub summary_visible: bool,
    pub summary_loading: bool,
    pub summary: Option<SentimentSummary>,
    /// Present only while the summary is visible.
    pub stats: Option<ConversationStats>,
    pub summary_error: Option<String>,

    /// Outcome of export and conversation-management actions.
    pub notice: Option<String>,
    /// Unrecoverable start-up failure; cleared only by `Intent::Reload`.
    pub fatal_error: Option<String>,

    pub settings: Settings,
}

impl ViewModel {
    pub fn can_send(&self) -> bool {
        self.state == SessionState::Ready
            && (!self.draft.trim().is_empty() || self.attachment.is_some())
    }
}

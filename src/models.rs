use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ValidationError;

/// Prompt sent in place of empty text when only an image is attached.
pub const IMAGE_ONLY_PROMPT: &str = "What's in this image?";

// ── Identifiers ──────────────────────────────────────────────────────────────

pub type ConversationId = String;

/// Server-assigned message id. The service may emit it as a number or a
/// string; both are normalised to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => MessageId(s),
            Raw::Int(n) => MessageId(n.to_string()),
        })
    }
}

// ── Message ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    /// Label used in human-readable transcripts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Bot => "Bot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: Option<MessageId>,
    pub sender: Sender,
    #[serde(rename = "message_text", alias = "text")]
    pub text: String,
    #[serde(default)]
    pub sentiment: Option<SentimentLabel>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn bot(id: MessageId, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            sender: Sender::Bot,
            text: text.into(),
            sentiment: None,
            sentiment_score: None,
            reaction: None,
            timestamp,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split(' ').count()
    }
}

/// Accepts RFC 3339, the service's `YYYY-MM-DD HH:MM:SS[.f]` form, or null.
/// Anything unreadable becomes the current instant.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp).unwrap_or_else(Utc::now))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ── Sentiment summary ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    #[serde(default)]
    pub positive: u32,
    #[serde(default)]
    pub neutral: u32,
    #[serde(default)]
    pub negative: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub overall_sentiment: SentimentLabel,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub sentiment_distribution: SentimentDistribution,
}

// ── Composer ─────────────────────────────────────────────────────────────────

/// An image attached to the next send, already encoded as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedImage {
    pub name: String,
    pub data_uri: String,
}

impl AttachedImage {
    pub fn from_bytes(name: impl Into<String>, mime: &str, bytes: &[u8]) -> Result<Self, ValidationError> {
        if !mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage { mime: mime.to_string() });
        }
        Ok(Self {
            name: name.into(),
            data_uri: format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
        })
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationResponse {
    pub conversation_id: ConversationId,
}

/// Row of the conversation list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationListItem {
    #[serde(alias = "id")]
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDetail {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub overall_sentiment: Option<SentimentLabel>,
    #[serde(default)]
    pub sentiment_explanation: Option<String>,
}

impl ConversationDetail {
    /// A summary computed earlier and stored with the conversation, if any.
    pub fn cached_summary(&self) -> Option<SentimentSummary> {
        self.overall_sentiment.map(|overall| SentimentSummary {
            overall_sentiment: overall,
            explanation: self.sentiment_explanation.clone().unwrap_or_default(),
            sentiment_distribution: SentimentDistribution::default(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub user_message_id: MessageId,
    pub user_message: String,
    #[serde(default)]
    pub user_sentiment: Option<SentimentLabel>,
    #[serde(default)]
    pub user_sentiment_score: Option<f64>,
    pub bot_message_id: MessageId,
    pub bot_message: String,
}

impl SendMessageResponse {
    /// The user message and bot reply, stamped with `now`.
    pub fn into_pair(self, now: DateTime<Utc>) -> (Message, Message) {
        let user = Message {
            id: Some(self.user_message_id),
            sender: Sender::User,
            text: self.user_message,
            sentiment: self.user_sentiment,
            sentiment_score: self.user_sentiment_score,
            reaction: None,
            timestamp: now,
        };
        let bot = Message::bot(self.bot_message_id, self.bot_message, now);
        (user, bot)
    }
}

/// `{"error": "..."}` body returned alongside non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::errors::{ClientError, ValidationError};
use crate::models::{Message, SentimentLabel, Sender};

pub const DEFAULT_EXPORT_TITLE: &str = "Sentiment Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }
}

/// A rendered export, ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

/// Serializes `messages` in order. Empty lists are rejected.
pub fn export_messages(
    messages: &[Message],
    title: &str,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> Result<ExportFile, ClientError> {
    if messages.is_empty() {
        return Err(ValidationError::NothingToExport.into());
    }
    let contents = match format {
        ExportFormat::Text => transcript(messages, title, now),
        ExportFormat::Json => json_document(messages, title, now)?,
    };
    Ok(ExportFile {
        file_name: format!("conversation-{}.{}", now.timestamp_millis(), format.extension()),
        contents,
    })
}

fn transcript(messages: &[Message], title: &str, now: DateTime<Utc>) -> String {
    let mut text = format!(
        "{title}\nExported: {}\n{}\n\n",
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        "=".repeat(50)
    );
    for msg in messages {
        let sentiment = msg
            .sentiment
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        text.push_str(&format!(
            "[{}] {}{sentiment}:\n{}\n\n",
            msg.timestamp.format("%H:%M:%S"),
            msg.sender.display_name(),
            msg.text
        ));
    }
    text
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    title: &'a str,
    exported_at: String,
    messages: Vec<ExportedMessage<'a>>,
}

#[derive(Serialize)]
struct ExportedMessage<'a> {
    sender: Sender,
    text: &'a str,
    sentiment: Option<SentimentLabel>,
    timestamp: String,
}

fn json_document(messages: &[Message], title: &str, now: DateTime<Utc>) -> Result<String, ClientError> {
    let doc = ExportDocument {
        title,
        exported_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        messages: messages
            .iter()
            .map(|m| ExportedMessage {
                sender: m.sender,
                text: &m.text,
                sentiment: m.sentiment,
                timestamp: m.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            })
            .collect(),
    };
    encode(&doc)
}

fn encode<T: Serialize>(doc: &T) -> Result<String, ClientError> {
    serde_json::to_string_pretty(doc).map_err(|e| ClientError::Encode {
        what: "export",
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 4, h, m, 0).unwrap()
    }

    fn sample() -> Vec<Message> {
        let mut user = Message::bot(MessageId::new("1"), "I love this", at(9, 0));
        user.sender = Sender::User;
        user.sentiment = Some(SentimentLabel::Positive);
        vec![user, Message::bot(MessageId::new("2"), "Glad to hear it!", at(9, 1))]
    }

    #[test]
    fn test_empty_export_is_rejected() {
        let err = export_messages(&[], DEFAULT_EXPORT_TITLE, ExportFormat::Text, at(10, 0)).unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::NothingToExport)));
    }

    #[test]
    fn test_encode_failure_is_reported() {
        // JSON object keys must be strings.
        let doc: std::collections::BTreeMap<(u8, u8), u8> = [((1, 2), 3)].into();
        let err = encode(&doc).unwrap_err();
        assert!(matches!(err, ClientError::Encode { what: "export", .. }));
        assert!(err.to_string().starts_with("Failed to encode export"));
    }

    #[test]
    fn test_transcript_layout() {
        let file = export_messages(&sample(), "Chat", ExportFormat::Text, at(10, 0)).unwrap();
        assert!(file.file_name.starts_with("conversation-"));
        assert!(file.file_name.ends_with(".txt"));
        let expected = format!(
            "Chat\nExported: 2025-05-04 10:00:00 UTC\n{}\n\n\
             [09:00:00] You [positive]:\nI love this\n\n\
             [09:01:00] Bot:\nGlad to hear it!\n\n",
            "=".repeat(50)
        );
        assert_eq!(file.contents, expected);
    }

    #[test]
    fn test_json_preserves_count_and_order() {
        let file = export_messages(&sample(), "Chat", ExportFormat::Json, at(10, 0)).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&file.contents).unwrap();
        let messages = doc["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["sender"], "user");
        assert_eq!(messages[0]["sentiment"], "positive");
        assert_eq!(messages[1]["text"], "Glad to hear it!");
        assert!(messages[1]["sentiment"].is_null());
        assert_eq!(doc["exportedAt"], "2025-05-04T10:00:00.000Z");
    }
}

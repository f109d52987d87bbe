use crate::models::{Message, SentimentDistribution, SentimentLabel, Sender};

/// Counts derived from the current message list; never fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub bot_replies: usize,
    pub avg_words_per_message: usize,
    /// Over user messages only.
    pub sentiment: SentimentDistribution,
}

impl ConversationStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut stats = Self { total_messages: messages.len(), ..Self::default() };
        let mut words = 0usize;

        for msg in messages {
            words += msg.word_count();
            match msg.sender {
                Sender::Bot => stats.bot_replies += 1,
                Sender::User => {
                    stats.user_messages += 1;
                    match msg.sentiment {
                        Some(SentimentLabel::Positive) => stats.sentiment.positive += 1,
                        Some(SentimentLabel::Neutral) => stats.sentiment.neutral += 1,
                        Some(SentimentLabel::Negative) => stats.sentiment.negative += 1,
                        None => {}
                    }
                }
            }
        }

        if !messages.is_empty() {
            stats.avg_words_per_message = (words as f64 / messages.len() as f64).round() as usize;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use chrono::Utc;

    fn user(text: &str, sentiment: SentimentLabel) -> Message {
        Message {
            sender: Sender::User,
            sentiment: Some(sentiment),
            ..Message::bot(MessageId::new("u"), text, Utc::now())
        }
    }

    #[test]
    fn test_stats_counts() {
        let messages = vec![
            user("great day today", SentimentLabel::Positive),
            Message::bot(MessageId::new("b1"), "nice", Utc::now()),
            user("meh", SentimentLabel::Neutral),
            Message::bot(MessageId::new("b2"), "I see, tell me more", Utc::now()),
        ];
        let stats = ConversationStats::from_messages(&messages);
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.user_messages, 2);
        assert_eq!(stats.bot_replies, 2);
        // (3 + 1 + 1 + 5) / 4 = 2.5 -> 3
        assert_eq!(stats.avg_words_per_message, 3);
        assert_eq!(stats.sentiment, SentimentDistribution { positive: 1, neutral: 1, negative: 0 });
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(ConversationStats::from_messages(&[]), ConversationStats::default());
    }
}

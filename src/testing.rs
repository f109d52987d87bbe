//! In-memory fakes shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::api::ConversationApi;
use crate::channels::{AudioCuePlayer, Cue, SpeechRecognizer, SpeechSynthesizer, Tone, Utterance, Voice};
use crate::config::Language;
use crate::errors::{ClientError, SideEffectError};
use crate::models::{
    ConversationDetail, ConversationListItem, CreateConversationResponse, Message, MessageId,
    SendMessageResponse, SentimentDistribution, SentimentLabel, SentimentSummary, Sender,
};

pub fn reply(text: &str, n: u32) -> SendMessageResponse {
    SendMessageResponse {
        user_message_id: MessageId::new(format!("u{n}")),
        user_message: text.to_string(),
        user_sentiment: Some(SentimentLabel::Neutral),
        user_sentiment_score: Some(0.5),
        bot_message_id: MessageId::new(format!("b{n}")),
        bot_message: format!("Echo: {text}"),
    }
}

/// A stored conversation with `pairs` user/bot exchanges.
pub fn sample_detail(pairs: usize) -> ConversationDetail {
    let mut messages = Vec::with_capacity(pairs * 2);
    for i in 0..pairs {
        messages.push(Message {
            sender: Sender::User,
            sentiment: Some(SentimentLabel::Positive),
            sentiment_score: Some(0.9),
            ..Message::bot(MessageId::new(format!("hu{i}")), format!("question {i}"), Utc::now())
        });
        messages.push(Message::bot(MessageId::new(format!("hb{i}")), format!("answer {i}"), Utc::now()));
    }
    ConversationDetail {
        messages,
        overall_sentiment: Some(SentimentLabel::Positive),
        sentiment_explanation: Some("Mostly upbeat".to_string()),
    }
}

pub fn summary() -> SentimentSummary {
    SentimentSummary {
        overall_sentiment: SentimentLabel::Positive,
        explanation: "The user sounds happy".to_string(),
        sentiment_distribution: SentimentDistribution { positive: 3, neutral: 0, negative: 0 },
    }
}

// ── Remote API ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeApi {
    history_pairs: usize,
    fail_sends: AtomicBool,
    panic_sends: AtomicBool,
    fail_history: AtomicBool,
    fail_summary: AtomicBool,
    next_id: AtomicU32,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeApi {
    pub fn with_history(pairs: usize) -> Self {
        Self { history_pairs: pairs, ..Self::default() }
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Makes `send_message` panic instead of returning.
    pub fn panic_sends(&self, panic: bool) {
        self.panic_sends.store(panic, Ordering::SeqCst);
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    pub fn fail_summary(&self, fail: bool) {
        self.fail_summary.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn down() -> ClientError {
        ClientError::network(crate::errors::CONNECTION_FAILED)
    }
}

#[async_trait]
impl ConversationApi for FakeApi {
    async fn create_conversation(&self) -> Result<CreateConversationResponse, ClientError> {
        self.record("create_conversation");
        Ok(CreateConversationResponse {
            conversation_id: format!("conv-{}", self.call_count("create_conversation")),
        })
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationListItem>, ClientError> {
        self.record("list_conversations");
        Ok(Vec::new())
    }

    async fn get_conversation(&self, _id: &str) -> Result<ConversationDetail, ClientError> {
        self.record("get_conversation");
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(sample_detail(self.history_pairs))
    }

    async fn send_message(
        &self,
        _id: &str,
        text: &str,
        _image: Option<&str>,
    ) -> Result<SendMessageResponse, ClientError> {
        self.record("send_message");
        if self.panic_sends.load(Ordering::SeqCst) {
            panic!("send handler crashed");
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(reply(text, self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn get_conversation_sentiment(&self, _id: &str) -> Result<SentimentSummary, ClientError> {
        self.record("get_conversation_sentiment");
        if self.fail_summary.load(Ordering::SeqCst) {
            return Err(ClientError::Server {
                status: 500,
                message: "Failed to analyze conversation sentiment".to_string(),
            });
        }
        Ok(summary())
    }

    async fn delete_conversation(&self, _id: &str) -> Result<(), ClientError> {
        self.record("delete_conversation");
        Ok(())
    }
}

// ── Channels ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeAudio {
    fail: bool,
    played: Mutex<Vec<Cue>>,
}

impl FakeAudio {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn played(&self) -> Vec<Cue> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioCuePlayer for FakeAudio {
    fn is_available(&self) -> bool {
        true
    }

    fn play(&self, cue: Cue, _pattern: &[Tone]) -> Result<(), SideEffectError> {
        self.played.lock().unwrap().push(cue);
        if self.fail {
            return Err(SideEffectError::Failed { channel: "audio", message: "context suspended".into() });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechCall {
    Cancel,
    Speak { text: String, lang: String },
}

/// Synthesizer and recognizer in one.
pub struct FakeSpeech {
    voices: Vec<Voice>,
    fail: bool,
    calls: Mutex<Vec<SpeechCall>>,
    transcript: Mutex<Option<String>>,
}

impl FakeSpeech {
    pub fn with_voices(voices: &[(&str, &str)]) -> Self {
        Self {
            voices: voices
                .iter()
                .map(|(name, lang)| Voice { name: name.to_string(), lang: lang.to_string() })
                .collect(),
            fail: false,
            calls: Mutex::new(Vec::new()),
            transcript: Mutex::new(None),
        }
    }

    /// Every utterance is recorded and then rejected.
    pub fn failing(voices: &[(&str, &str)]) -> Self {
        Self { fail: true, ..Self::with_voices(voices) }
    }

    pub fn calls(&self) -> Vec<SpeechCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_transcript(&self, text: &str) {
        *self.transcript.lock().unwrap() = Some(text.to_string());
    }
}

impl SpeechSynthesizer for FakeSpeech {
    fn is_available(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn cancel(&self) {
        self.calls.lock().unwrap().push(SpeechCall::Cancel);
    }

    fn speak(&self, utterance: Utterance) -> Result<(), SideEffectError> {
        self.calls.lock().unwrap().push(SpeechCall::Speak { text: utterance.text, lang: utterance.lang });
        if self.fail {
            return Err(SideEffectError::Failed { channel: "speech synthesis", message: "synthesis-failed".into() });
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechRecognizer for FakeSpeech {
    fn is_available(&self) -> bool {
        true
    }

    async fn listen(&self, _language: Language) -> Result<String, SideEffectError> {
        self.transcript
            .lock()
            .unwrap()
            .take()
            .ok_or(SideEffectError::Failed { channel: "speech recognition", message: "no-speech".into() })
    }
}

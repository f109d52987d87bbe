use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use sentiment_chat_client::channels::{AudioCuePlayer, Cue, Tone, Unsupported};
use sentiment_chat_client::errors::SideEffectError;
use sentiment_chat_client::export::ExportFormat;
use sentiment_chat_client::models::{AttachedImage, MessageId};
use sentiment_chat_client::{
    ClientConfig, HttpConversationApi, Intent, SessionDriver, SettingsStore, SideEffectCoordinator,
    ViewModel,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const HELP: &str = "\
Commands:
  <text>                 send a message
  /retry                 resend the last failed message
  /image <path>          attach an image to the next message
  /noimage               remove the attached image
  /voice                 fill the draft from the microphone
  /summary               show or hide the sentiment summary
  /export text|json      write the conversation to a file
  /react <id> <emoji>    react to a message
  /delete <id>           remove a message from the view
  /new                   start a new conversation
  /open <id>             switch to another conversation
  /drop <id>             delete a conversation
  /list                  list conversations
  /lang <code>           en es fr de zh ja hi ar
  /sound on|off          audio cues
  /tts on|off            read replies aloud
  /mic on|off            voice input
  /dismiss               clear errors and notices
  /reload                retry after a start-up failure
  /quit";

/// Rings the terminal bell for each cue.
struct TerminalBell;

impl AudioCuePlayer for TerminalBell {
    fn is_available(&self) -> bool {
        std::io::stdout().is_terminal()
    }

    fn play(&self, _cue: Cue, _pattern: &[Tone]) -> Result<(), SideEffectError> {
        let mut out = std::io::stdout();
        out.write_all(b"\x07")
            .and_then(|_| out.flush())
            .map_err(|e| SideEffectError::Failed { channel: "audio", message: e.to_string() })
    }
}

/// Prints whatever changed between two snapshots.
#[derive(Default)]
struct Renderer {
    last: ViewModel,
}

impl Renderer {
    fn render(&mut self, view: ViewModel) {
        if view.conversation_id != self.last.conversation_id {
            if let Some(id) = &view.conversation_id {
                println!("── conversation {id} ──");
            }
            self.last.messages.clear();
        }
        if view.state != self.last.state {
            info!("state: {:?}", view.state);
        }

        let shown = &self.last.messages;
        let unchanged_prefix = shown.len() <= view.messages.len()
            && shown.iter().zip(&view.messages).all(|(a, b)| a == b);
        let start = if unchanged_prefix { shown.len() } else { 0 };
        if !unchanged_prefix {
            println!("── {} messages ──", view.messages.len());
        }
        for msg in &view.messages[start..] {
            let id = msg.id.as_ref().map(MessageId::as_str).unwrap_or("-");
            let sentiment = msg.sentiment.map(|s| format!(" [{s}]")).unwrap_or_default();
            let reaction = msg.reaction.as_deref().map(|r| format!(" {r}")).unwrap_or_default();
            println!("({id}) {}{sentiment}: {}{reaction}", msg.sender.display_name(), msg.text);
        }

        if view.draft != self.last.draft && !view.draft.is_empty() {
            println!("draft: {}", view.draft);
        }
        if view.summary_visible && !self.last.summary_visible {
            if let Some(summary) = &view.summary {
                let d = summary.sentiment_distribution;
                println!(
                    "Summary: {} ({} positive / {} neutral / {} negative)\n  {}",
                    summary.overall_sentiment, d.positive, d.neutral, d.negative, summary.explanation
                );
            }
            if let Some(stats) = &view.stats {
                println!(
                    "Stats: {} messages, {} yours, {} replies, ~{} words each",
                    stats.total_messages, stats.user_messages, stats.bot_replies, stats.avg_words_per_message
                );
            }
        }
        for (now, before, label) in [
            (&view.send_error, &self.last.send_error, "error"),
            (&view.summary_error, &self.last.summary_error, "summary"),
            (&view.notice, &self.last.notice, "note"),
            (&view.fatal_error, &self.last.fatal_error, "fatal"),
        ] {
            if let Some(text) = now.as_ref().filter(|t| Some(*t) != before.as_ref()) {
                println!("[{label}] {text}");
            }
        }
        self.last = view;
    }
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn on_off(arg: &str) -> Option<bool> {
    match arg {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Turns one input line into intents. Returns `false` to quit.
async fn handle_line(driver: &mut SessionDriver, line: &str) -> anyhow::Result<bool> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(true);
    }
    let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
    let arg = arg.trim();

    let intent = match command {
        "/quit" | "/exit" => return Ok(false),
        "/help" => {
            println!("{HELP}");
            return Ok(true);
        }
        "/list" => {
            match driver.api().list_conversations().await {
                Ok(items) => {
                    for item in items {
                        let count = item.message_count.map(|n| format!(" ({n} messages)")).unwrap_or_default();
                        let title = item.title.unwrap_or_else(|| "Untitled chat".into());
                        println!("{}  {title}{count}", item.conversation_id);
                    }
                }
                Err(e) => println!("[error] {e}"),
            }
            return Ok(true);
        }
        "/image" => {
            let path = Path::new(arg);
            let bytes = tokio::fs::read(path).await?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or(arg);
            Intent::AttachImage(AttachedImage::from_bytes(name, image_mime(path), &bytes)?)
        }
        "/noimage" => Intent::RemoveImage,
        "/voice" => Intent::StartVoiceInput,
        "/retry" => Intent::RetrySend,
        "/summary" => Intent::ToggleSummary,
        "/export" => Intent::Export(if arg == "json" { ExportFormat::Json } else { ExportFormat::Text }),
        "/react" => {
            let (id, emoji) = arg.split_once(' ').unwrap_or((arg, "👍"));
            Intent::SetReaction { id: MessageId::new(id), emoji: emoji.trim().to_string() }
        }
        "/delete" => Intent::DeleteMessage(MessageId::new(arg)),
        "/new" => Intent::NewConversation,
        "/open" => Intent::SwitchConversation(arg.to_string()),
        "/drop" => Intent::DeleteConversation(arg.to_string()),
        "/lang" => Intent::SetLanguage(arg.to_string()),
        "/sound" | "/tts" | "/mic" => {
            let Some(enabled) = on_off(arg) else {
                println!("usage: {command} on|off");
                return Ok(true);
            };
            match command {
                "/sound" => Intent::SetAudioEnabled(enabled),
                "/tts" => Intent::SetSpeechOutputEnabled(enabled),
                _ => Intent::SetSpeechInputEnabled(enabled),
            }
        }
        "/dismiss" => {
            for intent in [Intent::DismissSendError, Intent::DismissSummaryError] {
                driver.dispatch(intent).await.ok();
            }
            Intent::DismissNotice
        }
        "/reload" => Intent::Reload,
        _ if command.starts_with('/') => {
            println!("unknown command, try /help");
            return Ok(true);
        }
        _ => {
            driver.dispatch(Intent::EditDraft(line.to_string())).await.ok();
            Intent::SubmitSend
        }
    };

    if let Err(e) = driver.dispatch(intent).await {
        println!("[!] {e}");
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentiment_chat_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Wiring ────────────────────────────────────────────────────────────────
    let config = ClientConfig::from_env();
    info!("Using conversation service at {}", config.api_base_url);

    let store = SettingsStore::new(&config.settings_path);
    let settings = store.load().await;
    let api = Arc::new(HttpConversationApi::new(&config)?);
    let coordinator = SideEffectCoordinator::new(
        Arc::new(TerminalBell),
        Arc::new(Unsupported),
        Arc::new(Unsupported),
    );
    let mut driver = SessionDriver::new(api, coordinator, settings)
        .with_settings_store(store)
        .with_export_dir(&config.export_dir);

    let first = std::env::args().nth(1);
    let intent = match first {
        Some(id) => Intent::SwitchConversation(id),
        None => Intent::NewConversation,
    };
    driver.dispatch(intent).await.ok();

    println!("Sentiment chat. Type /help for commands.");
    let mut renderer = Renderer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match handle_line(&mut driver, &line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => warn!("{e}"),
                }
            }
            _ = driver.next_completion(), if driver.in_flight() > 0 => {}
        }
        renderer.render(driver.view());
    }

    if driver.in_flight() > 0 {
        info!("Exiting with {} request(s) still in flight", driver.in_flight());
    }
    Ok(())
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ClientError;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SETTINGS_PATH: &str = "chat-settings.json";

// ── Process configuration ────────────────────────────────────────────────────

/// Connection and file-location settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub settings_path: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            export_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Reads `CHAT_*` variables from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout = lookup("CHAT_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            api_base_url: lookup("CHAT_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            auth_token: lookup("CHAT_AUTH_TOKEN").filter(|t| !t.is_empty()),
            request_timeout: timeout,
            settings_path: lookup("CHAT_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_path),
            export_dir: lookup("CHAT_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
        }
    }
}

// ── Languages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    Chinese,
    Japanese,
    Hindi,
    Arabic,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Chinese,
        Language::Japanese,
        Language::Hindi,
        Language::Arabic,
    ];

    /// Unknown codes resolve to English.
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(code))
            .unwrap_or(Language::English)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Chinese => "zh",
            Language::Japanese => "ja",
            Language::Hindi => "hi",
            Language::Arabic => "ar",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Español",
            Language::French => "Français",
            Language::German => "Deutsch",
            Language::Chinese => "中文",
            Language::Japanese => "日本語",
            Language::Hindi => "हिन्दी",
            Language::Arabic => "العربية",
        }
    }

    /// Spoken when speech output is switched on.
    pub fn speech_enabled_phrase(&self) -> &'static str {
        match self {
            Language::English => "Text to speech is now enabled",
            Language::Spanish => "El texto a voz está ahora habilitado",
            Language::French => "La synthèse vocale est maintenant activée",
            Language::German => "Text-zu-Sprache ist jetzt aktiviert",
            Language::Chinese => "文字转语音现已启用",
            Language::Japanese => "テキスト読み上げが有効になりました",
            Language::Hindi => "टेक्स्ट टू स्पीच अब सक्षम है",
            Language::Arabic => "تم تمكين تحويل النص إلى كلام الآن",
        }
    }
}

// ── Persisted user settings ──────────────────────────────────────────────────

/// Per-user toggles that survive restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub language: String,
    pub audio_enabled: bool,
    pub speech_output_enabled: bool,
    pub speech_input_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::English.code().to_string(),
            audio_enabled: true,
            speech_output_enabled: true,
            speech_input_enabled: true,
        }
    }
}

impl Settings {
    pub fn language(&self) -> Language {
        Language::from_code(&self.language)
    }
}

/// JSON file backing for [`Settings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable file yields defaults.
    pub async fn load(&self) -> Settings {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", self.path.display());
                return Settings::default();
            }
            Err(e) => {
                warn!("Failed to read settings {}: {e}", self.path.display());
                return Settings::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring corrupt settings file {}: {e}", self.path.display());
            Settings::default()
        })
    }

    pub async fn save(&self, settings: &Settings) -> Result<(), ClientError> {
        let json = serde_json::to_string_pretty(settings).map_err(|e| ClientError::Settings {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.auth_token.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_config_overrides() {
        let config = ClientConfig::from_lookup(|key| match key {
            "CHAT_API_BASE_URL" => Some("https://chat.example.com/api/".into()),
            "CHAT_AUTH_TOKEN" => Some("tok".into()),
            "CHAT_REQUEST_TIMEOUT_SECS" => Some("5".into()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://chat.example.com/api");
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        assert_eq!(Language::from_code("ja"), Language::Japanese);
        assert_eq!(Language::from_code("xx"), Language::English);
    }

    #[tokio::test]
    async fn test_settings_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));
        assert_eq!(store.load().await, Settings::default());

        let settings = Settings {
            language: "fr".into(),
            audio_enabled: false,
            ..Settings::default()
        };
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await, settings);
    }

    #[tokio::test]
    async fn test_corrupt_settings_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert_eq!(SettingsStore::new(path).load().await, Settings::default());
    }
}

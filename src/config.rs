//! Settings and runtime configuration.
//! Settings (credential + prompt template) are owned by the extension's
//! persistent storage; this crate only reads them through `SettingsStore`.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Token in the prompt template replaced by the raw source text.
pub const PROMPT_PLACEHOLDER: &str = "<TEXT>";

/// Prompt seeded by the settings page when the user has not saved one.
pub const DEFAULT_PROMPT: &str = "You are a professional news translator. Carefully analyze the entire text to understand its subject matter, context, and key message before translating.

Translate the following text into Persian while preserving the original formatting exactly, including line breaks, lists, spacing, bullet points, bold text, italics, and indentation.

- Maintain the original tone of the text (formal, informal, neutral, persuasive, etc.).
- If the text is formal, use a professional and polished tone.
- If the text is conversational, keep it natural and engaging.
- If the text is technical (e.g., medical, legal, engineering), use precise terminology.
- If the text contains idioms or metaphors, translate them naturally rather than literally.

Ensure that words and phrases are translated with the correct meaning based on context, not just literally. Adapt terminology appropriately based on the subject of the text to maintain accuracy and readability.

Original Text:
<TEXT>

Translated Text (with the same formatting and tone):";

/// Environment variable holding the API key for `EnvSettings`.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable holding the prompt template for `EnvSettings`.
pub const PROMPT_ENV: &str = "TRANSLATION_PROMPT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// User settings as stored by the extension (`apiKey`, `translationPrompt`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub translation_prompt: Option<String>,
}

impl Settings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            translation_prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.translation_prompt = Some(prompt.into());
        self
    }

    /// Parse the storage record. Unknown keys are ignored.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The credential, if configured. Blank values count as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Prompt template, falling back to `DEFAULT_PROMPT` when unset or blank.
    pub fn prompt_template(&self) -> &str {
        match self.translation_prompt.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => DEFAULT_PROMPT,
        }
    }

    /// Substitute `text` into the first placeholder of the template.
    pub fn render_prompt(&self, text: &str) -> String {
        self.prompt_template().replacen(PROMPT_PLACEHOLDER, text, 1)
    }
}

/// Read-only view of the settings storage.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Settings;
}

/// In-process settings, replaceable at runtime (the settings page writes through `set`).
#[derive(Default)]
pub struct MemorySettings {
    inner: RwLock<Settings>,
}

impl MemorySettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn set(&self, settings: Settings) {
        *self.inner.write() = settings;
        debug!("settings_replaced");
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn load(&self) -> Settings {
        self.inner.read().clone()
    }
}

/// Settings read from `GEMINI_API_KEY` / `TRANSLATION_PROMPT` on every load.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSettings;

#[async_trait]
impl SettingsStore for EnvSettings {
    async fn load(&self) -> Settings {
        Settings {
            api_key: std::env::var(API_KEY_ENV).ok(),
            translation_prompt: std::env::var(PROMPT_ENV).ok(),
        }
    }
}

/// Fixed-delay retry on HTTP 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(2),
        }
    }
}

/// Remote generation endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the models collection.
    pub endpoint: String,
    pub model: String,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".into(),
            model: "gemini-2.0-flash".into(),
            retry: RetryPolicy::default(),
        }
    }
}

/// User-visible strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub selection_button: String,
    pub feed_button: String,
    pub busy: String,
    pub panel_header: String,
    pub retranslate_icon: String,
    pub retranslate_busy: String,
    pub failure_notice: String,
    pub retranslate_failed: String,
    pub close: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            selection_button: "Translate".into(),
            feed_button: "Translate".into(),
            busy: "Translating...".into(),
            panel_header: "Translation".into(),
            retranslate_icon: "\u{21bb}".into(),
            retranslate_busy: "Translating again...".into(),
            failure_notice: "Translation failed.".into(),
            retranslate_failed: "Re-translation failed. Please try again.".into(),
            close: "\u{00d7}".into(),
        }
    }
}

/// Feed sites and the content nodes treated as feed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub hosts: Vec<String>,
    pub selector: crate::page::FeedSelector,
    /// Data flag set on items that already carry an affordance.
    pub marker: String,
    pub debounce: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["twitter.com".into(), "x.com".into()],
            selector: crate::page::FeedSelector::default(),
            marker: "buttonAdded".into(),
            debounce: Duration::from_millis(250),
        }
    }
}

impl FeedConfig {
    pub fn matches_host(&self, hostname: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(hostname))
    }
}

/// Everything the content script needs besides the page and the settings store.
#[derive(Debug, Clone, Default)]
pub struct ContentConfig {
    pub client: ClientConfig,
    pub feed: FeedConfig,
    pub labels: Labels,
    pub timings: Timings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Wait after pointer release before reading the selection.
    pub selection_delay: Duration,
    /// Outside-click dismissal ignores clicks for this long after creation.
    pub dismiss_arm_delay: Duration,
    pub fade: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            selection_delay: Duration::from_millis(300),
            dismiss_arm_delay: Duration::from_millis(100),
            fade: Duration::from_millis(300),
        }
    }
}

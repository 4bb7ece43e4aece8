//! Configuration management for the Muse bot.
//!
//! The bot reads an optional JSON file at `~/.muse/config.json` (or the path
//! in `MUSE_CONFIG`) and then applies environment overrides. Every field has
//! a default, so an empty file or no file at all is valid; only the two
//! credentials are required, and `validate()` checks for them.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `BOT_TOKEN` / `TELEGRAM_BOT_TOKEN` → secrets.telegram_bot_token
//! - `OPENAI_API_KEY` → secrets.openai_api_key
//! - `ADMIN_ID` → admin.admin_id
//! - `CHANNEL_LINK` → branding.channel_link
//! - `WELCOME_IMAGE_URL` → branding.welcome_image_url
//! - `OPENAI_BASE_URL` → openai.base_url
//! - `MUSE_LOG_LEVEL` → observability.log_level
//! - `MUSE_LOG_FORMAT` → observability.log_format

use crate::error::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Placeholder replaced with the current date in the system prompt.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Placeholder replaced with the community link in persona texts.
pub const CHANNEL_LINK_PLACEHOLDER: &str = "{channel_link}";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".muse"),
        |dirs| dirs.home_dir().join(".muse"),
    )
}

/// Get the configuration file path, honouring `MUSE_CONFIG`.
pub fn config_path() -> PathBuf {
    match std::env::var("MUSE_CONFIG") {
        Ok(path) if !path.trim().is_empty() => {
            PathBuf::from(shellexpand::tilde(path.trim()).into_owned())
        }
        _ => config_dir().join("config.json"),
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Credentials for the two upstream services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    /// OpenAI API key
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

// ============================================================================
// Admin
// ============================================================================

/// Administrator identity and request log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Telegram numeric user id allowed to read the request log.
    /// When unset, `/admin` is ignored for everybody.
    #[serde(default)]
    pub admin_id: Option<i64>,

    /// Send the administrator a note whenever someone opens the bot with `/start`
    #[serde(default = "default_true")]
    pub notify_on_start: bool,

    /// Number of most recent entries shown by `/admin`
    #[serde(default = "default_request_log_window")]
    pub request_log_window: usize,

    /// Number of entries retained in memory; older ones are evicted
    #[serde(default = "default_request_log_capacity")]
    pub request_log_capacity: usize,

    /// Label printed for chat requests in the request log
    #[serde(default = "default_chat_label")]
    pub chat_label: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            admin_id: None,
            notify_on_start: true,
            request_log_window: default_request_log_window(),
            request_log_capacity: default_request_log_capacity(),
            chat_label: default_chat_label(),
        }
    }
}

fn default_request_log_window() -> usize {
    20
}

fn default_request_log_capacity() -> usize {
    200
}

fn default_chat_label() -> String {
    "GPT-4o".into()
}

// ============================================================================
// Branding & Persona
// ============================================================================

/// Public links shown to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandingConfig {
    /// Community / channel link
    #[serde(default = "default_channel_link")]
    pub channel_link: String,

    /// Image sent together with the `/start` greeting
    #[serde(default = "default_welcome_image_url")]
    pub welcome_image_url: String,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            channel_link: default_channel_link(),
            welcome_image_url: default_welcome_image_url(),
        }
    }
}

fn default_channel_link() -> String {
    "https://t.me/applab_ua".into()
}

fn default_welcome_image_url() -> String {
    "https://i.ibb.co/FLkjGL5X/IMG-0285.png".into()
}

/// Texts that define how the assistant presents itself.
///
/// `system_prompt` may contain `{date}`; `biography` and `greeting` may
/// contain `{channel_link}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Fixed answer to "describe yourself" queries (Markdown)
    #[serde(default = "default_biography")]
    pub biography: String,

    /// `/start` greeting (Markdown)
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            biography: default_biography(),
            greeting: default_greeting(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are an AI assistant developed by AppLab. It is now {date}. \
     Answer queries accurately, translate between any languages, generate professional images, \
     and edit photos per user instructions. You have no live internet access; \
     say so when asked about events after your training data."
        .into()
}

fn default_biography() -> String {
    "Я — універсальний AI-асистент від AppLab, створений компанією AppLab. \
     Мене створив засновник компанії AppLab Evgeniy Kolokolov. \
     Деталі за [ссилкою]({channel_link})."
        .into()
}

fn default_greeting() -> String {
    "*👋 Привіт!*\n\
     Я — універсальний AI-асистент від [AppLab]({channel_link}) 🤖\n\n\
     *✍️ Створюю та редагую тексти*\n\
     *🌍 Перекладаю будь-якою мовою світу*\n\
     *🎨 Генерую професійні зображення*\n\
     *💻 Пишу та пояснюю код*\n\n\
     📩 Просто напишіть свій запит у чаті — і я все зроблю!"
        .into()
}

// ============================================================================
// Upstream APIs
// ============================================================================

/// OpenAI HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL (without `/v1`)
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            timeout_secs: default_openai_timeout(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".into()
}

fn default_openai_timeout() -> u64 {
    120
}

/// Telegram long-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// `getUpdates` long-poll timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// HTTP timeout for every Bot API call; must exceed the poll timeout
    #[serde(default = "default_telegram_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout(),
            request_timeout_secs: default_telegram_request_timeout(),
        }
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_telegram_request_timeout() -> u64 {
    60
}

// ============================================================================
// Responders
// ============================================================================

/// Chat completion settings and history bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,

    /// Number of turns (including the new user turn) sent with each request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Number of turns retained per conversation; oldest are evicted
    #[serde(default = "default_max_retained_turns")]
    pub max_retained_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            history_window: default_history_window(),
            max_retained_turns: default_max_retained_turns(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o".into()
}

fn default_temperature() -> f64 {
    0.5
}

fn default_max_tokens() -> i64 {
    1500
}

fn default_history_window() -> usize {
    20
}

fn default_max_retained_turns() -> usize {
    100
}

/// Image generation and edit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Model for `/v1/images/generations`
    #[serde(default = "default_image_model")]
    pub model: String,

    /// Model for `/v1/images/edits`
    #[serde(default = "default_edit_model")]
    pub edit_model: String,

    #[serde(default = "default_image_size")]
    pub size: String,

    /// Style qualifier put in front of generation prompts
    #[serde(default = "default_generate_prefix")]
    pub generate_prompt_prefix: String,

    /// Qualifier put in front of edit prompts
    #[serde(default = "default_edit_prefix")]
    pub edit_prompt_prefix: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            edit_model: default_edit_model(),
            size: default_image_size(),
            generate_prompt_prefix: default_generate_prefix(),
            edit_prompt_prefix: default_edit_prefix(),
        }
    }
}

fn default_image_model() -> String {
    "dall-e-3".into()
}

fn default_edit_model() -> String {
    "dall-e-2".into()
}

fn default_image_size() -> String {
    "1024x1024".into()
}

fn default_generate_prefix() -> String {
    "High-resolution professional image, realistic style, 4k".into()
}

fn default_edit_prefix() -> String {
    "Professional photo editing, enhanced".into()
}

/// Retry behaviour for image requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (base delay when exponential)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Double the delay after each failed attempt
    #[serde(default)]
    pub exponential: bool,

    /// Upper bound for exponential backoff
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Retry 4xx responses (except 408/429, which are always retried)
    #[serde(default = "default_true")]
    pub retry_client_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            exponential: false,
            max_backoff_ms: default_max_backoff_ms(),
            retry_client_errors: true,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

/// Keyword data for intent classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentsConfig {
    /// Phrases (case-insensitive substrings) asking the bot to describe itself
    #[serde(default = "default_self_description")]
    pub self_description: Vec<String>,

    /// Verbs (case-insensitive whole words) that request an image
    #[serde(default = "default_image_keywords")]
    pub image_keywords: Vec<String>,

    /// Command token that starts a photo edit
    #[serde(default = "default_edit_command")]
    pub edit_command: String,
}

impl Default for IntentsConfig {
    fn default() -> Self {
        Self {
            self_description: default_self_description(),
            image_keywords: default_image_keywords(),
            edit_command: default_edit_command(),
        }
    }
}

fn default_self_description() -> Vec<String> {
    [
        "опиши себя",
        "о тебе",
        "скажи о себе",
        "кто ты",
        "хто ти",
        "розкажи про себе",
        "describe yourself",
        "tell me about yourself",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_image_keywords() -> Vec<String> {
    [
        "нарисуй",
        "рисуй",
        "намалюй",
        "малюй",
        "згенеруй",
        "draw",
        "paint",
        "create",
        "generate",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_edit_command() -> String {
    "/edit".into()
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub branding: BrandingConfig,

    #[serde(default)]
    pub persona: PersonaConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub intents: IntentsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("BOT_TOKEN").or_else(|| get("TELEGRAM_BOT_TOKEN")) {
            self.secrets.telegram_bot_token = Some(token);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.secrets.openai_api_key = Some(key);
        }
        if let Some(id) = get("ADMIN_ID") {
            match id.trim().parse() {
                Ok(id) => self.admin.admin_id = Some(id),
                Err(_) => tracing::warn!(value = %id, "Ignoring non-numeric ADMIN_ID"),
            }
        }
        if let Some(link) = get("CHANNEL_LINK") {
            self.branding.channel_link = link;
        }
        if let Some(url) = get("WELCOME_IMAGE_URL") {
            self.branding.welcome_image_url = url;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Some(level) = get("MUSE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = get("MUSE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Telegram bot token, if configured and non-empty.
    pub fn telegram_bot_token(&self) -> Option<&str> {
        self.secrets
            .telegram_bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
    }

    /// OpenAI API key, if configured and non-empty.
    pub fn openai_api_key(&self) -> Option<&str> {
        self.secrets
            .openai_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
    }

    /// Whether `user_id` is the configured administrator.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin.admin_id == Some(user_id)
    }

    /// System prompt with `{date}` substituted.
    pub fn system_prompt(&self, date: &str) -> String {
        self.persona.system_prompt.replace(DATE_PLACEHOLDER, date)
    }

    /// Self-description answer with the channel link substituted.
    pub fn biography(&self) -> String {
        self.persona
            .biography
            .replace(CHANNEL_LINK_PLACEHOLDER, &self.branding.channel_link)
    }

    /// `/start` greeting with the channel link substituted.
    pub fn greeting(&self) -> String {
        self.persona
            .greeting
            .replace(CHANNEL_LINK_PLACEHOLDER, &self.branding.channel_link)
    }
}

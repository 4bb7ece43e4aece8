//! Keyword-based intent classification.
//!
//! Rules are data loaded from the `intents` config section. Checks run in a
//! fixed order: edit command, image keyword, self-description, chat.

use muse_common::config::IntentsConfig;
use muse_common::Error;
use regex::Regex;

/// What an inbound text asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SelfDescription,
    ImageGenerate,
    ImageEdit,
    Chat,
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct IntentRules {
    /// Lowercased phrases matched as substrings
    self_phrases: Vec<String>,
    /// Whole-word image keyword matcher, `None` when no keywords are configured
    image_pattern: Option<Regex>,
    /// Lowercased command token, e.g. `/edit`
    edit_command: String,
}

impl IntentRules {
    pub fn new(config: &IntentsConfig) -> Result<Self, Error> {
        let keywords: Vec<String> = config
            .image_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        let image_pattern = if keywords.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
            Some(
                Regex::new(&pattern)
                    .map_err(|e| Error::Config(format!("intents.image_keywords: {e}")))?,
            )
        };

        let edit_command = config.edit_command.trim().to_lowercase();
        if edit_command.is_empty() || edit_command.contains(char::is_whitespace) {
            return Err(Error::Config(
                "intents.edit_command must be a single non-empty token".into(),
            ));
        }

        Ok(Self {
            self_phrases: config
                .self_description
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            image_pattern,
            edit_command,
        })
    }

    /// Classify `text`.
    pub fn classify(&self, text: &str) -> Intent {
        if self.is_edit_command(text) {
            Intent::ImageEdit
        } else if self.is_image_request(text) {
            Intent::ImageGenerate
        } else if self.is_self_description(text) {
            Intent::SelfDescription
        } else {
            Intent::Chat
        }
    }

    /// Text begins with the edit command, alone or as `/edit@botname`.
    pub fn is_edit_command(&self, text: &str) -> bool {
        let first = text.split_whitespace().next().unwrap_or_default().to_lowercase();
        match first.strip_prefix(self.edit_command.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('@'),
            None => false,
        }
    }

    /// Text contains an image keyword as a whole word.
    pub fn is_image_request(&self, text: &str) -> bool {
        self.image_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }

    /// Text contains a self-description phrase.
    pub fn is_self_description(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.self_phrases.iter().any(|p| lowered.contains(p.as_str()))
    }

    /// Everything after the command token, trimmed.
    pub fn edit_description<'a>(&self, text: &'a str) -> &'a str {
        let text = text.trim_start();
        match text.find(char::is_whitespace) {
            Some(idx) => text[idx..].trim(),
            None => "",
        }
    }
}

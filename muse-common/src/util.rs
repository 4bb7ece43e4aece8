//! Utility functions for Muse crates.

use regex::Regex;
use std::sync::OnceLock;

/// Dash-like characters that models emit in place of an ASCII hyphen.
const NON_ASCII_HYPHENS: &[char] = &[
    '\u{2010}', // hyphen
    '\u{2011}', // non-breaking hyphen
    '\u{2012}', // figure dash
    '\u{2013}', // en dash
    '\u{2014}', // em dash
    '\u{2015}', // horizontal bar
    '\u{2212}', // minus sign
    '\u{FE58}', // small em dash
    '\u{FE63}', // small hyphen-minus
    '\u{FF0D}', // fullwidth hyphen-minus
];

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// This function safely handles multi-byte UTF-8 characters (emoji, Cyrillic, CJK)
/// by using character boundaries instead of byte indices.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Replace every non-standard hyphen or dash character with an ASCII `-`.
pub fn normalize_hyphens(s: &str) -> String {
    s.chars()
        .map(|c| if NON_ASCII_HYPHENS.contains(&c) { '-' } else { c })
        .collect()
}

fn redaction_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let raw: &[(&str, &str)] = &[
            (r"(?i)(api[_-]?key|apikey)[=:]\s*\S{20,}", "$1=***REDACTED***"),
            (r"(?i)(token|secret|bearer)\s*[=:]\s*\S{10,}", "$1=***REDACTED***"),
            (r"sk-[a-zA-Z0-9_-]{20,}", "***REDACTED_API_KEY***"),
            (r"bot\d{6,}:[A-Za-z0-9_-]{30,}", "bot***REDACTED_BOT_TOKEN***"),
        ];
        raw.iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern).ok().map(|re| (re, *replacement))
            })
            .collect()
    })
}

/// Sanitize a string for safe logging (redact API keys and bot tokens).
///
/// reqwest errors embed the request URL, and Telegram URLs carry the bot token.
pub fn sanitize_for_log(s: &str) -> String {
    let mut result = s.to_string();
    for (re, replacement) in redaction_patterns() {
        result = re.replace_all(&result, *replacement).to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(truncate_with_ellipsis("привіт світ", 6), "привіт...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
    }

    #[test]
    fn test_normalize_hyphens() {
        assert_eq!(normalize_hyphens("well\u{2011}known"), "well-known");
        assert_eq!(normalize_hyphens("2020\u{2013}2024 \u{2014} done"), "2020-2024 - done");
        assert_eq!(normalize_hyphens("plain-text"), "plain-text");
        assert_eq!(normalize_hyphens("Привіт"), "Привіт");
    }

    #[test]
    fn test_sanitize_for_log_api_key() {
        let input = "Using api_key=sk-proj-12345678901234567890";
        let output = sanitize_for_log(input);
        assert!(!output.contains("sk-proj-12345678901234567890"));
        assert!(output.contains("REDACTED"));
    }

    #[test]
    fn test_sanitize_for_log_bot_token() {
        let input =
            "error sending request for url (https://api.telegram.org/bot7543432497:AAG5DI2jssDxX25oKofN3QBUcVpelS94on4/getUpdates)";
        let output = sanitize_for_log(input);
        assert!(!output.contains("AAG5DI2jssDxX25oKofN3QBUcVpelS94on4"));
        assert!(output.contains("/getUpdates"));
    }
}

//! Sensitive-content filter
//! Substring and pattern checks run over outbound text before a vendor call

use crate::error::GatewayError;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

pub const BLOCKED_MESSAGE: &str = "Request contains sensitive content and has been blocked.";

/// Prefix marking a regular expression line in a banned-words file
const PATTERN_PREFIX: &str = "re:";

#[derive(Debug, Default)]
pub struct ContentFilter {
    words: Vec<String>,
    patterns: Vec<Regex>,
}

impl ContentFilter {
    pub fn new<I, S>(words: I, patterns: Vec<Regex>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        Self { words, patterns }
    }

    /// Parse banned-word lines. Blank lines and `#` comments are skipped; `re:` lines are patterns.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self, regex::Error> {
        let mut words = Vec::new();
        let mut patterns = Vec::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix(PATTERN_PREFIX) {
                Some(pattern) => patterns.push(Regex::new(pattern.trim())?),
                None => words.push(line),
            }
        }

        Ok(Self::new(words, patterns))
    }

    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_lines(raw.lines()).map_err(|err| {
            GatewayError::Config(format!("invalid pattern in {}: {err}", path.display()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.patterns.is_empty()
    }

    /// Reject `input` when any of its text hits a banned word or pattern
    pub fn check<T>(&self, input: &T) -> Result<(), GatewayError>
    where
        T: Serialize + ?Sized,
    {
        if self.is_empty() {
            return Ok(());
        }
        let value = serde_json::to_value(input)
            .map_err(|err| GatewayError::upstream(format!("content serialization failed: {err}")))?;
        self.check_value(&value)
    }

    pub fn check_value(&self, value: &Value) -> Result<(), GatewayError> {
        if self.is_empty() {
            return Ok(());
        }
        let mut text = String::new();
        collect_text(value, &mut text);
        if text.is_empty() {
            return Ok(());
        }

        let normalized = text.to_lowercase();
        if let Some(word) = self.words.iter().find(|word| normalized.contains(word.as_str())) {
            warn!(word = %word, "[Sensitive Check] blocked by word");
            return Err(GatewayError::bad_request(BLOCKED_MESSAGE));
        }
        if let Some(pattern) = self.patterns.iter().find(|pattern| pattern.is_match(&text)) {
            warn!(pattern = %pattern.as_str(), "[Sensitive Check] blocked by pattern");
            return Err(GatewayError::bad_request(BLOCKED_MESSAGE));
        }
        Ok(())
    }
}

/// Flatten strings, arrays, and `parts`/`text` objects into newline-separated text
fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(text) => {
            out.push_str(text);
            out.push('\n');
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(map) => match map.get("parts") {
            Some(parts) if !parts.is_null() => collect_text(parts, out),
            _ => {
                if let Some(Value::String(text)) = map.get("text") {
                    if !text.is_empty() {
                        out.push_str(text);
                        out.push('\n');
                    }
                }
            }
        },
        _ => {}
    }
}

//! User-visible messages attached to an advisor response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

/// Ordered list of messages for one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Messages(Vec<Message>);

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, level: Level, text: impl Into<String>) {
        self.0.push(Message {
            level,
            text: text.into(),
        });
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.add(Level::Success, text);
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.add(Level::Info, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.add(Level::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.add(Level::Error, text);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|m| m.level == Level::Error)
    }

    /// Text of the first message at `level`, if any.
    pub fn first(&self, level: Level) -> Option<&str> {
        self.0
            .iter()
            .find(|m| m.level == level)
            .map(|m| m.text.as_str())
    }
}

impl<'a> IntoIterator for &'a Messages {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_serialize_lowercase() {
        let mut messages = Messages::new();
        messages.success("Dataset uploaded successfully.");
        messages.error("Failed to save dataset: disk full");

        let json = serde_json::to_value(&messages).unwrap();
        assert_eq!(json[0]["level"], "success");
        assert_eq!(json[1]["level"], "error");
        assert!(messages.has_errors());
    }

    #[test]
    fn test_first_by_level() {
        let mut messages = Messages::new();
        messages.info("a");
        messages.warning("b");
        assert_eq!(messages.first(Level::Warning), Some("b"));
        assert_eq!(messages.first(Level::Error), None);
        assert!(!messages.has_errors());
    }
}

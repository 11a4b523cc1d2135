use std::fmt;

use serde::{Deserialize, Serialize};

/// A message that can be shown as the message of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub text: String,
}

impl Message {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }

    /// Shown when nobody contributed any messages.
    pub fn fallback() -> Self {
        Self::new("Anon", "Work hard and be good to your Mother")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"\n\n- {}", self.text, self.author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_text_and_credits_author() {
        let message = Message::new("Tom Gilb", "Don't do it on a large scale.");
        assert_eq!(
            message.to_string(),
            "\"Don't do it on a large scale.\"\n\n- Tom Gilb"
        );
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(Message::fallback()).unwrap();
        assert_eq!(json["author"], "Anon");
    }
}

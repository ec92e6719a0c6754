//! Text-generation provider abstraction.

use async_trait::async_trait;

use crate::error::LlmError;

pub mod gemini;

pub use gemini::GeminiProvider;

/// Replies longer than this get truncated.
pub const MAX_REPLY_CHARS: usize = 300;
/// Truncated replies keep this many characters plus an ellipsis.
pub const TRUNCATED_REPLY_CHARS: usize = 280;

/// A provider that turns a persona prompt plus user text into a reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_message: &str)
    -> Result<String, LlmError>;
}

/// Cap a generated reply for chat delivery.
///
/// Counts characters, not bytes; replies are mostly CJK text where the two
/// differ by a factor of three.
pub fn truncate_reply(text: &str) -> String {
    if text.chars().count() <= MAX_REPLY_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(TRUNCATED_REPLY_CHARS).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn short_replies_pass_through() {
        assert_eq!(truncate_reply("嘎嘎"), "嘎嘎");
    }

    #[test]
    fn long_replies_truncate_to_280_chars_plus_ellipsis() {
        let long: String = "鵝".repeat(400);
        let out = truncate_reply(&long);
        assert_eq!(out.chars().count(), TRUNCATED_REPLY_CHARS + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn exactly_at_limit_is_untouched() {
        let text: String = "a".repeat(MAX_REPLY_CHARS);
        assert_eq!(truncate_reply(&text), text);
    }

    #[test]
    fn trailing_whitespace_is_trimmed_before_ellipsis() {
        let mut text = "x".repeat(279);
        text.push(' ');
        text.push_str(&"y".repeat(100));
        let out = truncate_reply(&text);
        assert_eq!(out, format!("{}...", "x".repeat(279)));
    }
}

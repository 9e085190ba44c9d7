use once_cell::sync::Lazy;
use regex::Regex;

use crate::data::ConversationMessage;

static THINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid think pattern"));

/// Removes every `<think>...</think>` scratch segment from an assistant reply.
pub fn strip_think(text: &str) -> String {
    THINK_PATTERN.replace_all(text, "").trim().to_owned()
}

/// Append-only message history of one chat, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    messages: Vec<ConversationMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    /// Appends the stored history fetched when the chat is opened.
    pub fn extend_history(&mut self, history: impl IntoIterator<Item = ConversationMessage>) {
        self.messages.extend(history);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages[..]
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_segments_case_insensitively() {
        let reply = "<THINK>\nplan the\nanswer\n</Think>\n  Hello <think>x</think>there ";

        assert_eq!(strip_think(reply), "Hello there");
    }

    #[test]
    fn leaves_text_without_think_untouched() {
        assert_eq!(strip_think(r#"[{"question": "Q"}]"#), r#"[{"question": "Q"}]"#);
    }

    #[test]
    fn log_keeps_arrival_order() {
        let mut log = ConversationLog::new();
        log.extend_history(vec![ConversationMessage::user("hi")]);
        log.append(ConversationMessage::assistant("hello"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0], ConversationMessage::user("hi"));
        assert_eq!(log.last(), Some(&ConversationMessage::assistant("hello")));
    }
}

//! Prior conversation turns supplied by the caller

use serde::{Deserialize, Serialize};

use crate::rag::context::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// How much history reaches the prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryWindow {
    /// Most recent turns kept
    pub turns: usize,
    /// Character cap per turn
    pub turn_chars: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            turns: 6,
            turn_chars: 500,
        }
    }
}

impl HistoryWindow {
    /// Delimited block of the most recent turns, or `None` when there are none
    pub fn render(&self, history: &[ChatTurn]) -> Option<String> {
        if history.is_empty() || self.turns == 0 {
            return None;
        }

        let start = history.len().saturating_sub(self.turns);
        let mut out = String::from("=== PREVIOUS CONVERSATION ===\n");
        for turn in &history[start..] {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            out.push_str(&format!(
                "{}: {}\n",
                speaker,
                truncate_chars(turn.content.trim(), self.turn_chars)
            ));
        }
        out.push_str("=== END OF PREVIOUS CONVERSATION ===\n");
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_most_recent_turns() {
        let history: Vec<ChatTurn> = (0..10).map(|i| ChatTurn::user(format!("message {}", i))).collect();
        let block = HistoryWindow::default().render(&history).unwrap();
        assert!(!block.contains("message 3"));
        assert!(block.contains("message 4"));
        assert!(block.contains("message 9"));
    }

    #[test]
    fn test_truncates_long_turns() {
        let window = HistoryWindow {
            turns: 6,
            turn_chars: 5,
        };
        let block = window.render(&[ChatTurn::assistant("abcdefghij")]).unwrap();
        assert!(block.contains("Assistant: abcde"));
        assert!(!block.contains("abcdef"));
    }

    #[test]
    fn test_empty_history_renders_nothing() {
        assert!(HistoryWindow::default().render(&[]).is_none());
    }
}

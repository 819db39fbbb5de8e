use serde::{Deserialize, Serialize};

/// The question currently on screen. Correct answers never reach the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    /// Zero-based, non-decreasing within a session.
    pub index: usize,
    pub prompt: String,
    pub choices: Vec<String>,
}

impl QuestionView {
    /// Human-facing question number.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn has_choice(&self, choice: &str) -> bool {
        self.choices.iter().any(|c| c == choice)
    }
}

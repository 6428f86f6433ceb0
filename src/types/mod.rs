use serde::{Deserialize, Serialize};

mod callback;
mod participant;
pub use callback::*;
pub use participant::*;

/// Telegram user id as used for participant keys.
pub type UserKey = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn new(text: impl Into<String>, options: Vec<String>, correct_index: usize) -> Self {
        Self {
            text: text.into(),
            options,
            correct_index,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.options.len() < 2 {
            return Err(format!("needs at least 2 options, got {}", self.options.len()));
        }
        if self.correct_index >= self.options.len() {
            return Err(format!(
                "correct index {} outside {} options",
                self.correct_index,
                self.options.len()
            ));
        }
        Ok(())
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }
}

/// Letter label for an option position: 0 -> 'A'.
pub fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

/// Persisted question file: the questions plus an optional time override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_time: Option<u64>,
}

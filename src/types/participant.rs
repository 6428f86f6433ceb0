use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::UserKey;

pub fn now_stamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub first_seen: NaiveDateTime,
    #[serde(default)]
    pub last_seen: Option<NaiveDateTime>,
    #[serde(default)]
    pub chat_ids: Vec<i64>,
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub quizzes_completed: u32,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub has_completed_current_quiz: bool,
}

impl Participant {
    pub fn new(name: String) -> Self {
        let now = now_stamp();
        Self {
            name,
            first_seen: now,
            last_seen: Some(now),
            chat_ids: Vec::new(),
            total_score: 0,
            quizzes_completed: 0,
            accuracy: 0.0,
            has_completed_current_quiz: false,
        }
    }

    /// Clears statistics and completion but keeps identity and chat links.
    pub fn reset_stats(&mut self) {
        self.total_score = 0;
        self.quizzes_completed = 0;
        self.accuracy = 0.0;
        self.has_completed_current_quiz = false;
        self.last_seen = Some(now_stamp());
    }

    /// Folds one finished round into the running totals.
    pub fn record_round(&mut self, score: u32, correct: u32, total_questions: usize) {
        self.has_completed_current_quiz = true;
        self.total_score += i64::from(score);
        self.quizzes_completed += 1;

        if total_questions > 0 {
            let round_accuracy = f64::from(correct) / total_questions as f64 * 100.0;
            let accuracy = if self.quizzes_completed > 1 {
                let n = f64::from(self.quizzes_completed);
                (self.accuracy * (n - 1.0) + round_accuracy) / n
            } else {
                round_accuracy
            };
            self.accuracy = round2(accuracy);
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRegistry {
    #[serde(default)]
    pub completed_users: BTreeSet<UserKey>,
    #[serde(default = "default_active")]
    pub quiz_active: bool,
}

fn default_active() -> bool {
    true
}

impl Default for CompletionRegistry {
    fn default() -> Self {
        Self {
            completed_users: BTreeSet::new(),
            quiz_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_a_running_mean() {
        let mut p = Participant::new("Ada".to_string());
        p.record_round(20, 2, 4);
        assert_eq!(p.accuracy, 50.0);
        p.record_round(10, 1, 1);
        assert_eq!(p.accuracy, 75.0);
        p.record_round(0, 0, 3);
        assert_eq!(p.accuracy, 50.0);
        assert_eq!(p.total_score, 30);
        assert_eq!(p.quizzes_completed, 3);
    }

    #[test]
    fn accuracy_rounds_to_two_decimals() {
        let mut p = Participant::new("Bo".to_string());
        p.record_round(10, 1, 3);
        assert_eq!(p.accuracy, 33.33);
    }

    #[test]
    fn registry_defaults_to_open() {
        let reg: CompletionRegistry = serde_json::from_str("{}").unwrap();
        assert!(reg.quiz_active);
        assert!(reg.completed_users.is_empty());
    }
}

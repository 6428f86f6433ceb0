use crate::config::ScoringRules;
use crate::error::QuizError;
use crate::leaderboard::{self, Standing};
use crate::types::{Question, UserKey};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

mod shuffle;
pub use shuffle::shuffle_round;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    pub option: usize,
    pub correct: bool,
    pub points: u32,
    pub latency: Duration,
}

/// What one participant did during the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub user: UserKey,
    pub name: String,
    pub score: u32,
    pub answers: BTreeMap<usize, AnswerRecord>,
    pub total_latency: Duration,
    pub correct_answers: u32,
}

impl SessionEntry {
    fn new(user: UserKey, name: String) -> Self {
        Self {
            user,
            name,
            score: 0,
            answers: BTreeMap::new(),
            total_latency: Duration::ZERO,
            correct_answers: 0,
        }
    }

    pub fn standing(&self) -> Standing {
        Standing {
            user: self.user,
            name: self.name.clone(),
            score: self.score,
            total_latency: self.total_latency,
            correct_answers: self.correct_answers,
            answered: self.answers.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question: usize,
    pub correct: bool,
    pub points: u32,
    pub first_correct: bool,
    pub latency: Duration,
    pub correct_index: usize,
    pub everyone_answered: bool,
}

/// One chat's quiz round. Pure state: the caller supplies the clock.
#[derive(Debug)]
pub struct ChatQuizSession {
    chat_id: i64,
    questions: Vec<Question>,
    rules: ScoringRules,
    current: Option<usize>,
    running: bool,
    accepting: bool,
    question_started: Option<Instant>,
    entries: Vec<SessionEntry>,
    index: HashMap<UserKey, usize>,
    answered_current: HashSet<UserKey>,
    first_correct: HashMap<usize, UserKey>,
}

impl ChatQuizSession {
    pub fn new(chat_id: i64, questions: Vec<Question>, rules: ScoringRules) -> Self {
        Self {
            chat_id,
            questions,
            rules,
            current: None,
            running: true,
            accepting: false,
            question_started: None,
            entries: Vec::new(),
            index: HashMap::new(),
            answered_current: HashSet::new(),
            first_correct: HashMap::new(),
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current.and_then(|i| self.questions.get(i))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_accepting(&self) -> bool {
        self.running && self.accepting
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn entry(&self, user: UserKey) -> Option<&SessionEntry> {
        self.index.get(&user).map(|&i| &self.entries[i])
    }

    pub fn first_correct(&self, question: usize) -> Option<UserKey> {
        self.first_correct.get(&question).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answered_current.len()
    }

    /// Answering is what puts a user on the roster that early completion
    /// waits for.
    fn enroll(&mut self, user: UserKey, name: &str) -> &mut SessionEntry {
        let idx = match self.index.get(&user) {
            Some(&idx) => idx,
            None => {
                self.entries.push(SessionEntry::new(user, name.to_string()));
                let idx = self.entries.len() - 1;
                self.index.insert(user, idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    /// Moves to the next question and opens it for answers. Returns its index,
    /// or `None` when the round is exhausted or stopped.
    pub fn advance(&mut self, now: Instant) -> Option<usize> {
        if !self.running {
            return None;
        }
        let next = self.current.map_or(0, |i| i + 1);
        if next >= self.questions.len() {
            self.accepting = false;
            return None;
        }
        self.current = Some(next);
        self.accepting = true;
        self.question_started = Some(now);
        self.answered_current.clear();
        Some(next)
    }

    pub fn close_question(&mut self) {
        self.accepting = false;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.accepting = false;
    }

    /// True once every roster member has answered the open question.
    pub fn everyone_answered(&self) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|e| self.answered_current.contains(&e.user))
    }

    pub fn submit(
        &mut self,
        user: UserKey,
        name: &str,
        question: usize,
        option: usize,
        now: Instant,
    ) -> Result<AnswerOutcome, QuizError> {
        if !self.running {
            return Err(QuizError::NotRunning);
        }
        if !self.accepting {
            return Err(QuizError::TooLate);
        }
        if self.current != Some(question) {
            return Err(QuizError::StaleQuestion);
        }
        if self.answered_current.contains(&user) {
            return Err(QuizError::AlreadyAnswered);
        }
        let correct_index = self.questions[question].correct_index;
        if option >= self.questions[question].options.len() {
            return Err(QuizError::InvalidOption(option));
        }

        let latency = self
            .question_started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let correct = option == correct_index;

        let mut points = 0;
        let mut first_correct = false;
        if correct {
            points = self.rules.points_correct;
            if !self.first_correct.contains_key(&question) {
                self.first_correct.insert(question, user);
                first_correct = true;
                points += self.rules.first_correct_bonus;
            }
        }

        self.answered_current.insert(user);
        let entry = self.enroll(user, name);
        entry.total_latency += latency;
        entry.score += points;
        if correct {
            entry.correct_answers += 1;
        }
        entry.answers.insert(
            question,
            AnswerRecord {
                option,
                correct,
                points,
                latency,
            },
        );

        Ok(AnswerOutcome {
            question,
            correct,
            points,
            first_correct,
            latency,
            correct_index,
            everyone_answered: self.everyone_answered(),
        })
    }

    /// Score-ordered snapshot for the live points message.
    pub fn live_points(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self.entries.iter().map(SessionEntry::standing).collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }

    pub fn final_standings(&self) -> Vec<Standing> {
        leaderboard::rank_final(self.entries.iter().map(SessionEntry::standing).collect())
    }
}

/// Shared handle to a running session plus the signals its loop listens to.
#[derive(Debug)]
pub struct SessionHandle {
    pub session: Mutex<ChatQuizSession>,
    advance: Notify,
    cancelled: AtomicBool,
}

impl SessionHandle {
    pub fn new(session: ChatQuizSession) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(session),
            advance: Notify::new(),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Wakes the progression loop so the open question ends now.
    pub fn signal_advance(&self) {
        self.advance.notify_one();
    }

    pub async fn advanced(&self) {
        self.advance.notified().await
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.advance.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatQuizSession {
        let questions = vec![
            Question::new("2+2?", vec!["3".into(), "4".into(), "5".into()], 1),
            Question::new("Capital of France?", vec!["Paris".into(), "Rome".into()], 0),
        ];
        ChatQuizSession::new(-100, questions, ScoringRules::default())
    }

    #[test]
    fn first_correct_bonus_goes_to_one_user() {
        let mut s = session();
        let t0 = Instant::now();
        s.advance(t0);

        let a = s.submit(1, "Ann", 0, 1, t0 + Duration::from_millis(300)).unwrap();
        let b = s.submit(2, "Ben", 0, 1, t0 + Duration::from_millis(200)).unwrap();

        assert!(a.first_correct);
        assert_eq!(a.points, 15);
        assert!(!b.first_correct);
        assert_eq!(b.points, 10);
        assert_eq!(s.first_correct(0), Some(1));
    }

    #[test]
    fn one_answer_per_question() {
        let mut s = session();
        let t0 = Instant::now();
        s.advance(t0);
        s.submit(1, "Ann", 0, 0, t0).unwrap();
        assert!(matches!(s.submit(1, "Ann", 0, 1, t0), Err(QuizError::AlreadyAnswered)));
    }

    #[test]
    fn closed_and_stale_questions_are_rejected() {
        let mut s = session();
        let t0 = Instant::now();
        assert!(matches!(s.submit(1, "Ann", 0, 0, t0), Err(QuizError::TooLate)));
        s.advance(t0);
        s.close_question();
        assert!(matches!(s.submit(1, "Ann", 0, 0, t0), Err(QuizError::TooLate)));
        s.advance(t0);
        assert!(matches!(s.submit(1, "Ann", 0, 0, t0), Err(QuizError::StaleQuestion)));
        assert!(matches!(s.submit(1, "Ann", 1, 9, t0), Err(QuizError::InvalidOption(9))));
    }

    #[test]
    fn everyone_answered_tracks_the_roster() {
        let mut s = session();
        let t0 = Instant::now();
        s.advance(t0);
        assert!(!s.everyone_answered());
        let first = s.submit(1, "Ann", 0, 0, t0).unwrap();
        assert!(first.everyone_answered);

        s.advance(t0);
        assert!(!s.everyone_answered());
        let late_joiner = s.submit(2, "Ben", 1, 1, t0).unwrap();
        assert!(!late_joiner.everyone_answered);
        let second = s.submit(1, "Ann", 1, 0, t0).unwrap();
        assert!(second.everyone_answered);
    }

    #[test]
    fn latency_accumulates_across_questions() {
        let mut s = session();
        let t0 = Instant::now();
        s.advance(t0);
        s.submit(1, "Ann", 0, 0, t0 + Duration::from_nanos(1_500)).unwrap();
        let t1 = t0 + Duration::from_secs(5);
        s.advance(t1);
        s.submit(1, "Ann", 1, 0, t1 + Duration::from_nanos(2_250)).unwrap();

        let entry = s.entry(1).unwrap();
        assert_eq!(entry.total_latency, Duration::from_nanos(3_750));
        assert_eq!(entry.answers.len(), 2);
        assert_eq!(entry.score, 15);
    }

    #[test]
    fn advance_stops_after_last_question() {
        let mut s = session();
        let t0 = Instant::now();
        assert_eq!(s.advance(t0), Some(0));
        assert_eq!(s.advance(t0), Some(1));
        assert_eq!(s.advance(t0), None);
        assert!(!s.is_accepting());
    }
}

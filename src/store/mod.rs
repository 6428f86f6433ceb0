use crate::error::QuizError;
use crate::types::{now_stamp, CompletionRegistry, Participant, Question, QuestionBank, UserKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const QUESTIONS_FILE: &str = "questions.json";
pub const PARTICIPANTS_FILE: &str = "participants.json";
pub const COMPLETION_FILE: &str = "quiz_completed.json";

/// Upper bound on questions accepted from one bulk paste.
pub const BULK_ADD_LIMIT: usize = 50;
pub const MIN_QUESTION_TIME: u64 = 5;
pub const MAX_QUESTION_TIME: u64 = 60;

pub type ParticipantMap = BTreeMap<UserKey, Participant>;

/// Flat JSON persistence. Each mutation rewrites the affected file whole.
pub struct Store {
    dir: PathBuf,
    questions: Mutex<QuestionBank>,
    participants: Mutex<ParticipantMap>,
    completion: Mutex<CompletionRegistry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    pub question_count: usize,
    pub question_time: Option<u64>,
    pub quiz_active: bool,
    pub registered: usize,
    pub completed: usize,
    pub average_accuracy: f64,
    pub total_score: i64,
}

impl Store {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, QuizError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let questions = load_question_bank(&dir.join(QUESTIONS_FILE)).await;
        let participants: ParticipantMap = load_or_default(&dir.join(PARTICIPANTS_FILE)).await;
        let completion: CompletionRegistry = load_or_default(&dir.join(COMPLETION_FILE)).await;

        log::info!(
            "Store opened at {}: {} questions, {} participants, {} completed",
            dir.display(),
            questions.questions.len(),
            participants.len(),
            completion.completed_users.len()
        );

        Ok(Self {
            dir,
            questions: Mutex::new(questions),
            participants: Mutex::new(participants),
            completion: Mutex::new(completion),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn save_questions(&self, bank: &QuestionBank) -> Result<(), QuizError> {
        write_json(&self.dir.join(QUESTIONS_FILE), bank).await
    }

    async fn save_participants(&self, map: &ParticipantMap) -> Result<(), QuizError> {
        write_json(&self.dir.join(PARTICIPANTS_FILE), map).await
    }

    async fn save_completion(&self, registry: &CompletionRegistry) -> Result<(), QuizError> {
        write_json(&self.dir.join(COMPLETION_FILE), registry).await
    }

    // Questions

    pub async fn questions(&self) -> Vec<Question> {
        self.questions.lock().await.questions.clone()
    }

    pub async fn question(&self, index: usize) -> Option<Question> {
        self.questions.lock().await.questions.get(index).cloned()
    }

    pub async fn question_time(&self) -> Option<u64> {
        self.questions.lock().await.question_time
    }

    /// Appends one question and returns the new total.
    pub async fn add_question(&self, question: Question) -> Result<usize, QuizError> {
        question.validate().map_err(QuizError::InvalidQuestion)?;
        let mut bank = self.questions.lock().await;
        bank.questions.push(question);
        self.save_questions(&bank).await?;
        Ok(bank.questions.len())
    }

    /// Appends up to [`BULK_ADD_LIMIT`] valid questions. Returns (added, total).
    pub async fn add_questions(&self, batch: Vec<Question>) -> Result<(usize, usize), QuizError> {
        let valid: Vec<Question> = batch
            .into_iter()
            .filter(|q| q.validate().is_ok())
            .take(BULK_ADD_LIMIT)
            .collect();
        let added = valid.len();

        let mut bank = self.questions.lock().await;
        bank.questions.extend(valid);
        self.save_questions(&bank).await?;
        Ok((added, bank.questions.len()))
    }

    pub async fn replace_question(&self, index: usize, question: Question) -> Result<(), QuizError> {
        question.validate().map_err(QuizError::InvalidQuestion)?;
        let mut bank = self.questions.lock().await;
        let slot = bank
            .questions
            .get_mut(index)
            .ok_or_else(|| QuizError::OutOfRange(format!("No question {}", index + 1)))?;
        *slot = question;
        self.save_questions(&bank).await
    }

    pub async fn delete_question(&self, index: usize) -> Result<Question, QuizError> {
        let mut bank = self.questions.lock().await;
        if index >= bank.questions.len() {
            return Err(QuizError::OutOfRange(format!("No question {}", index + 1)));
        }
        let removed = bank.questions.remove(index);
        self.save_questions(&bank).await?;
        Ok(removed)
    }

    /// Removes every listed index that exists. Returns (deleted, remaining).
    pub async fn delete_questions(&self, indices: &BTreeSet<usize>) -> Result<(usize, usize), QuizError> {
        let mut bank = self.questions.lock().await;
        let mut deleted = 0;
        for &index in indices.iter().rev() {
            if index < bank.questions.len() {
                bank.questions.remove(index);
                deleted += 1;
            }
        }
        self.save_questions(&bank).await?;
        Ok((deleted, bank.questions.len()))
    }

    pub async fn clear_questions(&self) -> Result<(), QuizError> {
        let mut bank = self.questions.lock().await;
        bank.questions.clear();
        self.save_questions(&bank).await
    }

    pub async fn set_question_time(&self, seconds: u64) -> Result<(), QuizError> {
        if !(MIN_QUESTION_TIME..=MAX_QUESTION_TIME).contains(&seconds) {
            return Err(QuizError::OutOfRange(format!(
                "Please enter a number between {} and {} seconds.",
                MIN_QUESTION_TIME, MAX_QUESTION_TIME
            )));
        }
        let mut bank = self.questions.lock().await;
        bank.question_time = Some(seconds);
        self.save_questions(&bank).await
    }

    // Participants

    pub async fn participants(&self) -> ParticipantMap {
        self.participants.lock().await.clone()
    }

    pub async fn participant(&self, user: UserKey) -> Option<Participant> {
        self.participants.lock().await.get(&user).cloned()
    }

    pub async fn is_registered(&self, user: UserKey) -> bool {
        self.participants.lock().await.contains_key(&user)
    }

    pub async fn participant_name(&self, user: UserKey) -> String {
        self.participants
            .lock()
            .await
            .get(&user)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("User_{}", user))
    }

    /// Creates or refreshes a participant: name, last-seen and chat link.
    pub async fn register_participant(
        &self,
        user: UserKey,
        name: &str,
        chat_id: Option<i64>,
    ) -> Result<(), QuizError> {
        let mut map = self.participants.lock().await;
        let entry = map
            .entry(user)
            .or_insert_with(|| Participant::new(name.to_string()));
        entry.name = name.to_string();
        entry.last_seen = Some(now_stamp());
        if let Some(chat) = chat_id {
            if !entry.chat_ids.contains(&chat) {
                entry.chat_ids.push(chat);
            }
        }
        self.save_participants(&map).await
    }

    /// Registers an unknown user or links a new chat. Writes only on change.
    pub async fn ensure_participant(&self, user: UserKey, name: &str, chat_id: i64) -> Result<(), QuizError> {
        let mut map = self.participants.lock().await;
        let changed = match map.get_mut(&user) {
            Some(p) if p.chat_ids.contains(&chat_id) => false,
            Some(p) => {
                p.chat_ids.push(chat_id);
                true
            }
            None => {
                let mut p = Participant::new(name.to_string());
                p.chat_ids.push(chat_id);
                map.insert(user, p);
                true
            }
        };
        if changed {
            self.save_participants(&map).await?;
        }
        Ok(())
    }

    /// Folds a finished round into the participant's totals and closes the
    /// round for them.
    pub async fn record_round(
        &self,
        user: UserKey,
        score: u32,
        correct: u32,
        total_questions: usize,
    ) -> Result<(), QuizError> {
        {
            let mut map = self.participants.lock().await;
            match map.get_mut(&user) {
                Some(p) => {
                    p.record_round(score, correct, total_questions);
                    self.save_participants(&map).await?;
                }
                None => log::warn!("Round finished by unregistered user {}", user),
            }
        }
        self.mark_completed(user).await
    }

    pub async fn update_participant<F>(&self, user: UserKey, edit: F) -> Result<Participant, QuizError>
    where
        F: FnOnce(&mut Participant),
    {
        let mut map = self.participants.lock().await;
        let p = map.get_mut(&user).ok_or(QuizError::UnknownParticipant(user))?;
        edit(p);
        let updated = p.clone();
        self.save_participants(&map).await?;
        Ok(updated)
    }

    pub async fn set_accuracy(&self, user: UserKey, accuracy: f64) -> Result<Participant, QuizError> {
        if !(0.0..=100.0).contains(&accuracy) {
            return Err(QuizError::OutOfRange(
                "Please enter a number between 0 and 100.".to_string(),
            ));
        }
        self.update_participant(user, |p| p.accuracy = accuracy).await
    }

    /// Flips the completion flag and keeps the registry in step. Returns the new flag.
    pub async fn toggle_completion(&self, user: UserKey) -> Result<bool, QuizError> {
        let completed = self
            .update_participant(user, |p| {
                p.has_completed_current_quiz = !p.has_completed_current_quiz
            })
            .await?
            .has_completed_current_quiz;

        let mut registry = self.completion.lock().await;
        if completed {
            registry.completed_users.insert(user);
        } else {
            registry.completed_users.remove(&user);
        }
        self.save_completion(&registry).await?;
        Ok(completed)
    }

    pub async fn reset_participant(&self, user: UserKey) -> Result<(), QuizError> {
        self.update_participant(user, Participant::reset_stats).await?;
        let mut registry = self.completion.lock().await;
        registry.completed_users.remove(&user);
        self.save_completion(&registry).await
    }

    // Completion registry

    pub async fn has_completed(&self, user: UserKey) -> bool {
        self.completion.lock().await.completed_users.contains(&user)
    }

    pub async fn mark_completed(&self, user: UserKey) -> Result<(), QuizError> {
        let mut registry = self.completion.lock().await;
        if registry.completed_users.insert(user) {
            self.save_completion(&registry).await?;
        }
        Ok(())
    }

    pub async fn is_quiz_active(&self) -> bool {
        self.completion.lock().await.quiz_active
    }

    pub async fn set_quiz_active(&self, active: bool) -> Result<(), QuizError> {
        let mut registry = self.completion.lock().await;
        registry.quiz_active = active;
        self.save_completion(&registry).await
    }

    /// Lets everyone play again without touching their statistics.
    pub async fn reset_round(&self) -> Result<(), QuizError> {
        let mut map = self.participants.lock().await;
        for p in map.values_mut() {
            p.has_completed_current_quiz = false;
        }
        self.save_participants(&map).await?;

        let mut registry = self.completion.lock().await;
        *registry = CompletionRegistry::default();
        self.save_completion(&registry).await
    }

    /// Starts over: completions cleared and every participant's statistics
    /// zeroed. Names, first-seen and chat links survive.
    pub async fn new_round(&self) -> Result<(), QuizError> {
        let mut map = self.participants.lock().await;
        for p in map.values_mut() {
            p.reset_stats();
        }
        self.save_participants(&map).await?;

        let mut registry = self.completion.lock().await;
        *registry = CompletionRegistry::default();
        self.save_completion(&registry).await
    }

    pub async fn summary(&self) -> StoreSummary {
        let bank = self.questions.lock().await;
        let map = self.participants.lock().await;
        let registry = self.completion.lock().await;

        let accuracies: Vec<f64> = map
            .values()
            .map(|p| p.accuracy)
            .filter(|a| *a > 0.0)
            .collect();
        let average_accuracy = if accuracies.is_empty() {
            0.0
        } else {
            accuracies.iter().sum::<f64>() / accuracies.len() as f64
        };

        StoreSummary {
            question_count: bank.questions.len(),
            question_time: bank.question_time,
            quiz_active: registry.quiz_active,
            registered: map.len(),
            completed: map.values().filter(|p| p.has_completed_current_quiz).count(),
            average_accuracy,
            total_score: map.values().map(|p| p.total_score).sum(),
        }
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), QuizError> {
    let json = serde_json::to_string_pretty(value)?;

    let temp_path = path.with_extension("tmp.json");
    let mut temp_file = File::create(&temp_path).await?;
    temp_file.write_all(json.as_bytes()).await?;
    temp_file.flush().await?;
    drop(temp_file);

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Reads `path`, creating it with the default when missing and rewriting it
/// with the default when it cannot be parsed.
async fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Serialize + Default,
{
    match tokio::fs::read_to_string(path).await {
        Ok(json) => match serde_json::from_str(&json) {
            Ok(value) => return value,
            Err(e) => log::warn!("{} is malformed, recreating: {}", path.display(), e),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("Creating new {}", path.display());
        }
        Err(e) => {
            log::error!("Failed to read {}: {}", path.display(), e);
            return T::default();
        }
    }

    let value = T::default();
    if let Err(e) = write_json(path, &value).await {
        log::error!("Failed to write {}: {}", path.display(), e);
    }
    value
}

/// Like [`load_or_default`] but skips individual malformed questions instead
/// of discarding the whole file.
async fn load_question_bank(path: &Path) -> QuestionBank {
    let raw: serde_json::Value = match tokio::fs::read_to_string(path).await {
        Ok(json) => match serde_json::from_str(&json) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{} is malformed, recreating: {}", path.display(), e);
                serde_json::Value::Null
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("Creating new {}", path.display());
            serde_json::Value::Null
        }
        Err(e) => {
            log::error!("Failed to read {}: {}", path.display(), e);
            return QuestionBank::default();
        }
    };

    if !raw.is_object() {
        let bank = QuestionBank::default();
        if let Err(e) = write_json(path, &bank).await {
            log::error!("Failed to write {}: {}", path.display(), e);
        }
        return bank;
    }

    let mut bank = QuestionBank::default();
    if let Some(entries) = raw.get("questions").and_then(|q| q.as_array()) {
        for (i, entry) in entries.iter().enumerate() {
            match serde_json::from_value::<Question>(entry.clone()) {
                Ok(q) => match q.validate() {
                    Ok(()) => bank.questions.push(q),
                    Err(e) => log::warn!("Skipping question {}: {}", i + 1, e),
                },
                Err(e) => log::warn!("Skipping malformed question {}: {}", i + 1, e),
            }
        }
    }
    bank.question_time = raw.get("question_time").and_then(|t| t.as_u64());
    bank
}

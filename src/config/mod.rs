use crate::error::QuizError;
use crate::types::UserKey;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    pub points_correct: u32,
    pub first_correct_bonus: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            points_correct: 10,
            first_correct_bonus: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleSettings {
    pub questions: bool,
    pub options: bool,
    pub seed: Option<u64>,
}

impl Default for ShuffleSettings {
    fn default() -> Self {
        Self {
            questions: true,
            options: true,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: Vec<UserKey>,
    pub data_dir: PathBuf,
    pub question_time: Duration,
    pub transition_delay: Duration,
    pub scoring: ScoringRules,
    pub auto_delete_delay: Duration,
    pub start_message_delay: Duration,
    pub shuffle: ShuffleSettings,
    pub admin_flow_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_ids: Vec::new(),
            data_dir: PathBuf::from("."),
            question_time: Duration::from_secs(15),
            transition_delay: Duration::from_secs(2),
            scoring: ScoringRules::default(),
            auto_delete_delay: Duration::from_secs(100),
            start_message_delay: Duration::from_secs(60),
            shuffle: ShuffleSettings::default(),
            admin_flow_ttl: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, QuizError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, QuizError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let bot_token = lookup("BOT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| QuizError::Config("BOT_TOKEN is not set".to_string()))?;

        let admin_ids = match lookup("ADMIN_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<UserKey>()
                        .map_err(|_| QuizError::Config(format!("ADMIN_IDS entry {:?} is not a user id", id)))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let secs = |key: &str, default: Duration| -> Result<Duration, QuizError> {
            Ok(parse_var::<u64>(&lookup, key)?
                .map(Duration::from_secs)
                .unwrap_or(default))
        };

        Ok(Self {
            bot_token,
            admin_ids,
            data_dir: lookup("QUIZ_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            question_time: secs("QUESTION_TIME", defaults.question_time)?,
            transition_delay: secs("QUESTION_TRANSITION_DELAY", defaults.transition_delay)?,
            scoring: ScoringRules {
                points_correct: parse_var(&lookup, "POINTS_CORRECT")?
                    .unwrap_or(defaults.scoring.points_correct),
                first_correct_bonus: parse_var(&lookup, "POINTS_FIRST_CORRECT_BONUS")?
                    .unwrap_or(defaults.scoring.first_correct_bonus),
            },
            auto_delete_delay: secs("AUTO_DELETE_DELAY", defaults.auto_delete_delay)?,
            start_message_delay: secs("START_MESSAGE_DELAY", defaults.start_message_delay)?,
            shuffle: ShuffleSettings {
                questions: parse_flag(&lookup, "SHUFFLE_QUESTIONS")
                    .unwrap_or(defaults.shuffle.questions),
                options: parse_flag(&lookup, "SHUFFLE_OPTIONS").unwrap_or(defaults.shuffle.options),
                seed: parse_var(&lookup, "SHUFFLE_SEED")?,
            },
            admin_flow_ttl: defaults.admin_flow_ttl,
        })
    }

    pub fn is_admin(&self, user: UserKey) -> bool {
        self.admin_ids.contains(&user)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, QuizError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| QuizError::Config(format!("{} has invalid value {:?}", key, raw))),
        _ => Ok(None),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    lookup(key).map(|v| v != "0" && v.to_lowercase() != "false")
}

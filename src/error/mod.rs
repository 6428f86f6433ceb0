use std::fmt;

#[derive(Debug)]
pub enum QuizError {
    IoError(std::io::Error),
    SerdeError(serde_json::Error),
    ApiError(teloxide::RequestError),
    Config(String),
    AlreadyCompleted,
    QuizClosed,
    AlreadyRunning,
    NoQuestions,
    NotRunning,
    TooLate,
    StaleQuestion,
    AlreadyAnswered,
    InvalidOption(usize),
    InvalidQuestion(String),
    UnknownParticipant(u64),
    OutOfRange(String),
}

impl std::error::Error for QuizError {}

impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizError::IoError(e) => write!(f, "IO error: {}", e),
            QuizError::SerdeError(e) => write!(f, "Serialization error: {}", e),
            QuizError::ApiError(e) => write!(f, "Telegram API error: {}", e),
            QuizError::Config(msg) => write!(f, "Configuration error: {}", msg),
            QuizError::AlreadyCompleted => write!(f, "You already completed this quiz!"),
            QuizError::QuizClosed => write!(f, "The quiz has been closed by the administrator."),
            QuizError::AlreadyRunning => write!(f, "A quiz is already running!"),
            QuizError::NoQuestions => write!(f, "No questions available. Contact admin."),
            QuizError::NotRunning => write!(f, "No quiz is running in this chat."),
            QuizError::TooLate => write!(f, "Too late! Question time expired."),
            QuizError::StaleQuestion => write!(f, "Invalid question!"),
            QuizError::AlreadyAnswered => write!(f, "You already answered this question!"),
            QuizError::InvalidOption(idx) => write!(f, "Option {} does not exist.", idx),
            QuizError::InvalidQuestion(msg) => write!(f, "Invalid question: {}", msg),
            QuizError::UnknownParticipant(id) => write!(f, "User {} not found!", id),
            QuizError::OutOfRange(msg) => write!(f, "{}", msg),
        }
    }
}

impl QuizError {
    /// Rejections are expected outcomes shown to the user, not failures to log.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            QuizError::IoError(_)
                | QuizError::SerdeError(_)
                | QuizError::ApiError(_)
                | QuizError::Config(_)
        )
    }
}

impl From<std::io::Error> for QuizError {
    fn from(err: std::io::Error) -> Self {
        QuizError::IoError(err)
    }
}

impl From<serde_json::Error> for QuizError {
    fn from(err: serde_json::Error) -> Self {
        QuizError::SerdeError(err)
    }
}

impl From<teloxide::RequestError> for QuizError {
    fn from(err: teloxide::RequestError) -> Self {
        QuizError::ApiError(err)
    }
}

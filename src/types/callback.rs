use std::fmt;
use std::str::FromStr;

use super::UserKey;

/// Everything an inline button can carry, encoded as `:`-separated segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackData {
    Answer { question: usize, option: usize },
    Admin(AdminAction),
    Confirm(ConfirmAction),
    ToggleShuffle(ShuffleTarget),
    SelectUser(UserKey),
    UserEdit { field: UserField, user: UserKey },
    SelectQuestion(usize),
    QuestionField(QuestionField),
    SetCorrect(usize),
    AddCorrect(usize),
    DeleteQuestion(usize),
    ConfirmDeleteQuestion(usize),
    BulkDeleteAll,
    BulkDeleteSelect,
    ToggleDelete(usize),
    DeleteSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Panel,
    Stats,
    Participants,
    EditUser,
    Questions,
    AddQuestion,
    BulkAdd,
    EditQuestion,
    DeleteQuestion,
    BulkDelete,
    ShuffleSettings,
    SetTime,
    ResetQuiz,
    CloseQuiz,
    ReopenQuiz,
    NewRound,
    Export,
    ClearState,
    StateInfo,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    ResetQuiz,
    CloseQuiz,
    ReopenQuiz,
    NewRound,
    ClearCurrent,
    ClearAll,
    DeleteAllQuestions,
    DeleteSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleTarget {
    Questions,
    Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Name,
    Score,
    Accuracy,
    Quizzes,
    ToggleCompletion,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionField {
    Text,
    Options,
    Correct,
    Save,
}

const ADMIN_ACTIONS: &[(AdminAction, &str)] = &[
    (AdminAction::Panel, "panel"),
    (AdminAction::Stats, "stats"),
    (AdminAction::Participants, "participants"),
    (AdminAction::EditUser, "edit_user"),
    (AdminAction::Questions, "questions"),
    (AdminAction::AddQuestion, "add_question"),
    (AdminAction::BulkAdd, "bulk_add"),
    (AdminAction::EditQuestion, "edit_question"),
    (AdminAction::DeleteQuestion, "delete_question"),
    (AdminAction::BulkDelete, "bulk_delete"),
    (AdminAction::ShuffleSettings, "shuffle"),
    (AdminAction::SetTime, "set_time"),
    (AdminAction::ResetQuiz, "reset_quiz"),
    (AdminAction::CloseQuiz, "close_quiz"),
    (AdminAction::ReopenQuiz, "reopen_quiz"),
    (AdminAction::NewRound, "new_round"),
    (AdminAction::Export, "export"),
    (AdminAction::ClearState, "clear_state"),
    (AdminAction::StateInfo, "state_info"),
    (AdminAction::Close, "close"),
];

const CONFIRM_ACTIONS: &[(ConfirmAction, &str)] = &[
    (ConfirmAction::ResetQuiz, "reset"),
    (ConfirmAction::CloseQuiz, "close"),
    (ConfirmAction::ReopenQuiz, "reopen"),
    (ConfirmAction::NewRound, "new_round"),
    (ConfirmAction::ClearCurrent, "clear_current"),
    (ConfirmAction::ClearAll, "clear_all"),
    (ConfirmAction::DeleteAllQuestions, "delete_all"),
    (ConfirmAction::DeleteSelected, "delete_selected"),
];

const USER_FIELDS: &[(UserField, &str)] = &[
    (UserField::Name, "name"),
    (UserField::Score, "score"),
    (UserField::Accuracy, "accuracy"),
    (UserField::Quizzes, "quizzes"),
    (UserField::ToggleCompletion, "completion"),
    (UserField::Reset, "reset"),
];

const QUESTION_FIELDS: &[(QuestionField, &str)] = &[
    (QuestionField::Text, "text"),
    (QuestionField::Options, "options"),
    (QuestionField::Correct, "correct"),
    (QuestionField::Save, "save"),
];

fn name_of<T: PartialEq + Copy>(table: &[(T, &'static str)], value: T) -> &'static str {
    table
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, name)| *name)
        .unwrap_or("?")
}

fn lookup<T: Copy>(table: &[(T, &str)], name: &str) -> Option<T> {
    table.iter().find(|(_, n)| *n == name).map(|(v, _)| *v)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCallback(pub String);

impl fmt::Display for UnknownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown callback data: {:?}", self.0)
    }
}

impl std::error::Error for UnknownCallback {}

impl FromStr for CallbackData {
    type Err = UnknownCallback;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(s.to_string());
        let parts: Vec<&str> = s.split(':').collect();
        let index = |i: usize| -> Result<usize, UnknownCallback> {
            parts.get(i).and_then(|p| p.parse().ok()).ok_or_else(unknown)
        };

        let data = match parts.as_slice() {
            ["ans", _, _] => CallbackData::Answer {
                question: index(1)?,
                option: index(2)?,
            },
            ["admin", action] => CallbackData::Admin(lookup(ADMIN_ACTIONS, action).ok_or_else(unknown)?),
            ["confirm", action] => {
                CallbackData::Confirm(lookup(CONFIRM_ACTIONS, action).ok_or_else(unknown)?)
            }
            ["shuffle", "questions"] => CallbackData::ToggleShuffle(ShuffleTarget::Questions),
            ["shuffle", "options"] => CallbackData::ToggleShuffle(ShuffleTarget::Options),
            ["user", id] => CallbackData::SelectUser(id.parse().map_err(|_| unknown())?),
            ["user_edit", field, id] => CallbackData::UserEdit {
                field: lookup(USER_FIELDS, field).ok_or_else(unknown)?,
                user: id.parse().map_err(|_| unknown())?,
            },
            ["q_edit", _] => CallbackData::SelectQuestion(index(1)?),
            ["q_field", field] => {
                CallbackData::QuestionField(lookup(QUESTION_FIELDS, field).ok_or_else(unknown)?)
            }
            ["q_correct", _] => CallbackData::SetCorrect(index(1)?),
            ["add_correct", _] => CallbackData::AddCorrect(index(1)?),
            ["q_delete", _] => CallbackData::DeleteQuestion(index(1)?),
            ["q_delete_confirm", _] => CallbackData::ConfirmDeleteQuestion(index(1)?),
            ["bulk_delete", "all"] => CallbackData::BulkDeleteAll,
            ["bulk_delete", "select"] => CallbackData::BulkDeleteSelect,
            ["bulk_delete", "selected"] => CallbackData::DeleteSelected,
            ["bulk_toggle", _] => CallbackData::ToggleDelete(index(1)?),
            _ => return Err(unknown()),
        };
        Ok(data)
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackData::Answer { question, option } => write!(f, "ans:{}:{}", question, option),
            CallbackData::Admin(action) => write!(f, "admin:{}", name_of(ADMIN_ACTIONS, *action)),
            CallbackData::Confirm(action) => {
                write!(f, "confirm:{}", name_of(CONFIRM_ACTIONS, *action))
            }
            CallbackData::ToggleShuffle(ShuffleTarget::Questions) => f.write_str("shuffle:questions"),
            CallbackData::ToggleShuffle(ShuffleTarget::Options) => f.write_str("shuffle:options"),
            CallbackData::SelectUser(id) => write!(f, "user:{}", id),
            CallbackData::UserEdit { field, user } => {
                write!(f, "user_edit:{}:{}", name_of(USER_FIELDS, *field), user)
            }
            CallbackData::SelectQuestion(i) => write!(f, "q_edit:{}", i),
            CallbackData::QuestionField(field) => {
                write!(f, "q_field:{}", name_of(QUESTION_FIELDS, *field))
            }
            CallbackData::SetCorrect(i) => write!(f, "q_correct:{}", i),
            CallbackData::AddCorrect(i) => write!(f, "add_correct:{}", i),
            CallbackData::DeleteQuestion(i) => write!(f, "q_delete:{}", i),
            CallbackData::ConfirmDeleteQuestion(i) => write!(f, "q_delete_confirm:{}", i),
            CallbackData::BulkDeleteAll => f.write_str("bulk_delete:all"),
            CallbackData::BulkDeleteSelect => f.write_str("bulk_delete:select"),
            CallbackData::DeleteSelected => f.write_str("bulk_delete:selected"),
            CallbackData::ToggleDelete(i) => write!(f, "bulk_toggle:{}", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answer_buttons() {
        let data: CallbackData = "ans:3:1".parse().unwrap();
        assert_eq!(data, CallbackData::Answer { question: 3, option: 1 });
    }

    #[test]
    fn every_admin_action_survives_encoding() {
        for (action, _) in ADMIN_ACTIONS {
            let encoded = CallbackData::Admin(*action).to_string();
            assert_eq!(encoded.parse::<CallbackData>(), Ok(CallbackData::Admin(*action)));
        }
    }

    #[test]
    fn user_edit_keeps_the_user_id() {
        let data = CallbackData::UserEdit {
            field: UserField::Accuracy,
            user: 6011041717,
        };
        assert_eq!(data.to_string(), "user_edit:accuracy:6011041717");
        assert_eq!(data.to_string().parse::<CallbackData>(), Ok(data));
    }

    #[test]
    fn every_confirmation_survives_encoding() {
        for (action, _) in CONFIRM_ACTIONS {
            let encoded = CallbackData::Confirm(*action).to_string();
            assert_eq!(encoded.parse::<CallbackData>(), Ok(CallbackData::Confirm(*action)));
        }
        assert_eq!(
            CallbackData::Confirm(ConfirmAction::DeleteSelected).to_string(),
            "confirm:delete_selected"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("ans:x:1".parse::<CallbackData>().is_err());
        assert!("admin:launch_missiles".parse::<CallbackData>().is_err());
        assert!("".parse::<CallbackData>().is_err());
    }
}

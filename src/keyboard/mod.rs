use crate::config::ShuffleSettings;
use crate::types::{
    option_letter, AdminAction, CallbackData, ConfirmAction, Question, QuestionField, ShuffleTarget, UserField,
    UserKey,
};
use std::collections::BTreeSet;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

fn button(text: impl Into<String>, data: CallbackData) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), data.to_string())
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![button("🔙 Back", CallbackData::Admin(AdminAction::Panel))]
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// One button per option, lettered A, B, C...
pub fn answer_keyboard(index: usize, question: &Question) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = question
        .options
        .iter()
        .enumerate()
        .map(|(option, text)| {
            vec![button(
                format!("{}. {}", option_letter(option), text),
                CallbackData::Answer { question: index, option },
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(keyboard)
}

pub fn admin_panel_keyboard() -> InlineKeyboardMarkup {
    let entries = [
        ("📊 Statistics", AdminAction::Stats),
        ("👥 Participants", AdminAction::Participants),
        ("✏️ Edit User", AdminAction::EditUser),
        ("❓ Questions", AdminAction::Questions),
        ("➕ Add Question", AdminAction::AddQuestion),
        ("📥 Bulk Add", AdminAction::BulkAdd),
        ("📝 Edit Question", AdminAction::EditQuestion),
        ("🗑 Delete Question", AdminAction::DeleteQuestion),
        ("🧹 Bulk Delete", AdminAction::BulkDelete),
        ("🔀 Shuffle Settings", AdminAction::ShuffleSettings),
        ("⏱ Set Timer", AdminAction::SetTime),
        ("🔄 Reset Quiz", AdminAction::ResetQuiz),
        ("🔒 Close Quiz", AdminAction::CloseQuiz),
        ("🔓 Reopen Quiz", AdminAction::ReopenQuiz),
        ("🆕 New Round", AdminAction::NewRound),
        ("📤 Export Data", AdminAction::Export),
        ("🧽 Clear State", AdminAction::ClearState),
        ("ℹ️ State Info", AdminAction::StateInfo),
    ];
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = entries
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|(label, action)| button(*label, CallbackData::Admin(*action)))
                .collect()
        })
        .collect();
    keyboard.push(vec![button("❌ Close Panel", CallbackData::Admin(AdminAction::Close))]);
    InlineKeyboardMarkup::new(keyboard)
}

pub fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![back_row()])
}

/// Confirm and cancel buttons for a destructive action.
pub fn confirm_keyboard(action: ConfirmAction) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("✅ Yes, continue", CallbackData::Confirm(action)),
        button("❌ Cancel", CallbackData::Admin(AdminAction::Panel)),
    ]])
}

pub fn clear_state_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("🧽 This Chat", CallbackData::Confirm(ConfirmAction::ClearCurrent))],
        vec![button("💥 All Chats", CallbackData::Confirm(ConfirmAction::ClearAll))],
        back_row(),
    ])
}

pub fn user_select_keyboard(users: &[(UserKey, String)]) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = users
        .iter()
        .map(|(id, name)| vec![button(format!("👤 {}", preview(name, 30)), CallbackData::SelectUser(*id))])
        .collect();
    keyboard.push(back_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn user_edit_keyboard(user: UserKey, completed: bool) -> InlineKeyboardMarkup {
    let edit = |label: &str, field: UserField| button(label, CallbackData::UserEdit { field, user });
    let completion = if completed {
        "🔓 Mark Not Completed"
    } else {
        "✅ Mark Completed"
    };
    InlineKeyboardMarkup::new(vec![
        vec![edit("📝 Name", UserField::Name), edit("⭐ Score", UserField::Score)],
        vec![edit("📊 Accuracy", UserField::Accuracy), edit("🎯 Quizzes", UserField::Quizzes)],
        vec![edit(completion, UserField::ToggleCompletion)],
        vec![edit("♻️ Reset Stats", UserField::Reset)],
        vec![button("🔙 Back", CallbackData::Admin(AdminAction::EditUser))],
    ])
}

/// A button per question; `make` picks what pressing it does.
pub fn question_select_keyboard(questions: &[Question], make: fn(usize) -> CallbackData) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| vec![button(format!("{}. {}", i + 1, preview(&q.text, 40)), make(i))])
        .collect();
    keyboard.push(back_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn question_edit_keyboard() -> InlineKeyboardMarkup {
    let field = |label: &str, f: QuestionField| button(label, CallbackData::QuestionField(f));
    InlineKeyboardMarkup::new(vec![
        vec![field("📝 Question Text", QuestionField::Text)],
        vec![field("🔤 Options", QuestionField::Options)],
        vec![field("✅ Correct Answer", QuestionField::Correct)],
        vec![field("💾 Save All Changes", QuestionField::Save)],
        vec![button("🔙 Back", CallbackData::Admin(AdminAction::EditQuestion))],
    ])
}

/// Lettered buttons for choosing the correct option.
pub fn correct_option_keyboard(options: &[String], make: fn(usize) -> CallbackData) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = options
        .iter()
        .enumerate()
        .map(|(i, opt)| vec![button(format!("{}. {}", option_letter(i), preview(opt, 40)), make(i))])
        .collect();
    InlineKeyboardMarkup::new(keyboard)
}

pub fn bulk_delete_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("💥 Delete ALL Questions", CallbackData::BulkDeleteAll)],
        vec![button("☑️ Select Questions", CallbackData::BulkDeleteSelect)],
        back_row(),
    ])
}

pub fn delete_selection_keyboard(questions: &[Question], selected: &BTreeSet<usize>) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let mark = if selected.contains(&i) { "☑️" } else { "⬜" };
            vec![button(
                format!("{} {}. {}", mark, i + 1, preview(&q.text, 35)),
                CallbackData::ToggleDelete(i),
            )]
        })
        .collect();
    if !selected.is_empty() {
        keyboard.push(vec![button(
            format!("🗑 Delete {} Selected", selected.len()),
            CallbackData::DeleteSelected,
        )]);
    }
    keyboard.push(back_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn delete_question_keyboard(index: usize) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("✅ Yes, delete", CallbackData::ConfirmDeleteQuestion(index)),
        button("❌ Cancel", CallbackData::Admin(AdminAction::DeleteQuestion)),
    ]])
}

pub fn shuffle_keyboard(settings: &ShuffleSettings) -> InlineKeyboardMarkup {
    let state = |on: bool| if on { "ON ✅" } else { "OFF ❌" };
    InlineKeyboardMarkup::new(vec![
        vec![button(
            format!("🔀 Questions: {}", state(settings.questions)),
            CallbackData::ToggleShuffle(ShuffleTarget::Questions),
        )],
        vec![button(
            format!("🔤 Options: {}", state(settings.options)),
            CallbackData::ToggleShuffle(ShuffleTarget::Options),
        )],
        back_row(),
    ])
}

use crate::admin::{AdminFlow, DraftStep, FlowKind, QuestionDraft, OPTION_COUNT};
use crate::keyboard::*;
use crate::store::{BULK_ADD_LIMIT, MAX_QUESTION_TIME, MIN_QUESTION_TIME};
use crate::types::{
    option_letter, AdminAction, CallbackData, ConfirmAction, Question, QuestionField, ShuffleTarget, UserField,
    UserKey,
};
use crate::{BotState, Command};
use std::collections::BTreeSet;
use std::error::Error;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile, ParseMode};

use crate::handlers::*;

type Toast = Result<Option<String>, Box<dyn Error + Send + Sync>>;

const PARTICIPANT_LIST_LIMIT: usize = 20;
const MESSAGE_BUDGET: usize = 3800;

pub async fn admin_command(bot: &Bot, chat: ChatId, user: UserKey, cmd: Command, state: &BotState) -> HandlerResult {
    match cmd {
        Command::Admin => {
            state.clear_admin_flow(user).await;
            bot.send_message(chat, panel_text(state).await)
                .parse_mode(ParseMode::Html)
                .reply_markup(admin_panel_keyboard())
                .await?;
        }
        Command::ClearState => {
            state.clear_session(chat.0).await;
            state.clear_admin_flow(user).await;
            reply(bot, state, chat, "✅ All states cleared for this chat and user.").await?;
        }
        Command::StateInfo => {
            reply(bot, state, chat, &state_info_text(state).await).await?;
        }
        Command::ResetAllData => {
            state.start_new_round().await?;
            reply(
                bot,
                state,
                chat,
                "✅ <b>COMPLETE DATA RESET</b>\n\n\
                 All user data has been erased for the next round!\n\
                 • Quiz completion records cleared\n\
                 • Scores, accuracy and quiz counts reset\n\
                 • Active quizzes and admin sessions cleared",
            )
            .await?;
        }
        Command::ReopenQuiz => {
            state.store.set_quiz_active(true).await?;
            reply(bot, state, chat, "✅ Quiz reopened! Users can now start the quiz.").await?;
        }
        other => log::warn!("{:?} is not an admin command", other),
    }
    Ok(())
}

pub async fn admin_callback(
    bot: &Bot,
    query: &CallbackQuery,
    message: &Message,
    data: CallbackData,
    state: &BotState,
) -> HandlerResult {
    let user = query.from.id.0;
    if !state.is_admin(user) {
        bot.answer_callback_query(query.id.clone())
            .text("❌ Admin only!")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let toast = match dispatch(bot, message, user, data, state).await {
        Ok(toast) => toast,
        Err(e) => {
            log::error!("Admin action {} by {} failed: {}", data, user, e);
            Some("❌ Something went wrong".to_string())
        }
    };
    let mut answer = bot.answer_callback_query(query.id.clone());
    if let Some(text) = toast {
        answer = answer.text(text);
    }
    answer.await?;
    Ok(())
}

async fn dispatch(bot: &Bot, message: &Message, user: UserKey, data: CallbackData, state: &BotState) -> Toast {
    match data {
        CallbackData::Admin(action) => panel_action(bot, message, user, action, state).await,
        CallbackData::Confirm(action) => confirmed(bot, message, user, action, state).await,
        CallbackData::ToggleShuffle(target) => {
            let settings = {
                let mut settings = state.shuffle.lock().await;
                match target {
                    ShuffleTarget::Questions => settings.questions = !settings.questions,
                    ShuffleTarget::Options => settings.options = !settings.options,
                }
                *settings
            };
            log::info!("Shuffle settings changed by {}: {:?}", user, settings);
            edit_panel(bot, message, &shuffle_text(state).await, shuffle_keyboard(&settings)).await;
            Ok(Some("🔀 Updated".to_string()))
        }
        CallbackData::SelectUser(target) => show_user(bot, message, target, state).await,
        CallbackData::UserEdit { field, user: target } => edit_user(bot, message, user, target, field, state).await,
        CallbackData::SelectQuestion(index) => {
            let Some(question) = state.store.question(index).await else {
                return Ok(Some("❌ Invalid question!".to_string()));
            };
            let draft = QuestionDraft::new(index, question);
            let text = format!("{}\n<b>What would you like to edit?</b>", draft.render("✏️ <b>Editing Question</b>"));
            state.set_admin_flow(user, AdminFlow::new(FlowKind::EditQuestion(draft))).await;
            edit_panel(bot, message, &text, question_edit_keyboard()).await;
            Ok(None)
        }
        CallbackData::QuestionField(field) => question_field(bot, message, user, field, state).await,
        CallbackData::SetCorrect(option) => {
            let text = {
                let mut flows = state.acquire_flows_lock().await?;
                match flows.get_mut(&user).map(|f| {
                    f.touch();
                    &mut f.kind
                }) {
                    Some(FlowKind::EditQuestion(draft)) if option < draft.question.options.len() => {
                        draft.question.correct_index = option;
                        draft.step = DraftStep::Menu;
                        draft.render("✅ <b>Correct Answer Updated</b>")
                    }
                    _ => return Ok(Some("❌ Edit session expired".to_string())),
                }
            };
            edit_panel(bot, message, &text, question_edit_keyboard()).await;
            Ok(Some("✅ Correct answer set!".to_string()))
        }
        CallbackData::AddCorrect(option) => add_question_correct(bot, message, user, option, state).await,
        CallbackData::DeleteQuestion(index) => {
            let Some(question) = state.store.question(index).await else {
                return Ok(Some("❌ Invalid question!".to_string()));
            };
            let text = format!(
                "🗑 <b>Delete Question {}</b>\n\n{}\n\n⚠️ This cannot be undone. Are you sure?",
                index + 1,
                question.text
            );
            edit_panel(bot, message, &text, delete_question_keyboard(index)).await;
            Ok(None)
        }
        CallbackData::ConfirmDeleteQuestion(index) => {
            let removed = state.store.delete_question(index).await?;
            let remaining = state.store.questions().await.len();
            log::info!("Question {} deleted by {}: {:?}", index + 1, user, removed.text);
            let text = format!(
                "✅ <b>Question {} deleted successfully!</b>\n\n📊 Remaining questions: {}",
                index + 1,
                remaining
            );
            edit_panel(bot, message, &text, back_keyboard()).await;
            Ok(Some("🗑 Deleted".to_string()))
        }
        CallbackData::BulkDeleteAll => {
            let count = state.store.questions().await.len();
            let text = format!(
                "💥 <b>Delete ALL Questions</b>\n\nThis will remove all {} questions.\nAre you sure?",
                count
            );
            edit_panel(bot, message, &text, confirm_keyboard(ConfirmAction::DeleteAllQuestions)).await;
            Ok(None)
        }
        CallbackData::BulkDeleteSelect => {
            let questions = state.store.questions().await;
            if questions.is_empty() {
                return Ok(Some("❌ No questions to delete".to_string()));
            }
            state
                .set_admin_flow(user, AdminFlow::new(FlowKind::DeleteSelection(BTreeSet::new())))
                .await;
            edit_panel(
                bot,
                message,
                "☑️ <b>Select questions to delete</b>",
                delete_selection_keyboard(&questions, &BTreeSet::new()),
            )
            .await;
            Ok(None)
        }
        CallbackData::ToggleDelete(index) => {
            let selected = {
                let mut flows = state.acquire_flows_lock().await?;
                match flows.get_mut(&user) {
                    Some(flow) => {
                        flow.touch();
                        match &mut flow.kind {
                            FlowKind::DeleteSelection(selected) => {
                                if !selected.remove(&index) {
                                    selected.insert(index);
                                }
                                selected.clone()
                            }
                            _ => return Ok(Some("❌ Selection expired".to_string())),
                        }
                    }
                    None => return Ok(Some("❌ Selection expired".to_string())),
                }
            };
            let questions = state.store.questions().await;
            let text = format!("☑️ <b>Select questions to delete</b>\n\nSelected: {}", selected.len());
            edit_panel(bot, message, &text, delete_selection_keyboard(&questions, &selected)).await;
            Ok(None)
        }
        CallbackData::DeleteSelected => {
            let Some(selected) = state.delete_selection(user).await else {
                return Ok(Some("❌ Nothing selected".to_string()));
            };
            let questions = state.store.questions().await;
            edit_panel(
                bot,
                message,
                &delete_selected_text(&questions, &selected),
                confirm_keyboard(ConfirmAction::DeleteSelected),
            )
            .await;
            Ok(None)
        }
        CallbackData::Answer { .. } => Ok(None),
    }
}

async fn panel_action(bot: &Bot, message: &Message, user: UserKey, action: AdminAction, state: &BotState) -> Toast {
    match action {
        AdminAction::Panel => {
            state.clear_admin_flow(user).await;
            edit_panel(bot, message, &panel_text(state).await, admin_panel_keyboard()).await;
        }
        AdminAction::Stats => {
            edit_panel(bot, message, &stats_text(state).await, back_keyboard()).await;
        }
        AdminAction::Participants => {
            edit_panel(bot, message, &participants_text(state).await, back_keyboard()).await;
        }
        AdminAction::EditUser => {
            state.clear_admin_flow(user).await;
            let users: Vec<(UserKey, String)> = state
                .store
                .participants()
                .await
                .into_iter()
                .map(|(id, p)| (id, p.name))
                .collect();
            if users.is_empty() {
                edit_panel(bot, message, "👥 No registered participants yet.", back_keyboard()).await;
            } else {
                edit_panel(bot, message, "✏️ <b>Select a user to edit</b>", user_select_keyboard(&users)).await;
            }
        }
        AdminAction::Questions => {
            edit_panel(bot, message, &questions_text(state).await, back_keyboard()).await;
        }
        AdminAction::AddQuestion => {
            state
                .set_admin_flow(
                    user,
                    AdminFlow::new(FlowKind::AddQuestion {
                        text: None,
                        options: Vec::new(),
                    }),
                )
                .await;
            let text = format!(
                "➕ <b>Add Question</b>\n\nSend the <b>question text</b>.\nYou will then enter {} options (A to {}).",
                OPTION_COUNT,
                option_letter(OPTION_COUNT - 1)
            );
            edit_panel(bot, message, &text, back_keyboard()).await;
        }
        AdminAction::BulkAdd => {
            state.set_admin_flow(user, AdminFlow::new(FlowKind::BulkAdd)).await;
            let text = format!(
                "📥 <b>Bulk Add Questions</b>\n\nSend up to {} questions in this format:\n\n\
                 <code>What is 2+2?\nA) 1\nB) 2\nC) 3\nD) 4\nE) 5\n✅ D</code>\n\n\
                 Separate questions with a blank line.",
                BULK_ADD_LIMIT
            );
            edit_panel(bot, message, &text, back_keyboard()).await;
        }
        AdminAction::EditQuestion | AdminAction::DeleteQuestion => {
            state.clear_admin_flow(user).await;
            let questions = state.store.questions().await;
            if questions.is_empty() {
                edit_panel(bot, message, "❓ No questions available.", back_keyboard()).await;
            } else if action == AdminAction::EditQuestion {
                let keyboard = question_select_keyboard(&questions, CallbackData::SelectQuestion);
                edit_panel(bot, message, "📝 <b>Select a question to edit</b>", keyboard).await;
            } else {
                let keyboard = question_select_keyboard(&questions, CallbackData::DeleteQuestion);
                edit_panel(bot, message, "🗑 <b>Select a question to delete</b>", keyboard).await;
            }
        }
        AdminAction::BulkDelete => {
            let count = state.store.questions().await.len();
            let text = format!("🧹 <b>Bulk Delete</b>\n\n📊 Total questions: {}", count);
            edit_panel(bot, message, &text, bulk_delete_keyboard()).await;
        }
        AdminAction::ShuffleSettings => {
            let settings = *state.shuffle.lock().await;
            edit_panel(bot, message, &shuffle_text(state).await, shuffle_keyboard(&settings)).await;
        }
        AdminAction::SetTime => {
            state.set_admin_flow(user, AdminFlow::new(FlowKind::SetTime)).await;
            let text = format!(
                "⏱ <b>Set Question Time</b>\n\nCurrent: <b>{} seconds</b>\n\nSend a number between {} and {}.",
                state.question_time().await.as_secs(),
                MIN_QUESTION_TIME,
                MAX_QUESTION_TIME
            );
            edit_panel(bot, message, &text, back_keyboard()).await;
        }
        AdminAction::ResetQuiz => {
            let text = "🔄 <b>Reset Quiz</b>\n\nThis will allow all users to take the quiz again.\nAre you sure you want to reset?";
            edit_panel(bot, message, text, confirm_keyboard(ConfirmAction::ResetQuiz)).await;
        }
        AdminAction::CloseQuiz => {
            let text = "🔒 <b>Close Quiz</b>\n\nThis will prevent new users from starting the quiz.\nAre you sure you want to close?";
            edit_panel(bot, message, text, confirm_keyboard(ConfirmAction::CloseQuiz)).await;
        }
        AdminAction::ReopenQuiz => {
            let text = "🔓 <b>Reopen Quiz</b>\n\nThis will allow new users to start the quiz.\nAre you sure you want to reopen?";
            edit_panel(bot, message, text, confirm_keyboard(ConfirmAction::ReopenQuiz)).await;
        }
        AdminAction::NewRound => {
            let text = "🆕 <b>New Round</b>\n\n⚠️ This erases every score, accuracy and completion record.\nNames are kept. Are you sure?";
            edit_panel(bot, message, text, confirm_keyboard(ConfirmAction::NewRound)).await;
        }
        AdminAction::Export => {
            export_data(bot, message.chat.id, state).await?;
            return Ok(Some("📤 Export sent".to_string()));
        }
        AdminAction::ClearState => {
            let text = "🧽 <b>Clear State</b>\n\nClear running quizzes for this chat or for every chat?";
            edit_panel(bot, message, text, clear_state_keyboard()).await;
        }
        AdminAction::StateInfo => {
            edit_panel(bot, message, &state_info_text(state).await, back_keyboard()).await;
        }
        AdminAction::Close => {
            state.clear_admin_flow(user).await;
            delete_quietly(bot, message.chat.id, message.id).await;
            return Ok(Some("Panel closed".to_string()));
        }
    }
    Ok(None)
}

async fn confirmed(bot: &Bot, message: &Message, user: UserKey, action: ConfirmAction, state: &BotState) -> Toast {
    let chat = message.chat.id;
    let text = match action {
        ConfirmAction::ResetQuiz => {
            state.store.reset_round().await?;
            "✅ <b>Quiz reset!</b>\n\nAll users can take the quiz again.".to_string()
        }
        ConfirmAction::CloseQuiz => {
            state.store.set_quiz_active(false).await?;
            "🔒 <b>Quiz closed!</b>\n\nNew users can no longer start the quiz.".to_string()
        }
        ConfirmAction::ReopenQuiz => {
            state.store.set_quiz_active(true).await?;
            "🔓 <b>Quiz reopened!</b>\n\nUsers can now start the quiz.".to_string()
        }
        ConfirmAction::NewRound => {
            state.start_new_round().await?;
            "🆕 <b>New round started!</b>\n\nAll statistics and completion records were cleared.".to_string()
        }
        ConfirmAction::ClearCurrent => {
            let cleared = state.clear_session(chat.0).await;
            state.clear_admin_flow(user).await;
            if cleared {
                "✅ Quiz state cleared for this chat.".to_string()
            } else {
                "ℹ️ No quiz was running in this chat.".to_string()
            }
        }
        ConfirmAction::ClearAll => {
            let sessions = state.clear_all_sessions().await;
            let flows = state.clear_all_admin_flows().await;
            format!(
                "✅ Cleared {} quiz states and {} admin sessions.",
                sessions, flows
            )
        }
        ConfirmAction::DeleteAllQuestions => {
            state.store.clear_questions().await?;
            "✅ <b>All questions deleted.</b>".to_string()
        }
        ConfirmAction::DeleteSelected => {
            let selected = match state.clear_admin_flow(user).await.map(|f| f.kind) {
                Some(FlowKind::DeleteSelection(selected)) if !selected.is_empty() => selected,
                _ => return Ok(Some("❌ Selection expired".to_string())),
            };
            let (deleted, remaining) = state.store.delete_questions(&selected).await?;
            log::info!("{} questions deleted by {}", deleted, user);
            format!(
                "✅ <b>Deleted {} questions!</b>\n\n📊 Remaining questions: {}",
                deleted, remaining
            )
        }
    };
    log::info!("Admin {} confirmed {:?}", user, action);
    edit_panel(bot, message, &text, back_keyboard()).await;
    Ok(Some("✅ Done".to_string()))
}

async fn show_user(bot: &Bot, message: &Message, target: UserKey, state: &BotState) -> Toast {
    let Some(p) = state.store.participant(target).await else {
        return Ok(Some("❌ User not found!".to_string()));
    };
    let status = if p.has_completed_current_quiz {
        "✅ Completed"
    } else {
        "❌ Not Completed"
    };
    let last_seen = p
        .last_seen
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    let text = format!(
        "👤 <b>{}</b>\n🆔 <code>{}</code>\n\n\
         ⭐ Total Score: <b>{}</b>\n\
         📊 Accuracy: <b>{:.1}%</b>\n\
         🎯 Quizzes Completed: <b>{}</b>\n\
         📝 Current Quiz: <b>{}</b>\n\
         🕒 Last seen: {}",
        p.name, target, p.total_score, p.accuracy, p.quizzes_completed, status, last_seen
    );
    edit_panel(bot, message, &text, user_edit_keyboard(target, p.has_completed_current_quiz)).await;
    Ok(None)
}

async fn edit_user(
    bot: &Bot,
    message: &Message,
    admin: UserKey,
    target: UserKey,
    field: UserField,
    state: &BotState,
) -> Toast {
    let prompt = match field {
        UserField::ToggleCompletion => {
            let completed = state.store.toggle_completion(target).await?;
            show_user(bot, message, target, state).await?;
            let text = if completed {
                "✅ Marked completed"
            } else {
                "🔓 Marked not completed"
            };
            return Ok(Some(text.to_string()));
        }
        UserField::Reset => {
            state.store.reset_participant(target).await?;
            show_user(bot, message, target, state).await?;
            return Ok(Some("♻️ Statistics reset".to_string()));
        }
        UserField::Name => "📝 Send the new <b>name</b>:",
        UserField::Score => "⭐ Send the new <b>total score</b>:",
        UserField::Accuracy => "📊 Send the new <b>accuracy</b> (0-100):",
        UserField::Quizzes => "🎯 Send the new number of <b>quizzes completed</b>:",
    };
    state
        .set_admin_flow(admin, AdminFlow::new(FlowKind::EditUser { user: target, field }))
        .await;
    edit_panel(bot, message, prompt, back_keyboard()).await;
    Ok(None)
}

async fn question_field(bot: &Bot, message: &Message, user: UserKey, field: QuestionField, state: &BotState) -> Toast {
    let draft = {
        let mut flows = state.acquire_flows_lock().await?;
        let Some(flow) = flows.get_mut(&user) else {
            return Ok(Some("❌ Edit session expired".to_string()));
        };
        flow.touch();
        let FlowKind::EditQuestion(draft) = &mut flow.kind else {
            return Ok(Some("❌ Edit session expired".to_string()));
        };
        draft.step = match field {
            QuestionField::Text => DraftStep::Text,
            QuestionField::Options => DraftStep::Option(0),
            QuestionField::Correct | QuestionField::Save => DraftStep::Menu,
        };
        draft.clone()
    };

    match field {
        QuestionField::Text => {
            let text = format!(
                "📝 <b>Current text:</b>\n{}\n\nSend the new question text:",
                draft.question.text
            );
            edit_panel(bot, message, &text, back_keyboard()).await;
        }
        QuestionField::Options => {
            let text = format!(
                "🔤 Send the new text for <b>Option {}</b> (currently: {}):",
                option_letter(0),
                draft.question.options.first().map(String::as_str).unwrap_or("")
            );
            edit_panel(bot, message, &text, back_keyboard()).await;
        }
        QuestionField::Correct => {
            let keyboard = correct_option_keyboard(&draft.question.options, CallbackData::SetCorrect);
            edit_panel(bot, message, "✅ <b>Select the correct answer</b>", keyboard).await;
        }
        QuestionField::Save => {
            state.store.replace_question(draft.index, draft.question.clone()).await?;
            state.clear_admin_flow(user).await;
            log::info!("Question {} updated by {}", draft.index + 1, user);
            let text = format!("✅ <b>Question {} updated successfully!</b>", draft.index + 1);
            edit_panel(bot, message, &text, back_keyboard()).await;
            return Ok(Some("💾 Saved".to_string()));
        }
    }
    Ok(None)
}

async fn add_question_correct(bot: &Bot, message: &Message, user: UserKey, option: usize, state: &BotState) -> Toast {
    let question = match state.clear_admin_flow(user).await.map(|f| f.kind) {
        Some(FlowKind::AddQuestion {
            text: Some(text),
            options,
        }) if options.len() == OPTION_COUNT && option < OPTION_COUNT => Question::new(text, options, option),
        _ => return Ok(Some("❌ Add question session expired".to_string())),
    };
    let total = state.store.add_question(question.clone()).await?;
    log::info!("Question added by {}: {:?}", user, question.text);
    let text = format!(
        "✅ <b>Question added!</b>\n\n{}\n✅ Correct: {}. {}\n\n📊 Total questions: {}",
        question.text,
        option_letter(option),
        question.correct_option(),
        total
    );
    edit_panel(bot, message, &text, back_keyboard()).await;
    Ok(Some("✅ Question added".to_string()))
}

async fn export_data(bot: &Bot, chat: ChatId, state: &BotState) -> HandlerResult {
    let summary = state.store.summary().await;
    let participants = state.store.participants().await;
    let export = serde_json::json!({
        "exported_at": crate::types::now_stamp(),
        "summary": {
            "questions": summary.question_count,
            "question_time": summary.question_time,
            "quiz_active": summary.quiz_active,
            "registered": summary.registered,
            "completed": summary.completed,
            "average_accuracy": summary.average_accuracy,
            "total_score": summary.total_score,
        },
        "participants": participants,
    });
    let bytes = serde_json::to_vec_pretty(&export)?;
    bot.send_document(chat, InputFile::memory(bytes).file_name("quiz_export.json"))
        .caption(format!(
            "📤 Export: {} participants, {} completed",
            summary.registered, summary.completed
        ))
        .await?;
    Ok(())
}

async fn edit_panel(bot: &Bot, message: &Message, text: &str, keyboard: InlineKeyboardMarkup) {
    if let Err(e) = bot
        .edit_message_text(message.chat.id, message.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await
    {
        log::warn!("Failed to update admin panel in chat {}: {}", message.chat.id.0, e);
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON ✅"
    } else {
        "OFF ❌"
    }
}

async fn panel_text(state: &BotState) -> String {
    let status = if state.store.is_quiz_active().await {
        "🟢 Open"
    } else {
        "🔴 Closed"
    };
    format!(
        "🛠 <b>Admin Panel</b>\n\n🚦 Quiz: <b>{}</b>\n❓ Questions: <b>{}</b>\n⏱ Time per question: <b>{}s</b>",
        status,
        state.store.questions().await.len(),
        state.question_time().await.as_secs()
    )
}

async fn stats_text(state: &BotState) -> String {
    let summary = state.store.summary().await;
    let shuffle = *state.shuffle.lock().await;
    let running = state.sessions.lock().await.len();
    format!(
        "📊 <b>Quiz Statistics</b>\n\n\
         ❓ Questions: <b>{}</b>\n\
         ⏱ Question time: <b>{}s</b>\n\
         🚦 Quiz status: <b>{}</b>\n\
         👥 Registered: <b>{}</b>\n\
         ✅ Completed: <b>{}</b>\n\
         📊 Average accuracy: <b>{:.1}%</b>\n\
         ⭐ Total score: <b>{}</b>\n\
         🎮 Running quizzes: <b>{}</b>\n\
         🔀 Shuffle questions: {} | options: {}",
        summary.question_count,
        state.question_time().await.as_secs(),
        if summary.quiz_active { "Open" } else { "Closed" },
        summary.registered,
        summary.completed,
        summary.average_accuracy,
        summary.total_score,
        running,
        on_off(shuffle.questions),
        on_off(shuffle.options)
    )
}

async fn participants_text(state: &BotState) -> String {
    let mut participants: Vec<_> = state.store.participants().await.into_iter().collect();
    if participants.is_empty() {
        return "👥 No registered participants yet.".to_string();
    }
    participants.sort_by(|(_, a), (_, b)| b.total_score.cmp(&a.total_score));

    let mut text = format!("👥 <b>Participants</b> ({} total)\n\n", participants.len());
    for (i, (id, p)) in participants.iter().take(PARTICIPANT_LIST_LIMIT).enumerate() {
        let done = if p.has_completed_current_quiz { "✅" } else { "⏳" };
        text.push_str(&format!(
            "{}. {} {} <code>{}</code>\n   ⭐ {} | 📊 {:.1}% | 🎯 {}\n",
            i + 1,
            done,
            p.name,
            id,
            p.total_score,
            p.accuracy,
            p.quizzes_completed
        ));
    }
    text
}

async fn questions_text(state: &BotState) -> String {
    let questions = state.store.questions().await;
    if questions.is_empty() {
        return "❓ No questions available.".to_string();
    }
    let mut text = format!("❓ <b>Questions</b> ({} total)\n\n", questions.len());
    for (i, q) in questions.iter().enumerate() {
        let entry = format!(
            "<b>{}.</b> {}\n   ✅ {}. {}\n",
            i + 1,
            q.text,
            option_letter(q.correct_index),
            q.correct_option()
        );
        if text.len() + entry.len() > MESSAGE_BUDGET {
            text.push_str(&format!("\n... and {} more", questions.len() - i));
            break;
        }
        text.push_str(&entry);
    }
    text
}

async fn shuffle_text(state: &BotState) -> String {
    let settings = *state.shuffle.lock().await;
    format!(
        "🔀 <b>Shuffle Settings</b>\n\nQuestions: <b>{}</b>\nOptions: <b>{}</b>{}",
        on_off(settings.questions),
        on_off(settings.options),
        settings
            .seed
            .map(|seed| format!("\nSeed: <code>{}</code>", seed))
            .unwrap_or_default()
    )
}

pub async fn state_info_text(state: &BotState) -> String {
    let sessions: Vec<_> = state
        .sessions
        .lock()
        .await
        .iter()
        .map(|(chat, handle)| (*chat, handle.clone()))
        .collect();

    let mut text = format!("🔍 <b>Current States</b>\n\n<b>Active Quiz Chats:</b> {}\n", sessions.len());
    for (chat, handle) in sessions {
        let session = handle.session.lock().await;
        let status = if session.is_running() { "🟢 Running" } else { "🟡 Idle" };
        let position = session
            .current_index()
            .map(|i| format!("Q{}/{}", i + 1, session.question_count()))
            .unwrap_or_else(|| "starting".to_string());
        text.push_str(&format!(
            "• <code>{}</code>: {} | {} | {} participants\n",
            chat,
            status,
            position,
            session.entries().len()
        ));
    }

    let flows = state.admin_flows.lock().await;
    text.push_str(&format!("\n<b>Admin Sessions:</b> {}\n", flows.len()));
    for (user, flow) in flows.iter() {
        text.push_str(&format!("• <code>{}</code>: {}\n", user, flow.mode()));
    }
    text
}

/// Confirmation prompt listing the questions about to be deleted.
pub fn delete_selected_text(questions: &[Question], selected: &BTreeSet<usize>) -> String {
    let mut text = format!("⚠️ <b>Delete {} selected questions?</b>\n\n", selected.len());
    for &index in selected {
        if let Some(q) = questions.get(index) {
            let preview: String = q.text.chars().take(40).collect();
            text.push_str(&format!("{}. {}\n", index + 1, preview));
        }
    }
    text.push_str("\nThis cannot be undone.");
    text
}

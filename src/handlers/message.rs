use crate::admin::{AdminCommand, FlowKind, FlowStep};
use crate::keyboard::{correct_option_keyboard, question_edit_keyboard};
use crate::types::CallbackData;
use crate::BotState;
use std::sync::Arc;
use teloxide::prelude::*;

use crate::handlers::*;

const MAX_NAME_LEN: usize = 64;

/// Plain text: pending registrations first, then admin flows. Anything else
/// is chat noise during a quiz and gets removed.
pub async fn text_handler(bot: Bot, msg: Message, state: Arc<BotState>) -> HandlerResult {
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        return Ok(());
    };
    let user_id = user.id.0;
    let chat = msg.chat.id;

    if state.take_pending_name(chat.0, user_id).await {
        delete_quietly(&bot, chat, msg.id).await;
        return register_name(&bot, chat, user_id, text, &state).await;
    }

    let step = {
        let mut flows = state.acquire_flows_lock().await?;
        match flows.get_mut(&user_id) {
            Some(flow) if flow.expects_text() => Some(flow.apply_text(text)),
            _ => None,
        }
    };

    delete_quietly(&bot, chat, msg.id).await;
    match step {
        Some(step) => apply_flow_step(&bot, chat, user_id, step, &state).await,
        None => Ok(()),
    }
}

async fn register_name(bot: &Bot, chat: ChatId, user_id: u64, text: &str, state: &BotState) -> HandlerResult {
    let name: String = text.trim().chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() || name.starts_with('/') {
        state.await_name(chat.0, user_id).await;
        return reply(bot, state, chat, "❌ Please send a valid name.").await;
    }
    state.store.register_participant(user_id, &name, Some(chat.0)).await?;
    log::info!("Registered participant {} as {:?}", user_id, name);
    reply(
        bot,
        state,
        chat,
        &format!("✅ Registered as <b>{}</b>!\n\nUse /start_quiz to play.", name),
    )
    .await
}

async fn apply_flow_step(bot: &Bot, chat: ChatId, user_id: u64, step: FlowStep, state: &BotState) -> HandlerResult {
    let delay = state.config.auto_delete_delay;
    match step {
        FlowStep::Prompt(text) => reply(bot, state, chat, &text).await,
        FlowStep::ChooseCorrect(options) => {
            reply_with(
                bot,
                chat,
                "✅ All options saved! Now select the <b>correct answer</b>:",
                Some(correct_option_keyboard(&options, CallbackData::AddCorrect)),
                delay,
            )
            .await
        }
        FlowStep::ShowDraft(text) => {
            reply_with(
                bot,
                chat,
                &format!("{}\n<b>What would you like to edit?</b>", text),
                Some(question_edit_keyboard()),
                delay,
            )
            .await
        }
        FlowStep::Invalid(text) => {
            keep_or_clear_flow(user_id, state).await;
            reply(bot, state, chat, &text).await
        }
        FlowStep::Apply(command) => {
            state.clear_admin_flow(user_id).await;
            let text = match run_admin_command(command, state).await {
                Ok(text) => text,
                Err(e) if e.is_rejection() => format!("❌ {}", e),
                Err(e) => {
                    log::error!("Admin command from {} failed: {}", user_id, e);
                    "❌ Failed to save changes.".to_string()
                }
            };
            reply(bot, state, chat, &text).await
        }
    }
}

/// Bad input ends a numeric flow but keeps a multi-step question flow alive.
async fn keep_or_clear_flow(user_id: u64, state: &BotState) {
    let mut flows = state.admin_flows.lock().await;
    let keep = matches!(
        flows.get(&user_id).map(|f| &f.kind),
        Some(FlowKind::AddQuestion { .. }) | Some(FlowKind::EditQuestion(_))
    );
    if !keep {
        flows.remove(&user_id);
    }
}

pub(crate) async fn run_admin_command(command: AdminCommand, state: &BotState) -> Result<String, crate::QuizError> {
    let store = &state.store;
    let text = match command {
        AdminCommand::BulkAdd(questions) => {
            let (added, total) = store.add_questions(questions).await?;
            format!("✅ <b>Successfully added {} questions!</b>\n\n📊 Total questions: {}", added, total)
        }
        AdminCommand::SetQuestionTime(secs) => {
            store.set_question_time(secs).await?;
            format!("✅ Question time set to <b>{} seconds</b>.", secs)
        }
        AdminCommand::SetName(user, name) => {
            let p = store.update_participant(user, |p| p.name = name).await?;
            format!("✅ Name updated to <b>{}</b>.", p.name)
        }
        AdminCommand::SetScore(user, score) => {
            store.update_participant(user, |p| p.total_score = score).await?;
            format!("✅ Total score set to <b>{}</b>.", score)
        }
        AdminCommand::SetAccuracy(user, accuracy) => {
            let p = store.set_accuracy(user, accuracy).await?;
            format!("✅ Accuracy set to <b>{:.1}%</b>.", p.accuracy)
        }
        AdminCommand::SetQuizzes(user, count) => {
            store.update_participant(user, |p| p.quizzes_completed = count).await?;
            format!("✅ Quizzes completed set to <b>{}</b>.", count)
        }
    };
    Ok(text)
}

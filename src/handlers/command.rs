use crate::error::QuizError;
use crate::leaderboard::{format_global, global_ranking};
use crate::quiz::start_quiz;
use crate::{BotState, Command};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::handlers::*;

pub async fn command_handler(bot: Bot, msg: Message, cmd: Command, state: Arc<BotState>) -> HandlerResult {
    let chat = msg.chat.id;
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0;
    let first_name = user.first_name.clone();
    log::info!("Command {:?} from user {} in chat {}", cmd, user_id, chat.0);

    delete_quietly(&bot, chat, msg.id).await;

    match cmd {
        Command::Start => handle_start(&bot, chat, user_id, &state).await?,
        Command::StartQuiz => handle_start_quiz(&bot, chat, user_id, &first_name, &state).await?,
        Command::Leaderboard => {
            let participants = state.store.participants().await;
            let text = format_global(&global_ranking(&participants, chat.0));
            reply(&bot, &state, chat, &text).await?;
        }
        Command::MyInfo => handle_my_info(&bot, chat, user_id, &state).await?,
        Command::Help => {
            reply(&bot, &state, chat, &Command::descriptions().to_string()).await?;
        }
        Command::Admin | Command::ClearState | Command::StateInfo | Command::ResetAllData | Command::ReopenQuiz => {
            if !state.is_admin(user_id) {
                reply(&bot, &state, chat, "❌ Admin only command.").await?;
                return Ok(());
            }
            admin_command(&bot, chat, user_id, cmd, &state).await?;
        }
    }
    Ok(())
}

async fn handle_start(bot: &Bot, chat: ChatId, user_id: u64, state: &BotState) -> HandlerResult {
    match state.store.participant(user_id).await {
        Some(participant) => {
            if let Err(e) = state.store.register_participant(user_id, &participant.name, Some(chat.0)).await {
                log::error!("Failed to refresh participant {}: {}", user_id, e);
            }
            let participants = state.store.participants().await;
            let text = format!(
                "👋 Welcome back, <b>{}</b>!\n\nUse /start_quiz to play.\n\n{}",
                participant.name,
                format_global(&global_ranking(&participants, chat.0))
            );
            reply_with(bot, chat, &text, None, state.config.start_message_delay).await
        }
        None => {
            state.await_name(chat.0, user_id).await;
            reply_with(
                bot,
                chat,
                "👋 <b>Welcome to the Quiz!</b>\n\nPlease send your <b>name</b> to register.",
                None,
                state.config.start_message_delay,
            )
            .await
        }
    }
}

async fn handle_start_quiz(
    bot: &Bot,
    chat: ChatId,
    user_id: u64,
    first_name: &str,
    state: &Arc<BotState>,
) -> HandlerResult {
    let name = match state.store.participant(user_id).await {
        Some(p) => p.name,
        None => first_name.to_string(),
    };
    match start_quiz(bot, state, chat, user_id, &name).await {
        Ok(_) => {
            if let Err(e) = state.store.ensure_participant(user_id, &name, chat.0).await {
                log::error!("Failed to register quiz starter {}: {}", user_id, e);
            }
            Ok(())
        }
        Err(e @ QuizError::QuizClosed) => reply(bot, state, chat, &format!("🚪 {}", e)).await,
        Err(e) if e.is_rejection() => reply(bot, state, chat, &format!("❌ {}", e)).await,
        Err(e) => Err(e.into()),
    }
}

async fn handle_my_info(bot: &Bot, chat: ChatId, user_id: u64, state: &BotState) -> HandlerResult {
    let Some(p) = state.store.participant(user_id).await else {
        return reply(bot, state, chat, "❌ You are not registered yet. Use /start to register.").await;
    };
    let status = if p.has_completed_current_quiz {
        "✅ Completed"
    } else {
        "❌ Not Completed"
    };
    let text = format!(
        "📊 <b>Your Information</b>\n\n\
         👤 Name: <b>{}</b>\n\
         🆔 User ID: <code>{}</code>\n\
         ⭐ Total Score: <b>{}</b>\n\
         📊 Accuracy: <b>{:.1}%</b>\n\
         🎯 Quizzes Completed: <b>{}</b>\n\
         📝 Current Quiz: <b>{}</b>",
        p.name, user_id, p.total_score, p.accuracy, p.quizzes_completed, status
    );
    reply(bot, state, chat, &text).await
}

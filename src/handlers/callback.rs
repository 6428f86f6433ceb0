use crate::error::QuizError;
use crate::quiz::{announce_answer, submit_answer};
use crate::types::CallbackData;
use crate::BotState;
use std::sync::Arc;
use teloxide::dispatching::DpHandlerDescription;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use crate::handlers::*;

pub fn callback_branch(
    state: Arc<BotState>,
) -> dptree::Handler<'static, DependencyMap, HandlerResult, DpHandlerDescription> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let state = state.clone();
        async move { handle_callback_query(bot, q, state).await }
    })
}

pub async fn handle_callback_query(bot: Bot, query: CallbackQuery, state: Arc<BotState>) -> HandlerResult {
    let (Some(message), Some(raw)) = (query.message.as_ref(), query.data.as_deref()) else {
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };
    let data: CallbackData = match raw.parse() {
        Ok(data) => data,
        Err(e) => {
            log::warn!("{}", e);
            bot.answer_callback_query(query.id.clone()).await?;
            return Ok(());
        }
    };

    match data {
        CallbackData::Answer { question, option } => {
            handle_answer(&bot, &query, message.chat.id, question, option, &state).await
        }
        other => admin_callback(&bot, &query, message, other, &state).await,
    }
}

async fn handle_answer(
    bot: &Bot,
    query: &CallbackQuery,
    chat: ChatId,
    question: usize,
    option: usize,
    state: &BotState,
) -> HandlerResult {
    let user = &query.from;
    match submit_answer(state, chat.0, user.id.0, &user.first_name, question, option).await {
        Ok(report) => {
            bot.answer_callback_query(query.id.clone())
                .text(report.toast())
                .await?;
            announce_answer(bot, state, chat, &report).await;
        }
        Err(e) if e.is_rejection() => {
            bot.answer_callback_query(query.id.clone())
                .text(format!("❌ {}", e))
                .show_alert(matches!(e, QuizError::AlreadyCompleted))
                .await?;
        }
        Err(e) => {
            log::error!("Error handling answer from user {}: {}", user.id.0, e);
            bot.answer_callback_query(query.id.clone())
                .text("❌ An error occurred")
                .await?;
        }
    }
    Ok(())
}

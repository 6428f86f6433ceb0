use std::error::Error;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};

use crate::quiz::send_transient;
use crate::BotState;

mod admin;
mod callback;
mod command;
mod janitor;
mod message;

pub use admin::*;
pub use callback::*;
pub use command::*;
pub use janitor::*;
pub use message::*;

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Sends an HTML reply that removes itself after the configured delay.
pub(crate) async fn reply(bot: &Bot, state: &BotState, chat: ChatId, text: &str) -> HandlerResult {
    reply_with(bot, chat, text, None, state.config.auto_delete_delay).await
}

pub(crate) async fn reply_with(
    bot: &Bot,
    chat: ChatId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
    delay: Duration,
) -> HandlerResult {
    send_transient(bot, chat, text, keyboard, delay).await?;
    Ok(())
}

/// Removes a user's message; failures (missing rights, already gone) are ignored.
pub(crate) async fn delete_quietly(bot: &Bot, chat: ChatId, message: MessageId) {
    if let Err(e) = bot.delete_message(chat, message).await {
        log::debug!("Could not delete message {:?} in chat {}: {}", message, chat.0, e);
    }
}

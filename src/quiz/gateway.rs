use crate::error::QuizError;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};

/// The slice of the bot API the quiz loop needs.
#[async_trait]
pub trait ChatGateway: Clone + Send + Sync + 'static {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, QuizError>;

    async fn edit_text(&self, chat: ChatId, message: MessageId, text: &str) -> Result<(), QuizError>;

    async fn delete(&self, chat: ChatId, message: MessageId) -> Result<(), QuizError>;
}

#[async_trait]
impl ChatGateway for Bot {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, QuizError> {
        let mut request = self.send_message(chat, text).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        Ok(request.await?.id)
    }

    async fn edit_text(&self, chat: ChatId, message: MessageId, text: &str) -> Result<(), QuizError> {
        self.edit_message_text(chat, message, text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn delete(&self, chat: ChatId, message: MessageId) -> Result<(), QuizError> {
        self.delete_message(chat, message).await?;
        Ok(())
    }
}

/// Deletes `message` after `delay`. The message may already be gone.
pub fn schedule_delete<G: ChatGateway>(gateway: &G, chat: ChatId, message: MessageId, delay: Duration) {
    let gateway = gateway.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = gateway.delete(chat, message).await {
            log::debug!("Auto-delete of {:?} in chat {} failed: {}", message, chat.0, e);
        }
    });
}

/// Sends a message that removes itself after `delay`.
pub async fn send_transient<G: ChatGateway>(
    gateway: &G,
    chat: ChatId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
    delay: Duration,
) -> Result<MessageId, QuizError> {
    let message = gateway.send_text(chat, text, keyboard).await?;
    schedule_delete(gateway, chat, message, delay);
    Ok(message)
}

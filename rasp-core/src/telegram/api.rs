use async_trait::async_trait;

use crate::delivery::{MessageSink, SinkError};

use super::client::{TelegramClient, TelegramError};
use super::types::{ChatId, MessageId, ReplyKeyboard};

/// Outbound chat operations used by the bot.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<MessageId, TelegramError>;

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError>;
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<MessageId, TelegramError> {
        TelegramClient::send_message(self, chat_id, text, keyboard).await
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.edit_message_text(chat_id, message_id, text).await
    }
}

/// One chat as a delivery sink.
pub struct ChatTarget<'a> {
    api: &'a dyn ChatApi,
    chat_id: ChatId,
}

impl<'a> ChatTarget<'a> {
    pub fn new(api: &'a dyn ChatApi, chat_id: ChatId) -> Self {
        Self { api, chat_id }
    }
}

#[async_trait]
impl MessageSink for ChatTarget<'_> {
    async fn send(&self, text: &str) -> Result<(), SinkError> {
        self.api
            .send_message(self.chat_id, text, None)
            .await
            .map(|_| ())
            .map_err(SinkError::from)
    }
}

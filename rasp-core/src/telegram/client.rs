use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::TelegramSection;
use crate::delivery::SinkError;
use crate::error::ConfigError;

use super::types::{ApiResponse, ChatId, Message, MessageId, ReplyKeyboard, Update};

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bot api rejected {method}: {description}")]
    Api {
        method: &'static str,
        code: Option<u16>,
        description: String,
    },
    #[error("bot api rate limited {method}")]
    RateLimited {
        method: &'static str,
        retry_after: Option<Duration>,
    },
    #[error("bot api returned no result for {0}")]
    EmptyResult(&'static str),
}

impl From<TelegramError> for SinkError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::RateLimited { retry_after, .. } => SinkError::RateLimited { retry_after },
            TelegramError::Http(inner) => SinkError::Transient(inner.to_string()),
            TelegramError::Api { code: Some(code), description, .. } if code >= 500 => {
                SinkError::Transient(description)
            }
            other => SinkError::Rejected(other.to_string()),
        }
    }
}

/// Thin Bot API client: long polling plus the two message calls the bot needs.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    endpoint: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(config: &TelegramSection, token: &str) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds),
        })
    }

    /// Reads the token from the environment variable named in the config.
    pub fn token_from_env(config: &TelegramSection) -> Result<String, ConfigError> {
        std::env::var(&config.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv(config.token_env.clone()))
    }

    async fn call<P, R>(&self, method: &'static str, payload: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, method))
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let envelope: ApiResponse<R> = response.json().await?;
        if envelope.ok {
            return envelope.result.ok_or(TelegramError::EmptyResult(method));
        }

        let retry_after = envelope
            .parameters
            .and_then(|parameters| parameters.retry_after)
            .map(Duration::from_secs);
        if status == StatusCode::TOO_MANY_REQUESTS || envelope.error_code == Some(429) {
            return Err(TelegramError::RateLimited {
                method,
                retry_after,
            });
        }
        Err(TelegramError::Api {
            method,
            code: envelope.error_code,
            description: envelope
                .description
                .unwrap_or_else(|| status.to_string()),
        })
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let payload = json!({
            "offset": offset,
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self.call("getUpdates", &payload).await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }
        Ok(updates)
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<MessageId, TelegramError> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|err| TelegramError::Api {
                    method: "sendMessage",
                    code: None,
                    description: err.to_string(),
                })?;
        }
        let message: Message = self.call("sendMessage", &payload).await?;
        Ok(message.message_id)
    }

    pub async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError> {
        let payload = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        let _: serde_json::Value = self.call("editMessageText", &payload).await?;
        Ok(())
    }
}

mod api;
mod client;
mod types;

pub use api::{ChatApi, ChatTarget};
pub use client::{TelegramClient, TelegramError};
pub use types::{
    ApiResponse, Chat, ChatId, KeyboardButton, Message, MessageId, ReplyKeyboard,
    ResponseParameters, Update, User,
};

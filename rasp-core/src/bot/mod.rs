mod commands;
mod replies;
mod service;

pub use commands::{Command, HELP_BUTTON, REGISTER_BUTTON, SCHEDULE_BUTTON, SELECTION_PREFIX};
pub use replies::main_menu;
pub use service::{BotError, BotService, Inbound};

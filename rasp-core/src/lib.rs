pub mod bot;
pub mod browser;
pub mod config;
pub mod delivery;
pub mod error;
pub mod extraction;
pub mod groups;
pub mod registry;
pub mod telegram;

pub use bot::{main_menu, BotError, BotService, Command, Inbound};
pub use browser::{
    BrowserError, BrowserMetrics, BrowserResult, ChromiumDriver, ChromiumSession, NodeHandle,
    RenderDriver, RenderSession, SelectorLayout,
};
pub use config::{
    load_rasp_config, ChromiumSection, DeliverySection, ExtractionSection, GroupsSection,
    RaspConfig, TelegramSection, DEFAULT_LOCATOR_PREFIX,
};
pub use delivery::{
    DeliveryError, DeliveryPacer, DeliveryReceipt, MessageSink, PacingConfig, RetryPolicy,
    SinkError,
};
pub use error::{ConfigError, Result};
pub use extraction::{
    produce_sections, ExtractionDocument, ExtractionEngine, ExtractionError, ExtractionOptions,
    ExtractionResult, Item, ScanPlan, Section,
};
pub use groups::{
    resolve_in, GroupEntry, GroupIndex, GroupSnapshot, LoadError, LocatorPolicy,
    ResolutionResult, ValidationError, MAX_CANDIDATES,
};
pub use registry::{PendingResolution, RequesterId, RequesterRegistry};
pub use telegram::{
    ChatApi, ChatId, ChatTarget, MessageId, ReplyKeyboard, TelegramClient, TelegramError, Update,
};

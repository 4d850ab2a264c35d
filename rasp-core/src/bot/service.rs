use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::delivery::DeliveryPacer;
use crate::extraction::ExtractionEngine;
use crate::groups::{GroupEntry, GroupIndex, LocatorPolicy, ResolutionResult};
use crate::registry::{PendingResolution, RequesterId, RequesterRegistry};
use crate::telegram::{
    ChatApi, ChatId, ChatTarget, MessageId, ReplyKeyboard, TelegramError, Update,
};

use super::commands::Command;
use super::replies;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("chat api error: {0}")]
    Telegram(#[from] TelegramError),
}

/// One inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub requester: RequesterId,
    pub chat_id: ChatId,
    pub text: String,
}

impl Inbound {
    pub fn new(requester: RequesterId, chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            requester,
            chat_id,
            text: text.into(),
        }
    }

    /// `None` for updates that carry no text message.
    pub fn from_update(update: &Update) -> Option<Self> {
        let message = update.message.as_ref()?;
        let text = message.text.as_ref()?;
        let requester = message
            .from
            .as_ref()
            .map(|user| user.id)
            .unwrap_or(message.chat.id);
        Some(Self::new(requester, message.chat.id, text.clone()))
    }
}

/// Routes inbound messages through resolution, extraction and delivery.
/// Every pipeline fault ends as a reply to the requester; only failures to
/// reach the chat platform itself are returned.
pub struct BotService {
    groups: Arc<GroupIndex>,
    registry: RequesterRegistry,
    engine: ExtractionEngine,
    pacer: DeliveryPacer,
}

impl BotService {
    pub fn new(groups: Arc<GroupIndex>, engine: ExtractionEngine, pacer: DeliveryPacer) -> Self {
        Self {
            groups,
            registry: RequesterRegistry::new(),
            engine,
            pacer,
        }
    }

    pub fn groups(&self) -> &Arc<GroupIndex> {
        &self.groups
    }

    pub fn registry(&self) -> &RequesterRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &ExtractionEngine {
        &self.engine
    }

    fn policy(&self) -> &LocatorPolicy {
        self.groups.policy()
    }

    pub async fn handle(&self, inbound: &Inbound, api: &dyn ChatApi) -> Result<(), BotError> {
        let awaiting_choice = self.registry.has_pending(inbound.requester);
        let command = Command::parse(&inbound.text, awaiting_choice);
        info!(
            requester = inbound.requester,
            chat = inbound.chat_id,
            command = command.name(),
            "handling message"
        );
        let reply = Reply {
            api,
            chat_id: inbound.chat_id,
        };

        match command {
            Command::Start => {
                self.registry.reset(inbound.requester);
                reply
                    .with_keyboard(&replies::greeting(), &replies::main_menu())
                    .await?;
            }
            Command::Help => {
                reply.text(&replies::help()).await?;
            }
            Command::RegisterButton => {
                reply.text(&replies::register_hint()).await?;
            }
            Command::Register(query) => self.register(inbound.requester, &query, &reply).await?,
            Command::Select(label) => self.select(inbound.requester, &label, &reply).await?,
            Command::GetSchedule => self.schedule(inbound.requester, &reply).await?,
            Command::Unknown(_) => {
                reply.text(&replies::unknown()).await?;
            }
        }
        Ok(())
    }

    async fn register(
        &self,
        requester: RequesterId,
        query: &str,
        reply: &Reply<'_>,
    ) -> Result<(), BotError> {
        self.registry.clear_pending(requester);
        if query.is_empty() {
            reply.text(&replies::register_usage()).await?;
            return Ok(());
        }

        if looks_like_locator(query) {
            return self.register_locator(requester, query, reply).await;
        }

        match self.groups.resolve(query) {
            ResolutionResult::SingleMatch(entry) => self.confirm(requester, entry, reply).await,
            ResolutionResult::MultipleMatches { candidates, total } => {
                let menu = replies::candidate_menu(&candidates);
                let text = replies::choose_group(candidates.len(), total);
                self.registry
                    .set_pending(requester, PendingResolution::new(query, candidates, total));
                reply.with_keyboard(&text, &menu).await?;
                Ok(())
            }
            ResolutionResult::NoMatch => {
                reply.text(&replies::not_found(query)).await?;
                Ok(())
            }
        }
    }

    async fn register_locator(
        &self,
        requester: RequesterId,
        locator: &str,
        reply: &Reply<'_>,
    ) -> Result<(), BotError> {
        let locator = locator.trim();
        if let Err(err) = self.policy().validate(locator) {
            warn!(requester, error = %err, "rejected locator");
            reply
                .text(&replies::invalid_locator(self.policy().prefix()))
                .await?;
            return Ok(());
        }
        // A known locator keeps its label; otherwise the group id stands in.
        let entry = self
            .groups
            .snapshot()
            .entries()
            .iter()
            .find(|entry| entry.locator == locator)
            .cloned()
            .unwrap_or_else(|| {
                let label = LocatorPolicy::group_id(locator).unwrap_or(locator).to_string();
                GroupEntry::new(label, locator)
            });
        self.confirm(requester, entry, reply).await
    }

    async fn select(
        &self,
        requester: RequesterId,
        label: &str,
        reply: &Reply<'_>,
    ) -> Result<(), BotError> {
        let Some(pending) = self.registry.take_pending(requester) else {
            reply.text(replies::SELECTION_FAILED).await?;
            return Ok(());
        };
        match pending.choose(label).cloned() {
            Some(entry) => self.confirm(requester, entry, reply).await,
            None => {
                self.registry.set_pending(requester, pending);
                reply.text(replies::SELECTION_FAILED).await?;
                Ok(())
            }
        }
    }

    async fn confirm(
        &self,
        requester: RequesterId,
        entry: GroupEntry,
        reply: &Reply<'_>,
    ) -> Result<(), BotError> {
        info!(requester, group = %entry.label, url = %entry.locator, "requester registered");
        let text = replies::registered(&entry.label);
        self.registry.register(requester, entry);
        reply.with_keyboard(&text, &replies::main_menu()).await?;
        Ok(())
    }

    async fn schedule(&self, requester: RequesterId, reply: &Reply<'_>) -> Result<(), BotError> {
        let Some(entry) = self.registry.registration(requester) else {
            reply.text(&replies::not_registered()).await?;
            return Ok(());
        };

        let status = reply.text(replies::FETCHING).await?;
        let document = match self.engine.extract(&entry.locator).await {
            Ok(document) => document,
            Err(err) => {
                warn!(requester, group = %entry.label, error = %err, "schedule extraction failed");
                reply.edit(status, replies::EXTRACTION_FAILED).await;
                return Ok(());
            }
        };
        if document.is_empty() {
            reply.edit(status, replies::NOTHING_FOUND).await;
            return Ok(());
        }

        reply
            .edit(status, &replies::sending(document.section_count()))
            .await;
        let sink = ChatTarget::new(reply.api, reply.chat_id);
        if let Err(err) = self.pacer.deliver(&document, &sink).await {
            warn!(requester, sent = err.sent, error = %err, "schedule delivery interrupted");
            // The chat may be unreachable at this point; the failure is logged either way.
            if let Err(notify) = reply.text(&replies::delivery_interrupted(err.sent)).await {
                warn!(requester, error = %notify, "failed to report interrupted delivery");
            }
        }
        Ok(())
    }
}

fn looks_like_locator(query: &str) -> bool {
    let lower = query.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

struct Reply<'a> {
    api: &'a dyn ChatApi,
    chat_id: ChatId,
}

impl Reply<'_> {
    async fn text(&self, text: &str) -> Result<MessageId, TelegramError> {
        self.api.send_message(self.chat_id, text, None).await
    }

    async fn with_keyboard(
        &self,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<MessageId, TelegramError> {
        self.api.send_message(self.chat_id, text, Some(keyboard)).await
    }

    /// Status edits are best effort.
    async fn edit(&self, message_id: MessageId, text: &str) {
        if let Err(err) = self.api.edit_message(self.chat_id, message_id, text).await {
            warn!(chat = self.chat_id, error = %err, "failed to edit status message");
        }
    }
}

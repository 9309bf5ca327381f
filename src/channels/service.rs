//! Channel-independent inbound message flow
//!
//! [`ChannelService::ingest`] runs inline in the webhook handler and logs the
//! customer's message before the delivery is acknowledged.
//! [`ChannelService::respond`] produces and sends the reply and is spawned in
//! the background by [`ChannelService::dispatch`]. Replies within one session
//! are produced and delivered in the order their messages were ingested.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use tracing::Instrument;
use uuid::Uuid;

use super::best_effort;
use super::split_message;
use super::ChannelDirectory;
use super::ChannelSender;
use super::InboundEvent;
use super::ReplyOutcome;
use crate::config::RagConfig;
use crate::errors::Result;
use crate::memory::MemoryStore;
use crate::memory::TenantSelection;
use crate::models::ChannelBinding;
use crate::models::ChannelKind;
use crate::models::ConversationSession;
use crate::models::SenderRole;
use crate::models::SessionKey;
use crate::rag::RagService;
use crate::rate_limit::RateLimiter;

/// A logged inbound message waiting for its reply
#[derive(Debug, Clone)]
pub struct PendingReply {
    pub binding: ChannelBinding,
    pub event: InboundEvent,
    pub session: ConversationSession,
    /// Id of the logged user message
    pub message_id: i64,
    pub tenant_ids: Vec<Uuid>,
}

/// Last reply dispatched for a session; `done` resolves once it has finished
struct ReplyTurn {
    seq: u64,
    done: oneshot::Receiver<()>,
}

#[derive(Clone)]
pub struct ChannelService {
    directory: Arc<dyn ChannelDirectory>,
    memory: Arc<dyn MemoryStore>,
    rag: Arc<RagService>,
    limiter: Arc<dyn RateLimiter>,
    messenger: Arc<dyn ChannelSender>,
    telegram: Arc<dyn ChannelSender>,
    tenant_selection: TenantSelection,
    context_turns: usize,
    reply_turns: Arc<DashMap<SessionKey, ReplyTurn>>,
    next_turn: Arc<AtomicU64>,
}

impl ChannelService {
    #[must_use]
    pub fn new(
        directory: Arc<dyn ChannelDirectory>,
        memory: Arc<dyn MemoryStore>,
        rag: Arc<RagService>,
        limiter: Arc<dyn RateLimiter>,
        messenger: Arc<dyn ChannelSender>,
        telegram: Arc<dyn ChannelSender>,
        config: &RagConfig,
    ) -> Self {
        Self {
            directory,
            memory,
            rag,
            limiter,
            messenger,
            telegram,
            tenant_selection: config.tenant_selection,
            context_turns: config.context_turns,
            reply_turns: Arc::new(DashMap::new()),
            next_turn: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<dyn ChannelDirectory> {
        &self.directory
    }

    #[must_use]
    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    #[must_use]
    pub fn rag(&self) -> &Arc<RagService> {
        &self.rag
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.limiter
    }

    fn sender_for(&self, channel: ChannelKind) -> Arc<dyn ChannelSender> {
        match channel {
            ChannelKind::Messenger => self.messenger.clone(),
            ChannelKind::Telegram => self.telegram.clone(),
        }
    }

    /// Tenants whose catalog answers this binding's customers
    ///
    /// A pinned tenant wins; otherwise the owner's memberships are narrowed by
    /// the configured [`TenantSelection`].
    pub async fn resolve_tenants(&self, binding: &ChannelBinding) -> Result<Vec<Uuid>> {
        if let Some(tenant_id) = binding.tenant_id {
            return Ok(vec![tenant_id]);
        }
        let memberships = self.directory.memberships_for_owner(binding.owner_id).await?;
        Ok(self.tenant_selection.resolve(&memberships))
    }

    /// Resolve the binding for `event` and log it
    ///
    /// Returns `Ok(None)` when no active binding exists for the page or bot.
    pub async fn ingest(&self, event: InboundEvent) -> Result<Option<PendingReply>> {
        let Some(binding) = self
            .directory
            .find_binding(event.channel, &event.external_id)
            .await?
        else {
            debug!(
                "No active {} binding for {}, dropping message",
                event.channel, event.external_id
            );
            return Ok(None);
        };
        self.ingest_for(binding, event).await
    }

    /// Log `event` for an already resolved binding
    ///
    /// Returns `Ok(None)` when the binding's owner has no tenant; nothing is
    /// written in that case.
    pub async fn ingest_for(
        &self,
        binding: ChannelBinding,
        event: InboundEvent,
    ) -> Result<Option<PendingReply>> {
        let tenant_ids = self.resolve_tenants(&binding).await?;
        let Some(&tenant_id) = tenant_ids.first() else {
            warn!(
                owner = %binding.owner_id,
                "{} binding {} has no tenant, dropping message",
                binding.channel, binding.external_id
            );
            return Ok(None);
        };

        let key = SessionKey {
            owner_id: binding.owner_id,
            tenant_id,
            channel: event.channel,
            external_user_id: event.sender_id.clone(),
        };
        let session = self.memory.open_session(&key).await?;
        let message = self
            .memory
            .append_message(&session, SenderRole::User, &event.text)
            .await?;
        debug!(
            session = %session.id,
            message_id = message.id,
            "Logged inbound {} message",
            event.channel
        );

        Ok(Some(PendingReply {
            binding,
            event,
            session,
            message_id: message.id,
            tenant_ids,
        }))
    }

    /// Answer a logged message and deliver the reply
    ///
    /// Never fails; every problem is logged and reported in the outcome.
    pub async fn respond(&self, pending: PendingReply) -> ReplyOutcome {
        let span = info_span!(
            "channel.reply",
            channel = %pending.event.channel,
            sender = %pending.event.sender_id,
            session = %pending.session.id,
        );
        self.respond_inner(pending).instrument(span).await
    }

    async fn respond_inner(&self, pending: PendingReply) -> ReplyOutcome {
        let PendingReply {
            binding,
            event,
            session,
            message_id,
            tenant_ids,
        } = pending;

        let limit_key = format!("{}:{}", event.channel, event.sender_id);
        if !self.limiter.check(&limit_key) {
            warn!("Rate limit exceeded for {}, not replying", limit_key);
            return ReplyOutcome::RateLimited;
        }

        let sender = self.sender_for(event.channel);
        {
            let sender = sender.clone();
            let binding = binding.clone();
            let recipient = event.reply_to.clone();
            drop(best_effort("typing indicator", async move {
                sender.typing(&binding, &recipient).await
            }));
        }

        let conversation = match self
            .memory
            .reply_context(&session, message_id, self.context_turns)
            .await
        {
            Ok(context) => context,
            Err(e) => {
                warn!("Failed to load conversation context: {}", e);
                String::new()
            }
        };
        let conversation = Some(conversation.as_str()).filter(|c| !c.is_empty());

        let answer = self.rag.answer(&tenant_ids, &event.text, conversation).await;

        if let Err(e) = self
            .memory
            .append_message(&session, SenderRole::Bot, &answer.reply)
            .await
        {
            warn!("Failed to log bot reply: {}", e);
        }

        let parts = split_message(&answer.reply, event.channel.max_message_chars());
        for part in &parts {
            if let Err(e) = sender.send_text(&binding, &event.reply_to, part).await {
                error!(
                    "Failed to deliver {} reply to {}: {}",
                    event.channel, event.reply_to, e
                );
                return ReplyOutcome::Failed(e.to_string());
            }
        }

        info!(
            parts = parts.len(),
            degraded = answer.degraded,
            apology = answer.failed,
            "Reply delivered"
        );
        ReplyOutcome::Sent {
            parts: parts.len(),
            degraded: answer.degraded,
            apology: answer.failed,
        }
    }

    /// Spawn [`ChannelService::respond`] so the webhook can be acknowledged
    ///
    /// The reply waits for the previous reply dispatched for the same session,
    /// so call this in ingest order.
    pub fn dispatch(&self, pending: PendingReply) -> JoinHandle<ReplyOutcome> {
        let key = pending.session.key();
        let seq = self.next_turn.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = oneshot::channel();
        let previous = self
            .reply_turns
            .insert(key.clone(), ReplyTurn { seq, done: done_rx });

        let service = self.clone();
        tokio::spawn(async move {
            if let Some(previous) = previous {
                // Resolves with Err once the previous reply drops its sender
                let _ = previous.done.await;
            }
            let outcome = service.respond(pending).await;
            drop(done_tx);
            service.reply_turns.remove_if(&key, |_, turn| turn.seq == seq);
            outcome
        })
    }
}

//! The processor chain.
//!
//! [`UpdatePipeline`] is the entry: it acquires the chat's exclusive lane and
//! hands the update to the first inner stage. Stages form an explicit chain
//! assembled once at startup, each holding a reference to the next; any stage
//! may short-circuit with an [`Outcome`] without invoking the rest.
//!
//! Order (outer → inner): lane acquisition → [`SequenceDeduplicator`] →
//! [`Tracer`] → [`TypingIndicator`] → [`CallbackRouter`] → [`Authenticator`]
//! → [`ConversationDispatcher`].

use std::{sync::Arc, time::Instant};

use {
    async_trait::async_trait,
    tracing::{Instrument, debug, warn},
};

use {
    deskbot_channels::{ChatChannelFactory, ConversationFactory, Identity, IdentityResolver},
    deskbot_common::{CallbackReceiveResult, ChatId, Update, UpdateKind},
};

use crate::{
    context::{ChatContextRegistry, ChatState},
    error::{Error, Result},
    receiver::{CallbackContext, ReceiverRegistry},
};

/// Fixed reply for senders the directory does not know.
pub const REGISTRATION_PROMPT: &str =
    "I don't know you yet. Please contact the service desk to get registered, then write me again.";

/// How the pipeline disposed of one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reached the conversation state machine.
    Dispatched,
    /// Dropped as a duplicate or stale delivery.
    Stale,
    /// Answered a pending continuation or an inline receiver.
    CallbackHandled(CallbackReceiveResult),
    /// Sender unknown; answered with the registration prompt.
    Unauthenticated,
}

/// Per-update state threaded through the inner stages.
///
/// `state` is the chat's mutable state, exclusively held for the whole
/// traversal — stages mutate it directly without further locking.
pub struct StageContext<'a> {
    pub chat: ChatId,
    pub state: &'a mut ChatState,
    /// Set by the authenticator; present for every stage further in.
    pub identity: Option<Identity>,
}

/// One inner stage of the chain.
#[async_trait]
pub trait UpdateStage: Send + Sync {
    async fn process(&self, update: &Update, cx: &mut StageContext<'_>) -> Result<Outcome>;
}

// ── Entry: per-chat lane acquisition ────────────────────────────────────────

/// Pipeline entry point. Serializes updates per chat; unrelated chats run
/// fully concurrently.
pub struct UpdatePipeline {
    registry: Arc<ChatContextRegistry>,
    head: Arc<dyn UpdateStage>,
}

impl UpdatePipeline {
    pub fn new(registry: Arc<ChatContextRegistry>, head: Arc<dyn UpdateStage>) -> Self {
        Self { registry, head }
    }

    pub fn registry(&self) -> &Arc<ChatContextRegistry> {
        &self.registry
    }

    /// Process one update under its chat's exclusive lane.
    ///
    /// The lane is released on every exit path when the guard drops. Calling
    /// `handle` again for the same chat from within an in-flight invocation
    /// deadlocks; continuations get their chat access through
    /// [`CallbackContext`] instead.
    pub async fn handle(&self, update: Update) -> Result<Outcome> {
        let context = self.registry.get_or_create(update.chat);
        context.touch();

        let mut state = context.lane.lock().await;
        let mut cx = StageContext {
            chat: update.chat,
            state: &mut state,
            identity: None,
        };
        self.head.process(&update, &mut cx).await
    }
}

// ── Stage: duplicate / stale suppression ────────────────────────────────────

/// Drops updates whose sequence number does not advance the chat's highest
/// accepted one. Runs under the lane, so the compare-and-set is race-free.
pub struct SequenceDeduplicator {
    next: Arc<dyn UpdateStage>,
}

impl SequenceDeduplicator {
    pub fn new(next: Arc<dyn UpdateStage>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl UpdateStage for SequenceDeduplicator {
    async fn process(&self, update: &Update, cx: &mut StageContext<'_>) -> Result<Outcome> {
        if update.seq <= cx.state.last_seq {
            debug!(
                chat = %cx.chat,
                seq = update.seq,
                last_seq = cx.state.last_seq,
                "dropping duplicate or stale update"
            );
            return Ok(Outcome::Stale);
        }
        cx.state.last_seq = update.seq;
        self.next.process(update, cx).await
    }
}

// ── Stage: tracing decorator ────────────────────────────────────────────────

/// Brackets the rest of the chain in a tracing span. Never alters the
/// downstream result or error.
pub struct Tracer {
    next: Arc<dyn UpdateStage>,
}

impl Tracer {
    pub fn new(next: Arc<dyn UpdateStage>) -> Self {
        Self { next }
    }
}

fn update_kind(update: &Update) -> &'static str {
    match update.kind {
        UpdateKind::Message(_) => "message",
        UpdateKind::CallbackQuery(_) => "callback_query",
    }
}

#[async_trait]
impl UpdateStage for Tracer {
    async fn process(&self, update: &Update, cx: &mut StageContext<'_>) -> Result<Outcome> {
        let span = tracing::info_span!(
            "update",
            chat = %cx.chat,
            seq = update.seq,
            kind = update_kind(update),
        );
        let started = Instant::now();
        let result = self.next.process(update, cx).instrument(span).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(outcome) => {
                debug!(chat = %cx.chat, seq = update.seq, ?outcome, elapsed_ms, "update processed");
            },
            Err(error) => {
                warn!(chat = %cx.chat, seq = update.seq, %error, elapsed_ms, "update failed");
            },
        }
        result
    }
}

// ── Stage: typing indicator ─────────────────────────────────────────────────

/// Emits a fire-and-forget "typing" presence signal before the rest of the
/// chain runs. The transport auto-expires the signal; failures are logged
/// and never surface.
pub struct TypingIndicator {
    channels: Arc<dyn ChatChannelFactory>,
    next: Arc<dyn UpdateStage>,
}

impl TypingIndicator {
    pub fn new(channels: Arc<dyn ChatChannelFactory>, next: Arc<dyn UpdateStage>) -> Self {
        Self { channels, next }
    }
}

#[async_trait]
impl UpdateStage for TypingIndicator {
    async fn process(&self, update: &Update, cx: &mut StageContext<'_>) -> Result<Outcome> {
        let channel = self.channels.channel_for(cx.chat);
        let chat = cx.chat;
        tokio::spawn(async move {
            if let Err(error) = channel.send_typing().await {
                debug!(%chat, %error, "typing signal failed");
            }
        });
        self.next.process(update, cx).await
    }
}

// ── Stage: callback router ──────────────────────────────────────────────────

/// Routes an update into a pending continuation or an inline receiver, when
/// one matches; otherwise passes it on unchanged.
///
/// A free-text reply referencing an awaited prompt resolves by handle; a
/// callback query resolves by token, falling back to the push binding of the
/// message its control sits on. A resolved redirection is consumed before
/// the continuation runs — a reply answers at most one continuation, ever.
pub struct CallbackRouter {
    receivers: Arc<ReceiverRegistry>,
    channels: Arc<dyn ChatChannelFactory>,
    next: Arc<dyn UpdateStage>,
}

impl CallbackRouter {
    pub fn new(
        receivers: Arc<ReceiverRegistry>,
        channels: Arc<dyn ChatChannelFactory>,
        next: Arc<dyn UpdateStage>,
    ) -> Self {
        Self {
            receivers,
            channels,
            next,
        }
    }

    async fn resume(
        &self,
        update: &Update,
        cx: &mut StageContext<'_>,
        redirection: crate::correlator::Redirection,
    ) -> Result<Outcome> {
        let channel = self.channels.channel_for(cx.chat);
        let origin = redirection.origin;
        let mut ccx = CallbackContext {
            chat: cx.chat,
            channel: Arc::clone(&channel),
            redirections: &mut cx.state.redirections,
        };
        let result = redirection.continuation.resume(update, &mut ccx).await?;
        if result == CallbackReceiveResult::RemoveButtons
            && let Some(origin) = origin
        {
            channel.remove_buttons(origin).await?;
            cx.state.bindings.remove(&origin);
        }
        Ok(Outcome::CallbackHandled(result))
    }
}

#[async_trait]
impl UpdateStage for CallbackRouter {
    async fn process(&self, update: &Update, cx: &mut StageContext<'_>) -> Result<Outcome> {
        if let Some(prompt) = update.reply_to()
            && let Some(redirection) = cx.state.redirections.resolve_by_prompt(prompt)
        {
            debug!(chat = %cx.chat, %prompt, "reply resolves pending redirection");
            return self.resume(update, cx, redirection).await;
        }

        if let Some(query) = update.callback() {
            if let Some(redirection) = cx.state.redirections.resolve_by_token(&query.token) {
                debug!(chat = %cx.chat, token = %query.token, "callback resolves pending redirection");
                return self.resume(update, cx, redirection).await;
            }

            if let Some(origin) = query.message
                && let Some(binding) = cx.state.bindings.get(&origin).cloned()
            {
                let factory =
                    self.receivers
                        .get(&binding.receiver)
                        .ok_or_else(|| Error::UnknownReceiver {
                            id: binding.receiver.clone(),
                        })?;
                let configuration = factory.parse_configuration(&binding.configuration)?;
                let payload = factory.parse_data(&binding.data)?;
                let process = factory.create_process(configuration, payload)?;

                let channel = self.channels.channel_for(cx.chat);
                let mut ccx = CallbackContext {
                    chat: cx.chat,
                    channel: Arc::clone(&channel),
                    redirections: &mut cx.state.redirections,
                };
                let result = process.process(update, &mut ccx).await?;
                if result == CallbackReceiveResult::RemoveButtons {
                    channel.remove_buttons(origin).await?;
                    cx.state.bindings.remove(&origin);
                }
                return Ok(Outcome::CallbackHandled(result));
            }
        }

        self.next.process(update, cx).await
    }
}

// ── Stage: authentication ───────────────────────────────────────────────────

/// Resolves the sender against the identity directory. Unknown senders get
/// the fixed registration prompt and never reach conversation dispatch.
pub struct Authenticator {
    directory: Arc<dyn IdentityResolver>,
    channels: Arc<dyn ChatChannelFactory>,
    next: Arc<dyn UpdateStage>,
}

impl Authenticator {
    pub fn new(
        directory: Arc<dyn IdentityResolver>,
        channels: Arc<dyn ChatChannelFactory>,
        next: Arc<dyn UpdateStage>,
    ) -> Self {
        Self {
            directory,
            channels,
            next,
        }
    }
}

#[async_trait]
impl UpdateStage for Authenticator {
    async fn process(&self, update: &Update, cx: &mut StageContext<'_>) -> Result<Outcome> {
        match self.directory.resolve(update.from).await? {
            Some(identity) => {
                cx.identity = Some(identity);
                self.next.process(update, cx).await
            },
            None => {
                debug!(chat = %cx.chat, from = %update.from, "unauthenticated sender");
                let channel = self.channels.channel_for(cx.chat);
                channel.send_message(REGISTRATION_PROMPT, false).await?;
                Ok(Outcome::Unauthenticated)
            },
        }
    }
}

// ── Terminal stage: conversation dispatch ───────────────────────────────────

/// Feeds the update into the chat's conversation state machine, creating it
/// lazily. One conversation per chat at a time; the kind is picked by the
/// factory from the sender's identity.
pub struct ConversationDispatcher {
    conversations: Arc<dyn ConversationFactory>,
    channels: Arc<dyn ChatChannelFactory>,
}

impl ConversationDispatcher {
    pub fn new(
        conversations: Arc<dyn ConversationFactory>,
        channels: Arc<dyn ChatChannelFactory>,
    ) -> Self {
        Self {
            conversations,
            channels,
        }
    }
}

#[async_trait]
impl UpdateStage for ConversationDispatcher {
    async fn process(&self, update: &Update, cx: &mut StageContext<'_>) -> Result<Outcome> {
        let identity = cx
            .identity
            .clone()
            .ok_or_else(|| Error::message("update reached dispatch without an identity"))?;
        let channel = self.channels.channel_for(cx.chat);
        let conversation = cx
            .state
            .conversation
            .get_or_insert_with(|| self.conversations.create(cx.chat, &identity));
        conversation
            .advance(update, &identity, channel.as_ref())
            .await?;
        Ok(Outcome::Dispatched)
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Assembles the chain in its fixed order, once, at startup.
#[derive(Default)]
pub struct PipelineBuilder {
    registry: Option<Arc<ChatContextRegistry>>,
    channels: Option<Arc<dyn ChatChannelFactory>>,
    directory: Option<Arc<dyn IdentityResolver>>,
    conversations: Option<Arc<dyn ConversationFactory>>,
    receivers: Option<Arc<ReceiverRegistry>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(mut self, registry: Arc<ChatContextRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn channels(mut self, channels: Arc<dyn ChatChannelFactory>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn IdentityResolver>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn conversations(mut self, conversations: Arc<dyn ConversationFactory>) -> Self {
        self.conversations = Some(conversations);
        self
    }

    pub fn receivers(mut self, receivers: Arc<ReceiverRegistry>) -> Self {
        self.receivers = Some(receivers);
        self
    }

    /// Wire the stages innermost-first and return the ready pipeline.
    pub fn build(self) -> Result<UpdatePipeline> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ChatContextRegistry::new()));
        let channels = self
            .channels
            .ok_or_else(|| Error::message("pipeline builder: channel factory not set"))?;
        let directory = self
            .directory
            .ok_or_else(|| Error::message("pipeline builder: identity resolver not set"))?;
        let conversations = self
            .conversations
            .ok_or_else(|| Error::message("pipeline builder: conversation factory not set"))?;
        let receivers = self.receivers.unwrap_or_default();

        let dispatcher = Arc::new(ConversationDispatcher::new(
            conversations,
            Arc::clone(&channels),
        ));
        let authenticator = Arc::new(Authenticator::new(
            directory,
            Arc::clone(&channels),
            dispatcher,
        ));
        let router = Arc::new(CallbackRouter::new(
            receivers,
            Arc::clone(&channels),
            authenticator,
        ));
        let typing = Arc::new(TypingIndicator::new(Arc::clone(&channels), router));
        let tracer = Arc::new(Tracer::new(typing));
        let dedup = Arc::new(SequenceDeduplicator::new(tracer));

        Ok(UpdatePipeline::new(registry, dedup))
    }
}

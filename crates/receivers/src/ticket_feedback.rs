//! Ticket feedback receiver: the inline actions attached to service-desk
//! resolution notices.
//!
//! Five rating actions complete in a single callback query. `ReopenIssue`
//! and `AdditionalInfo` span two updates: the callback query sends a
//! force-reply prompt and registers a redirection; the user's free-text
//! reply is routed back here through the correlator, posts the comment, and
//! (for reopen) applies the workflow transition. If the comment succeeds and
//! the transition fails, the redirection is already consumed: the external
//! state stays half-updated and there is no automatic retry.

use std::{str::FromStr, sync::Arc};

use {async_trait::async_trait, serde::Deserialize};

use {
    deskbot_channels::IdentityResolver,
    deskbot_common::{CallbackQuery, CallbackReceiveResult, Update, UpdateKind},
    deskbot_pipeline::{
        CallbackContext, CallbackReceiverProcess, CallbackReceiverProcessFactory, Continuation,
        Error, Redirection, Result, receiver::OpaqueValue,
    },
};

use crate::servicedesk::ServiceDeskClient;

const REOPEN_PROMPT: &str =
    "Why would you like to reopen this request?\n\nPlease keep your answer attached to this message!";
const ADDITIONAL_INFO_PROMPT: &str =
    "Please type your reply.\n\nPlease keep your answer attached to this message!";

/// Actions carried in the callback data of a feedback message.
///
/// `A`..`E` are the rating buttons, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    A,
    B,
    C,
    D,
    E,
    ReopenIssue,
    AdditionalInfo,
}

impl FromStr for CallbackAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" => Ok(Self::E),
            "ReopenIssue" => Ok(Self::ReopenIssue),
            "AdditionalInfo" => Ok(Self::AdditionalInfo),
            other => Err(Error::UnrecognizedCallbackAction { data: other.into() }),
        }
    }
}

impl CallbackAction {
    /// Rating value of a rating action, `None` for the two-step actions.
    pub fn rating(self) -> Option<u8> {
        match self {
            Self::A => Some(5),
            Self::B => Some(4),
            Self::C => Some(3),
            Self::D => Some(2),
            Self::E => Some(1),
            Self::ReopenIssue | Self::AdditionalInfo => None,
        }
    }
}

fn rating_label(rating: u8) -> &'static str {
    match rating {
        5 => "very good",
        4 => "good",
        3 => "neither good nor bad",
        2 => "poor",
        1 => "very poor",
        _ => "",
    }
}

/// Per-push configuration delivered alongside the feedback message.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketFeedbackConfig {
    pub base_url: String,
}

/// Parsed data blob: issue key plus the portal feedback token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRef {
    pub issue: String,
    pub token: String,
}

impl TicketRef {
    /// Data arrives as UTF-8 "ISSUE-KEY#token"; the token part is optional.
    fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::parse(format!("ticket reference is not UTF-8: {e}")))?;
        let (issue, token) = match text.split_once('#') {
            Some((issue, token)) => (issue, token),
            None => (text, ""),
        };
        if issue.is_empty() {
            return Err(Error::parse("ticket reference has an empty issue key"));
        }
        Ok(Self {
            issue: issue.into(),
            token: token.into(),
        })
    }
}

/// One bound feedback action handler for a specific ticket.
#[derive(Clone)]
pub struct TicketFeedbackProcess {
    config: TicketFeedbackConfig,
    ticket: TicketRef,
    client: Arc<ServiceDeskClient>,
    directory: Arc<dyn IdentityResolver>,
}

#[async_trait]
impl CallbackReceiverProcess for TicketFeedbackProcess {
    async fn process(
        &self,
        update: &Update,
        cx: &mut CallbackContext<'_>,
    ) -> Result<CallbackReceiveResult> {
        let query = update
            .callback()
            .ok_or_else(|| Error::message("ticket feedback starts from a callback query"))?;
        let action: CallbackAction = query.data.parse()?;
        self.run(action, update, cx).await
    }
}

impl TicketFeedbackProcess {
    async fn run(
        &self,
        action: CallbackAction,
        update: &Update,
        cx: &mut CallbackContext<'_>,
    ) -> Result<CallbackReceiveResult> {
        match action {
            CallbackAction::A
            | CallbackAction::B
            | CallbackAction::C
            | CallbackAction::D
            | CallbackAction::E => {
                let rating = action
                    .rating()
                    .ok_or_else(|| Error::message("rating action without a rating value"))?;
                self.submit_rating(rating, cx).await
            },
            CallbackAction::ReopenIssue | CallbackAction::AdditionalInfo => {
                self.two_step(action, update, cx).await
            },
        }
    }

    async fn submit_rating(
        &self,
        rating: u8,
        cx: &mut CallbackContext<'_>,
    ) -> Result<CallbackReceiveResult> {
        self.client
            .submit_rating(
                &self.config.base_url,
                &self.ticket.issue,
                &self.ticket.token,
                rating,
            )
            .await?;
        cx.channel
            .send_message(
                &format!(
                    "Thanks! I rated the handling of your request \"{}\".",
                    rating_label(rating)
                ),
                false,
            )
            .await?;
        Ok(CallbackReceiveResult::RemoveButtons)
    }

    /// First leg: prompt for free text and park a redirection. Second leg:
    /// post the comment, then for reopen apply the transition as well.
    async fn two_step(
        &self,
        action: CallbackAction,
        update: &Update,
        cx: &mut CallbackContext<'_>,
    ) -> Result<CallbackReceiveResult> {
        match &update.kind {
            UpdateKind::CallbackQuery(query) => {
                let prompt = match action {
                    CallbackAction::ReopenIssue => REOPEN_PROMPT,
                    _ => ADDITIONAL_INFO_PROMPT,
                };
                self.await_reply(query, cx, action, prompt).await
            },
            UpdateKind::Message(message) => {
                self.append_comment(update, &message.text).await?;
                if action == CallbackAction::ReopenIssue {
                    self.client
                        .reopen(&self.config.base_url, &self.ticket.issue)
                        .await?;
                    cx.channel
                        .send_message("Got it, I reopened your service desk request!", false)
                        .await?;
                } else {
                    cx.channel
                        .send_message("Thanks, I attached your comment to the request!", false)
                        .await?;
                }
                Ok(CallbackReceiveResult::RemoveButtons)
            },
        }
    }

    async fn await_reply(
        &self,
        query: &CallbackQuery,
        cx: &mut CallbackContext<'_>,
        action: CallbackAction,
        prompt: &str,
    ) -> Result<CallbackReceiveResult> {
        let prompt_handle = cx.channel.send_message(prompt, true).await?;
        cx.redirections.register(Redirection::new(
            prompt_handle,
            query.token.clone(),
            query.message,
            Box::new(PendingReply {
                process: self.clone(),
                action,
            }),
        ))?;
        Ok(CallbackReceiveResult::None)
    }

    async fn append_comment(&self, update: &Update, text: &str) -> Result<()> {
        let identity = self
            .directory
            .resolve(update.from)
            .await?
            .ok_or_else(|| {
                Error::message(format!("no directory identity for sender {}", update.from))
            })?;
        self.client
            .add_comment(
                &self.config.base_url,
                &self.ticket.issue,
                &identity.account,
                text,
            )
            .await
    }
}

/// The parked second half of a two-step action.
struct PendingReply {
    process: TicketFeedbackProcess,
    action: CallbackAction,
}

#[async_trait]
impl Continuation for PendingReply {
    async fn resume(
        &self,
        update: &Update,
        cx: &mut CallbackContext<'_>,
    ) -> Result<CallbackReceiveResult> {
        self.process.run(self.action, update, cx).await
    }
}

/// Registration-boundary factory binding opaque push payloads to
/// [`TicketFeedbackProcess`] instances.
pub struct TicketFeedbackFactory {
    client: Arc<ServiceDeskClient>,
    directory: Arc<dyn IdentityResolver>,
}

impl TicketFeedbackFactory {
    pub fn new(client: Arc<ServiceDeskClient>, directory: Arc<dyn IdentityResolver>) -> Self {
        Self { client, directory }
    }
}

impl CallbackReceiverProcessFactory for TicketFeedbackFactory {
    fn id(&self) -> &'static str {
        "ticket-feedback"
    }

    fn parse_configuration(&self, bytes: &[u8]) -> Result<OpaqueValue> {
        let config: TicketFeedbackConfig = serde_json::from_slice(bytes)
            .map_err(|e| Error::parse(format!("ticket feedback configuration: {e}")))?;
        Ok(Box::new(config))
    }

    fn parse_data(&self, bytes: &[u8]) -> Result<OpaqueValue> {
        Ok(Box::new(TicketRef::parse(bytes)?))
    }

    fn create_process(
        &self,
        configuration: OpaqueValue,
        payload: OpaqueValue,
    ) -> Result<Arc<dyn CallbackReceiverProcess>> {
        let config = configuration
            .downcast::<TicketFeedbackConfig>()
            .map_err(|_| Error::parse("configuration is not a ticket feedback configuration"))?;
        let ticket = payload
            .downcast::<TicketRef>()
            .map_err(|_| Error::parse("payload is not a ticket reference"))?;
        Ok(Arc::new(TicketFeedbackProcess {
            config: *config,
            ticket: *ticket,
            client: Arc::clone(&self.client),
            directory: Arc::clone(&self.directory),
        }))
    }
}

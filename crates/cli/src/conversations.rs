//! The two conversation kinds, selected by sender role.
//!
//! Deliberately small: the conversational surface greets, explains what the
//! bot does, and acknowledges free text. Everything transactional (feedback
//! ratings, reopen, comments) arrives through pushed inline controls and is
//! handled by the callback receivers, not here.

use async_trait::async_trait;

use {
    deskbot_channels::{
        ChatChannel, Conversation, ConversationFactory, Identity, SenderRole,
        error::Result as ChannelResult,
    },
    deskbot_common::{ChatId, Update},
};

const EMPLOYEE_HELP: &str = "I keep you posted on your service desk requests. \
When a request is resolved you will get a message with rating buttons here; \
you can also reopen a request or attach additional information from that message.";

const CONTRACTOR_NOTICE: &str = "Your access is limited to service desk notifications. \
Please contact your coordinator for anything else.";

enum Step {
    Greeting,
    Ready,
}

/// Conversation for directory employees.
pub struct EmployeeConversation {
    step: Step,
}

impl EmployeeConversation {
    fn new() -> Self {
        Self {
            step: Step::Greeting,
        }
    }
}

#[async_trait]
impl Conversation for EmployeeConversation {
    fn kind(&self) -> &'static str {
        "employee"
    }

    async fn advance(
        &mut self,
        update: &Update,
        identity: &Identity,
        channel: &dyn ChatChannel,
    ) -> ChannelResult<()> {
        match self.step {
            Step::Greeting => {
                channel
                    .send_message(
                        &format!(
                            "Hello, {}! {}",
                            identity.display_name, EMPLOYEE_HELP
                        ),
                        false,
                    )
                    .await?;
                self.step = Step::Ready;
                Ok(())
            },
            Step::Ready => {
                let reply = match update.text() {
                    Some("/help") => EMPLOYEE_HELP,
                    _ => "Noted. I will ping you here as soon as there is news on your requests.",
                };
                channel.send_message(reply, false).await?;
                Ok(())
            },
        }
    }
}

/// Conversation for external contractors: notifications only.
pub struct ContractorConversation;

#[async_trait]
impl Conversation for ContractorConversation {
    fn kind(&self) -> &'static str {
        "contractor"
    }

    async fn advance(
        &mut self,
        _update: &Update,
        _identity: &Identity,
        channel: &dyn ChatChannel,
    ) -> ChannelResult<()> {
        channel.send_message(CONTRACTOR_NOTICE, false).await?;
        Ok(())
    }
}

/// Picks the conversation kind from the sender's directory role.
pub struct RoleConversationFactory;

impl ConversationFactory for RoleConversationFactory {
    fn create(&self, _chat: ChatId, identity: &Identity) -> Box<dyn Conversation> {
        match identity.role {
            SenderRole::Employee => Box::new(EmployeeConversation::new()),
            SenderRole::Contractor => Box::new(ContractorConversation),
        }
    }
}

//! Out-of-band push dispatch.
//!
//! Push sources (webhook receivers, datastore pollers, third-party HTTP
//! pushes) hand over a chat, a message with inline controls, and the opaque
//! receiver payload. The dispatcher validates the payload against the named
//! factory, sends the message, and records the binding so the callback
//! router can route later control taps back to the receiver.

use std::sync::Arc;

use tracing::info;

use {
    deskbot_channels::{ChatChannelFactory, InlineButton},
    deskbot_common::{ChatId, MessageHandle},
    deskbot_pipeline::{ChatContextRegistry, Error, PushBinding, ReceiverRegistry, Result},
};

pub struct PushDispatcher {
    registry: Arc<ChatContextRegistry>,
    channels: Arc<dyn ChatChannelFactory>,
    receivers: Arc<ReceiverRegistry>,
}

impl PushDispatcher {
    pub fn new(
        registry: Arc<ChatContextRegistry>,
        channels: Arc<dyn ChatChannelFactory>,
        receivers: Arc<ReceiverRegistry>,
    ) -> Self {
        Self {
            registry,
            channels,
            receivers,
        }
    }

    /// Deliver one pushed message and bind its controls to `receiver`.
    ///
    /// Malformed configuration or data is rejected here, before anything is
    /// sent. Runs outside any in-flight pipeline invocation, so taking the
    /// chat's lane to record the binding is safe.
    pub async fn deliver(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[InlineButton],
        receiver: &str,
        configuration: &[u8],
        data: &[u8],
    ) -> Result<MessageHandle> {
        let factory = self
            .receivers
            .get(receiver)
            .ok_or_else(|| Error::UnknownReceiver {
                id: receiver.into(),
            })?;
        factory.parse_configuration(configuration)?;
        factory.parse_data(data)?;

        let channel = self.channels.channel_for(chat);
        let handle = channel.send_with_buttons(text, buttons).await?;

        let context = self.registry.get_or_create(chat);
        context.touch();
        let mut state = context.lane.lock().await;
        state.bindings.insert(
            handle,
            PushBinding::new(receiver, configuration.to_vec(), data.to_vec()),
        );
        info!(%chat, %handle, receiver, "pushed message with inline controls");
        Ok(handle)
    }
}

//! Inline callback receiver contracts.
//!
//! Out-of-band push sources deliver opaque `(configuration, data)` pairs
//! together with a receiver id. When a pushed message's inline control is
//! tapped, the callback router looks up the factory registered under that id,
//! parses both blobs, and runs the resulting process under the chat's lane.

use std::{
    any::Any,
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;

use deskbot_common::{CallbackReceiveResult, ChatId, Update};

use {
    crate::{correlator::RedirectionTable, error::Result},
    deskbot_channels::ChatChannel,
};

/// Opaque parse output handed from `parse_*` to `create_process`.
pub type OpaqueValue = Box<dyn Any + Send + Sync>;

/// Invocation context for a receiver process or a resumed continuation.
///
/// Grants access to the chat's redirection table (already exclusively held
/// via the lane) and the chat's outbound channel. Receivers must use this
/// instead of reaching back into the registry: re-locking the chat's lane
/// from inside an in-flight update deadlocks.
pub struct CallbackContext<'a> {
    pub chat: ChatId,
    pub channel: Arc<dyn ChatChannel>,
    pub redirections: &'a mut RedirectionTable,
}

/// A small per-action state machine consuming one inbound update.
///
/// Stateless between invocations except through redirections it registers.
#[async_trait]
pub trait CallbackReceiverProcess: Send + Sync {
    async fn process(
        &self,
        update: &Update,
        cx: &mut CallbackContext<'_>,
    ) -> Result<CallbackReceiveResult>;
}

/// Builds receiver processes from opaque push payloads.
pub trait CallbackReceiverProcessFactory: Send + Sync {
    /// Registry key, e.g. "ticket-feedback".
    fn id(&self) -> &'static str;

    /// Parse configuration bytes; fails with a parse error on malformed
    /// input and nothing else happens.
    fn parse_configuration(&self, bytes: &[u8]) -> Result<OpaqueValue>;

    /// Parse the data blob into the factory's payload representation.
    fn parse_data(&self, bytes: &[u8]) -> Result<OpaqueValue>;

    /// Bind parsed configuration and payload into a ready process.
    fn create_process(
        &self,
        configuration: OpaqueValue,
        payload: OpaqueValue,
    ) -> Result<Arc<dyn CallbackReceiverProcess>>;
}

/// Registry of receiver factories, keyed by factory id.
#[derive(Default)]
pub struct ReceiverRegistry {
    factories: HashMap<&'static str, Arc<dyn CallbackReceiverProcessFactory>>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn CallbackReceiverProcessFactory>) {
        self.factories.insert(factory.id(), factory);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn CallbackReceiverProcessFactory>> {
        self.factories.get(id).map(Arc::clone)
    }

    pub fn list(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

/// Receiver binding recorded for one pushed message with inline controls.
#[derive(Clone)]
pub struct PushBinding {
    /// Factory id in the [`ReceiverRegistry`].
    pub receiver: String,
    pub configuration: Vec<u8>,
    pub data: Vec<u8>,
    pub created_at: Instant,
}

impl PushBinding {
    pub fn new(
        receiver: impl Into<String>,
        configuration: impl Into<Vec<u8>>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            receiver: receiver.into(),
            configuration: configuration.into(),
            data: data.into(),
            created_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    struct EchoProcess;

    #[async_trait]
    impl CallbackReceiverProcess for EchoProcess {
        async fn process(
            &self,
            _update: &Update,
            _cx: &mut CallbackContext<'_>,
        ) -> Result<CallbackReceiveResult> {
            Ok(CallbackReceiveResult::RemoveButtons)
        }
    }

    struct EchoFactory;

    impl CallbackReceiverProcessFactory for EchoFactory {
        fn id(&self) -> &'static str {
            "echo"
        }

        fn parse_configuration(&self, bytes: &[u8]) -> Result<OpaqueValue> {
            let text = std::str::from_utf8(bytes).map_err(|e| Error::parse(e.to_string()))?;
            Ok(Box::new(text.to_string()))
        }

        fn parse_data(&self, bytes: &[u8]) -> Result<OpaqueValue> {
            Ok(Box::new(bytes.to_vec()))
        }

        fn create_process(
            &self,
            _configuration: OpaqueValue,
            _payload: OpaqueValue,
        ) -> Result<Arc<dyn CallbackReceiverProcess>> {
            Ok(Arc::new(EchoProcess))
        }
    }

    #[test]
    fn registry_lookup_by_id() {
        let mut registry = ReceiverRegistry::new();
        registry.register(Arc::new(EchoFactory));

        assert!(registry.get("echo").is_some());
        assert!(registry.get("ghost").is_none());
        assert_eq!(registry.list(), vec!["echo"]);
    }

    #[test]
    fn malformed_configuration_is_a_parse_error() {
        let factory = EchoFactory;
        let err = factory.parse_configuration(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}

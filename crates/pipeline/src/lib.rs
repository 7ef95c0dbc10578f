//! The update-processing core: per-chat serialized pipeline, duplicate
//! suppression, and asynchronous callback correlation.
//!
//! An inbound [`Update`](deskbot_common::Update) enters through
//! [`UpdatePipeline::handle`](stages::UpdatePipeline::handle), which acquires
//! the chat's exclusive lane and runs the stage chain. Any stage may
//! short-circuit with an [`Outcome`](stages::Outcome); unrelated chats are
//! processed fully concurrently.

pub mod context;
pub mod correlator;
pub mod error;
pub mod receiver;
pub mod stages;

pub use {
    context::{ChatContext, ChatContextRegistry, ChatState, SweepStats},
    correlator::{Continuation, Redirection, RedirectionTable},
    error::{Error, Result},
    receiver::{
        CallbackContext, CallbackReceiverProcess, CallbackReceiverProcessFactory, PushBinding,
        ReceiverRegistry,
    },
    stages::{
        Authenticator, CallbackRouter, ConversationDispatcher, Outcome, PipelineBuilder,
        SequenceDeduplicator, StageContext, Tracer, TypingIndicator, UpdatePipeline, UpdateStage,
    },
};

//! Inline callback receivers and the push dispatch surface.
//!
//! The representative receiver family integrates with a Jira-style service
//! desk: rating capture on pushed feedback messages, reopen-with-comment,
//! and add-comment — the latter two spanning two physically separate updates
//! bridged through the redirection correlator.

pub mod push;
pub mod servicedesk;
pub mod ticket_feedback;

pub use {
    push::PushDispatcher,
    servicedesk::{ServiceDeskClient, ServiceDeskConfig},
    ticket_feedback::{CallbackAction, TicketFeedbackConfig, TicketFeedbackFactory},
};

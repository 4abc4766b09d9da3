//! Persisted collaborative workflow.
//!
//! [`WorkflowService`] runs the in-memory [`rfpdesk_core::CollaborativeDocument`]
//! operations against a [`rfpdesk_core::ProjectStore`], then fans the results
//! out as bus events and user notifications.

pub mod notifications;
pub mod service;

pub use service::{Committed, WorkflowService};

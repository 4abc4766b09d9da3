//! Event bus and notification fan-out for collaborative projects.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope broadcast after every
//!   committed project write.
//! - [`BusNotifier`]: a [`Notifier`](rfpdesk_core::Notifier) that delivers
//!   notifications as events on the bus.

pub mod bus;
pub mod notifier;

pub use bus::{event_types, EventBus, PlatformEvent};
pub use notifier::BusNotifier;

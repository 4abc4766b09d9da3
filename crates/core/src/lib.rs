//! Domain core for collaborative RFP answering.
//!
//! Pure, I/O-free building blocks: the project document model, advisory
//! question locks, answer history, the review state machine, assignment
//! planning, presence, and the [`document::CollaborativeDocument`]
//! orchestrator that composes them. Collaborator contracts (persistence,
//! notification, answer generation) live in [`collaborators`].

pub mod assignment;
pub mod collaborators;
pub mod document;
pub mod error;
pub mod locking;
pub mod memory_store;
pub mod model;
pub mod presence;
pub mod roles;
pub mod stats;
pub mod sync;
pub mod types;
pub mod versioning;
pub mod workflow;

pub use collaborators::{
    AnswerGenerator, GeneratedAnswer, Notification, Notifier, ProjectStore, StoredProject,
};
pub use document::CollaborativeDocument;
pub use error::CoreError;
pub use memory_store::InMemoryProjectStore;
pub use model::{Project, Question, ReviewState, Section};
pub use roles::{Actor, Role};

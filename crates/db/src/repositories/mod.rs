//! Zero-sized repository structs, one per table. Every method takes the pool
//! explicitly and returns `sqlx::Error`.

pub mod notification_repo;
pub mod presence_repo;
pub mod project_repo;

pub use notification_repo::NotificationRepo;
pub use presence_repo::PresenceRepo;
pub use project_repo::ProjectRepo;

/// Section, question and version ids are UUIDv7, assigned at creation.
pub type EntityId = uuid::Uuid;

/// Users are identified by the external identity provider's uid.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Monotonic per-project write counter used for compare-and-swap saves.
pub type Revision = i64;

/// Generate a fresh, time-ordered entity id.
pub fn new_id() -> EntityId {
    uuid::Uuid::now_v7()
}

//! Database-side failures and their mapping onto `CoreError`.

use rfpdesk_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Malformed project document: {0}")]
    Document(#[from] serde_json::Error),
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(e) => CoreError::Persistence(e.to_string()),
            DbError::Document(e) => CoreError::Internal(format!("Malformed project document: {e}")),
        }
    }
}

/// Shorthand for mapping repository errors at the trait boundary.
pub(crate) fn persistence(err: sqlx::Error) -> CoreError {
    DbError::from(err).into()
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("db error: {0}")]
    Internal(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("schema mismatch: {0}")]
    Schema(String),
}

use crate::db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error")]
    Fetch(#[from] FetchError),

    #[error("database error")]
    Db(#[from] DbError),

    #[error("parse error")]
    Parse(#[from] ParseError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("archive i/o error")]
    Archive(#[from] std::io::Error),

    #[error("listing page at offset {offset} yielded no entries; probable interstitial")]
    EmptyListing { offset: u32 },
}

/// Errors raised by the transport layer.
///
/// The distinction that matters to callers is batch-fatal vs item-fatal:
/// a missing page condemns one work item, everything else condemns the
/// whole batch (items stay pending and the next invocation retries cleanly).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("anti-bot challenge served for {url}")]
    ChallengeServed { url: String },

    #[error("page not found: {url}")]
    PageMissing { url: String },

    #[error("rendered content below threshold for {url} ({len} chars)")]
    ContentTooShort { url: String, len: usize },

    #[error("browser transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("transport failed for {url}: {reason}")]
    TransportFailed { url: String, reason: String },
}

impl FetchError {
    /// Item-fatal errors mark one work item failed and let the batch
    /// continue; everything else discards the batch.
    pub fn is_item_fatal(&self) -> bool {
        matches!(self, Self::PageMissing { .. })
    }

    /// Taxonomy kind for structured error lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChallengeServed { .. } => "ChallengeServed",
            Self::PageMissing { .. } => "PageMissing",
            Self::ContentTooShort { .. } => "ContentTooShort",
            Self::TransportUnavailable(_) => "TransportUnavailable",
            Self::TransportFailed { .. } => "TransportFailed",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::ChallengeServed { url }
            | Self::PageMissing { url }
            | Self::ContentTooShort { url, .. }
            | Self::TransportFailed { url, .. } => Some(url),
            Self::TransportUnavailable(_) => None,
        }
    }
}

/// A page whose structure does not match the parser contract.
/// Never retried; the orchestrator quarantines and moves on.
#[derive(Debug, Error)]
#[error("failed to parse {page}: {reason}")]
pub struct ParseError {
    pub page: &'static str,
    pub reason: String,
}

impl ParseError {
    pub fn new(page: &'static str, reason: impl Into<String>) -> Self {
        Self {
            page,
            reason: reason.into(),
        }
    }
}

/// A structurally-parsed record that fails a model constraint.
#[derive(Debug, Error)]
#[error("invalid {entity}: {reason}")]
pub struct ValidationError {
    pub entity: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(entity: &'static str, reason: impl Into<String>) -> Self {
        Self {
            entity,
            reason: reason.into(),
        }
    }
}

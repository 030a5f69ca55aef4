use crate::catalogue::DistributorCode;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingErrorKind {
    /// The page could not be fetched (network failure, timeout).
    Fetch,
    /// The distributor answered with a non-success status.
    Http(u16),
    /// The document was fetched but could not be interpreted.
    Parse,
    /// The adapter itself is misconfigured (bad selector, bad URL).
    Config,
}

impl fmt::Display for ListingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch failed"),
            Self::Http(status) => write!(f, "HTTP {}", status),
            Self::Parse => f.write_str("parse failed"),
            Self::Config => f.write_str("invalid configuration"),
        }
    }
}

/// Error raised by any distributor listing adapter.
#[derive(Debug, Clone, Error)]
#[error("[{distributor}] {kind}: {message}")]
pub struct ListingError {
    pub distributor: DistributorCode,
    pub kind: ListingErrorKind,
    pub message: String,
    /// Whether the scheduler may retry the run later with a chance of success.
    pub retryable: bool,
}

impl ListingError {
    pub fn fetch(distributor: DistributorCode, message: impl Into<String>) -> Self {
        Self {
            distributor,
            kind: ListingErrorKind::Fetch,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn http(distributor: DistributorCode, status: u16, message: impl Into<String>) -> Self {
        Self {
            distributor,
            kind: ListingErrorKind::Http(status),
            message: message.into(),
            retryable: status == 429 || status >= 500,
        }
    }

    pub fn parse(distributor: DistributorCode, message: impl Into<String>) -> Self {
        Self {
            distributor,
            kind: ListingErrorKind::Parse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn config(distributor: DistributorCode, message: impl Into<String>) -> Self {
        Self {
            distributor,
            kind: ListingErrorKind::Config,
            message: message.into(),
            retryable: false,
        }
    }
}

use serde::{Deserialize, Serialize};

/// Error taxonomy shared by every store-facing operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid page: {0}")]
    InvalidPage(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("unknown scan: {0}")]
    UnknownScan(String),
    #[error("bulk delete aborted, missing markers {missing:?}")]
    BulkDelete { missing: Vec<u64> },
}

/// Copyable discriminant so callers can decide between retrying and surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateKey,
    NotFound,
    InvalidPage,
    InvalidFilter,
    InvalidRecord,
    StoreUnavailable,
    UnknownScan,
    BulkDelete,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::DuplicateKey(_) => ErrorKind::DuplicateKey,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidPage(_) => ErrorKind::InvalidPage,
            CoreError::InvalidFilter(_) => ErrorKind::InvalidFilter,
            CoreError::InvalidRecord(_) => ErrorKind::InvalidRecord,
            CoreError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            CoreError::UnknownScan(_) => ErrorKind::UnknownScan,
            CoreError::BulkDelete { .. } => ErrorKind::BulkDelete,
        }
    }

    /// Only backing-store outages are worth retrying; everything else is a
    /// property of the request or the data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::StoreUnavailable(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_outages_are_retryable() {
        assert!(CoreError::StoreUnavailable("timeout".into()).is_retryable());
        assert!(!CoreError::NotFound("scan".into()).is_retryable());
        assert!(!CoreError::BulkDelete { missing: vec![3] }.is_retryable());
    }

    #[test]
    fn io_errors_surface_as_store_unavailable() {
        let err: CoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }
}

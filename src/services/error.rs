use crate::storage::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("failed to provision `{path}`: {reason}")]
    ProvisioningFailed { path: String, reason: String },
    #[error("`{0}` not found")]
    NotFound(String),
    #[error("`{0}` was taken by a concurrent writer")]
    NameConflict(String),
    #[error(transparent)]
    Metadata(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl StoreError {
    /// Mapping for backend failures while placing an object at `target`.
    ///
    /// `NotFound` is reserved for retrieval: a share or directory that
    /// disappears under an upload is a storage failure, not a missing document.
    pub fn from_placement(target: &str, err: BackendError) -> Self {
        match err {
            BackendError::AlreadyExists(_) => StoreError::NameConflict(target.to_string()),
            BackendError::NotFound(what) => {
                StoreError::StorageUnavailable(format!("`{}` vanished during placement", what))
            }
            BackendError::InvalidPath(path) => StoreError::ProvisioningFailed {
                path: target.to_string(),
                reason: format!("invalid storage path `{}`", path),
            },
            BackendError::Unavailable(msg) => StoreError::StorageUnavailable(msg),
            BackendError::Io(err) => StoreError::StorageUnavailable(err.to_string()),
        }
    }
}

/// Default mapping for backend failures outside provisioning and writing.
impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(what) => StoreError::NotFound(what),
            BackendError::AlreadyExists(what) => StoreError::NameConflict(what),
            BackendError::InvalidPath(path) => {
                StoreError::InvalidArgument(format!("invalid storage path `{}`", path))
            }
            BackendError::Unavailable(msg) => StoreError::StorageUnavailable(msg),
            BackendError::Io(err) => StoreError::StorageUnavailable(err.to_string()),
        }
    }
}

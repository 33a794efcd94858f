//! Error taxonomy for the filesystem layer.
//!
//! Local validation failures (`InvalidPath`) never reach the store. Kind
//! mismatches and collisions are detected against current store state at
//! call time. Unrecoverable backend failures surface as `Store`.

use thiserror::Error;

use crate::store::client::BoxError;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("resource not found: '{0}'")]
    ResourceNotFound(String),

    #[error("path '{0}' is a directory, expected a file")]
    FileExpected(String),

    #[error("path '{0}' is a file, expected a directory")]
    DirectoryExpected(String),

    #[error("a file already exists at '{0}'")]
    FileExists(String),

    #[error("a directory already exists at '{0}'")]
    DirectoryExists(String),

    #[error("destination '{0}' already exists")]
    DestinationExists(String),

    #[error("directory '{0}' is not empty")]
    DirectoryNotEmpty(String),

    #[error("root path '{0}' does not exist")]
    CreateFailed(String),

    #[error("object store error: {0}")]
    Store(#[from] BoxError),
}

pub type Result<T> = std::result::Result<T, FsError>;

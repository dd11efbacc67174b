use std::path::PathBuf;

use thiserror::Error;

use crate::object::{Id, ParseIdError};

/// Describes the potential error conditions that might arise from store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The object is neither a loose object nor present in any pack.
    #[error("object {0} not found")]
    ObjectNotFound(Id),

    /// A loose or packed object could not be decoded.
    #[error("corrupt object: {0}")]
    CorruptObject(String),

    #[error("corrupt pack {}: {reason}", .path.display())]
    CorruptPack { path: PathBuf, reason: String },

    /// The path does not contain a git object database.
    #[error("{} is not a git repository", .0.display())]
    InvalidRepository(PathBuf),

    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A write went through a path segment that names a blob.
    #[error("`{0}` is not a tree")]
    NotATree(String),

    #[error("invalid reference {}: {content:?}", .path.display())]
    InvalidReference { path: PathBuf, content: String },

    /// A value codec rejected the data stored at `path`.
    #[error("codec failed for `{path}`: {source}")]
    Codec {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    ParseId(#[from] ParseIdError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// A specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

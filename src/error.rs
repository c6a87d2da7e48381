//! Contains the `Error` and `Result` types that `mongodb_concern` uses.

use std::sync::Arc;

use thiserror::Error;

/// The result type for all methods that can return an error in the `mongodb_concern` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `mongodb_concern` crate. The inner [`ErrorKind`] is boxed so
/// that `Result`s stay small, and every source is held behind an `Arc` so the error can be
/// cloned.
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
#[non_exhaustive]
pub struct Error {
    /// The type of error that occurred.
    pub kind: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        ErrorKind::InvalidArgument {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn parse(key: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorKind::Parse {
            key: key.into(),
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ErrorKind::Validation {
            field,
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn unrecognized_field(field: impl Into<String>) -> Self {
        ErrorKind::UnrecognizedField {
            field: field.into(),
        }
        .into()
    }

    /// Whether this error was produced while reading a connection string option.
    pub fn is_parse_error(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Parse { .. })
    }

    /// Whether this error was produced by concern validation.
    pub fn is_validation_error(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Validation { .. })
    }

    /// Whether this error was produced by attempting to encode an invalid concern.
    pub fn is_empty_or_invalid_concern(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::EmptyOrInvalidConcern { .. })
    }

    /// Whether this error indicates that a document contained a field that isn't part of a
    /// concern.
    pub fn is_unrecognized_field(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::UnrecognizedField { .. })
    }

    /// Whether this error indicates that no GridFS file matched a lookup.
    pub fn is_file_not_found(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. })
        )
    }

    /// Converts this error into one usable from the `futures_io` traits, unwrapping it if it
    /// already came from an I/O source.
    pub(crate) fn into_futures_io_error(self) -> futures_io::Error {
        match *self.kind {
            ErrorKind::Io(ref io_err) => futures_io::Error::new(io_err.kind(), self),
            _ => futures_io::Error::other(self),
        }
    }
}

impl<E> From<E> for Error
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        Self::new(err.into())
    }
}

impl std::ops::Deref for Error {
    type Target = ErrorKind;

    fn deref(&self) -> &Self::Target {
        &self.kind
    }
}

/// The types of errors that can occur.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A connection string option owned by the concern subsystem had a malformed value. The
    /// whole connection string is rejected.
    #[error("Invalid connection string option `{key}`: {message}")]
    #[non_exhaustive]
    Parse { key: String, message: String },

    /// A concern was structurally contradictory.
    #[error("Invalid concern field `{field}`: {message}")]
    #[non_exhaustive]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Encoding was attempted on a concern that failed validation.
    #[error("Cannot encode an empty or invalid concern: {message}")]
    #[non_exhaustive]
    EmptyOrInvalidConcern { message: String },

    /// A concern document contained a field the model does not know.
    #[error("Unrecognized concern field `{field}`")]
    #[non_exhaustive]
    UnrecognizedField { field: String },

    /// An invalid argument was provided.
    #[error("An invalid argument was provided: {message}")]
    #[non_exhaustive]
    InvalidArgument { message: String },

    /// An error occurred when interacting with a GridFS bucket.
    #[error("A GridFS error occurred: {0:?}")]
    GridFs(GridFsErrorKind),

    /// Wrapper around `bson::ser::Error`.
    #[error("{0}")]
    BsonSerialization(Arc<crate::bson::ser::Error>),

    /// Wrapper around `bson::de::Error`.
    #[error("{0}")]
    BsonDeserialization(Arc<crate::bson::de::Error>),

    /// Wrapper around [`std::io::Error`].
    #[error("{0}")]
    Io(Arc<std::io::Error>),
}

impl From<crate::bson::ser::Error> for ErrorKind {
    fn from(err: crate::bson::ser::Error) -> Self {
        Self::BsonSerialization(Arc::new(err))
    }
}

impl From<crate::bson::de::Error> for ErrorKind {
    fn from(err: crate::bson::de::Error) -> Self {
        Self::BsonDeserialization(Arc::new(err))
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// An error that occurred during a GridFS operation.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum GridFsErrorKind {
    /// The file with the given identifier was not found.
    #[non_exhaustive]
    FileNotFound { identifier: GridFsFileIdentifier },

    /// The file with the given revision was not found.
    #[non_exhaustive]
    RevisionNotFound { revision: i32 },

    /// The chunk at index `n` was missing.
    #[non_exhaustive]
    MissingChunk { n: u32 },

    /// The chunk at index `n` was the incorrect size.
    #[non_exhaustive]
    WrongSizeChunk {
        actual_size: usize,
        expected_size: u32,
        n: u32,
    },

    /// An incorrect number of chunks was present for the file.
    #[non_exhaustive]
    WrongNumberOfChunks {
        actual_number: u32,
        expected_number: u32,
    },
}

/// An identifier for a file stored in a GridFS bucket.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum GridFsFileIdentifier {
    /// The name of the file. Not guaranteed to be unique.
    Filename(String),

    /// The file's unique `_id`.
    Id(crate::bson::Bson),

    /// The filter that was used to look the file up.
    Filter(crate::bson::Document),
}

//! The stable error taxonomy returned by every fallible operation on a
//! [`crate::ConfigArray`]. The core never retries and never wraps these in a
//! generic "something went wrong" variant — callers match on the kind.

use thiserror::Error;

/// Errors produced while building, normalizing, or querying a
/// [`crate::ConfigArray`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A query (`get_config`, `is_file_ignored`, ...) was called before
    /// `normalize`/`normalize_sync` completed.
    #[error("config array has not been normalized yet")]
    NotNormalized,

    /// `push` was called after normalization.
    #[error("cannot push a new entry into a normalized config array")]
    NotExtensible,

    /// An array was encountered in the config tree but
    /// `ExtraConfigTypes::array` was not enabled.
    #[error("unexpected array in config; enable ExtraConfigTypes::array to allow nested lists")]
    UnexpectedArray,

    /// A factory callable was encountered but `ExtraConfigTypes::function`
    /// was not enabled.
    #[error(
        "unexpected function in config; enable ExtraConfigTypes::function to allow factories"
    )]
    UnexpectedFunction,

    /// A factory returned another factory directly (not wrapped in a list).
    #[error("a config factory returned another factory, which is not allowed")]
    InvalidReturn,

    /// A factory returned a deferred value while normalizing synchronously.
    #[error("a config factory returned a deferred value, but normalize_sync cannot await it")]
    AsyncNotSupported,

    /// Schema validation rejected an entry's value for `key`.
    #[error("Key \"{key}\": {message}")]
    Validation {
        /// The offending key name.
        key: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// An entry's `files` was present but empty, discovered lazily while
    /// evaluating that entry against a path.
    #[error("entry has an empty `files` array; a files entry must name at least one pattern")]
    InvalidFiles,
}

impl Error {
    /// Build a [`Error::Validation`] for `key`.
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            key: key.into(),
            message: message.into(),
        }
    }
}

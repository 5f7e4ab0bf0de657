//! `configarray`: a per-file effective configuration resolver over an
//! ordered list of glob-matched config entries.
//!
//! A [`ConfigArray`] is built up with [`ConfigArray::push`] (plain
//! entries, nested lists, or factory callables), then frozen with
//! [`ConfigArray::normalize`] or [`ConfigArray::normalize_sync`]. Once
//! frozen, [`ConfigArray::get_config`] resolves the effective,
//! schema-merged configuration for any file path under its base path, and
//! [`ConfigArray::is_file_ignored`]/[`ConfigArray::is_directory_ignored`]
//! answer the separate global-ignore question.

mod entry;
mod error;
mod matcher;
mod normalize;
mod pattern;
mod resolver;
mod schema;

pub use entry::{
    BoxFuture, ConfigEntry, ConfigItem, FactoryFn, FactoryOutcome, FilesPatternInput, PatternInput,
    RawEntry,
};
pub use error::Error;
pub use matcher::{is_explicit_match, PathKind};
pub use normalize::{ExtraConfigTypes, FinalizeHook, HookContext, PreprocessHook};
pub use pattern::{FilesPattern, GlobPattern, PatternAtom, PredicateFn};
pub use resolver::{ConfigArray, ConfigArrayOptions, MergedConfig};
pub use schema::{Schema, Strategy};

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

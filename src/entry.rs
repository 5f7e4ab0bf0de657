//! The config entry data model: the pre-normalize dynamic tree
//! ([`ConfigItem`]) and the flat, typed entries ([`ConfigEntry`]) that
//! result from normalizing it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::pattern::{FilesPattern, PatternAtom, PredicateFn};

/// A boxed, `Send` future — the shape a factory returns when it defers to
/// an async computation (only awaited by [`crate::ConfigArray::normalize`]).
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A single element of a `files` list before it has been compiled: either a
/// bare string/predicate, or an AND-sequence of those.
pub enum FilesPatternInput {
    Single(PatternInput),
    And(Vec<PatternInput>),
}

/// A single pattern element before compilation.
pub enum PatternInput {
    Glob(String),
    Predicate(PredicateFn),
}

impl PatternInput {
    pub fn glob(s: impl Into<String>) -> Self {
        PatternInput::Glob(s.into())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&std::path::Path) -> bool + Send + Sync + 'static,
    {
        PatternInput::Predicate(Arc::new(f))
    }
}

impl FilesPatternInput {
    pub fn single(p: PatternInput) -> Self {
        FilesPatternInput::Single(p)
    }

    pub fn and(parts: impl IntoIterator<Item = PatternInput>) -> Self {
        FilesPatternInput::And(parts.into_iter().collect())
    }
}

/// A raw config entry as supplied by a caller, before pattern compilation
/// and schema validation.
#[derive(Default)]
pub struct RawEntry {
    pub name: Option<String>,
    pub files: Option<Vec<FilesPatternInput>>,
    pub ignores: Option<Vec<PatternInput>>,
    pub extra: HashMap<String, Value>,
}

impl RawEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_files(mut self, files: Vec<FilesPatternInput>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_ignores(mut self, ignores: Vec<PatternInput>) -> Self {
        self.ignores = Some(ignores);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// The outcome of invoking a factory callable with its context.
pub enum FactoryOutcome {
    /// The factory resolved immediately to another config item.
    Value(Box<ConfigItem>),
    /// The factory deferred; only `normalize` (the async path) can await
    /// this. `normalize_sync` fails with `AsyncNotSupported`.
    Deferred(BoxFuture<ConfigItem>),
}

/// A factory callable: invoked with the caller-supplied context, returns a
/// (possibly deferred) config item.
pub type FactoryFn = Arc<dyn Fn(&Value) -> FactoryOutcome + Send + Sync>;

/// The dynamic shape a config list element may take before normalization:
/// a plain entry, a nested list, or a factory callable.
pub enum ConfigItem {
    Entry(RawEntry),
    List(Vec<ConfigItem>),
    Factory(FactoryFn),
}

impl ConfigItem {
    pub fn entry(entry: RawEntry) -> Self {
        ConfigItem::Entry(entry)
    }

    pub fn list(items: impl IntoIterator<Item = ConfigItem>) -> Self {
        ConfigItem::List(items.into_iter().collect())
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Value) -> FactoryOutcome + Send + Sync + 'static,
    {
        ConfigItem::Factory(Arc::new(f))
    }
}

/// A flattened, schema-validated, pattern-compiled config entry — what
/// `ConfigArray::entries` holds after normalization.
#[derive(Clone)]
pub struct ConfigEntry {
    pub name: Option<String>,
    pub files: Option<Vec<FilesPattern>>,
    pub ignores: Option<Vec<PatternAtom>>,
    pub extra: HashMap<String, Value>,
}

impl ConfigEntry {
    /// Has only `ignores` (no other keys, no `files`): contributes only to
    /// the global ignore algebra.
    pub fn is_global_ignore(&self) -> bool {
        self.files.is_none() && self.ignores.is_some() && self.name.is_none() && self.extra.is_empty()
    }

    /// Lacks `files` but has keys beyond `ignores`: matches any
    /// non-ignored file unconditionally.
    pub fn is_files_less(&self) -> bool {
        self.files.is_none() && (self.name.is_some() || !self.extra.is_empty())
    }

    /// Has `files`.
    pub fn is_ordinary(&self) -> bool {
        self.files.is_some()
    }
}

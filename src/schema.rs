//! Schema engine: a mapping from key name to a `{required, validate, merge}`
//! strategy. The base schema supplies strategies for `name`/`files`/
//! `ignores` (whose `merge` always drops the key from the resolved
//! config — see §4.2); callers extend it with strategies for their own
//! keys. A key with no strategy falls back to [`Strategy::default_key`]:
//! permissive validation, right-biased override on merge.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;

type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;
type MergeFn = Arc<dyn Fn(Option<&Value>, Option<&Value>) -> Option<Value> + Send + Sync>;

/// How a single config key validates and merges.
#[derive(Clone)]
pub struct Strategy {
    pub required: bool,
    validate: ValidateFn,
    merge: MergeFn,
}

impl Strategy {
    pub fn new<V, M>(required: bool, validate: V, merge: M) -> Self
    where
        V: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
        M: Fn(Option<&Value>, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        Strategy {
            required,
            validate: Arc::new(validate),
            merge: Arc::new(merge),
        }
    }

    /// Always valid; last value present wins (right-biased override).
    pub fn default_key() -> Self {
        Strategy::new(false, |_| Ok(()), |a, b| b.or(a).cloned())
    }

    /// Always valid; never propagated into the merged result. Used by the
    /// base `name`/`files`/`ignores` strategies.
    fn dropped() -> Self {
        Strategy::new(false, |_| Ok(()), |_, _| None)
    }

    pub fn validate(&self, value: &Value) -> Result<(), String> {
        (self.validate)(value)
    }

    pub fn merge(&self, a: Option<&Value>, b: Option<&Value>) -> Option<Value> {
        (self.merge)(a, b)
    }
}

/// The schema a [`crate::ConfigArray`] validates and merges entries
/// against: base strategies for `name`/`files`/`ignores`, plus whatever the
/// caller extends on top for its own keys.
#[derive(Clone)]
pub struct Schema {
    strategies: HashMap<String, Strategy>,
    deny_unknown_keys: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::base()
    }
}

impl Schema {
    /// The base schema: `name`, `files`, `ignores` only, unknown keys
    /// permitted (and merged with [`Strategy::default_key`]).
    pub fn base() -> Self {
        let mut strategies = HashMap::new();
        strategies.insert("name".to_string(), Strategy::dropped());
        strategies.insert("files".to_string(), Strategy::dropped());
        strategies.insert("ignores".to_string(), Strategy::dropped());
        Schema {
            strategies,
            deny_unknown_keys: false,
        }
    }

    /// Register (or replace) the strategy for `key`.
    pub fn with_strategy(mut self, key: impl Into<String>, strategy: Strategy) -> Self {
        self.strategies.insert(key.into(), strategy);
        self
    }

    /// Reject entries that declare a key with no registered strategy,
    /// instead of the default permissive pass-through.
    pub fn deny_unknown_keys(mut self) -> Self {
        self.deny_unknown_keys = true;
        self
    }

    fn strategy_for(&self, key: &str) -> Option<&Strategy> {
        self.strategies.get(key)
    }

    /// Validate every `extra` key of a raw entry against its strategy
    /// (or the default strategy, unless unknown keys are denied).
    pub fn validate_extra(&self, extra: &HashMap<String, Value>) -> Result<(), Error> {
        for (key, value) in extra {
            match self.strategy_for(key) {
                Some(strategy) => strategy
                    .validate(value)
                    .map_err(|message| Error::validation(key.clone(), message))?,
                None if self.deny_unknown_keys => {
                    return Err(Error::validation(key.clone(), "unknown key"));
                }
                None => {}
            }
        }
        for (key, strategy) in &self.strategies {
            if strategy.required
                && key != "name"
                && key != "files"
                && key != "ignores"
                && !extra.contains_key(key)
            {
                return Err(Error::validation(key.clone(), "required key is missing"));
            }
        }
        Ok(())
    }

    /// Fold `extra` maps from matched entries into one merged map,
    /// left-associative, starting from an empty map — §4.2.
    pub fn merge_extra(
        &self,
        entries: impl IntoIterator<Item = HashMap<String, Value>>,
    ) -> HashMap<String, Value> {
        let mut acc: HashMap<String, Value> = HashMap::new();
        for extra in entries {
            acc = self.merge_one(acc, extra);
        }
        acc
    }

    fn merge_one(
        &self,
        a: HashMap<String, Value>,
        b: HashMap<String, Value>,
    ) -> HashMap<String, Value> {
        let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
        keys.sort_unstable();
        keys.dedup();

        let mut result = HashMap::new();
        for key in keys {
            let av = a.get(key);
            let bv = b.get(key);
            let strategy = self.strategy_for(key);
            let merged = match strategy {
                Some(strategy) => strategy.merge(av, bv),
                None => Strategy::default_key().merge(av, bv),
            };
            if let Some(merged) = merged {
                result.insert(key.clone(), merged);
            }
        }
        result
    }
}

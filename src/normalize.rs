//! Normalizer: flattens the pre-normalize [`ConfigItem`] tree into a flat,
//! ordered `Vec<ConfigEntry>`, invoking factory callables with the
//! caller-supplied context and compiling/validating each resulting entry
//! against the schema.

use serde_json::Value;
use std::path::Path;

use crate::entry::{ConfigEntry, ConfigItem, FactoryOutcome, FilesPatternInput, PatternInput, RawEntry};
use crate::error::Error;
use crate::pattern::{FilesPattern, GlobPattern, PatternAtom};
use crate::schema::Schema;

/// Which non-plain-object shapes a config list may contain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraConfigTypes {
    pub array: bool,
    pub function: bool,
}

impl ExtraConfigTypes {
    pub fn all() -> Self {
        ExtraConfigTypes {
            array: true,
            function: true,
        }
    }
}

/// Read-only view handed to `preprocess_config`/`finalize_config` hooks in
/// place of a `this`-bound owning instance.
pub struct HookContext<'a> {
    pub base_path: &'a Path,
}

pub type PreprocessHook = std::sync::Arc<dyn Fn(RawEntry, &HookContext) -> RawEntry + Send + Sync>;

/// Runs once per resolved file, after the schema merge produces a
/// `HashMap<String, Value>`, letting a caller post-process the merged
/// config (e.g. resolve relative paths embedded in values) before it is
/// wrapped in an `Arc<MergedConfig>` and cached.
pub type FinalizeHook = std::sync::Arc<
    dyn Fn(std::collections::HashMap<String, Value>, &HookContext) -> std::collections::HashMap<String, Value>
        + Send
        + Sync,
>;

/// Flatten one [`ConfigItem`] (and its descendants) into `out`, invoking
/// factories synchronously. Fails with [`Error::AsyncNotSupported`] the
/// moment a factory defers.
pub fn flatten_sync(
    item: ConfigItem,
    context: &Value,
    extra_types: ExtraConfigTypes,
    base_path: &Path,
    preprocess: Option<&PreprocessHook>,
    out: &mut Vec<RawEntry>,
) -> Result<(), Error> {
    match item {
        ConfigItem::Entry(entry) => {
            let entry = apply_preprocess(entry, base_path, preprocess);
            out.push(entry);
            Ok(())
        }
        ConfigItem::List(items) => {
            if !extra_types.array {
                return Err(Error::UnexpectedArray);
            }
            for item in items {
                flatten_sync(item, context, extra_types, base_path, preprocess, out)?;
            }
            Ok(())
        }
        ConfigItem::Factory(factory) => {
            if !extra_types.function {
                return Err(Error::UnexpectedFunction);
            }
            match factory(context) {
                FactoryOutcome::Value(inner) => {
                    if matches!(*inner, ConfigItem::Factory(_)) {
                        return Err(Error::InvalidReturn);
                    }
                    flatten_sync(*inner, context, extra_types, base_path, preprocess, out)
                }
                FactoryOutcome::Deferred(_) => Err(Error::AsyncNotSupported),
            }
        }
    }
}

/// Like [`flatten_sync`], but awaits deferred factory results.
pub fn flatten_async<'a>(
    item: ConfigItem,
    context: &'a Value,
    extra_types: ExtraConfigTypes,
    base_path: &'a Path,
    preprocess: Option<&'a PreprocessHook>,
    out: &'a mut Vec<RawEntry>,
) -> crate::entry::BoxFuture<Result<(), Error>> {
    Box::pin(async move {
        match item {
            ConfigItem::Entry(entry) => {
                let entry = apply_preprocess(entry, base_path, preprocess);
                out.push(entry);
                Ok(())
            }
            ConfigItem::List(items) => {
                if !extra_types.array {
                    return Err(Error::UnexpectedArray);
                }
                for item in items {
                    flatten_async(item, context, extra_types, base_path, preprocess, out).await?;
                }
                Ok(())
            }
            ConfigItem::Factory(factory) => {
                if !extra_types.function {
                    return Err(Error::UnexpectedFunction);
                }
                match factory(context) {
                    FactoryOutcome::Value(inner) => {
                        if matches!(*inner, ConfigItem::Factory(_)) {
                            return Err(Error::InvalidReturn);
                        }
                        flatten_async(*inner, context, extra_types, base_path, preprocess, out).await
                    }
                    FactoryOutcome::Deferred(fut) => {
                        let resolved = fut.await;
                        flatten_async(resolved, context, extra_types, base_path, preprocess, out).await
                    }
                }
            }
        }
    })
}

fn apply_preprocess(
    entry: RawEntry,
    base_path: &Path,
    preprocess: Option<&PreprocessHook>,
) -> RawEntry {
    match preprocess {
        Some(hook) => hook(entry, &HookContext { base_path }),
        None => entry,
    }
}

/// Compile a raw entry's `files`/`ignores` and validate its `extra` keys
/// against `schema`, producing the typed [`ConfigEntry`] stored post
/// normalization. Pattern compile failures and schema validation failures
/// both surface as `Error::Validation`, prefixed with the offending key —
/// matching §4.3's "Key \"<name>\":" contract.
pub fn validate_and_compile(raw: RawEntry, schema: &Schema) -> Result<ConfigEntry, Error> {
    let files = match raw.files {
        Some(inputs) => Some(compile_files(inputs)?),
        None => None,
    };
    let ignores = match raw.ignores {
        Some(inputs) => Some(compile_ignores(inputs)?),
        None => None,
    };

    schema.validate_extra(&raw.extra)?;

    Ok(ConfigEntry {
        name: raw.name,
        files,
        ignores,
        extra: raw.extra,
    })
}

fn compile_files(inputs: Vec<FilesPatternInput>) -> Result<Vec<FilesPattern>, Error> {
    inputs
        .into_iter()
        .map(|input| match input {
            FilesPatternInput::Single(p) => Ok(FilesPattern::Single(compile_atom(p)?)),
            FilesPatternInput::And(parts) => {
                let atoms: Result<Vec<_>, Error> = parts.into_iter().map(compile_atom).collect();
                Ok(FilesPattern::And(atoms?))
            }
        })
        .collect()
}

fn compile_ignores(inputs: Vec<PatternInput>) -> Result<Vec<PatternAtom>, Error> {
    inputs.into_iter().map(compile_ignore_atom).collect()
}

fn compile_atom(input: PatternInput) -> Result<PatternAtom, Error> {
    match input {
        PatternInput::Glob(raw) => GlobPattern::compile(&raw)
            .map(PatternAtom::Glob)
            .map_err(|message| Error::validation("files", message)),
        PatternInput::Predicate(f) => Ok(PatternAtom::Predicate(f)),
    }
}

fn compile_ignore_atom(input: PatternInput) -> Result<PatternAtom, Error> {
    match input {
        PatternInput::Glob(raw) => GlobPattern::compile(&raw)
            .map(PatternAtom::Glob)
            .map_err(|message| Error::validation("ignores", message)),
        PatternInput::Predicate(f) => Ok(PatternAtom::Predicate(f)),
    }
}

//! [`ConfigArray`]: the public resolver. Holds the ordered entry list
//! through its two-phase lifecycle (mutable before normalization, frozen
//! and queryable after) and memoizes per-file and per-entry-set merged
//! configs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::entry::{ConfigEntry, ConfigItem};
use crate::error::Error;
use crate::matcher::{entry_matches, is_explicit_match, GlobalIgnores, PathKind};
use crate::normalize::{
    flatten_async, flatten_sync, validate_and_compile, ExtraConfigTypes, FinalizeHook,
    HookContext, PreprocessHook,
};
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    Building,
    Frozen,
}

fn pattern_atom_string(atom: &crate::pattern::PatternAtom) -> Option<String> {
    match atom {
        crate::pattern::PatternAtom::Glob(g) => Some(g.raw().to_string()),
        crate::pattern::PatternAtom::Predicate(_) => None,
    }
}

/// String form of a glob atom, but only if it is neither negated nor a
/// predicate — §6's `files()` contract excludes both.
fn non_negated_pattern_atom_string(atom: &crate::pattern::PatternAtom) -> Option<String> {
    match atom {
        crate::pattern::PatternAtom::Glob(g) if !g.negated() => Some(g.raw().to_string()),
        _ => None,
    }
}

fn files_pattern_strings(pattern: &crate::pattern::FilesPattern) -> Vec<String> {
    match pattern {
        crate::pattern::FilesPattern::Single(atom) => {
            non_negated_pattern_atom_string(atom).into_iter().collect()
        }
        crate::pattern::FilesPattern::And(atoms) => {
            atoms.iter().filter_map(non_negated_pattern_atom_string).collect()
        }
    }
}

/// The merged, effective configuration for one file: the folded `extra`
/// maps of every ordinary entry that matched it, in match order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MergedConfig {
    pub values: HashMap<String, Value>,
}

impl MergedConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// Builder-style options for [`ConfigArray::new`].
#[derive(Default)]
pub struct ConfigArrayOptions {
    pub base_path: PathBuf,
    pub schema: Option<Schema>,
    pub extra_config_types: ExtraConfigTypes,
    pub preprocess: Option<PreprocessHook>,
    pub finalize: Option<FinalizeHook>,
}

/// An ordered, glob-matched list of config entries, resolving to one
/// merged, effective configuration per file. See module docs and
/// `SPEC_FULL.md` for the full algebra.
pub struct ConfigArray {
    base_path: PathBuf,
    schema: Schema,
    extra_config_types: ExtraConfigTypes,
    preprocess: Option<PreprocessHook>,
    finalize: Option<FinalizeHook>,
    items: Vec<ConfigItem>,
    entries: Vec<ConfigEntry>,
    global_ignores: GlobalIgnores,
    state: ArrayState,
    by_path: Mutex<HashMap<PathBuf, Option<Arc<MergedConfig>>>>,
    by_entry_set: Mutex<HashMap<Vec<usize>, Arc<MergedConfig>>>,
}

impl ConfigArray {
    /// Build a new array seeded with `entries` (appended in order; more
    /// may be `push`ed before normalizing).
    pub fn new(entries: Vec<ConfigItem>, options: ConfigArrayOptions) -> Self {
        ConfigArray {
            base_path: options.base_path,
            schema: options.schema.unwrap_or_default(),
            extra_config_types: options.extra_config_types,
            preprocess: options.preprocess,
            finalize: options.finalize,
            items: entries,
            entries: Vec::new(),
            global_ignores: GlobalIgnores::empty(),
            state: ArrayState::Building,
            by_path: Mutex::new(HashMap::new()),
            by_entry_set: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Append a config item. Errors with [`Error::NotExtensible`] once the
    /// array has been normalized.
    pub fn push(&mut self, item: ConfigItem) -> Result<(), Error> {
        if self.state == ArrayState::Frozen {
            return Err(Error::NotExtensible);
        }
        self.items.push(item);
        Ok(())
    }

    /// Synchronously flatten, validate, and freeze the array. Fails if any
    /// factory defers (use [`ConfigArray::normalize`] for that).
    pub fn normalize_sync(&mut self, context: &Value) -> Result<(), Error> {
        if self.state == ArrayState::Frozen {
            return Ok(());
        }
        let mut raw = Vec::new();
        for item in std::mem::take(&mut self.items) {
            flatten_sync(
                item,
                context,
                self.extra_config_types,
                &self.base_path,
                self.preprocess.as_ref(),
                &mut raw,
            )?;
        }
        let mut entries = Vec::with_capacity(raw.len());
        for raw_entry in raw {
            entries.push(validate_and_compile(raw_entry, &self.schema)?);
        }
        tracing::debug!(entry_count = entries.len(), "config array normalized");
        self.entries = entries;
        self.global_ignores = GlobalIgnores::compile(&self.base_path, &self.global_ignore_entries())?;
        self.state = ArrayState::Frozen;
        Ok(())
    }

    /// Asynchronously flatten, validate, and freeze the array, awaiting any
    /// deferred factory results.
    pub async fn normalize(&mut self, context: &Value) -> Result<(), Error> {
        if self.state == ArrayState::Frozen {
            return Ok(());
        }
        let mut raw = Vec::new();
        for item in std::mem::take(&mut self.items) {
            flatten_async(
                item,
                context,
                self.extra_config_types,
                &self.base_path,
                self.preprocess.as_ref(),
                &mut raw,
            )
            .await?;
        }
        let mut entries = Vec::with_capacity(raw.len());
        for raw_entry in raw {
            entries.push(validate_and_compile(raw_entry, &self.schema)?);
        }
        tracing::debug!(entry_count = entries.len(), "config array normalized");
        self.entries = entries;
        self.global_ignores = GlobalIgnores::compile(&self.base_path, &self.global_ignore_entries())?;
        self.state = ArrayState::Frozen;
        Ok(())
    }

    fn require_frozen(&self) -> Result<(), Error> {
        if self.state != ArrayState::Frozen {
            return Err(Error::NotNormalized);
        }
        Ok(())
    }

    /// The flattened, compiled entries (post normalize). Read-only.
    pub fn entries(&self) -> Result<&[ConfigEntry], Error> {
        self.require_frozen()?;
        Ok(&self.entries)
    }

    fn relative_path(&self, absolute_path: &Path) -> String {
        let rel = absolute_path
            .strip_prefix(&self.base_path)
            .unwrap_or(absolute_path);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// §4.4.1 step 1 / §8 invariant 4: a path that does not live under
    /// `base_path` at all, or whose relative form starts with a `..`
    /// component, is "outside" and treated as globally ignored.
    fn escapes_base_path(&self, absolute_path: &Path) -> bool {
        match absolute_path.strip_prefix(&self.base_path) {
            Err(_) => true,
            Ok(rel) => matches!(rel.components().next(), Some(std::path::Component::ParentDir)),
        }
    }

    fn global_ignore_entries(&self) -> Vec<&ConfigEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_global_ignore())
            .collect()
    }

    /// Is `absolute_path` ignored by the global-ignore algebra (entries
    /// with only `ignores`)? §4.4.2/§4.4.3.
    pub fn is_file_ignored(&self, absolute_path: &Path) -> Result<bool, Error> {
        self.require_frozen()?;
        if self.escapes_base_path(absolute_path) {
            return Ok(true);
        }
        let relative = self.relative_path(absolute_path);
        Ok(self.global_ignores.is_ignored(&self.base_path, &relative, PathKind::File))
    }

    /// Is `absolute_path` (a directory) ignored by the global-ignore
    /// algebra?
    pub fn is_directory_ignored(&self, absolute_path: &Path) -> Result<bool, Error> {
        self.require_frozen()?;
        if self.escapes_base_path(absolute_path) {
            return Ok(true);
        }
        let relative = self.relative_path(absolute_path);
        Ok(self.global_ignores.is_ignored(&self.base_path, &relative, PathKind::Dir))
    }

    /// Does any ordinary entry explicitly (not merely ancestrally) match
    /// `absolute_path`? §4.4.4.
    pub fn is_explicit_match(&self, absolute_path: &Path) -> Result<bool, Error> {
        self.require_frozen()?;
        let relative = self.relative_path(absolute_path);
        Ok(self
            .entries
            .iter()
            .filter(|e| e.is_ordinary())
            .any(|e| is_explicit_match(e, absolute_path, &relative)))
    }

    /// Every raw `files` pattern string across all ordinary entries, in
    /// entry order (negated and predicate patterns are omitted per §6).
    pub fn files(&self) -> Result<Vec<String>, Error> {
        self.require_frozen()?;
        Ok(self
            .entries
            .iter()
            .filter_map(|e| e.files.as_ref())
            .flatten()
            .flat_map(files_pattern_strings)
            .collect())
    }

    /// Every raw `ignores` pattern string from global-ignore entries only
    /// (entries with no other keys besides `ignores` — the same
    /// restriction `global_ignore_entries` applies for the actual ignore
    /// algebra), in entry order. Ordinary entries that happen to also
    /// declare `ignores` are not part of this list: their patterns exclude
    /// matches from that entry alone, not from the file set as a whole.
    pub fn ignores(&self) -> Result<Vec<String>, Error> {
        self.require_frozen()?;
        Ok(self
            .global_ignore_entries()
            .into_iter()
            .filter_map(|e| e.ignores.as_ref())
            .flatten()
            .filter_map(pattern_atom_string)
            .collect())
    }

    /// Resolve the effective merged configuration for `absolute_path`,
    /// per the §4.4 eight-step algorithm: global-ignore check, then
    /// files-less/ordinary entry matching in order, memoized both by path
    /// and (structurally) by the ordered set of matched ordinary-entry
    /// indices so two files with an identical matched entry-set share one
    /// `Arc<MergedConfig>`.
    pub fn get_config(&self, absolute_path: &Path) -> Result<Option<Arc<MergedConfig>>, Error> {
        self.require_frozen()?;

        let key = absolute_path.to_path_buf();
        if let Some(cached) = self.by_path.lock().unwrap().get(&key) {
            return Ok(cached.clone());
        }

        if self.escapes_base_path(absolute_path) {
            tracing::trace!(path = %absolute_path.display(), "path escapes base_path");
            self.by_path.lock().unwrap().insert(key, None);
            return Ok(None);
        }

        let relative = self.relative_path(absolute_path);
        if self.global_ignores.is_ignored(&self.base_path, &relative, PathKind::File) {
            tracing::trace!(path = %relative, "globally ignored");
            self.by_path.lock().unwrap().insert(key, None);
            return Ok(None);
        }

        let mut matched_indices = Vec::new();
        let mut matched_ordinary = false;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.is_global_ignore() {
                continue;
            }
            debug_assert!(
                entry.is_ordinary() || entry.is_files_less(),
                "a non-global-ignore entry must be ordinary or files-less"
            );
            if entry_matches(entry, absolute_path, &relative, PathKind::File)? {
                matched_indices.push(idx);
                if entry.is_ordinary() {
                    matched_ordinary = true;
                }
            }
        }

        // §4.5 step 5: a files-less entry alone never produces a config —
        // the file must also be explicitly named by some entry's `files`.
        if !matched_ordinary {
            let explicit = self
                .entries
                .iter()
                .filter(|e| e.is_ordinary())
                .any(|e| is_explicit_match(e, absolute_path, &relative));
            if !explicit {
                self.by_path.lock().unwrap().insert(key, None);
                return Ok(None);
            }
        }

        if matched_indices.is_empty() {
            self.by_path.lock().unwrap().insert(key, None);
            return Ok(None);
        }

        let mut by_entry_set = self.by_entry_set.lock().unwrap();
        let merged = if let Some(existing) = by_entry_set.get(&matched_indices) {
            existing.clone()
        } else {
            let extras = matched_indices
                .iter()
                .map(|&idx| self.entries[idx].extra.clone());
            let mut values = self.schema.merge_extra(extras);
            if let Some(finalize) = &self.finalize {
                values = finalize(
                    values,
                    &HookContext {
                        base_path: &self.base_path,
                    },
                );
            }
            let merged = Arc::new(MergedConfig { values });
            by_entry_set.insert(matched_indices, merged.clone());
            merged
        };
        drop(by_entry_set);

        self.by_path.lock().unwrap().insert(key, Some(merged.clone()));
        Ok(Some(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{FilesPatternInput, RawEntry};
    use crate::pattern::PatternInput;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    fn array(base: &str) -> ConfigArray {
        ConfigArray::new(
            Vec::new(),
            ConfigArrayOptions {
                base_path: PathBuf::from(base),
                schema: Some(Schema::base().with_strategy(
                    "language",
                    crate::schema::Strategy::new(false, |_| Ok(()), |a, b| b.or(a).cloned()),
                )),
                extra_config_types: ExtraConfigTypes::all(),
                preprocess: None,
                finalize: None,
            },
        )
    }

    #[test]
    fn queries_before_normalize_fail() {
        let arr = array("/base");
        assert_eq!(
            arr.get_config(Path::new("/base/a.js")).unwrap_err(),
            Error::NotNormalized
        );
    }

    #[test]
    fn push_after_normalize_fails() {
        let mut arr = array("/base");
        arr.normalize_sync(&json!({})).unwrap();
        assert_eq!(
            arr.push(ConfigItem::entry(RawEntry::new())).unwrap_err(),
            Error::NotExtensible
        );
    }

    #[test]
    fn merges_in_order_last_wins() {
        let mut arr = array("/base");
        arr.push(ConfigItem::entry(
            RawEntry::new()
                .with_files(vec![FilesPatternInput::single(PatternInput::glob("**/*"))])
                .with_key("language", json!("js")),
        ))
        .unwrap();
        arr.push(ConfigItem::entry(
            RawEntry::new()
                .with_files(vec![FilesPatternInput::single(PatternInput::glob("*.ts"))])
                .with_key("language", json!("ts")),
        ))
        .unwrap();
        arr.normalize_sync(&json!({})).unwrap();

        let merged = arr.get_config(Path::new("/base/a.ts")).unwrap().unwrap();
        assert_eq!(merged.get("language"), Some(&json!("ts")));

        let merged_js = arr.get_config(Path::new("/base/a.js")).unwrap().unwrap();
        assert_eq!(merged_js.get("language"), Some(&json!("js")));
    }

    #[test]
    fn merged_config_serializes_for_diagnostics() {
        let mut arr = array("/base");
        arr.push(ConfigItem::entry(
            RawEntry::new()
                .with_files(vec![FilesPatternInput::single(PatternInput::glob("**/*"))])
                .with_key("language", json!("js")),
        ))
        .unwrap();
        arr.normalize_sync(&json!({})).unwrap();

        let merged = arr.get_config(Path::new("/base/a.js")).unwrap().unwrap();
        let serialized = serde_json::to_value(&*merged).unwrap();
        assert_eq!(serialized["values"]["language"], json!("js"));
    }

    #[test]
    fn globally_ignored_file_resolves_to_none() {
        let mut arr = array("/base");
        arr.push(ConfigItem::entry(
            RawEntry::new().with_ignores(vec![PatternInput::glob("dist/")]),
        ))
        .unwrap();
        arr.push(ConfigItem::entry(
            RawEntry::new().with_key("language", json!("js")),
        ))
        .unwrap();
        arr.normalize_sync(&json!({})).unwrap();

        assert!(arr
            .get_config(Path::new("/base/dist/bundle.js"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn identical_matched_entry_sets_share_the_same_arc() {
        let mut arr = array("/base");
        arr.push(ConfigItem::entry(
            RawEntry::new()
                .with_files(vec![FilesPatternInput::single(PatternInput::glob("**/*.js"))])
                .with_key("language", json!("js")),
        ))
        .unwrap();
        arr.normalize_sync(&json!({})).unwrap();

        let a = arr.get_config(Path::new("/base/a.js")).unwrap().unwrap();
        let b = arr.get_config(Path::new("/base/b.js")).unwrap().unwrap();
        assert!(StdArc::ptr_eq(&a, &b));
    }

    #[test]
    fn files_less_entry_alone_never_produces_a_config() {
        let mut arr = array("/base");
        arr.push(ConfigItem::entry(
            RawEntry::new().with_key("language", json!("js")),
        ))
        .unwrap();
        arr.normalize_sync(&json!({})).unwrap();

        assert!(arr.get_config(Path::new("/base/a.js")).unwrap().is_none());
    }

    #[test]
    fn path_outside_base_path_is_globally_ignored() {
        let mut arr = array("/base");
        arr.push(ConfigItem::entry(
            RawEntry::new()
                .with_files(vec![FilesPatternInput::single(PatternInput::glob("**/*"))])
                .with_key("language", json!("js")),
        ))
        .unwrap();
        arr.normalize_sync(&json!({})).unwrap();

        assert!(arr.get_config(Path::new("/elsewhere/a.js")).unwrap().is_none());
        assert!(arr.is_file_ignored(Path::new("/elsewhere/a.js")).unwrap());
        assert!(arr
            .is_file_ignored(Path::new("/base/../elsewhere/a.js"))
            .unwrap());
    }
}

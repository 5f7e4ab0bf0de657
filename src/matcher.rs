//! Matching algebra: per-entry `files`/`ignores` evaluation (§4.4.1), the
//! global-ignore algebra with ancestor-lock propagation (§4.4.2/§4.4.3), and
//! the `is_explicit_match` helper (§4.4.4).

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;

use crate::entry::ConfigEntry;
use crate::error::Error;
use crate::pattern::{ordered_evaluate, PatternAtom, PredicateFn};

/// Whether `relative_path` (already relative to the config array's base
/// path, using forward slashes) names a directory, for matching purposes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PathKind {
    File,
    Dir,
}

/// Does `entry` match `absolute_path`? Implements §4.4.1's five-step rule:
/// files-less entries match unconditionally (once not globally ignored);
/// otherwise a path must match at least one `files` element and must not
/// match the entry's own `ignores`. Raises [`Error::InvalidFiles`] lazily if
/// `files` is present but empty.
pub fn entry_matches(
    entry: &ConfigEntry,
    absolute_path: &Path,
    relative_path: &str,
    kind: PathKind,
) -> Result<bool, Error> {
    let is_dir = kind == PathKind::Dir;

    if let Some(ignores) = &entry.ignores
        && ordered_evaluate(ignores, absolute_path, relative_path, is_dir)
    {
        return Ok(false);
    }

    match &entry.files {
        None => {
            debug_assert!(
                entry.is_files_less() || entry.is_global_ignore(),
                "entry_matches' files-less branch hit on an unclassified entry"
            );
            Ok(true)
        }
        Some(patterns) => {
            if patterns.is_empty() {
                tracing::warn!(path = %relative_path, "entry has an empty files array");
                return Err(Error::InvalidFiles);
            }
            Ok(patterns
                .iter()
                .any(|pattern| pattern.matches(absolute_path, relative_path)))
        }
    }
}

/// The compiled global-ignore algebra (entries with only `ignores`, no
/// `files`/`name`/other keys), built once at normalize time from every such
/// entry's `ignores` list, in order.
///
/// String patterns are handed to [`ignore::gitignore::Gitignore`], which
/// natively implements gitignore's ordered last-match-wins negation and
/// "an ignored ancestor directory locks out re-inclusion of its
/// descendants" (§4.4.2/§4.4.3) — the same algebra this crate used to
/// reimplement by hand via a per-path ancestor walk. Predicate atoms can't
/// be expressed as gitignore lines, so they're evaluated separately: a
/// predicate match against the target path or any of its proper ancestors
/// (under `base_path`) ignores the path unconditionally, mirroring the
/// ancestor lock-in semantics for patterns but, consistent with
/// `PatternAtom::is_negated` always being `false` for predicates, with no
/// negation to re-include it.
pub struct GlobalIgnores {
    gitignore: Gitignore,
    predicates: Vec<PredicateFn>,
}

impl GlobalIgnores {
    /// The algebra for a config array with no global-ignore entries at all.
    pub fn empty() -> Self {
        GlobalIgnores {
            gitignore: Gitignore::empty(),
            predicates: Vec::new(),
        }
    }

    /// Compile the algebra from `entries` (expected to already be filtered
    /// to [`ConfigEntry::is_global_ignore`]), rooted at `base_path`.
    pub fn compile(base_path: &Path, entries: &[&ConfigEntry]) -> Result<Self, Error> {
        let mut builder = GitignoreBuilder::new(base_path);
        let mut predicates = Vec::new();
        for entry in entries {
            for atom in entry.ignores.iter().flatten() {
                match atom {
                    PatternAtom::Glob(glob) => {
                        builder
                            .add_line(None, glob.raw())
                            .map_err(|err| Error::validation("ignores", err.to_string()))?;
                    }
                    PatternAtom::Predicate(f) => predicates.push(f.clone()),
                }
            }
        }
        let gitignore = builder
            .build()
            .map_err(|err| Error::validation("ignores", err.to_string()))?;
        Ok(GlobalIgnores { gitignore, predicates })
    }

    /// Is `relative_path` (under `absolute_base`) globally ignored?
    pub fn is_ignored(&self, absolute_base: &Path, relative_path: &str, kind: PathKind) -> bool {
        let is_dir = kind == PathKind::Dir;
        let absolute_path = absolute_base.join(relative_path);

        if matches!(
            self.gitignore.matched_path_or_any_parents(&absolute_path, is_dir),
            Match::Ignore(_)
        ) {
            return true;
        }

        if self.predicates.is_empty() {
            return false;
        }
        let mut current = Some(absolute_path.as_path());
        while let Some(dir) = current {
            if dir == absolute_base {
                break;
            }
            if self.predicates.iter().any(|predicate| predicate(dir)) {
                return true;
            }
            current = dir.parent();
        }
        false
    }
}

/// §4.4.4: a path is an "explicit match" iff the entry's `files` would match
/// it, ignoring the entry's own `ignores` entirely — "the file is spoken
/// about by the config, regardless of whether it is then excluded."
pub fn is_explicit_match(entry: &ConfigEntry, absolute_path: &Path, relative_path: &str) -> bool {
    match &entry.files {
        None => false,
        Some(patterns) => patterns
            .iter()
            .any(|pattern| pattern.matches(absolute_path, relative_path)),
    }
}

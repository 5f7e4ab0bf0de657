//! Glob engine: compiles a single gitignore/minimatch-style pattern and
//! classifies it per the data model in the design doc (negated,
//! directory-anchored, trailing-slash variants), plus the ordered
//! include/exclude fold shared by entry-level and global ignore evaluation.

use globset::{Glob, GlobBuilder, GlobMatcher};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A predicate pattern: receives the absolute path, returns whether it
/// matches.
pub type PredicateFn = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// One compiled string pattern, with the derived properties the matcher and
/// global-ignore algebra need.
#[derive(Clone)]
pub struct GlobPattern {
    raw: String,
    negated: bool,
    directory_only: bool,
    root_anchored: bool,
    double_star_suffix: bool,
    single_star_suffix: bool,
    matcher: GlobMatcher,
    /// Present only when `double_star_suffix`: matches the directory named
    /// by the pattern's prefix itself (globset's own `foo/**` does not match
    /// `foo`, but this engine's contract does).
    dir_itself_matcher: Option<GlobMatcher>,
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobPattern").field("raw", &self.raw).finish()
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl Eq for GlobPattern {}

impl GlobPattern {
    /// Compile a raw string pattern (as it appears in a config entry's
    /// `files`/`ignores` list).
    pub fn compile(raw: &str) -> Result<Self, String> {
        let negated = raw.starts_with('!');
        let after_bang = if negated { &raw[1..] } else { raw };

        let root_anchored = after_bang.starts_with('/');
        let after_root = if root_anchored {
            &after_bang[1..]
        } else {
            after_bang
        };

        let directory_only = after_root.ends_with('/') && after_root != "/";
        let body = if directory_only {
            &after_root[..after_root.len() - 1]
        } else {
            after_root
        };

        let double_star_suffix = body.ends_with("/**") || body == "**";
        let single_star_suffix = !double_star_suffix && body.ends_with("/*");

        let matcher = compile_body(body, root_anchored)?;

        let dir_itself_matcher = if body.ends_with("/**") {
            let prefix = &body[..body.len() - "/**".len()];
            Some(compile_body(prefix, root_anchored)?)
        } else {
            None
        };

        Ok(GlobPattern {
            raw: raw.to_string(),
            negated,
            directory_only,
            root_anchored,
            double_star_suffix,
            single_star_suffix,
            matcher,
            dir_itself_matcher,
        })
    }

    /// The original pattern string, including any `!` prefix.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    pub fn directory_only(&self) -> bool {
        self.directory_only
    }

    pub fn root_anchored(&self) -> bool {
        self.root_anchored
    }

    pub fn double_star_suffix(&self) -> bool {
        self.double_star_suffix
    }

    pub fn single_star_suffix(&self) -> bool {
        self.single_star_suffix
    }

    /// Whether the pattern matches `relative_path`, ignoring `negated`
    /// entirely (callers that care about negation ordering read
    /// [`GlobPattern::negated`] separately).
    pub fn raw_matches(&self, relative_path: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        if is_dir {
            if let Some(dir_matcher) = &self.dir_itself_matcher
                && dir_matcher.is_match(relative_path)
            {
                return true;
            }
        }
        self.matcher.is_match(relative_path)
    }
}

/// Compile a pattern body (post `!`/leading-`/`/trailing-`/` stripping) into
/// a [`GlobMatcher`], applying the `matchBase` convention: a body with no
/// `/` is prefixed with `**/` so it matches at any depth, unless the pattern
/// was root-anchored.
fn compile_body(body: &str, root_anchored: bool) -> Result<GlobMatcher, String> {
    let effective = if !root_anchored && !body.is_empty() && !body.contains('/') {
        format!("**/{body}")
    } else {
        body.to_string()
    };
    let effective = if effective.is_empty() {
        "**".to_string()
    } else {
        effective
    };
    GlobBuilder::new(&effective)
        .literal_separator(true)
        .build()
        .map_err(|e| e.to_string())
        .map(Glob::compile_matcher)
}

/// One atom of a `files`/`ignores` list: either a compiled glob or a
/// caller-supplied predicate.
#[derive(Clone)]
pub enum PatternAtom {
    Glob(GlobPattern),
    Predicate(PredicateFn),
}

impl fmt::Debug for PatternAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternAtom::Glob(g) => f.debug_tuple("Glob").field(&g.raw).finish(),
            PatternAtom::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl PatternAtom {
    /// True match state, ignoring any `!` negation on a glob atom.
    /// Predicates have no negation concept: "their boolean is their match".
    pub fn raw_matches(&self, absolute_path: &Path, relative_path: &str, is_dir: bool) -> bool {
        match self {
            PatternAtom::Glob(g) => g.raw_matches(relative_path, is_dir),
            PatternAtom::Predicate(f) => f(absolute_path),
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            PatternAtom::Glob(g) => g.negated(),
            PatternAtom::Predicate(_) => false,
        }
    }

    /// The atom's own match result, with negation already folded in. Used
    /// for `files` evaluation, where elements are OR'd independently (no
    /// ordering semantics between them).
    pub fn matches(&self, absolute_path: &Path, relative_path: &str, is_dir: bool) -> bool {
        self.raw_matches(absolute_path, relative_path, is_dir) ^ self.is_negated()
    }
}

/// One element of an entry's `files` list: a single pattern, or an
/// AND-sequence that all must match.
#[derive(Clone, Debug)]
pub enum FilesPattern {
    Single(PatternAtom),
    And(Vec<PatternAtom>),
}

impl FilesPattern {
    pub fn matches(&self, absolute_path: &Path, relative_path: &str) -> bool {
        match self {
            FilesPattern::Single(atom) => atom.matches(absolute_path, relative_path, false),
            FilesPattern::And(atoms) => atoms
                .iter()
                .all(|atom| atom.matches(absolute_path, relative_path, false)),
        }
    }
}

/// Fold an ordered pattern list (gitignore-style negation) against one
/// concrete path. Shared by per-entry `ignores` (§4.4.1) and the
/// global-ignore algebra (§4.4.2) — both reduce to "last matching pattern,
/// in order, decides; negated patterns re-include".
pub fn ordered_evaluate(
    patterns: &[PatternAtom],
    absolute_path: &Path,
    relative_path: &str,
    is_dir: bool,
) -> bool {
    let mut ignored = false;
    for atom in patterns {
        if atom.raw_matches(absolute_path, relative_path, is_dir) {
            ignored = !atom.is_negated();
        }
    }
    ignored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(raw: &str) -> GlobPattern {
        GlobPattern::compile(raw).unwrap()
    }

    #[test]
    fn derives_negated() {
        assert!(glob("!foo.txt").negated());
        assert!(!glob("foo.txt").negated());
    }

    #[test]
    fn derives_directory_only() {
        let p = glob("foo/");
        assert!(p.directory_only());
        assert!(!p.double_star_suffix());
        assert!(!p.single_star_suffix());
    }

    #[test]
    fn derives_double_star_suffix() {
        let p = glob("foo/**");
        assert!(p.double_star_suffix());
        assert!(!p.directory_only());
    }

    #[test]
    fn derives_single_star_suffix() {
        let p = glob("foo/*");
        assert!(p.single_star_suffix());
    }

    #[test]
    fn derives_root_anchored() {
        assert!(glob("/foo.txt").root_anchored());
        assert!(!glob("foo.txt").root_anchored());
    }

    #[test]
    fn matchbase_matches_any_depth() {
        let p = glob("*.js");
        assert!(p.raw_matches("foo.js", false));
        assert!(p.raw_matches("a/b/foo.js", false));
    }

    #[test]
    fn root_anchored_matches_only_from_base() {
        let p = glob("/foo.js");
        assert!(p.raw_matches("foo.js", false));
        assert!(!p.raw_matches("a/foo.js", false));
    }

    #[test]
    fn directory_only_never_matches_a_file_directly() {
        let p = glob("foo/");
        assert!(!p.raw_matches("foo", false));
        assert!(p.raw_matches("foo", true));
    }

    #[test]
    fn double_star_suffix_matches_dir_itself_and_descendants() {
        let p = glob("foo/**");
        assert!(p.raw_matches("foo", true));
        assert!(p.raw_matches("foo/a", false));
        assert!(p.raw_matches("foo/a/b", false));
        assert!(!p.raw_matches("foo", false));
    }

    #[test]
    fn single_star_suffix_matches_only_direct_children() {
        let p = glob("foo/*");
        assert!(p.raw_matches("foo/a", false));
        assert!(!p.raw_matches("foo/a/b", false));
        assert!(!p.raw_matches("foo", true));
    }

    #[test]
    fn ordered_evaluate_honors_negation_order() {
        let base = Path::new("/base");
        let forward = vec![
            PatternAtom::Glob(glob("!a.txt")),
            PatternAtom::Glob(glob("**/*.txt")),
        ];
        assert!(ordered_evaluate(&forward, base, "a.txt", false));

        let reverse = vec![
            PatternAtom::Glob(glob("**/*.txt")),
            PatternAtom::Glob(glob("!a.txt")),
        ];
        assert!(!ordered_evaluate(&reverse, base, "a.txt", false));
    }
}

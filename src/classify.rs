//! Commit message classification and noise detection.
//!
//! Classification is a pure function of the message text: the same input
//! always yields the same `(kind, noise)` pair, and it never fails. The
//! keyword table and the noise rules are data, not code, so callers can
//! override them from configuration.

use serde::{Deserialize, Serialize};

/// Semantic commit categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitKind {
    Feat,
    Fix,
    Refactor,
    Docs,
    Test,
    Perf,
    Chore,
    Other,
}

impl CommitKind {
    /// All kinds in report display order.
    pub const ALL: [CommitKind; 8] = [
        CommitKind::Feat,
        CommitKind::Fix,
        CommitKind::Refactor,
        CommitKind::Docs,
        CommitKind::Perf,
        CommitKind::Test,
        CommitKind::Chore,
        CommitKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitKind::Feat => "feat",
            CommitKind::Fix => "fix",
            CommitKind::Refactor => "refactor",
            CommitKind::Docs => "docs",
            CommitKind::Test => "test",
            CommitKind::Perf => "perf",
            CommitKind::Chore => "chore",
            CommitKind::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommitKind::Feat => "Features",
            CommitKind::Fix => "Fixes",
            CommitKind::Refactor => "Refactoring",
            CommitKind::Docs => "Documentation",
            CommitKind::Test => "Tests",
            CommitKind::Perf => "Performance",
            CommitKind::Chore => "Chores",
            CommitKind::Other => "Other",
        }
    }
}

/// Default merge-commit boilerplate, matched as message prefixes.
const DEFAULT_MERGE_PREFIXES: &[&str] = &[
    "merge branch",
    "merge pull request",
    "merge remote-tracking branch",
];

/// Default trivial markers, matched against the whole trimmed message.
const DEFAULT_TRIVIAL_MARKERS: &[&str] = &[
    "sync",
    "wip",
    "initial commit",
    "update readme",
    "update version",
    "bump version",
];

/// Messages with fewer non-whitespace characters than this are noise.
const DEFAULT_MIN_LENGTH: usize = 3;

/// Detects commits that carry no meaningful work signal.
///
/// Evaluated independently of the commit kind. A message is noise when it is
/// empty, shorter than the minimum, merge boilerplate, or a trivial marker.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    merge_prefixes: Vec<String>,
    trivial_markers: Vec<String>,
    min_length: usize,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl NoiseFilter {
    /// Build a filter, falling back to the documented defaults for any
    /// override left as `None`.
    pub fn new(
        merge_prefixes: Option<Vec<String>>,
        trivial_markers: Option<Vec<String>>,
        min_length: Option<usize>,
    ) -> Self {
        let merge_prefixes = merge_prefixes
            .unwrap_or_else(|| DEFAULT_MERGE_PREFIXES.iter().map(|s| s.to_string()).collect())
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        let trivial_markers = trivial_markers
            .unwrap_or_else(|| DEFAULT_TRIVIAL_MARKERS.iter().map(|s| s.to_string()).collect())
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            merge_prefixes,
            trivial_markers,
            min_length: min_length.unwrap_or(DEFAULT_MIN_LENGTH),
        }
    }

    pub fn is_noise(&self, message: &str) -> bool {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return true;
        }
        if trimmed.chars().filter(|c| !c.is_whitespace()).count() < self.min_length {
            return true;
        }

        let lower = trimmed.to_lowercase();
        if self.merge_prefixes.iter().any(|p| lower.starts_with(p.as_str())) {
            return true;
        }
        self.trivial_markers.iter().any(|m| lower == *m)
    }
}

/// Maps commit messages to a [`CommitKind`] and a noise flag.
pub struct Classifier {
    rules: Vec<(String, CommitKind)>,
    noise: NoiseFilter,
    scope_marker: regex_lite::Regex,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_noise(NoiseFilter::default())
    }
}

impl Classifier {
    /// Default keyword table with the default noise filter.
    pub fn with_noise(noise: NoiseFilter) -> Self {
        Self::new(default_rules(), noise)
    }

    /// Build from an explicit ordered keyword table. First match wins, so
    /// more specific prefixes should come first when they overlap.
    pub fn new(rules: Vec<(String, CommitKind)>, noise: NoiseFilter) -> Self {
        // Leading "[scope]" or "(scope)" marker, with optional separators.
        let scope_marker = regex_lite::Regex::new(r"^[\[(][^\])]{0,64}[\])][\s:,-]*")
            .unwrap_or_else(|e| panic!("invalid scope marker pattern: {e}"));
        Self {
            rules,
            noise,
            scope_marker,
        }
    }

    /// Classify a message. Total and idempotent: never fails, and the same
    /// input always produces the same output.
    pub fn classify(&self, message: &str) -> (CommitKind, bool) {
        (self.kind_of(message), self.noise.is_noise(message))
    }

    fn kind_of(&self, message: &str) -> CommitKind {
        let first_line = message.lines().next().unwrap_or("").trim();
        let subject = match self.scope_marker.find(first_line) {
            Some(m) => first_line[m.end()..].trim_start(),
            None => first_line,
        };

        for (prefix, kind) in &self.rules {
            if starts_with_keyword(subject, prefix) {
                return *kind;
            }
        }
        CommitKind::Other
    }
}

/// Prefix match at the start of the subject, case-insensitive, requiring a
/// non-alphanumeric boundary so "feat" does not match "feature".
fn starts_with_keyword(subject: &str, prefix: &str) -> bool {
    if prefix.is_empty()
        || subject.len() < prefix.len()
        || !subject.is_char_boundary(prefix.len())
    {
        return false;
    }
    if !subject[..prefix.len()].eq_ignore_ascii_case(prefix) {
        return false;
    }
    match subject[prefix.len()..].chars().next() {
        None => true,
        Some(c) => !c.is_alphanumeric(),
    }
}

fn default_rules() -> Vec<(String, CommitKind)> {
    [
        ("feat", CommitKind::Feat),
        ("feature", CommitKind::Feat),
        ("fix", CommitKind::Fix),
        ("bugfix", CommitKind::Fix),
        ("hotfix", CommitKind::Fix),
        ("refactor", CommitKind::Refactor),
        ("docs", CommitKind::Docs),
        ("doc", CommitKind::Docs),
        ("test", CommitKind::Test),
        ("tests", CommitKind::Test),
        ("perf", CommitKind::Perf),
        ("chore", CommitKind::Chore),
        ("build", CommitKind::Chore),
        ("ci", CommitKind::Chore),
        ("style", CommitKind::Chore),
    ]
    .into_iter()
    .map(|(p, k)| (p.to_string(), k))
    .collect()
}

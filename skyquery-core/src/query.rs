//! Text query parameters shared by every record store.

use serde::{Deserialize, Serialize};

/// How a text pattern is compared against a record field.
///
/// All modes except [`MatchMode::ExactCaseSensitive`] fold ASCII case, which
/// mirrors SQLite's default `LIKE` behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Whole-field match ignoring ASCII case.
    Exact,
    /// Whole-field, byte-for-byte match.
    ExactCaseSensitive,
    /// Field begins with the pattern.
    StartsWith,
    /// Field contains the pattern anywhere.
    #[default]
    Contains,
}

impl MatchMode {
    /// Return `true` when `candidate` satisfies `pattern` under this mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use skyquery_core::MatchMode;
    ///
    /// assert!(MatchMode::StartsWith.matches("LSZH", "lsz"));
    /// assert!(!MatchMode::ExactCaseSensitive.matches("LSZH", "lszh"));
    /// ```
    pub fn matches(self, candidate: &str, pattern: &str) -> bool {
        match self {
            Self::Exact => candidate.eq_ignore_ascii_case(pattern),
            Self::ExactCaseSensitive => candidate == pattern,
            Self::StartsWith => candidate
                .as_bytes()
                .get(..pattern.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(pattern.as_bytes())),
            Self::Contains => candidate
                .to_ascii_lowercase()
                .contains(&pattern.to_ascii_lowercase()),
        }
    }
}

/// A key, name or free-text lookup with a result window.
///
/// Results are ordered by the compared field and then by record identifier
/// before `skip` and `limit` are applied, so paging is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuery {
    /// Pattern compared against the field.
    pub pattern: String,
    /// Comparison mode.
    pub mode: MatchMode,
    /// Maximum number of records returned; `None` for no limit.
    pub limit: Option<usize>,
    /// Number of leading matches dropped before `limit` applies.
    pub skip: usize,
}

impl TextQuery {
    /// Create a substring query without a limit.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: MatchMode::default(),
            limit: None,
            skip: 0,
        }
    }

    /// Create an exact, case-folding query.
    pub fn exact(pattern: impl Into<String>) -> Self {
        Self::new(pattern).with_mode(MatchMode::Exact)
    }

    /// Replace the match mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Cap the number of returned records.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Drop the first `skip` matches.
    #[must_use]
    pub const fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Test a single field value.
    pub fn matches(&self, candidate: &str) -> bool {
        self.mode.matches(candidate, &self.pattern)
    }

    /// Apply the skip/limit window to ordered matches.
    pub fn window<I>(&self, ordered: I) -> impl Iterator<Item = I::Item>
    where
        I: IntoIterator,
    {
        ordered
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
    }
}

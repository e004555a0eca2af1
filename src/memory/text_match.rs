//! Safe text matching primitives: substring, fuzzy (bounded Levenshtein), and
//! regex with a ReDoS guard.
//!
//! Used directly by the text/fuzzy/regex query modes and as the fallback
//! whenever the full-text index cannot answer a query.

use std::sync::LazyLock;

use moka::sync::Cache;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

/// Haystacks longer than this are truncated before regex matching.
pub const MAX_SEARCH_STRING_LENGTH: usize = 10_000;

/// Patterns longer than this are rejected outright.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 500;

/// Fraction of the longer string's length tolerated as edit distance.
const FUZZY_THRESHOLD_RATIO: f64 = 0.3;

/// Compiled-size cap handed to the regex builder.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

// Quantifier (or closing brace) right before one or more `)` that are themselves
// quantified: (a+)+, (x*)*, (x?)*, ((a+))+, (a{2})+
static NESTED_QUANTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+*?}]\)+[+*?{]").expect("valid detector pattern"));

// A quantified or braced group followed by another quantifier: (ab)+*, (ab){2}{3}
static QUANTIFIED_GROUP_REQUANTIFIED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\)(?:[+*]|\{\d+(?:,\d*)?\})[+*{]").expect("valid detector pattern")
});

static QUANTIFIER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+*?]{3,}").expect("valid detector pattern"));

static CLASS_QUANTIFIER_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\][+*?]\{").expect("valid detector pattern"));

static BRACE_QUANTIFIER_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:,\d*)?\}").expect("valid detector pattern"));

/// How a needle is compared against entry text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Substring,
    Fuzzy,
    Regex,
}

/// Case-insensitive substring match. An empty haystack never matches; an empty
/// needle always matches a non-empty haystack.
pub fn text_matches(haystack: &str, needle: &str) -> bool {
    if haystack.is_empty() {
        return false;
    }
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Substring match, else edit distance within 30% of the longer string.
pub fn fuzzy_text_matches(haystack: &str, needle: &str) -> bool {
    if haystack.is_empty() {
        return false;
    }
    if text_matches(haystack, needle) {
        return true;
    }

    let a = haystack.to_lowercase();
    let b = needle.to_lowercase();
    let longest = a.chars().count().max(b.chars().count());
    let threshold = FUZZY_THRESHOLD_RATIO * longest as f64;
    let bound = threshold.floor() as usize;

    levenshtein_distance(&a, &b, Some(bound)) as f64 <= threshold
}

/// Character-level Levenshtein distance.
///
/// With `max_distance`, returns `max_distance + 1` as soon as the answer is
/// known to exceed the bound: immediately when the lengths alone differ by
/// more, or when every cell of a DP row is already past it.
pub fn levenshtein_distance(a: &str, b: &str, max_distance: Option<usize>) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if let Some(max) = max_distance {
        if a.len().abs_diff(b.len()) > max {
            return max + 1;
        }
    }
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        let mut row_min = curr[0];
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            row_min = row_min.min(curr[j]);
        }
        if let Some(max) = max_distance {
            if row_min > max {
                return max + 1;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[b.len()];
    match max_distance {
        Some(max) if distance > max => max + 1,
        _ => distance,
    }
}

/// Reject patterns prone to catastrophic backtracking.
pub fn is_safe_regex_pattern(pattern: &str) -> bool {
    if pattern.chars().count() > MAX_REGEX_PATTERN_LENGTH {
        return false;
    }
    if NESTED_QUANTIFIER.is_match(pattern)
        || QUANTIFIED_GROUP_REQUANTIFIED.is_match(pattern)
        || QUANTIFIER_RUN.is_match(pattern)
    {
        return false;
    }
    // `[a-z]+{` with no well-formed `{n,m}` after it
    for m in CLASS_QUANTIFIER_BRACE.find_iter(pattern) {
        if !BRACE_QUANTIFIER_BODY.is_match(&pattern[m.end()..]) {
            return false;
        }
    }
    true
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Regex matcher owning a bounded cache of compiled patterns.
#[derive(Clone)]
pub struct TextMatcher {
    cache: Cache<String, Regex>,
}

impl TextMatcher {
    pub fn new(max_patterns: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_patterns).build(),
        }
    }

    /// Case-insensitive regex match over the first 10,000 characters of
    /// `haystack`. Unsafe or invalid patterns degrade to a substring match.
    pub fn regex_text_matches(&self, haystack: &str, pattern: &str) -> bool {
        let haystack = truncate_chars(haystack, MAX_SEARCH_STRING_LENGTH);

        if !is_safe_regex_pattern(pattern) {
            warn!(pattern_len = pattern.len(), "unsafe regex pattern, using substring match");
            return text_matches(haystack, pattern);
        }

        match self.compiled(pattern) {
            Some(re) => re.is_match(haystack),
            None => text_matches(haystack, pattern),
        }
    }

    /// Dispatch on `mode`.
    pub fn matches(&self, haystack: &str, needle: &str, mode: MatchMode) -> bool {
        match mode {
            MatchMode::Substring => text_matches(haystack, needle),
            MatchMode::Fuzzy => fuzzy_text_matches(haystack, needle),
            MatchMode::Regex => self.regex_text_matches(haystack, needle),
        }
    }

    fn compiled(&self, pattern: &str) -> Option<Regex> {
        if let Some(re) = self.cache.get(pattern) {
            return Some(re);
        }
        match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(re) => {
                self.cache.insert(pattern.to_string(), re.clone());
                debug!(pattern, "compiled regex cached");
                Some(re)
            }
            Err(e) => {
                warn!(error = %e, "invalid regex pattern, using substring match");
                None
            }
        }
    }

    #[cfg(test)]
    fn cached(&self, pattern: &str) -> bool {
        self.cache.contains_key(pattern)
    }
}

impl Default for TextMatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

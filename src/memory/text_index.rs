//! Full-text lookup per entry type, degrading to a literal substring scan.
//!
//! Queries are sanitized into quoted FTS terms before reaching the index. If
//! the index rejects the query or is unavailable, the same fields are scanned
//! with a LIKE-style match where `%` and `_` are literal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::memory::types::EntryType;

/// Storage-side text index.
pub trait TextIndexBackend: Send + Sync {
    /// Run a sanitized full-text query restricted to `fields`.
    fn query(&self, entry_type: EntryType, query: &str, fields: &[&'static str])
        -> Result<HashSet<String>>;

    /// Case-insensitive literal substring scan over `fields`.
    fn scan(&self, entry_type: EntryType, needle: &str, fields: &[&'static str])
        -> Result<HashSet<String>>;
}

/// Indexed fields per entry type.
pub fn default_fields(entry_type: EntryType) -> &'static [&'static str] {
    match entry_type {
        EntryType::Guideline => &["name", "content", "rationale"],
        EntryType::Knowledge => &["title", "content", "source"],
        EntryType::Tool => &["name", "description"],
        EntryType::Experience => &["title", "content", "scenario"],
    }
}

/// Keep the requested fields this type actually indexes, falling back to the
/// defaults when nothing usable remains.
pub fn resolve_fields(entry_type: EntryType, requested: &[String]) -> Vec<&'static str> {
    let defaults = default_fields(entry_type);
    let selected: Vec<&'static str> = defaults
        .iter()
        .copied()
        .filter(|field| requested.iter().any(|r| r.eq_ignore_ascii_case(field)))
        .collect();
    if selected.is_empty() {
        defaults.to_vec()
    } else {
        selected
    }
}

/// Turn free text into space-separated quoted terms (implicit AND).
///
/// Everything but letters, digits, `_` and `-` is treated as a separator, so
/// index operators (`*`, `:`, `^`, parentheses, quotes) never reach the index.
pub fn sanitize_query(query: &str) -> String {
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .map(|term| term.trim_matches('-'))
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{term}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text index search over all entry types.
#[derive(Clone)]
pub struct TextIndexSearch {
    backend: Arc<dyn TextIndexBackend>,
}

impl TextIndexSearch {
    pub fn new(backend: Arc<dyn TextIndexBackend>) -> Self {
        Self { backend }
    }

    /// IDs of `entry_type` entries matching `query` in `fields`.
    pub fn search(
        &self,
        entry_type: EntryType,
        query: &str,
        fields: &[String],
    ) -> Result<HashSet<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(HashSet::new());
        }

        let fields = resolve_fields(entry_type, fields);
        let sanitized = sanitize_query(query);
        if sanitized.is_empty() {
            debug!(%entry_type, "query has no indexable terms, scanning");
            return self.backend.scan(entry_type, query, &fields);
        }

        match self.backend.query(entry_type, &sanitized, &fields) {
            Ok(ids) => {
                debug!(%entry_type, hits = ids.len(), "text index search");
                Ok(ids)
            }
            Err(e) => {
                warn!(%entry_type, error = %e, "text index query failed, falling back to scan");
                self.backend.scan(entry_type, query, &fields)
            }
        }
    }

    /// Run [`search`](Self::search) for each requested type. The map always
    /// has a key for all four types.
    pub fn search_across_types(
        &self,
        query: &str,
        types: &[EntryType],
    ) -> Result<HashMap<EntryType, HashSet<String>>> {
        let mut results: HashMap<EntryType, HashSet<String>> =
            EntryType::ALL.iter().map(|t| (*t, HashSet::new())).collect();

        if query.trim().is_empty() || types.is_empty() {
            return Ok(results);
        }

        for entry_type in types {
            let ids = self.search(*entry_type, query, &[])?;
            results.insert(*entry_type, ids);
        }
        Ok(results)
    }
}

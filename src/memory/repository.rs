//! Collaborator interfaces consumed by the retrieval core.
//!
//! The core never talks to storage directly: entries, the scope hierarchy,
//! and the relation graph all come through these traits. [`crate::memory::store`]
//! provides the SQLite implementation used by the binary and tests.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::memory::types::{
    Entry, EntryType, RelationDirection, RelationType, ScopeDescriptor, Version,
};

/// Read access to entries and their version history.
pub trait Repository: Send + Sync {
    fn get_by_id(&self, entry_type: EntryType, id: &str) -> Result<Option<Entry>>;

    /// Entries stored at exactly `scope`'s level (its `inherit` flag is ignored
    /// here; callers expand the chain themselves). `None` lists every scope.
    fn list_by_scope(
        &self,
        entry_type: EntryType,
        scope: Option<&ScopeDescriptor>,
        include_inactive: bool,
    ) -> Result<Vec<Entry>>;

    /// All versions of an entry, oldest first.
    fn get_history(&self, entry_type: EntryType, id: &str) -> Result<Vec<Version>>;

    /// Active entry with this exact name/title at exactly `scope`'s level.
    fn find_by_name(
        &self,
        entry_type: EntryType,
        name: &str,
        scope: &ScopeDescriptor,
    ) -> Result<Option<Entry>>;

    /// Tag names attached to each of `ids`.
    fn tags_for(&self, entry_type: EntryType, ids: &[String]) -> Result<HashMap<String, Vec<String>>>;

    /// Entries linked to a conversation.
    fn conversation_entries(&self, conversation_id: &str) -> Result<Vec<(EntryType, String)>>;
}

/// Parent lookups for the global/org/project/session hierarchy.
pub trait ScopeHierarchy: Send + Sync {
    /// The next broader scope above `scope`, or `None` when the only thing
    /// above it is global (or it is global already).
    fn parent_of(&self, scope: &ScopeDescriptor) -> Result<Option<ScopeDescriptor>>;
}

/// One edge reached while walking the relation graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedEdge {
    pub related_type: EntryType,
    pub related_id: String,
    pub relation_type: RelationType,
    /// Hops from the starting entry, starting at 1.
    pub distance: u32,
}

/// Options for [`RelationGraph::traverse`].
#[derive(Debug, Clone, Default)]
pub struct TraverseOptions {
    pub direction: RelationDirection,
    pub relation: Option<RelationType>,
}

/// Breadth-first access to entry relations.
pub trait RelationGraph: Send + Sync {
    fn traverse(
        &self,
        entry_id: &str,
        depth: u32,
        options: &TraverseOptions,
    ) -> Result<Vec<RelatedEdge>>;
}

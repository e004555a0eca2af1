//! Scope chain resolution.
//!
//! A descriptor with `inherit = true` expands to itself plus every broader
//! scope up to global (`session → project → org → global`). Callers use the
//! chain two ways: shadowing lookups take the first hit from most specific to
//! global, listing queries union every level and let scope proximity rank them.

use tracing::debug;

use crate::error::Result;
use crate::memory::repository::{Repository, ScopeHierarchy};
use crate::memory::types::{Entry, EntryType, ScopeDescriptor, ScopeType};

/// Session → project → org → global is at most four levels.
const MAX_CHAIN_LEN: usize = 4;

/// Expand `descriptor` into its lookup chain, most specific first.
pub fn resolve_scope_chain(
    descriptor: &ScopeDescriptor,
    hierarchy: &dyn ScopeHierarchy,
) -> Result<Vec<ScopeDescriptor>> {
    descriptor.validate()?;

    if !descriptor.inherit || descriptor.scope_type == ScopeType::Global {
        return Ok(vec![descriptor.clone()]);
    }

    let mut chain = vec![descriptor.clone()];
    let mut current = descriptor.clone();
    while chain.len() < MAX_CHAIN_LEN {
        match hierarchy.parent_of(&current)? {
            Some(parent) if parent.scope_type != ScopeType::Global => {
                chain.push(parent.clone());
                current = parent;
            }
            _ => break,
        }
    }
    chain.push(ScopeDescriptor::global());

    debug!(
        scope = %descriptor.scope_type,
        levels = chain.len(),
        "resolved scope chain"
    );
    Ok(chain)
}

/// Position of an entry's scope within `chain` (0 = the requested scope).
pub fn scope_distance(
    chain: &[ScopeDescriptor],
    scope_type: ScopeType,
    scope_id: Option<&str>,
) -> Option<usize> {
    chain.iter().position(|s| s.contains(scope_type, scope_id))
}

/// Walk the chain most-specific first and return the first hit.
pub fn first_in_chain<T>(
    chain: &[ScopeDescriptor],
    mut lookup: impl FnMut(&ScopeDescriptor) -> Result<Option<T>>,
) -> Result<Option<T>> {
    for scope in chain {
        if let Some(hit) = lookup(scope)? {
            return Ok(Some(hit));
        }
    }
    Ok(None)
}

/// Shadowing lookup: the entry named `name` at the closest scope wins.
pub fn resolve_by_name(
    repo: &dyn Repository,
    hierarchy: &dyn ScopeHierarchy,
    entry_type: EntryType,
    name: &str,
    descriptor: &ScopeDescriptor,
) -> Result<Option<Entry>> {
    let chain = resolve_scope_chain(descriptor, hierarchy)?;
    first_in_chain(&chain, |scope| repo.find_by_name(entry_type, name, scope))
}

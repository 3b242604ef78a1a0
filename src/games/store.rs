//! Session-scoped puzzle state store.
//!
//! Puzzle progress lives in an explicit map keyed by the caller's session
//! token rather than in ad hoc per-request slots. Entries are only ever
//! handed back when the stored owner matches the requesting user; a mismatch
//! is treated as "no state" and forces recreation, never served.

use std::collections::HashMap;

use super::puzzle::PuzzleState;

#[derive(Debug, Default)]
pub struct PuzzleStore {
    entries: HashMap<String, PuzzleState>,
}

impl PuzzleStore {
    pub fn new() -> Self {
        PuzzleStore {
            entries: HashMap::new(),
        }
    }

    /// Fetch the caller's live state. Returns `None` when there is no entry
    /// for the token or the stored owner is someone else.
    pub fn get(&self, token: &str, owner: &str) -> Option<&PuzzleState> {
        self.entries.get(token).filter(|s| s.owner == owner)
    }

    /// Mutable variant of [`get`](Self::get), with the same owner guard.
    pub fn get_mut(&mut self, token: &str, owner: &str) -> Option<&mut PuzzleState> {
        self.entries.get_mut(token).filter(|s| s.owner == owner)
    }

    /// Resolve the active state for a level 1 visit, rebuilding it when any
    /// of: no state exists, the owner mismatches, the move budget changed, or
    /// an explicit reset was requested.
    pub fn get_or_create(
        &mut self,
        token: &str,
        owner: &str,
        limit: u32,
        reset: bool,
    ) -> &PuzzleState {
        let rebuild = reset
            || self
                .entries
                .get(token)
                .map_or(true, |s| s.owner != owner || s.limit != limit);
        if rebuild {
            self.entries
                .insert(token.to_string(), PuzzleState::new(owner, limit));
        }
        // Entry guaranteed present: it either survived the check above or was
        // just inserted.
        &self.entries[token]
    }

    /// Drop the entry for a session. Called on logout and after a completed
    /// solve so stale state is never reused.
    pub fn invalidate(&mut self, token: &str) {
        self.entries.remove(token);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

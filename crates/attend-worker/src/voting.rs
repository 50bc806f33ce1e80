//! Multi-frame vote accumulation.

use std::collections::{HashMap, HashSet};

use attend_models::IdentityId;

/// Votes toward confirmation for one session.
///
/// An id leaves the table the moment it is confirmed and never votes again.
#[derive(Debug, Clone)]
pub struct VoteTable {
    required: u32,
    votes: HashMap<IdentityId, u32>,
    confirmed: HashSet<IdentityId>,
}

impl VoteTable {
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            votes: HashMap::new(),
            confirmed: HashSet::new(),
        }
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    /// Count one accepted identification.
    ///
    /// Returns `true` exactly once per id: on the vote that confirms it.
    pub fn vote(&mut self, id: &IdentityId) -> bool {
        if self.confirmed.contains(id) {
            return false;
        }
        let count = self.votes.entry(id.clone()).or_insert(0);
        *count += 1;
        if *count >= self.required {
            self.votes.remove(id);
            self.confirmed.insert(id.clone());
            return true;
        }
        false
    }

    pub fn votes_for(&self, id: &IdentityId) -> u32 {
        self.votes.get(id).copied().unwrap_or(0)
    }

    pub fn is_confirmed(&self, id: &IdentityId) -> bool {
        self.confirmed.contains(id)
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }

    /// Start over, e.g. for a new session.
    pub fn reset(&mut self, required: u32) {
        self.required = required.max(1);
        self.votes.clear();
        self.confirmed.clear();
    }
}

impl Default for VoteTable {
    fn default() -> Self {
        Self::new(3)
    }
}

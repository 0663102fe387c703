//! Waiting pools — connections awaiting a partner.
//!
//! Two independent instances live in the coordinator: one for anonymous
//! seekers, one for profiled seekers. Entries are kept in arrival order so
//! the oldest waiting entry wins ties.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use echo_core::profile::{self, MatchScore};
use echo_core::{ConnectionId, Profile, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingEntry {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub profile: Option<Profile>,
}

/// Winning candidate of a profiled scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMatch {
    pub entry: WaitingEntry,
    pub score: MatchScore,
}

#[derive(Debug, Default)]
pub struct WaitingPool {
    entries: VecDeque<WaitingEntry>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Returns false (and changes nothing) if the
    /// connection is already waiting.
    pub fn enqueue(&mut self, entry: WaitingEntry) -> bool {
        if self.contains(&entry.connection_id) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    pub fn remove_by_connection(&mut self, connection_id: &ConnectionId) -> Option<WaitingEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.connection_id == *connection_id)?;
        self.entries.remove(idx)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.entries.iter().any(|e| e.connection_id == *connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pop the oldest live entry that is not `exclude`.
    pub fn find_partner(
        &mut self,
        exclude: &ConnectionId,
        is_live: impl Fn(&ConnectionId) -> bool,
    ) -> Option<WaitingEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.connection_id != *exclude && is_live(&e.connection_id))?;
        self.entries.remove(idx)
    }

    /// Score every live profiled entry against `profile` and pop the best
    /// one, provided it reaches `threshold`. Ties go to the earliest entry.
    pub fn find_best_match(
        &mut self,
        exclude: &ConnectionId,
        profile: &Profile,
        threshold: u8,
        is_live: impl Fn(&ConnectionId) -> bool,
    ) -> Option<BestMatch> {
        let mut best: Option<(usize, MatchScore)> = None;

        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.connection_id == *exclude || !is_live(&entry.connection_id) {
                continue;
            }
            let Some(theirs) = entry.profile.as_ref().filter(|p| p.is_valid()) else {
                continue;
            };

            let score = profile::score(profile, theirs);
            let better = match &best {
                Some((_, current)) => score.value > current.value,
                None => true,
            };
            if better {
                best = Some((idx, score));
            }
        }

        let (idx, score) = best.filter(|(_, s)| s.value >= threshold)?;
        let entry = self.entries.remove(idx)?;
        Some(BestMatch { entry, score })
    }
}

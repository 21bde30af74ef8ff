//! Creator-priority ordering of candidate sets.

use crate::sets::ArtSet;

/// Rank given to creators not present in the priority list. Greater than
/// any explicit rank, so unknown creators sort last but are still present.
pub const UNRANKED: usize = usize::MAX;

/// Ordered creator preference supplied by configuration.
#[derive(Debug, Clone, Default)]
pub struct PriorityRanking {
    pub priority_usernames: Vec<String>,
    pub only_priority_usernames: bool,
}

impl PriorityRanking {
    pub fn new(priority_usernames: Vec<String>, only_priority_usernames: bool) -> Self {
        Self {
            priority_usernames,
            only_priority_usernames,
        }
    }

    /// Index of the creator in the priority list, or [`UNRANKED`].
    /// Lower is preferred.
    pub fn rank(&self, username: &str) -> usize {
        self.priority_usernames
            .iter()
            .position(|u| u == username)
            .unwrap_or(UNRANKED)
    }

    /// Order candidate sets: for each priority username in order, that
    /// user's sets preserving the provider's relative order, then (unless
    /// `only_priority_usernames`) every remaining set in original order.
    ///
    /// The iterator is lazy so a consumer can stop pulling as soon as an
    /// entity's artwork is fully resolved.
    pub fn order(&self, sets: Vec<ArtSet>) -> RankedSets<'_> {
        RankedSets {
            ranking: self,
            sets: sets.into_iter().map(Some).collect(),
            phase: 0,
            pos: 0,
        }
    }
}

/// See [`PriorityRanking::order`]. Each phase scans the backing vec once;
/// yielded sets are taken out of their slot so later phases skip them.
#[derive(Debug)]
pub struct RankedSets<'a> {
    ranking: &'a PriorityRanking,
    sets: Vec<Option<ArtSet>>,
    phase: usize,
    pos: usize,
}

impl Iterator for RankedSets<'_> {
    type Item = ArtSet;

    fn next(&mut self) -> Option<ArtSet> {
        while self.phase < self.ranking.priority_usernames.len() {
            let username = &self.ranking.priority_usernames[self.phase];
            while self.pos < self.sets.len() {
                let pos = self.pos;
                self.pos += 1;
                if self.sets[pos]
                    .as_ref()
                    .is_some_and(|s| &s.username == username)
                {
                    return self.sets[pos].take();
                }
            }
            self.phase += 1;
            self.pos = 0;
        }
        if self.ranking.only_priority_usernames {
            return None;
        }
        while self.pos < self.sets.len() {
            let pos = self.pos;
            self.pos += 1;
            if let Some(set) = self.sets[pos].take() {
                return Some(set);
            }
        }
        None
    }
}

use std::collections::{BTreeSet, HashMap};

use crate::models::{NextEpisodeState, ShowId};

/// Disjoint browse buckets over the resolved shows.
///
/// A show whose resolved next episode is the first of a season sits in
/// `start_fresh`; everything else is mid-season and sits in
/// `continue_watching`. Fully watched or excluded shows appear in neither.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowBuckets {
    pub start_fresh: BTreeSet<ShowId>,
    pub continue_watching: BTreeSet<ShowId>,
}

impl ShowBuckets {
    /// Project the resolution map into buckets.
    pub fn project(states: &HashMap<ShowId, NextEpisodeState>) -> Self {
        let mut buckets = Self::default();
        for (show_id, state) in states {
            if state.resolved_episode == 1 {
                buckets.start_fresh.insert(show_id.clone());
            } else {
                buckets.continue_watching.insert(show_id.clone());
            }
        }
        buckets
    }

    pub fn contains(&self, show_id: &ShowId) -> bool {
        self.start_fresh.contains(show_id) || self.continue_watching.contains(show_id)
    }

    pub fn len(&self) -> usize {
        self.start_fresh.len() + self.continue_watching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start_fresh.is_empty() && self.continue_watching.is_empty()
    }
}

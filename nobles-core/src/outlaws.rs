//! Per-noble ban lists.

use crate::party::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `peasant` may not pledge allegiance to `noble`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outlaw {
    pub noble: PlayerId,
    pub peasant: PlayerId,
}

/// Every outlaw entry in a party.
///
/// Entries never expire on their own. They are purged all at once when the
/// banning noble loses their title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlawRegistry {
    entries: BTreeSet<Outlaw>,
}

impl OutlawRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ban. Returns `false` if the pair was already banned.
    pub fn record(&mut self, noble: PlayerId, peasant: PlayerId) -> bool {
        self.entries.insert(Outlaw { noble, peasant })
    }

    pub fn is_banned(&self, noble: PlayerId, peasant: PlayerId) -> bool {
        self.entries.contains(&Outlaw { noble, peasant })
    }

    /// Drop every ban issued by `noble`, returning how many were removed.
    pub fn purge_noble(&mut self, noble: PlayerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|o| o.noble != noble);
        before - self.entries.len()
    }

    /// Peasants banned by `noble`.
    pub fn banned_by(&self, noble: PlayerId) -> impl Iterator<Item = PlayerId> + '_ {
        self.entries
            .iter()
            .filter(move |o| o.noble == noble)
            .map(|o| o.peasant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outlaw> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Party state: players, roles and the read-only views over them.
//!
//! A `Party` is the full snapshot the rules engine works on. It holds
//! every player row, the party's configuration and the outlaw registry.

use crate::config::PartyConfig;
use crate::outlaws::OutlawRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names are compared case-insensitively and without surrounding whitespace.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// Players
// ============================================================================

/// A player's role in the party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Noble,
    Peasant,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Status::Noble => "noble",
            Status::Peasant => "peasant",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One signed-in participant within a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Normalized name, unique within the party.
    pub name: String,
    pub status: Status,
    pub coin: u64,
    /// Drinks bought so far. Only used as a tie-break.
    pub drinks: u32,
    /// The noble this player serves. Always `None` for nobles.
    pub allegiance: Option<PlayerId>,
    /// For nobles: one for themselves plus one per allied peasant. Zero for peasants.
    pub soldiers: u32,
}

impl Player {
    /// Create a noble with their own garrison of one.
    pub fn noble(name: &str, coin: u64) -> Self {
        Self {
            id: PlayerId::new(),
            name: normalize_name(name),
            status: Status::Noble,
            coin,
            drinks: 0,
            allegiance: None,
            soldiers: 1,
        }
    }

    /// Create an unallied peasant.
    pub fn peasant(name: &str, coin: u64) -> Self {
        Self {
            id: PlayerId::new(),
            name: normalize_name(name),
            status: Status::Peasant,
            coin,
            drinks: 0,
            allegiance: None,
            soldiers: 0,
        }
    }

    pub fn is_noble(&self) -> bool {
        self.status == Status::Noble
    }

    pub fn is_peasant(&self) -> bool {
        self.status == Status::Peasant
    }
}

// ============================================================================
// Invariants
// ============================================================================

/// The first broken invariant found by [`Party::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A noble points at another player.
    NobleWithAllegiance { noble: String },
    /// A peasant serves someone who is not a noble (or not in the party).
    AllegianceToNonNoble { peasant: String },
    /// A stored soldier count disagrees with the allegiance pointers.
    SoldierMiscount {
        player: String,
        stored: u32,
        expected: u32,
    },
    /// An outlaw entry names a banning player who is no longer a noble.
    StaleOutlaw { noble: PlayerId },
    /// Two players share a name.
    DuplicateName { name: String },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::NobleWithAllegiance { noble } => {
                write!(f, "noble {noble} is allied to another player")
            }
            InvariantViolation::AllegianceToNonNoble { peasant } => {
                write!(f, "peasant {peasant} is allied to someone who is not a noble")
            }
            InvariantViolation::SoldierMiscount {
                player,
                stored,
                expected,
            } => write!(f, "{player} has {stored} soldiers but should have {expected}"),
            InvariantViolation::StaleOutlaw { noble } => {
                write!(f, "outlaw entry left behind by former noble {noble}")
            }
            InvariantViolation::DuplicateName { name } => {
                write!(f, "more than one player is named {name}")
            }
        }
    }
}

// ============================================================================
// Party
// ============================================================================

/// One game of Nobles and Peasants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub name: String,
    pub config: PartyConfig,
    pub players: Vec<Player>,
    pub outlaws: OutlawRegistry,
}

impl Party {
    pub fn new(name: impl Into<String>, config: PartyConfig) -> Self {
        Self {
            id: PartyId::new(),
            name: normalize_name(&name.into()),
            config,
            players: Vec::new(),
            outlaws: OutlawRegistry::new(),
        }
    }

    /// Seed the party with rows loaded from elsewhere.
    ///
    /// Direct insertion bypasses the rules engine; callers are
    /// responsible for handing over a consistent set of rows.
    pub fn with_players(mut self, players: impl IntoIterator<Item = Player>) -> Self {
        self.players.extend(players);
        self
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Look a player up by name. The name is normalized first.
    pub fn find(&self, name: &str) -> Option<&Player> {
        let name = normalize_name(name);
        self.players.iter().find(|p| p.name == name)
    }

    pub fn nobles(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_noble())
    }

    pub fn peasants(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_peasant())
    }

    /// Players currently allied to `noble`, excluding the noble.
    pub fn subjects_of(&self, noble: PlayerId) -> impl Iterator<Item = &Player> {
        self.players
            .iter()
            .filter(move |p| p.allegiance == Some(noble) && p.id != noble)
    }

    /// The soldier count `player` should have given current allegiances.
    pub fn expected_soldiers(&self, player: PlayerId) -> u32 {
        match self.player(player) {
            Some(p) if p.is_noble() => 1 + self.subjects_of(player).count() as u32,
            _ => 0,
        }
    }

    pub fn total_coin(&self) -> u64 {
        self.players.iter().map(|p| p.coin).sum()
    }

    /// All player names, alphabetically.
    pub fn player_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.players.iter().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }

    /// Names of every current noble, alphabetically.
    pub fn noble_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.nobles().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }

    /// The kingdom listing: every player ordered by name.
    pub fn kingdom(&self) -> Vec<&Player> {
        let mut players: Vec<_> = self.players.iter().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        players
    }

    /// Nobles ranked by soldiers, then coin, then drinks.
    pub fn leaderboard(&self) -> Vec<&Player> {
        let mut nobles: Vec<_> = self.nobles().collect();
        nobles.sort_by(|a, b| {
            b.soldiers
                .cmp(&a.soldiers)
                .then(b.coin.cmp(&a.coin))
                .then(b.drinks.cmp(&a.drinks))
                .then(a.name.cmp(&b.name))
        });
        nobles
    }

    /// The noble commanding the largest army.
    pub fn almighty_ruler(&self) -> Option<&Player> {
        self.leaderboard().into_iter().next()
    }

    /// Verify the role, allegiance, soldier and outlaw invariants.
    ///
    /// Names and allegiance pointers are checked for every player before any
    /// soldier count, so a bad pointer is reported ahead of the miscount it
    /// causes.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (i, player) in self.players.iter().enumerate() {
            if self.players[..i].iter().any(|p| p.name == player.name) {
                return Err(InvariantViolation::DuplicateName {
                    name: player.name.clone(),
                });
            }

            match (player.status, player.allegiance) {
                (Status::Noble, Some(_)) => {
                    return Err(InvariantViolation::NobleWithAllegiance {
                        noble: player.name.clone(),
                    });
                }
                (Status::Peasant, Some(noble)) => {
                    if !self.player(noble).is_some_and(Player::is_noble) {
                        return Err(InvariantViolation::AllegianceToNonNoble {
                            peasant: player.name.clone(),
                        });
                    }
                }
                _ => {}
            }
        }

        for player in &self.players {
            let expected = self.expected_soldiers(player.id);
            if player.soldiers != expected {
                return Err(InvariantViolation::SoldierMiscount {
                    player: player.name.clone(),
                    stored: player.soldiers,
                    expected,
                });
            }
        }

        for outlaw in self.outlaws.iter() {
            if !self.player(outlaw.noble).is_some_and(Player::is_noble) {
                return Err(InvariantViolation::StaleOutlaw {
                    noble: outlaw.noble,
                });
            }
        }

        Ok(())
    }
}

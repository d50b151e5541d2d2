//! Testing utilities for Nobles and Peasants.
//!
//! `TestHarness` seeds a party row by row, bypassing sign-in, then runs
//! intents through the real rules engine with a fixed seed. The assertion
//! helpers panic with descriptive messages and are meant for tests only.

use crate::config::PartyConfig;
use crate::party::{Party, Player, Status};
use crate::rules::{apply_effects, Intent, Resolution, RuleError, RulesEngine, StatusChoice};

/// Test harness for scripted party scenarios.
pub struct TestHarness {
    pub engine: RulesEngine,
    pub party: Party,
    /// Narratives of every accepted intent, oldest first.
    pub narratives: Vec<String>,
}

impl TestHarness {
    /// A harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PartyConfig::default())
    }

    pub fn with_config(config: PartyConfig) -> Self {
        Self {
            engine: RulesEngine::seeded(7),
            party: Party::new("Test Party", config),
            narratives: Vec::new(),
        }
    }

    /// Seed a noble with the given coin.
    pub fn noble(&mut self, name: &str, coin: u64) -> &mut Self {
        self.party.players.push(Player::noble(name, coin));
        self
    }

    /// Seed an unallied peasant with the given coin.
    pub fn peasant(&mut self, name: &str, coin: u64) -> &mut Self {
        self.party.players.push(Player::peasant(name, coin));
        self
    }

    /// Point a seeded peasant at a seeded noble and fix up soldier counts.
    #[track_caller]
    pub fn allied(&mut self, peasant: &str, noble: &str) -> &mut Self {
        let noble = self.player(noble).id;
        let peasant = self.player(peasant).id;
        if let Some(p) = self.party.player_mut(peasant) {
            p.allegiance = Some(noble);
        }
        self.recount();
        self
    }

    /// Set how many drinks a seeded player has had.
    #[track_caller]
    pub fn drinks(&mut self, name: &str, drinks: u32) -> &mut Self {
        let id = self.player(name).id;
        if let Some(p) = self.party.player_mut(id) {
            p.drinks = drinks;
        }
        self
    }

    fn recount(&mut self) {
        let counts: Vec<_> = self
            .party
            .players
            .iter()
            .map(|p| self.party.expected_soldiers(p.id))
            .collect();
        for (player, soldiers) in self.party.players.iter_mut().zip(counts) {
            player.soldiers = soldiers;
        }
    }

    /// Resolve an intent and apply its effects.
    pub fn act(&mut self, intent: Intent) -> Result<Resolution, RuleError> {
        let resolution = self.engine.resolve(&self.party, intent)?;
        apply_effects(&mut self.party, &resolution.effects);
        self.narratives.push(resolution.narrative.clone());
        Ok(resolution)
    }

    pub fn sign_in(&mut self, name: &str, status: StatusChoice) -> Result<Resolution, RuleError> {
        self.act(Intent::SignIn {
            name: name.to_string(),
            status,
        })
    }

    pub fn pledge(&mut self, player: &str, noble: &str) -> Result<Resolution, RuleError> {
        self.act(Intent::PledgeAllegiance {
            player: player.to_string(),
            noble: noble.to_string(),
        })
    }

    pub fn buy(
        &mut self,
        player: &str,
        drink: &str,
        quantity: u32,
    ) -> Result<Resolution, RuleError> {
        self.act(Intent::BuyDrink {
            player: player.to_string(),
            drink: drink.to_string(),
            quantity,
        })
    }

    pub fn ban(&mut self, noble: &str, peasant: &str) -> Result<Resolution, RuleError> {
        self.act(Intent::Ban {
            noble: noble.to_string(),
            peasant: peasant.to_string(),
        })
    }

    /// Report a duel where `challenger` attacked `target` and `winner` won.
    pub fn duel(
        &mut self,
        challenger: &str,
        target: &str,
        winner: &str,
    ) -> Result<Resolution, RuleError> {
        self.act(Intent::Duel {
            challenger: challenger.to_string(),
            target: target.to_string(),
            winner: winner.to_string(),
        })
    }

    #[track_caller]
    pub fn player(&self, name: &str) -> &Player {
        self.party
            .find(name)
            .unwrap_or_else(|| panic!("Expected {name} to be in the party"))
    }

    #[track_caller]
    pub fn coin(&self, name: &str) -> u64 {
        self.player(name).coin
    }

    #[track_caller]
    pub fn soldiers(&self, name: &str) -> u32 {
        self.player(name).soldiers
    }

    #[track_caller]
    pub fn status(&self, name: &str) -> Status {
        self.player(name).status
    }

    /// Name of the noble `name` serves, if any.
    #[track_caller]
    pub fn liege(&self, name: &str) -> Option<&str> {
        self.player(name)
            .allegiance
            .and_then(|id| self.party.player(id))
            .map(|p| p.name.as_str())
    }

    pub fn last_narrative(&self) -> Option<&str> {
        self.narratives.last().map(String::as_str)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that every party invariant holds.
#[track_caller]
pub fn assert_consistent(harness: &TestHarness) {
    if let Err(violation) = harness.party.check_invariants() {
        panic!("Expected a consistent party, but {violation}");
    }
}

#[track_caller]
pub fn assert_noble(harness: &TestHarness, name: &str) {
    assert_eq!(
        harness.status(name),
        Status::Noble,
        "Expected {name} to be a noble"
    );
}

#[track_caller]
pub fn assert_peasant(harness: &TestHarness, name: &str) {
    assert_eq!(
        harness.status(name),
        Status::Peasant,
        "Expected {name} to be a peasant"
    );
}

/// Assert that `peasant` serves `noble`.
#[track_caller]
pub fn assert_allied(harness: &TestHarness, peasant: &str, noble: &str) {
    assert_eq!(
        harness.liege(peasant),
        Some(noble),
        "Expected {peasant} to serve {noble}"
    );
}

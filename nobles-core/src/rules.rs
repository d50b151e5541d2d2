//! Nobles and Peasants rules engine with Intent/Effect system.
//!
//! This module implements the action pipeline:
//! 1. The caller builds an Intent from what a player asked to do
//! 2. RulesEngine validates the Intent against a party snapshot
//! 3. Effects are produced that describe state changes
//! 4. Effects are applied to the Party
//!
//! Resolution never mutates the party it is given. A rejected intent
//! produces a `RuleError` and no effects at all.

use crate::config::Difficulty;
use crate::exchange::{DuelOutcome, Transition};
use crate::party::{normalize_name, Party, Player, PlayerId, Status};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Reasons an intent is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Unsuccessful! {0} is not in the party.")]
    UnknownPlayer(String),

    #[error("Unsuccessful! {player} is not a {expected}.")]
    InvalidRole { player: String, expected: Status },

    #[error("Unsuccessful! You cannot {0} yourself!")]
    SelfTargeting(&'static str),

    #[error("Unsuccessful! {noble} has banned {peasant} from their kingdom!")]
    Banned { noble: String, peasant: String },

    #[error("Unsuccessful! There is no peasant who could take the title.")]
    NoEligiblePeasant,

    #[error("Unsuccessful! Please enter a name.")]
    InvalidName,

    #[error("Unsuccessful! Please choose a different name. Someone already selected {0}.")]
    NameTaken(String),

    #[error("Unsuccessful! {0} needs to ally themselves to a noble before buying a drink.")]
    NotAllied(String),

    #[error("Unsuccessful! {0} is not on the drink menu.")]
    UnknownDrink(String),

    #[error("Unsuccessful! You must buy at least one drink.")]
    InvalidQuantity,

    #[error("Unsuccessful! You need {needed} coin to assassinate a noble.")]
    InsufficientCoin { needed: u64 },

    #[error("Unsuccessful! {0} did not take part in this duel.")]
    NotADuelist(String),

    #[error("Unsuccessful! There are no {0} quests in this party.")]
    NoQuestAvailable(Difficulty),
}

/// Which role a signing-in player asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChoice {
    Noble,
    Peasant,
    /// Let the party balance decide.
    Random,
}

/// An intent represents what a player wants to do.
/// Names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Join the party
    SignIn { name: String, status: StatusChoice },

    /// Swear allegiance to a noble
    PledgeAllegiance { player: String, noble: String },

    /// Buy drinks on your noble's tab
    BuyDrink {
        player: String,
        drink: String,
        quantity: u32,
    },

    /// A noble bans a peasant from their kingdom
    Ban { noble: String, peasant: String },

    /// Draw a random quest
    RequestQuest {
        player: String,
        difficulty: Difficulty,
    },

    /// Report whether a quest was completed
    CompleteQuest {
        player: String,
        difficulty: Difficulty,
        completed: bool,
    },

    /// Declare an assassination attempt and draw the duel challenge
    Challenge { challenger: String, target: String },

    /// Report who won an assassination duel
    Duel {
        challenger: String,
        target: String,
        winner: String,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::SignIn { .. } => "sign_in",
            Intent::PledgeAllegiance { .. } => "pledge_allegiance",
            Intent::BuyDrink { .. } => "buy_drink",
            Intent::Ban { .. } => "ban",
            Intent::RequestQuest { .. } => "request_quest",
            Intent::CompleteQuest { .. } => "complete_quest",
            Intent::Challenge { .. } => "challenge",
            Intent::Duel { .. } => "duel",
        }
    }
}

/// The result of resolving an intent.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub effects: Vec<Effect>,
    pub narrative: String,
}

impl Resolution {
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            effects: Vec::new(),
            narrative: narrative.into(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Effects are the result of resolving an intent.
/// They describe concrete state changes to apply to the Party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// A player signed in
    PlayerJoined { player: Player },

    /// All of one player's coin went to another
    CoinTransferred {
        from: PlayerId,
        to: PlayerId,
        amount: u64,
    },

    /// A noble paid for drinks
    CoinSpent {
        player: PlayerId,
        amount: u64,
        new_total: u64,
    },

    /// A quest reward was paid
    CoinEarned {
        player: PlayerId,
        amount: u64,
        new_total: u64,
    },

    /// A new noble's treasury was topped up to the starting stake
    CoinFloored {
        player: PlayerId,
        previous: u64,
        new_total: u64,
    },

    /// A player drank
    DrinksBought {
        player: PlayerId,
        quantity: u32,
        new_total: u32,
    },

    /// A player's allegiance pointer moved
    AllegianceChanged {
        player: PlayerId,
        previous: Option<PlayerId>,
        noble: Option<PlayerId>,
    },

    /// A soldier count was recomputed from allegiances
    SoldiersRecounted { noble: PlayerId, soldiers: u32 },

    /// A player became a noble or a peasant
    StatusChanged { player: PlayerId, status: Status },

    /// A noble banned a peasant
    OutlawRecorded { noble: PlayerId, peasant: PlayerId },

    /// A former noble's ban list was cleared
    OutlawsPurged { noble: PlayerId, count: usize },
}

/// The rules engine resolves intents into effects.
#[derive(Debug)]
pub struct RulesEngine {
    rng: StdRng,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// An engine whose random choices are reproducible.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Resolve an intent against a party snapshot.
    pub fn resolve(&mut self, party: &Party, intent: Intent) -> Result<Resolution, RuleError> {
        let kind = intent.name();
        let result = match intent {
            Intent::SignIn { name, status } => self.resolve_sign_in(party, &name, status),
            Intent::PledgeAllegiance { player, noble } => {
                self.resolve_pledge(party, &player, &noble)
            }
            Intent::BuyDrink {
                player,
                drink,
                quantity,
            } => self.resolve_buy_drink(party, &player, &drink, quantity),
            Intent::Ban { noble, peasant } => self.resolve_ban(party, &noble, &peasant),
            Intent::RequestQuest { player, difficulty } => {
                self.resolve_request_quest(party, &player, difficulty)
            }
            Intent::CompleteQuest {
                player,
                difficulty,
                completed,
            } => self.resolve_complete_quest(party, &player, difficulty, completed),
            Intent::Challenge { challenger, target } => {
                self.resolve_challenge(party, &challenger, &target)
            }
            Intent::Duel {
                challenger,
                target,
                winner,
            } => self.resolve_duel(party, &challenger, &target, &winner),
        };

        match &result {
            Ok(resolution) => debug!(
                party = %party.name,
                intent = kind,
                effects = resolution.effects.len(),
                "intent resolved"
            ),
            Err(err) => debug!(party = %party.name, intent = kind, %err, "intent rejected"),
        }
        result
    }

    fn lookup<'a>(&self, party: &'a Party, name: &str) -> Result<&'a Player, RuleError> {
        party
            .find(name)
            .ok_or_else(|| RuleError::UnknownPlayer(normalize_name(name)))
    }

    /// Role for a player who asked to be placed at random.
    ///
    /// The first two players are always nobles. After that a newcomer is
    /// made a noble three times out of four while nobles are under a fifth
    /// of the party, and a peasant otherwise.
    fn choose_status(&mut self, party: &Party) -> Status {
        let players = party.players.len();
        let nobles = party.nobles().count();
        if nobles < 2 {
            Status::Noble
        } else if (nobles as f64) / (players as f64) < 0.2 {
            if self.rng.gen_bool(0.75) {
                Status::Noble
            } else {
                Status::Peasant
            }
        } else {
            Status::Peasant
        }
    }

    fn resolve_sign_in(
        &mut self,
        party: &Party,
        name: &str,
        choice: StatusChoice,
    ) -> Result<Resolution, RuleError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(RuleError::InvalidName);
        }
        if party.find(&name).is_some() {
            return Err(RuleError::NameTaken(name));
        }

        let status = match choice {
            StatusChoice::Noble => Status::Noble,
            StatusChoice::Peasant => Status::Peasant,
            StatusChoice::Random => self.choose_status(party),
        };
        let coin = party.config.starting_coin.for_status(status);
        let player = match status {
            Status::Noble => Player::noble(&name, coin),
            Status::Peasant => Player::peasant(&name, coin),
        };

        Ok(
            Resolution::new(format!("{name} has joined the party as a {status}."))
                .with_effect(Effect::PlayerJoined { player }),
        )
    }

    fn resolve_pledge(
        &mut self,
        party: &Party,
        player_name: &str,
        noble_name: &str,
    ) -> Result<Resolution, RuleError> {
        let player = self.lookup(party, player_name)?;
        let noble = self.lookup(party, noble_name)?;

        let mut tx = Transition::new(party);
        tx.pledge_allegiance(player.id, noble.id)?;

        Ok(Resolution::new(format!(
            "{} has pledged allegiance to {}.",
            player.name, noble.name
        ))
        .with_effects(tx.into_effects()))
    }

    fn resolve_buy_drink(
        &mut self,
        party: &Party,
        player_name: &str,
        drink: &str,
        quantity: u32,
    ) -> Result<Resolution, RuleError> {
        if quantity == 0 {
            return Err(RuleError::InvalidQuantity);
        }
        let buyer = self.lookup(party, player_name)?;
        let price = party
            .config
            .drink_price(drink)
            .ok_or_else(|| RuleError::UnknownDrink(normalize_name(drink)))?;

        // Nobles drink on their own treasury
        let noble = if buyer.is_noble() {
            buyer
        } else {
            let noble_id = buyer
                .allegiance
                .ok_or_else(|| RuleError::NotAllied(buyer.name.clone()))?;
            party
                .player(noble_id)
                .ok_or_else(|| RuleError::UnknownPlayer(noble_id.to_string()))?
        };

        let cost = price.saturating_mul(u64::from(quantity));
        let mut tx = Transition::new(party);
        tx.emit(Effect::DrinksBought {
            player: buyer.id,
            quantity,
            new_total: buyer.drinks.saturating_add(quantity),
        });
        tx.emit(Effect::CoinSpent {
            player: noble.id,
            amount: cost.min(noble.coin),
            new_total: noble.coin.saturating_sub(cost),
        });

        let mut narrative = format!(
            "{} bought {} {} on {}'s tab for {} coin.",
            buyer.name,
            quantity,
            normalize_name(drink),
            noble.name,
            cost
        );

        if noble.coin <= cost {
            match tx.promote_richest_peasant(noble.id) {
                Ok(successor) => {
                    let successor = tx
                        .party()
                        .player(successor)
                        .map(|p| p.name.clone())
                        .unwrap_or_default();
                    narrative = format!(
                        "{} ran out of money! {} is now a noble!",
                        noble.name, successor
                    );
                }
                Err(RuleError::NoEligiblePeasant) => {
                    narrative = format!(
                        "{} ran out of money, but there is no peasant to take the title.",
                        noble.name
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Resolution::new(narrative).with_effects(tx.into_effects()))
    }

    fn resolve_ban(
        &mut self,
        party: &Party,
        noble_name: &str,
        peasant_name: &str,
    ) -> Result<Resolution, RuleError> {
        let noble = self.lookup(party, noble_name)?;
        let peasant = self.lookup(party, peasant_name)?;

        let mut tx = Transition::new(party);
        tx.ban(noble.id, peasant.id)?;

        Ok(
            Resolution::new(format!("{} has banned {}!", noble.name, peasant.name))
                .with_effects(tx.into_effects()),
        )
    }

    fn resolve_request_quest(
        &mut self,
        party: &Party,
        player_name: &str,
        difficulty: Difficulty,
    ) -> Result<Resolution, RuleError> {
        let player = self.lookup(party, player_name)?;
        let quest = party
            .config
            .random_quest(difficulty, &mut self.rng)
            .ok_or(RuleError::NoQuestAvailable(difficulty))?;

        Ok(Resolution::new(format!(
            "{}, your {} quest: {}",
            player.name, difficulty, quest.text
        )))
    }

    fn resolve_complete_quest(
        &mut self,
        party: &Party,
        player_name: &str,
        difficulty: Difficulty,
        completed: bool,
    ) -> Result<Resolution, RuleError> {
        let player = self.lookup(party, player_name)?;
        if !completed {
            return Ok(Resolution::new(format!(
                "{} did not complete the {} quest.",
                player.name, difficulty
            )));
        }

        let reward = party.config.quest_rewards.for_difficulty(difficulty);
        let resolution = Resolution::new(format!(
            "{} has earned {} coin for completing a {} quest!",
            player.name, reward, difficulty
        ));
        if reward == 0 {
            return Ok(resolution);
        }
        Ok(resolution.with_effect(Effect::CoinEarned {
            player: player.id,
            amount: reward,
            new_total: player.coin.saturating_add(reward),
        }))
    }

    /// Validate a pair of duelists.
    fn duelists<'a>(
        &self,
        party: &'a Party,
        challenger: &str,
        target: &str,
    ) -> Result<(&'a Player, &'a Player), RuleError> {
        let challenger = self.lookup(party, challenger)?;
        let target = self.lookup(party, target)?;
        if challenger.id == target.id {
            return Err(RuleError::SelfTargeting("assassinate"));
        }
        Ok((challenger, target))
    }

    fn resolve_challenge(
        &mut self,
        party: &Party,
        challenger: &str,
        target: &str,
    ) -> Result<Resolution, RuleError> {
        let (challenger, target) = self.duelists(party, challenger, target)?;

        // A peasant needs a noble's stake to go after a noble
        if challenger.is_peasant() && target.is_noble() {
            let needed = party.config.starting_coin.noble;
            if challenger.coin < needed {
                return Err(RuleError::InsufficientCoin { needed });
            }
        }

        let challenge = party
            .config
            .random_challenge(&mut self.rng)
            .map(|c| c.text.as_str())
            .unwrap_or("Settle it however you like");

        Ok(Resolution::new(format!(
            "{} challenges {}! {}.",
            challenger.name, target.name, challenge
        )))
    }

    fn resolve_duel(
        &mut self,
        party: &Party,
        challenger: &str,
        target: &str,
        winner: &str,
    ) -> Result<Resolution, RuleError> {
        let (challenger, target) = self.duelists(party, challenger, target)?;
        let winner = normalize_name(winner);
        let (winner, loser) = if winner == challenger.name {
            (challenger, target)
        } else if winner == target.name {
            (target, challenger)
        } else {
            return Err(RuleError::NotADuelist(winner));
        };

        let mut tx = Transition::new(party);
        let outcome = tx.resolve_duel(winner.id, loser.id)?;

        let narrative = match outcome {
            DuelOutcome::Robbery => {
                format!("{} has taken all of the coin of {}", winner.name, loser.name)
            }
            DuelOutcome::Conscription => format!(
                "{} has taken all of the coin of {} and drafted them into their army",
                winner.name, loser.name
            ),
            DuelOutcome::Usurpation => format!(
                "{} assassinated {}! {} is now a noble!",
                winner.name, loser.name, winner.name
            ),
            DuelOutcome::Regicide {
                successor: Some(successor),
            } => format!(
                "{} assassinated {}! {} is now a noble!",
                winner.name,
                loser.name,
                tx.party()
                    .player(successor)
                    .map(|p| p.name.as_str())
                    .unwrap_or_default()
            ),
            DuelOutcome::Regicide { successor: None } => format!(
                "{} assassinated {}! No peasant remains to take the title.",
                winner.name, loser.name
            ),
        };

        Ok(Resolution::new(narrative).with_effects(tx.into_effects()))
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a list of effects to the party.
pub fn apply_effects(party: &mut Party, effects: &[Effect]) {
    for effect in effects {
        apply_effect(party, effect);
    }
}

/// Apply a single effect to the party.
pub fn apply_effect(party: &mut Party, effect: &Effect) {
    match effect {
        Effect::PlayerJoined { player } => {
            party.players.push(player.clone());
        }
        Effect::CoinTransferred { from, to, amount } => {
            if let Some(p) = party.player_mut(*from) {
                p.coin = p.coin.saturating_sub(*amount);
            }
            if let Some(p) = party.player_mut(*to) {
                p.coin = p.coin.saturating_add(*amount);
            }
        }
        Effect::CoinSpent { player, amount, .. } => {
            if let Some(p) = party.player_mut(*player) {
                p.coin = p.coin.saturating_sub(*amount);
            }
        }
        Effect::CoinEarned { player, amount, .. } => {
            if let Some(p) = party.player_mut(*player) {
                p.coin = p.coin.saturating_add(*amount);
            }
        }
        Effect::CoinFloored {
            player, new_total, ..
        } => {
            if let Some(p) = party.player_mut(*player) {
                p.coin = p.coin.max(*new_total);
            }
        }
        Effect::DrinksBought {
            player, quantity, ..
        } => {
            if let Some(p) = party.player_mut(*player) {
                p.drinks = p.drinks.saturating_add(*quantity);
            }
        }
        Effect::AllegianceChanged { player, noble, .. } => {
            if let Some(p) = party.player_mut(*player) {
                p.allegiance = *noble;
            }
        }
        Effect::SoldiersRecounted { noble, soldiers } => {
            if let Some(p) = party.player_mut(*noble) {
                p.soldiers = *soldiers;
            }
        }
        Effect::StatusChanged { player, status } => {
            if let Some(p) = party.player_mut(*player) {
                p.status = *status;
            }
        }
        Effect::OutlawRecorded { noble, peasant } => {
            party.outlaws.record(*noble, *peasant);
        }
        Effect::OutlawsPurged { noble, .. } => {
            party.outlaws.purge_noble(*noble);
        }
    }
}

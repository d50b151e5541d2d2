//! Per-party configuration: drink menu, starting stakes, quests and duel challenges.

use crate::party::{normalize_name, Status};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from party setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown quest difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("Unsuccessful! {0}")]
    RewardsOutOfOrder(&'static str),

    #[error("Unsuccessful! Quest ID: {0} is not registered in your party.")]
    UnknownQuest(u32),

    #[error("Unsuccessful! Challenge ID: {0} is not registered in your party.")]
    UnknownChallenge(u32),

    #[error("Unsuccessful! {0} cannot be empty.")]
    EmptyText(&'static str),

    #[error("Unsuccessful! {drink} must cost at least 1 coin.")]
    InvalidPrice { drink: String },
}

/// Quest difficulty levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn name(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn all() -> [Difficulty; 3] {
        [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ConfigError::UnknownDifficulty(s.to_string())),
        }
    }
}

/// Coin handed out at sign-in, by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingCoin {
    pub noble: u64,
    pub peasant: u64,
}

impl StartingCoin {
    pub fn for_status(&self, status: Status) -> u64 {
        match status {
            Status::Noble => self.noble,
            Status::Peasant => self.peasant,
        }
    }
}

impl Default for StartingCoin {
    fn default() -> Self {
        Self {
            noble: 100,
            peasant: 20,
        }
    }
}

/// Coin paid out for completing a quest of each difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestRewards {
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
}

impl QuestRewards {
    /// Rewards must not decrease with difficulty.
    pub fn new(easy: u64, medium: u64, hard: u64) -> Result<Self, ConfigError> {
        if medium < easy {
            return Err(ConfigError::RewardsOutOfOrder(
                "Medium reward cannot be less than easy reward",
            ));
        }
        if hard < medium {
            return Err(ConfigError::RewardsOutOfOrder(
                "Hard reward cannot be less than medium reward",
            ));
        }
        Ok(Self { easy, medium, hard })
    }

    pub fn for_difficulty(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

impl Default for QuestRewards {
    fn default() -> Self {
        Self {
            easy: 10,
            medium: 25,
            hard: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: u32,
    pub text: String,
    pub difficulty: Difficulty,
}

/// A task two duelists perform to decide an assassination attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: u32,
    pub text: String,
}

/// Configuration for one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyConfig {
    /// Drink name to price per drink.
    pub drinks: BTreeMap<String, u64>,
    pub starting_coin: StartingCoin,
    pub quest_rewards: QuestRewards,
    pub quests: Vec<Quest>,
    pub challenges: Vec<Challenge>,
    /// Next id handed to an added quest or challenge.
    next_id: u32,
}

impl Default for PartyConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        for (drink, price) in [("beer", 10), ("wine", 15), ("cocktail", 20), ("shot", 25)] {
            config.drinks.insert(drink.to_string(), price);
        }
        for (text, difficulty) in [
            ("Compliment three strangers on their shoes", Difficulty::Easy),
            ("Get the bartender to tell you a joke", Difficulty::Easy),
            ("Convince someone to swap hats with you", Difficulty::Medium),
            ("Learn the middle name of five people", Difficulty::Medium),
            ("Lead the whole room in a toast", Difficulty::Hard),
            ("Get a stranger to sing a verse with you", Difficulty::Hard),
        ] {
            config.push_quest(text.to_string(), difficulty);
        }
        for text in [
            "Rock, paper, scissors: best of three",
            "Thumb war",
            "Staring contest",
            "Arm wrestling",
        ] {
            config.push_challenge(text.to_string());
        }
        config
    }
}

impl PartyConfig {
    /// A configuration with no drinks, quests or challenges.
    pub fn empty() -> Self {
        Self {
            drinks: BTreeMap::new(),
            starting_coin: StartingCoin::default(),
            quest_rewards: QuestRewards::default(),
            quests: Vec::new(),
            challenges: Vec::new(),
            next_id: 1,
        }
    }

    /// Add a drink to the menu.
    pub fn with_drink(mut self, name: &str, price: u64) -> Self {
        self.drinks.insert(normalize_name(name), price);
        self
    }

    /// Set the starting coin for both roles.
    pub fn with_starting_coin(mut self, noble: u64, peasant: u64) -> Self {
        self.starting_coin = StartingCoin { noble, peasant };
        self
    }

    /// Set the quest reward table.
    pub fn with_quest_rewards(mut self, rewards: QuestRewards) -> Self {
        self.quest_rewards = rewards;
        self
    }

    /// Add a quest.
    pub fn with_quest(mut self, text: &str, difficulty: Difficulty) -> Self {
        self.push_quest(text.trim().to_string(), difficulty);
        self
    }

    /// Add a duel challenge.
    pub fn with_challenge(mut self, text: &str) -> Self {
        self.push_challenge(text.trim().to_string());
        self
    }

    /// Add a drink, or re-price it if it is already on the menu.
    pub fn set_drink(&mut self, name: &str, price: u64) -> Result<(), ConfigError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(ConfigError::EmptyText("Drink name"));
        }
        if price == 0 {
            return Err(ConfigError::InvalidPrice { drink: name });
        }
        self.drinks.insert(name, price);
        Ok(())
    }

    pub fn drink_price(&self, name: &str) -> Option<u64> {
        self.drinks.get(&normalize_name(name)).copied()
    }

    /// Drinks ordered from cheapest to most expensive.
    pub fn menu(&self) -> Vec<(&str, u64)> {
        let mut menu: Vec<_> = self.drinks.iter().map(|(n, p)| (n.as_str(), *p)).collect();
        menu.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
        menu
    }

    pub fn set_noble_starting_coin(&mut self, coin: u64) {
        self.starting_coin.noble = coin;
    }

    pub fn set_quest_rewards(
        &mut self,
        easy: u64,
        medium: u64,
        hard: u64,
    ) -> Result<(), ConfigError> {
        self.quest_rewards = QuestRewards::new(easy, medium, hard)?;
        Ok(())
    }

    /// Add a quest, returning its id.
    pub fn add_quest(&mut self, text: &str, difficulty: Difficulty) -> Result<u32, ConfigError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConfigError::EmptyText("Quest"));
        }
        Ok(self.push_quest(text.to_string(), difficulty))
    }

    pub fn remove_quest(&mut self, id: u32) -> Result<Quest, ConfigError> {
        let index = self
            .quests
            .iter()
            .position(|q| q.id == id)
            .ok_or(ConfigError::UnknownQuest(id))?;
        Ok(self.quests.remove(index))
    }

    /// Add a duel challenge, returning its id.
    pub fn add_challenge(&mut self, text: &str) -> Result<u32, ConfigError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConfigError::EmptyText("Challenge"));
        }
        Ok(self.push_challenge(text.to_string()))
    }

    pub fn remove_challenge(&mut self, id: u32) -> Result<Challenge, ConfigError> {
        let index = self
            .challenges
            .iter()
            .position(|c| c.id == id)
            .ok_or(ConfigError::UnknownChallenge(id))?;
        Ok(self.challenges.remove(index))
    }

    pub fn random_quest<R: Rng + ?Sized>(
        &self,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<&Quest> {
        let pool: Vec<_> = self
            .quests
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .collect();
        pool.choose(rng).copied()
    }

    pub fn random_challenge<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Challenge> {
        self.challenges.choose(rng)
    }

    fn push_quest(&mut self, text: String, difficulty: Difficulty) -> u32 {
        let id = self.take_id();
        self.quests.push(Quest {
            id,
            text,
            difficulty,
        });
        id
    }

    fn push_challenge(&mut self, text: String) -> u32 {
        let id = self.take_id();
        self.challenges.push(Challenge { id, text });
        id
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

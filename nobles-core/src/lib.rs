//! Nobles and Peasants: a drinking-party role-exchange game engine.
//!
//! This crate provides:
//! - Party state with nobles, peasants, allegiances and soldier counts
//! - Intent/Effect rules system where a rejected intent changes nothing
//! - Per-party configuration of drinks, starting coin, quests and challenges
//! - A `Tavern` that serializes transitions per party
//! - JSON persistence of parties
//!
//! # Quick Start
//!
//! ```ignore
//! use nobles_core::{Intent, PartyConfig, StatusChoice, Tavern};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tavern = Tavern::new();
//!     let party = tavern.open_party("friday", PartyConfig::default()).await?;
//!
//!     let response = tavern
//!         .act(party, Intent::SignIn { name: "ada".into(), status: StatusChoice::Noble })
//!         .await?;
//!     println!("{}", response.narrative);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod exchange;
pub mod outlaws;
pub mod party;
pub mod persist;
pub mod rules;
pub mod session;
pub mod testing;

// Primary public API
pub use config::{ConfigError, Difficulty, PartyConfig, QuestRewards, StartingCoin};
pub use party::{Party, PartyId, Player, PlayerId, Status};
pub use persist::{PersistError, SavedParty};
pub use rules::{Effect, Intent, Resolution, RuleError, RulesEngine, StatusChoice};
pub use session::{GameSession, Response, SessionError, Tavern};
pub use testing::TestHarness;

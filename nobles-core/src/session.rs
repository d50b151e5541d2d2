//! GameSession and Tavern - the primary public API for running parties.
//!
//! A `GameSession` owns one party and the rules engine that drives it.
//! The `Tavern` keeps every open party behind its own lock, so each party
//! handles one transition at a time while separate parties never wait on
//! each other.

use crate::config::{ConfigError, PartyConfig};
use crate::party::{normalize_name, Party, PartyId};
use crate::persist::{PersistError, SavedParty};
use crate::rules::{apply_effects, Effect, Intent, RuleError, RulesEngine};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

/// Errors from GameSession and Tavern operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Unsuccessful! No party with id {0} is open.")]
    UnknownParty(PartyId),

    #[error("Unsuccessful! A party named {0} already exists.")]
    PartyNameTaken(String),
}

/// Response from a player action.
#[derive(Debug, Clone)]
pub struct Response {
    /// Message to show the players.
    pub narrative: String,

    /// Effects that were applied to the party.
    pub effects: Vec<Effect>,
}

/// One running party.
#[derive(Debug)]
pub struct GameSession {
    party: Party,
    engine: RulesEngine,
}

impl GameSession {
    /// Start a fresh party.
    pub fn new(name: impl Into<String>, config: PartyConfig) -> Self {
        Self::with_party(Party::new(name, config), RulesEngine::new())
    }

    /// Resume a party with a given engine.
    pub fn with_party(party: Party, engine: RulesEngine) -> Self {
        Self { party, engine }
    }

    /// Load a saved party from a file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let saved = SavedParty::load_json(path).await?;
        Ok(Self::with_party(saved.party, RulesEngine::new()))
    }

    /// Save the current party to a file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        SavedParty::new(self.party.clone()).save_json(path).await
    }

    /// Resolve an intent and apply its effects.
    ///
    /// A rejected intent leaves the party exactly as it was.
    pub fn act(&mut self, intent: Intent) -> Result<Response, RuleError> {
        let resolution = self.engine.resolve(&self.party, intent)?;
        apply_effects(&mut self.party, &resolution.effects);

        if let Err(violation) = self.party.check_invariants() {
            error!(party = %self.party.name, %violation, "party invariants broken");
        }

        Ok(Response {
            narrative: resolution.narrative,
            effects: resolution.effects,
        })
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn id(&self) -> PartyId {
        self.party.id
    }

    pub fn name(&self) -> &str {
        &self.party.name
    }

    /// Party setup: drinks, starting coin, quests and challenges.
    pub fn config_mut(&mut self) -> &mut PartyConfig {
        &mut self.party.config
    }
}

/// A session shared between request handlers.
pub type SharedSession = Arc<Mutex<GameSession>>;

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<PartyId, SharedSession>,
    names: HashMap<String, PartyId>,
}

/// Every open party, each behind its own lock.
#[derive(Debug, Default)]
pub struct Tavern {
    registry: RwLock<Registry>,
}

impl Tavern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new party. Party names are unique, ignoring case.
    pub async fn open_party(
        &self,
        name: &str,
        config: PartyConfig,
    ) -> Result<PartyId, SessionError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(RuleError::InvalidName.into());
        }
        self.insert(GameSession::new(name, config)).await
    }

    /// Register an existing session, e.g. one just loaded from disk.
    pub async fn insert(&self, session: GameSession) -> Result<PartyId, SessionError> {
        let id = session.id();
        let name = session.name().to_string();

        let mut registry = self.registry.write().await;
        if registry.names.contains_key(&name) {
            return Err(SessionError::PartyNameTaken(name));
        }
        registry.names.insert(name.clone(), id);
        registry.sessions.insert(id, Arc::new(Mutex::new(session)));

        info!(party = %name, %id, "party opened");
        Ok(id)
    }

    /// Close a party, handing back its session.
    pub async fn close_party(&self, id: PartyId) -> Result<SharedSession, SessionError> {
        let mut registry = self.registry.write().await;
        let session = registry
            .sessions
            .remove(&id)
            .ok_or(SessionError::UnknownParty(id))?;
        registry.names.retain(|_, party| *party != id);
        info!(%id, "party closed");
        Ok(session)
    }

    pub async fn party_id(&self, name: &str) -> Option<PartyId> {
        let registry = self.registry.read().await;
        registry.names.get(&normalize_name(name)).copied()
    }

    pub async fn party_names(&self) -> Vec<String> {
        let registry = self.registry.read().await;
        let mut names: Vec<_> = registry.names.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn session(&self, id: PartyId) -> Result<SharedSession, SessionError> {
        let registry = self.registry.read().await;
        registry
            .sessions
            .get(&id)
            .cloned()
            .ok_or(SessionError::UnknownParty(id))
    }

    /// Run one intent against a party while holding that party's lock.
    pub async fn act(&self, id: PartyId, intent: Intent) -> Result<Response, SessionError> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        Ok(session.act(intent)?)
    }

    /// Change a party's setup while holding its lock.
    pub async fn configure<T>(
        &self,
        id: PartyId,
        update: impl FnOnce(&mut PartyConfig) -> Result<T, ConfigError>,
    ) -> Result<T, SessionError> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        Ok(update(session.config_mut())?)
    }

    /// A consistent copy of a party's current state.
    pub async fn snapshot(&self, id: PartyId) -> Result<Party, SessionError> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        Ok(session.party().clone())
    }
}

//! Party persistence for save/load functionality.
//!
//! Saves are pretty-printed JSON so a party can be inspected or repaired by
//! hand between sessions.

use crate::party::{InvariantViolation, Party};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Saved party is inconsistent: {0}")]
    Inconsistent(InvariantViolation),
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved party with all state needed to resume play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedParty {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// Seconds since the Unix epoch.
    pub saved_at: String,

    pub metadata: SaveMetadata,

    pub party: Party,
}

/// Summary of a save file, readable without loading the whole party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub party_name: String,
    pub players: usize,
    pub nobles: usize,
    /// Name of the noble with the most soldiers, if any.
    pub ruler: Option<String>,
}

impl SaveMetadata {
    fn of(party: &Party) -> Self {
        Self {
            party_name: party.name.clone(),
            players: party.players.len(),
            nobles: party.nobles().count(),
            ruler: party.almighty_ruler().map(|p| p.name.clone()),
        }
    }
}

impl SavedParty {
    pub fn new(party: Party) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: unix_now(),
            metadata: SaveMetadata::of(&party),
            party,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        debug!(party = %self.party.name, path = %path.display(), "party saved");
        Ok(())
    }

    /// Load from a JSON file, rejecting saves whose party is inconsistent.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;

        if let Err(violation) = saved.party.check_invariants() {
            warn!(path = %path.display(), %violation, "refusing inconsistent save");
            return Err(PersistError::Inconsistent(violation));
        }

        debug!(party = %saved.party.name, path = %path.display(), "party loaded");
        Ok(saved)
    }

    /// Get metadata without loading the full party.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// A save file found on disk.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: SaveMetadata,
}

/// List all party saves in a directory, sorted by party name.
///
/// Files that are not readable saves are skipped.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let dir = dir.as_ref();
    let mut saves = Vec::new();

    if !fs::try_exists(dir).await? {
        return Ok(saves);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "json") {
            if let Ok(metadata) = SavedParty::peek_metadata(&path).await {
                saves.push(SaveInfo { path, metadata });
            }
        }
    }

    saves.sort_by(|a, b| a.metadata.party_name.cmp(&b.metadata.party_name));
    Ok(saves)
}

/// Save path for a party: its name with anything but letters and digits
/// replaced, then the start of its id so that similar names never share a file.
pub fn save_path(dir: impl AsRef<Path>, party: &Party) -> PathBuf {
    let sanitized: String = party
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let id = party.id.0.simple().to_string();
    dir.as_ref().join(format!("{sanitized}_{}.json", &id[..8]))
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

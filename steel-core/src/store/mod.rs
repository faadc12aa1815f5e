//! Encounter persistence.
//!
//! Each channel keeps its encounter in a single pinned document on some host
//! medium (a chat channel, a directory, memory). The document carries a
//! marker line so it can be found again, the state as compact JSON, and a
//! rendered display of the tracker.

mod file;
mod memory;

pub use file::FileMedium;
pub use memory::InMemoryMedium;

use crate::encounter::EncounterState;
use crate::error::Result;
use crate::render::render;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Marker line that identifies a tracker document.
pub const TRACKER_TAG: &str = "[INITIATIVE TRACKER]";

const JSON_OPEN: &str = "```json\n";
const JSON_CLOSE: &str = "\n```";

// ============================================================================
// Documents and Media
// ============================================================================

/// Identifies the channel an encounter belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey(pub String);

impl ChannelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document as held by the medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Machine-readable content (marker plus state).
    pub content: String,
    /// Human-readable rendering shown alongside the content.
    pub display: String,
    pub pinned: bool,
}

impl Document {
    pub fn new(content: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            content: content.into(),
            display: display.into(),
            pinned: false,
        }
    }

    pub fn is_tracker(&self) -> bool {
        self.content.contains(TRACKER_TAG)
    }
}

/// Errors from the host medium.
#[derive(Debug, Error)]
pub enum MediumError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document {0} not found")]
    DocumentMissing(DocumentId),

    #[error("Pin refused: {0}")]
    PinRefused(String),
}

/// Where tracker documents live.
#[async_trait]
pub trait DocumentMedium: Send + Sync {
    /// Pinned documents in a channel, most recent first.
    async fn pinned(&self, channel: &ChannelKey) -> std::result::Result<Vec<Document>, MediumError>;

    /// Create a new, unpinned document.
    async fn create(
        &self,
        channel: &ChannelKey,
        content: &str,
        display: &str,
    ) -> std::result::Result<Document, MediumError>;

    async fn pin(&self, channel: &ChannelKey, id: DocumentId) -> std::result::Result<(), MediumError>;

    /// Replace a document's content and display in one write.
    async fn edit(
        &self,
        channel: &ChannelKey,
        id: DocumentId,
        content: &str,
        display: &str,
    ) -> std::result::Result<(), MediumError>;
}

// ============================================================================
// Document Format
// ============================================================================

/// Serialise a state into tracker document content.
pub fn encode_state(state: &EncounterState) -> std::result::Result<String, MediumError> {
    let json = serde_json::to_string(state)?;
    Ok(format!("{TRACKER_TAG}\n||{JSON_OPEN}{json}{JSON_CLOSE}||"))
}

/// Pull the state out of tracker document content, if it is readable.
pub fn decode_state(content: &str) -> Option<EncounterState> {
    let start = content.find(JSON_OPEN)? + JSON_OPEN.len();
    let length = content[start..].find(JSON_CLOSE)?;
    serde_json::from_str(&content[start..start + length]).ok()
}

// ============================================================================
// Store
// ============================================================================

/// How a loaded state came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Read from an existing document.
    Existing,
    /// No document existed; a new empty one was created.
    Created,
    /// The document was unreadable; an empty state stands in for it.
    Recovered,
}

/// A state together with the document it belongs to.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: DocumentId,
    pub state: EncounterState,
    pub origin: LoadOrigin,
}

/// Loads and saves encounters, one document per channel.
///
/// Mutations go through [`EncounterStore::transact`], which holds a
/// per-channel lock from load until save so concurrent commands on the same
/// channel apply one after another.
pub struct EncounterStore {
    medium: Arc<dyn DocumentMedium>,
    locks: Mutex<HashMap<ChannelKey, Arc<Mutex<()>>>>,
}

impl EncounterStore {
    pub fn new(medium: Arc<dyn DocumentMedium>) -> Self {
        Self {
            medium,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn medium(&self) -> &Arc<dyn DocumentMedium> {
        &self.medium
    }

    async fn channel_lock(&self, channel: &ChannelKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(channel.clone()).or_default().clone()
    }

    /// Find the channel's tracker document, creating and pinning one if needed.
    ///
    /// Does not take the channel lock; callers outside a transaction race
    /// with concurrent writers.
    pub async fn load(&self, channel: &ChannelKey) -> Result<Loaded> {
        let pinned = self.medium.pinned(channel).await?;

        if let Some(document) = pinned.into_iter().find(|d| d.is_tracker()) {
            return Ok(match decode_state(&document.content) {
                Some(mut state) => {
                    state.normalize();
                    tracing::debug!("Loaded tracker[{}] for channel {}", document.id, channel);
                    Loaded {
                        document: document.id,
                        state,
                        origin: LoadOrigin::Existing,
                    }
                }
                None => {
                    tracing::warn!(
                        "Tracker[{}] for channel {} is unreadable; starting from an empty encounter",
                        document.id,
                        channel
                    );
                    Loaded {
                        document: document.id,
                        state: EncounterState::new(),
                        origin: LoadOrigin::Recovered,
                    }
                }
            });
        }

        let state = EncounterState::new();
        let content = encode_state(&state)?;
        let display = render(&state).to_string();
        let document = self.medium.create(channel, &content, &display).await?;
        if let Err(e) = self.medium.pin(channel, document.id).await {
            tracing::warn!("Could not pin tracker[{}] in {}: {}", document.id, channel, e);
        }
        tracing::info!("Created tracker[{}] for channel {}", document.id, channel);

        Ok(Loaded {
            document: document.id,
            state,
            origin: LoadOrigin::Created,
        })
    }

    /// Overwrite the document with `state` and a fresh rendering of it.
    pub async fn save(
        &self,
        channel: &ChannelKey,
        document: DocumentId,
        state: &EncounterState,
    ) -> Result<()> {
        let content = encode_state(state)?;
        let display = render(state).to_string();
        self.medium.edit(channel, document, &content, &display).await?;
        tracing::debug!("Saved tracker[{}] for channel {}", document, channel);
        Ok(())
    }

    /// Load, mutate and save under the channel lock.
    ///
    /// The state is written back only when `mutate` succeeds.
    pub async fn transact<T, F>(&self, channel: &ChannelKey, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut EncounterState) -> Result<T> + Send,
        T: Send,
    {
        let lock = self.channel_lock(channel).await;
        let _guard = lock.lock().await;

        let Loaded {
            document,
            mut state,
            ..
        } = self.load(channel).await?;
        let value = mutate(&mut state)?;
        self.save(channel, document, &state).await?;
        Ok(value)
    }

    /// Current state of a channel, read under the channel lock.
    pub async fn snapshot(&self, channel: &ChannelKey) -> Result<EncounterState> {
        let lock = self.channel_lock(channel).await;
        let _guard = lock.lock().await;
        Ok(self.load(channel).await?.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Loadout, NewCombatant};
    use crate::error::{ErrorKind, TrackerError};

    fn store() -> (Arc<InMemoryMedium>, EncounterStore) {
        let medium = Arc::new(InMemoryMedium::new());
        let store = EncounterStore::new(medium.clone());
        (medium, store)
    }

    #[test]
    fn test_document_format() {
        let content = encode_state(&EncounterState::new()).unwrap();
        assert!(content.starts_with("[INITIATIVE TRACKER]\n||```json\n{"));
        assert!(content.ends_with("}\n```||"));
        assert_eq!(decode_state(&content), Some(EncounterState::new()));
    }

    #[test]
    fn test_decode_legacy_document() {
        let content = "[INITIATIVE TRACKER]\n||```json\n{\"entries\":[{\"name\":\"Aria\",\"stamina\":20,\"M\":2,\"status\":\"done\"}],\"active\":0,\"round\":3,\"current\":null}\n```||";
        let state = decode_state(content).unwrap();
        assert_eq!(state.round, 3);
        assert_eq!(state.entries[0].max_stamina, 20);
        assert_eq!(state.entries[0].characteristics.might, 2);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_state("[INITIATIVE TRACKER]").is_none());
        assert!(decode_state("[INITIATIVE TRACKER]\n||```json\n{oops\n```||").is_none());
    }

    #[tokio::test]
    async fn test_first_load_creates_pinned_document() {
        let (medium, store) = store();
        let channel = ChannelKey::from("general");

        let loaded = store.load(&channel).await.unwrap();
        assert_eq!(loaded.origin, LoadOrigin::Created);
        assert!(loaded.state.is_empty());

        let pinned = medium.pinned(&channel).await.unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].id, loaded.document);

        let again = store.load(&channel).await.unwrap();
        assert_eq!(again.origin, LoadOrigin::Existing);
        assert_eq!(again.document, loaded.document);
    }

    #[tokio::test]
    async fn test_refused_pin_still_loads() {
        let medium = Arc::new(InMemoryMedium::refusing_pins());
        let store = EncounterStore::new(medium.clone());
        let loaded = store.load(&ChannelKey::from("dm")).await.unwrap();
        assert_eq!(loaded.origin, LoadOrigin::Created);
        assert_eq!(medium.documents(&ChannelKey::from("dm")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_document_recovers_empty() {
        let (medium, store) = store();
        let channel = ChannelKey::from("general");
        let id = medium
            .seed(&channel, "[INITIATIVE TRACKER]\n||```json\nnot json\n```||", true)
            .await;

        let loaded = store.load(&channel).await.unwrap();
        assert_eq!(loaded.origin, LoadOrigin::Recovered);
        assert_eq!(loaded.document, id);
        assert!(loaded.state.is_empty());
    }

    #[tokio::test]
    async fn test_transact_saves_only_on_success() {
        let (medium, store) = store();
        let channel = ChannelKey::from("general");

        store
            .transact(&channel, |state| {
                state
                    .add_combatant(NewCombatant::new("Aria", 30), Loadout::default())
                    .map(|_| ())
            })
            .await
            .unwrap();

        let err = store
            .transact(&channel, |state| -> Result<()> {
                state.entries.clear();
                Err(TrackerError::conflict("nope"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let state = store.snapshot(&channel).await.unwrap();
        assert_eq!(state.entries.len(), 1);

        let document = &medium.pinned(&channel).await.unwrap()[0];
        assert!(document.display.contains("**Aria**"));
    }
}

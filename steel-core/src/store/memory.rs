//! In-process document medium.

use super::{ChannelKey, Document, DocumentId, DocumentMedium, MediumError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps every channel's documents in memory.
#[derive(Debug, Default)]
pub struct InMemoryMedium {
    channels: RwLock<HashMap<ChannelKey, Vec<Document>>>,
    refuse_pins: bool,
}

impl InMemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// A medium where pinning always fails, like a channel without pin rights.
    pub fn refusing_pins() -> Self {
        Self {
            refuse_pins: true,
            ..Self::default()
        }
    }

    /// All documents in a channel, oldest first.
    pub async fn documents(&self, channel: &ChannelKey) -> Vec<Document> {
        let channels = self.channels.read().await;
        channels.get(channel).cloned().unwrap_or_default()
    }

    /// Place a raw document in a channel.
    pub async fn seed(&self, channel: &ChannelKey, content: &str, pinned: bool) -> DocumentId {
        let mut document = Document::new(content, "");
        document.pinned = pinned;
        let id = document.id;
        let mut channels = self.channels.write().await;
        channels.entry(channel.clone()).or_default().push(document);
        id
    }
}

#[async_trait]
impl DocumentMedium for InMemoryMedium {
    async fn pinned(&self, channel: &ChannelKey) -> Result<Vec<Document>, MediumError> {
        let channels = self.channels.read().await;
        Ok(channels
            .get(channel)
            .map(|docs| docs.iter().rev().filter(|d| d.pinned).cloned().collect())
            .unwrap_or_default())
    }

    async fn create(
        &self,
        channel: &ChannelKey,
        content: &str,
        display: &str,
    ) -> Result<Document, MediumError> {
        let document = Document::new(content, display);
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.clone())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn pin(&self, channel: &ChannelKey, id: DocumentId) -> Result<(), MediumError> {
        if self.refuse_pins {
            return Err(MediumError::PinRefused(format!("no pin rights in {channel}")));
        }
        let mut channels = self.channels.write().await;
        let document = channels
            .get_mut(channel)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or(MediumError::DocumentMissing(id))?;
        document.pinned = true;
        Ok(())
    }

    async fn edit(
        &self,
        channel: &ChannelKey,
        id: DocumentId,
        content: &str,
        display: &str,
    ) -> Result<(), MediumError> {
        let mut channels = self.channels.write().await;
        let document = channels
            .get_mut(channel)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or(MediumError::DocumentMissing(id))?;
        document.content = content.to_string();
        document.display = display.to_string();
        Ok(())
    }
}

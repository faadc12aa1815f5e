//! Directory-backed document medium.
//!
//! Each channel's documents are kept together in `{channel}.json` inside the
//! base directory. Writes go to a temporary file which is then renamed over
//! the previous file. A channel file that no longer parses reads as empty, so
//! the next write replaces it.

use super::{ChannelKey, Document, DocumentId, DocumentMedium, MediumError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FileMedium {
    base_dir: PathBuf,
}

impl FileMedium {
    /// Open (creating if needed) a medium rooted at `base_dir`.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, MediumError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the path to a channel's document file.
    fn channel_path(&self, channel: &ChannelKey) -> PathBuf {
        let stem: String = channel
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{stem}.json"))
    }

    async fn read_channel(&self, channel: &ChannelKey) -> Result<Vec<Document>, MediumError> {
        let path = self.channel_path(channel);
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&path).await?;
        match serde_json::from_str(&json) {
            Ok(documents) => Ok(documents),
            Err(e) => {
                tracing::warn!(
                    "Channel file {} is unreadable, starting fresh: {}",
                    path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn write_channel(
        &self,
        channel: &ChannelKey,
        documents: &[Document],
    ) -> Result<(), MediumError> {
        let path = self.channel_path(channel);
        let temp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(documents)?;
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Wrote {} document(s) to {}", documents.len(), path.display());
        Ok(())
    }

    async fn modify(
        &self,
        channel: &ChannelKey,
        id: DocumentId,
        change: impl FnOnce(&mut Document),
    ) -> Result<(), MediumError> {
        let mut documents = self.read_channel(channel).await?;
        let document = documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(MediumError::DocumentMissing(id))?;
        change(document);
        self.write_channel(channel, &documents).await
    }
}

#[async_trait]
impl DocumentMedium for FileMedium {
    async fn pinned(&self, channel: &ChannelKey) -> Result<Vec<Document>, MediumError> {
        let documents = self.read_channel(channel).await?;
        Ok(documents.into_iter().rev().filter(|d| d.pinned).collect())
    }

    async fn create(
        &self,
        channel: &ChannelKey,
        content: &str,
        display: &str,
    ) -> Result<Document, MediumError> {
        let mut documents = self.read_channel(channel).await?;
        let document = Document::new(content, display);
        documents.push(document.clone());
        self.write_channel(channel, &documents).await?;
        Ok(document)
    }

    async fn pin(&self, channel: &ChannelKey, id: DocumentId) -> Result<(), MediumError> {
        self.modify(channel, id, |document| document.pinned = true)
            .await
    }

    async fn edit(
        &self,
        channel: &ChannelKey,
        id: DocumentId,
        content: &str,
        display: &str,
    ) -> Result<(), MediumError> {
        self.modify(channel, id, |document| {
            document.content = content.to_string();
            document.display = display.to_string();
        })
        .await
    }
}

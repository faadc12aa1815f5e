//! Draw Steel combat tracker engine.
//!
//! This crate provides:
//! - Per-channel encounter state with turn and round flow
//! - Power rolls, ability resolution, damage, healing and recoveries
//! - Ability and kit definitions loaded from JSON
//! - Persistence of each encounter as a single pinned document
//! - Typed commands with generated option schemas
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use steel_core::{ChannelKey, ContentLibrary, FileMedium, Tracker, TrackerCommand, TrackerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TrackerConfig::from_env();
//!     let medium = FileMedium::new(&config.storage_dir).await?;
//!     let content = ContentLibrary::load(&config.abilities_dir, &config.kits_dir).await;
//!     let tracker = Tracker::new(Arc::new(medium), content, config);
//!
//!     let channel = ChannelKey::from("table-1");
//!     let command = TrackerCommand::from_invocation("show_encounter", serde_json::json!({}))?;
//!     println!("{}", tracker.execute(&channel, command).await?);
//!     Ok(())
//! }
//! ```

// Lets generated `steel_core::...` paths resolve inside this crate too.
extern crate self as steel_core;

pub mod combatant;
pub mod commands;
pub mod config;
pub mod content;
pub mod dice;
pub mod encounter;
pub mod error;
pub mod render;
pub mod resolution;
pub mod store;
pub mod tracker;
mod turn;

// Re-export for convenience
pub use steel_macros::Command;

// Primary public API
pub use commands::{CommandDefinition, CommandOutput, TrackerCommand};
pub use config::TrackerConfig;
pub use content::ContentLibrary;
pub use encounter::EncounterState;
pub use error::{ErrorKind, Missing, Result, TrackerError};
pub use store::{ChannelKey, DocumentMedium, EncounterStore, FileMedium, InMemoryMedium};
pub use tracker::Tracker;

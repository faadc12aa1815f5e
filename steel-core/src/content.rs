//! Pre-authored ability and kit definitions.
//!
//! Definitions live as one JSON file per ability or kit. The file stem,
//! lower-cased, is the lookup key, so `abilities/fade.json` is found as
//! `Fade`, `fade` or ` FADE `.

use crate::combatant::{Characteristic, KitBonuses};
use crate::dice::Tier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tokio::fs;

// ============================================================================
// Definitions
// ============================================================================

/// What one tier of an ability does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierOutcome {
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default, alias = "rider_text")]
    pub rider: Option<String>,
}

/// Outcomes keyed by tier ("1", "2", "3").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    #[serde(rename = "1", default)]
    pub tier1: TierOutcome,
    #[serde(rename = "2", default)]
    pub tier2: TierOutcome,
    #[serde(rename = "3", default)]
    pub tier3: TierOutcome,
}

impl TierTable {
    pub fn get(&self, tier: Tier) -> &TierOutcome {
        match tier {
            Tier::One => &self.tier1,
            Tier::Two => &self.tier2,
            Tier::Three => &self.tier3,
        }
    }
}

/// Range is either free text or a small map such as `{"melee": 1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbilityRange {
    Text(String),
    Fields(BTreeMap<String, serde_json::Value>),
}

impl AbilityRange {
    pub fn is_empty(&self) -> bool {
        match self {
            AbilityRange::Text(text) => text.trim().is_empty(),
            AbilityRange::Fields(fields) => fields.is_empty(),
        }
    }
}

impl fmt::Display for AbilityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbilityRange::Text(text) => write!(f, "{text}"),
            AbilityRange::Fields(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", plain_value(v)))
                    .collect();
                write!(f, "{}", parts.join("; "))
            }
        }
    }
}

/// JSON scalars without the quotes a plain `to_string` would add.
fn plain_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An ability as written by the importer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub range: Option<AbilityRange>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub stats: Vec<String>,
    #[serde(default)]
    pub tiers: TierTable,
    #[serde(default)]
    pub cost: Option<serde_json::Value>,
    #[serde(default)]
    pub extra_effect: Option<String>,
}

impl AbilityDefinition {
    /// Characteristics the ability may be rolled with. Unknown entries are ignored.
    pub fn allowed_stats(&self) -> Vec<Characteristic> {
        let mut allowed = Vec::new();
        for stat in &self.stats {
            if let Ok(c) = stat.parse::<Characteristic>() {
                if !allowed.contains(&c) {
                    allowed.push(c);
                }
            }
        }
        allowed
    }

    pub fn cost_text(&self) -> Option<String> {
        self.cost
            .as_ref()
            .filter(|c| !c.is_null())
            .map(plain_value)
    }
}

/// A kit and its per-tier bonuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub melee: KitBonuses,
    #[serde(default)]
    pub ranged: KitBonuses,
}

// ============================================================================
// Library
// ============================================================================

/// Normalised lookup key for a definition name.
pub fn content_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The key an importer would have used as a file stem.
fn file_stem_key(name: &str) -> String {
    content_key(name)
        .replace(' ', "_")
        .replace([',', '\'', '’'], "")
}

/// Every ability and kit the tracker can look up.
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    abilities: BTreeMap<String, AbilityDefinition>,
    kits: BTreeMap<String, KitDefinition>,
}

impl ContentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` definition from both directories.
    ///
    /// Missing directories yield an empty section; files that fail to parse
    /// are skipped.
    pub async fn load(abilities_dir: impl AsRef<Path>, kits_dir: impl AsRef<Path>) -> Self {
        let mut library = Self::new();

        for (key, mut ability) in load_definitions::<AbilityDefinition>(abilities_dir.as_ref()).await {
            if ability.name.trim().is_empty() {
                ability.name = key.clone();
            }
            library.abilities.insert(key, ability);
        }
        for (key, mut kit) in load_definitions::<KitDefinition>(kits_dir.as_ref()).await {
            if kit.name.trim().is_empty() {
                kit.name = key.clone();
            }
            library.kits.insert(key, kit);
        }

        tracing::info!(
            "Loaded {} abilities and {} kits",
            library.abilities.len(),
            library.kits.len()
        );
        library
    }

    pub fn insert_ability(&mut self, ability: AbilityDefinition) {
        self.abilities.insert(file_stem_key(&ability.name), ability);
    }

    pub fn insert_kit(&mut self, kit: KitDefinition) {
        self.kits.insert(file_stem_key(&kit.name), kit);
    }

    pub fn ability(&self, name: &str) -> Option<&AbilityDefinition> {
        lookup(&self.abilities, name)
    }

    pub fn kit(&self, name: &str) -> Option<&KitDefinition> {
        lookup(&self.kits, name)
    }

    /// Ability keys starting with `prefix`, sorted, at most `limit`.
    pub fn ability_names(&self, prefix: &str, limit: usize) -> Vec<String> {
        matching_keys(&self.abilities, prefix, limit)
    }

    /// Kit keys starting with `prefix`, sorted, at most `limit`.
    pub fn kit_names(&self, prefix: &str, limit: usize) -> Vec<String> {
        matching_keys(&self.kits, prefix, limit)
    }

    pub fn ability_count(&self) -> usize {
        self.abilities.len()
    }

    pub fn kit_count(&self) -> usize {
        self.kits.len()
    }
}

fn lookup<'a, T>(map: &'a BTreeMap<String, T>, name: &str) -> Option<&'a T> {
    map.get(&content_key(name))
        .or_else(|| map.get(&file_stem_key(name)))
}

fn matching_keys<T>(map: &BTreeMap<String, T>, prefix: &str, limit: usize) -> Vec<String> {
    let prefix = content_key(prefix);
    map.keys()
        .filter(|key| key.starts_with(&prefix))
        .take(limit)
        .cloned()
        .collect()
}

async fn load_definitions<T>(dir: &Path) -> Vec<(String, T)>
where
    T: for<'de> Deserialize<'de>,
{
    let mut definitions = Vec::new();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("No definitions read from {}: {}", dir.display(), e);
            return definitions;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Stopped reading {}: {}", dir.display(), e);
                break;
            }
        };

        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_json {
            continue;
        }

        let parsed = match fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str::<T>(&text).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match parsed {
            Ok(definition) => definitions.push((content_key(stem), definition)),
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    definitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FADE: &str = r#"{
        "name": "Fade",
        "tags": ["Melee", "Strike", "Weapon"],
        "action": "Main action",
        "range": {"melee": 1},
        "target": "One creature",
        "stats": ["A"],
        "tiers": {
            "1": {"damage": 3, "effects": [], "rider": null},
            "2": {"damage": 6, "effects": ["Slide 1"], "rider_text": "You shift 1"},
            "3": {"damage": 8, "effects": ["Slide 3"]}
        },
        "cost": "3 Insight"
    }"#;

    #[test]
    fn test_parse_ability_definition() {
        let fade: AbilityDefinition = serde_json::from_str(FADE).unwrap();
        assert_eq!(fade.allowed_stats(), vec![Characteristic::Agility]);
        assert_eq!(fade.tiers.get(Tier::Two).damage, 6);
        assert_eq!(fade.tiers.get(Tier::Two).rider.as_deref(), Some("You shift 1"));
        assert_eq!(fade.tiers.get(Tier::Three).effects, vec!["Slide 3".to_string()]);
        assert_eq!(fade.range.as_ref().unwrap().to_string(), "melee: 1");
        assert_eq!(fade.cost_text().as_deref(), Some("3 Insight"));
    }

    #[test]
    fn test_ability_without_tiers() {
        let json = r#"{"name": "Aid", "range": "Self", "tiers": {}}"#;
        let aid: AbilityDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(aid.tiers, TierTable::default());
        assert_eq!(aid.range.unwrap().to_string(), "Self");
    }

    #[test]
    fn test_lookup_is_normalised() {
        let mut library = ContentLibrary::new();
        library.insert_ability(AbilityDefinition {
            name: "Back Blasphemer!".to_string(),
            ..Default::default()
        });
        library.insert_kit(KitDefinition {
            name: "Panther".to_string(),
            ..Default::default()
        });

        assert!(library.kit("  PANTHER ").is_some());
        assert!(library.ability("back blasphemer!").is_some());
        assert!(library.ability("Back_Blasphemer!").is_some());
        assert!(library.kit("Cloak").is_none());
    }

    #[test]
    fn test_names_by_prefix() {
        let mut library = ContentLibrary::new();
        for name in ["Panther", "Pan", "Raider", "Cloak and Dagger"] {
            library.insert_kit(KitDefinition {
                name: name.to_string(),
                ..Default::default()
            });
        }
        assert_eq!(library.kit_names("pa", 25), vec!["pan", "panther"]);
        assert_eq!(library.kit_names("", 2).len(), 2);
        assert_eq!(library.kit_names("cloak", 25), vec!["cloak_and_dagger"]);
    }

    #[tokio::test]
    async fn test_load_directories() {
        let abilities = TempDir::new().unwrap();
        let kits = TempDir::new().unwrap();

        std::fs::write(abilities.path().join("fade.json"), FADE).unwrap();
        std::fs::write(abilities.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(abilities.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(
            kits.path().join("Panther.json"),
            r#"{"melee": [1, 1, 1, 9], "ranged": [0]}"#,
        )
        .unwrap();

        let library = ContentLibrary::load(abilities.path(), kits.path()).await;
        assert_eq!(library.ability_count(), 1);
        assert_eq!(library.kit_count(), 1);

        let panther = library.kit("panther").unwrap();
        assert_eq!(panther.name, "panther");
        assert_eq!(panther.melee, KitBonuses::new(1, 1, 1));
        assert_eq!(panther.ranged, KitBonuses::default());
    }

    #[tokio::test]
    async fn test_load_missing_directories() {
        let library = ContentLibrary::load("/nonexistent/abilities", "/nonexistent/kits").await;
        assert_eq!(library.ability_count(), 0);
        assert_eq!(library.kit_count(), 0);
    }
}

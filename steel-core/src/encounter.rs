//! Encounter state: the combatants in one channel plus round bookkeeping.

use crate::combatant::{Combatant, FieldChange, FieldUpdate, Loadout, NewCombatant, TurnStatus};
use crate::error::{Missing, Result, TrackerError};
use serde::{Deserialize, Serialize};

/// Everything the tracker knows about one channel's fight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterState {
    #[serde(default)]
    pub entries: Vec<Combatant>,
    #[serde(default = "first_round")]
    pub round: u32,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub monster_groups: Vec<String>,
}

fn first_round() -> u32 {
    1
}

impl Default for EncounterState {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            round: 1,
            current: None,
            monster_groups: Vec::new(),
        }
    }
}

/// Result of removing a combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub removed: Combatant,
    pub remaining: usize,
}

impl EncounterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Repair a freshly loaded state so every invariant holds.
    pub fn normalize(&mut self) {
        if self.round < 1 {
            self.round = 1;
        }

        for entry in &mut self.entries {
            entry.clamp_resources();
        }

        let discovered: Vec<String> = self
            .entries
            .iter()
            .filter_map(|e| e.group.clone())
            .collect();
        for group in discovered {
            self.register_group(&group);
        }

        let dangling = match self.current.as_deref() {
            Some(name) => !self.find(name).is_some_and(|e| e.is_ready()),
            None => false,
        };
        if dangling {
            self.current = None;
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Index of a combatant, matched case-insensitively.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.is_named(name))
    }

    pub fn find(&self, name: &str) -> Option<&Combatant> {
        self.entries.iter().find(|e| e.is_named(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Combatant> {
        self.entries.iter_mut().find(|e| e.is_named(name))
    }

    pub fn get(&self, name: &str) -> Result<&Combatant> {
        self.find(name)
            .ok_or_else(|| TrackerError::not_found(Missing::Combatant, name.trim()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Combatant> {
        self.find_mut(name)
            .ok_or_else(|| TrackerError::not_found(Missing::Combatant, name.trim()))
    }

    /// Whether `name` is the combatant currently acting.
    pub fn is_current(&self, name: &str) -> bool {
        self.current
            .as_deref()
            .is_some_and(|current| current.to_lowercase() == name.trim().to_lowercase())
    }

    /// Known groups: the registered order first, then any found on entries.
    pub fn group_names(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        let discovered = self.entries.iter().filter_map(|e| e.group.as_ref());
        for group in self.monster_groups.iter().chain(discovered) {
            if !group.is_empty() && !groups.contains(group) {
                groups.push(group.clone());
            }
        }
        groups
    }

    fn register_group(&mut self, group: &str) {
        if !group.is_empty() && !self.monster_groups.iter().any(|g| g == group) {
            self.monster_groups.push(group.to_string());
        }
    }

    // ========================================================================
    // Roster
    // ========================================================================

    /// Add a combatant whose kit has already been resolved.
    pub fn add_combatant(&mut self, new: NewCombatant, loadout: Loadout) -> Result<&Combatant> {
        new.validate()?;
        if self.find(&new.name).is_some() {
            return Err(TrackerError::validation(format!(
                "A character named **{}** already exists.",
                new.name.trim()
            )));
        }

        let combatant = Combatant::new(new, loadout);
        if let Some(group) = combatant.group.clone() {
            self.register_group(&group);
        }
        self.entries.push(combatant);

        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Change one field, reporting the old and new value.
    pub fn update_field(&mut self, name: &str, update: FieldUpdate) -> Result<FieldChange> {
        let index = self
            .position(name)
            .ok_or_else(|| TrackerError::not_found(Missing::Combatant, name.trim()))?;
        let field = update.field();

        if let FieldUpdate::Name(new_name) = &update {
            let taken = self
                .entries
                .iter()
                .enumerate()
                .any(|(i, e)| i != index && e.is_named(new_name));
            if taken {
                return Err(TrackerError::validation(format!(
                    "A character named **{new_name}** already exists."
                )));
            }
        }

        let was_current = self.is_current(&self.entries[index].name);
        let old = self.entries[index].field_value(field);

        let mut edited = self.entries[index].clone();
        edited.apply_update(update)?;
        self.entries[index] = edited;

        let entry = &self.entries[index];
        let new = entry.field_value(field);
        let combatant = entry.name.clone();
        let group = entry.group.clone();

        if was_current {
            self.current = Some(combatant.clone());
        }
        if let Some(group) = group {
            self.register_group(&group);
        }

        Ok(FieldChange {
            combatant,
            field: field.to_string(),
            old,
            new,
        })
    }

    pub fn remove_combatant(&mut self, name: &str) -> Result<Removal> {
        let index = self
            .position(name)
            .ok_or_else(|| TrackerError::not_found(Missing::Combatant, name.trim()))?;
        let removed = self.entries.remove(index);
        if self.is_current(&removed.name) {
            self.current = None;
        }
        Ok(Removal {
            removed,
            remaining: self.entries.len(),
        })
    }

    /// Reset to an empty encounter at round 1.
    pub fn clear(&mut self) {
        *self = EncounterState::default();
    }

    // ========================================================================
    // Effects
    // ========================================================================

    /// Append an effect, returning how many the combatant now has.
    pub fn add_effect(&mut self, name: &str, effect: &str) -> Result<usize> {
        let effect = effect.trim();
        if effect.is_empty() {
            return Err(TrackerError::validation("Effect text cannot be empty."));
        }
        let entry = self.get_mut(name)?;
        entry.effects.push(effect.to_string());
        Ok(entry.effects.len())
    }

    /// Remove the effect at a 1-based position.
    pub fn remove_effect(&mut self, name: &str, position: usize) -> Result<String> {
        let entry = self.get_mut(name)?;
        if entry.effects.is_empty() {
            return Err(TrackerError::validation(format!(
                "**{}** has no effects to remove.",
                entry.name
            )));
        }
        if position == 0 || position > entry.effects.len() {
            return Err(TrackerError::not_found(
                Missing::Effect,
                format!(
                    "#{position} on {} ({} effect(s))",
                    entry.name,
                    entry.effects.len()
                ),
            ));
        }
        Ok(entry.effects.remove(position - 1))
    }

    /// Combatants that still have to act this round.
    pub fn ready_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == TurnStatus::Ready)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Characteristics, FieldName};
    use crate::content::ContentLibrary;
    use crate::error::ErrorKind;

    fn encounter() -> EncounterState {
        let mut state = EncounterState::new();
        state
            .add_combatant(NewCombatant::new("Aria", 30), Loadout::default())
            .unwrap();
        state
            .add_combatant(
                NewCombatant::new("Goblin 1", 10).monster(Some("Goblins")),
                Loadout::default(),
            )
            .unwrap();
        state
    }

    #[test]
    fn test_add_registers_group() {
        let state = encounter();
        assert_eq!(state.monster_groups, vec!["Goblins".to_string()]);
        assert_eq!(state.entries[1].group.as_deref(), Some("Goblins"));
    }

    #[test]
    fn test_add_rejects_duplicate_name() {
        let mut state = encounter();
        let err = state
            .add_combatant(NewCombatant::new("aria", 12), Loadout::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(state.entries.len(), 2);
    }

    #[test]
    fn test_add_rejects_group_on_player() {
        let mut state = EncounterState::new();
        let mut new = NewCombatant::new("Aria", 30);
        new.group = Some("Heroes".to_string());
        let err = state.add_combatant(new, Loadout::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(state.is_empty());
        assert!(state.monster_groups.is_empty());
    }

    #[test]
    fn test_group_on_player_update_is_rejected_without_mutation() {
        let mut state = encounter();
        let before = state.clone();
        let err = state
            .update_field("Aria", FieldUpdate::Group(Some("Goblins".to_string())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(state, before);
    }

    #[test]
    fn test_update_reports_old_and_new() {
        let mut state = encounter();
        let library = ContentLibrary::new();
        let update = FieldUpdate::parse(FieldName::Stamina, "12", &library).unwrap();
        let change = state.update_field("aria", update).unwrap();
        assert_eq!(change.combatant, "Aria");
        assert_eq!(change.field, "stamina");
        assert_eq!(change.old, "30");
        assert_eq!(change.new, "12");
    }

    #[test]
    fn test_rename_keeps_current_pointer() {
        let mut state = encounter();
        state.current = Some("Aria".to_string());
        state
            .update_field("Aria", FieldUpdate::Name("Aria the Bold".to_string()))
            .unwrap();
        assert_eq!(state.current.as_deref(), Some("Aria the Bold"));
    }

    #[test]
    fn test_rename_rejects_taken_name() {
        let mut state = encounter();
        let err = state
            .update_field("Aria", FieldUpdate::Name("GOBLIN 1".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        // Changing only the case of one's own name is allowed.
        state
            .update_field("Aria", FieldUpdate::Name("ARIA".to_string()))
            .unwrap();
    }

    #[test]
    fn test_update_keeps_other_fields() {
        let mut state = encounter();
        let before = state.entries[1].clone();
        state
            .update_field(
                "Goblin 1",
                FieldUpdate::Characteristic(crate::combatant::Characteristic::Agility, 3),
            )
            .unwrap();
        let after = &state.entries[1];
        assert_eq!(after.characteristics, Characteristics::new(0, 3, 0, 0, 0));
        assert_eq!(after.stamina, before.stamina);
        assert_eq!(after.group, before.group);
        assert_eq!(after.loadout, before.loadout);
    }

    #[test]
    fn test_remove_clears_current() {
        let mut state = encounter();
        state.current = Some("Goblin 1".to_string());
        let removal = state.remove_combatant("goblin 1").unwrap();
        assert_eq!(removal.removed.name, "Goblin 1");
        assert_eq!(removal.remaining, 1);
        assert!(state.current.is_none());
        assert!(state.remove_combatant("Goblin 1").is_err());
    }

    #[test]
    fn test_effects_by_position() {
        let mut state = encounter();
        state.add_effect("Aria", "Slowed").unwrap();
        assert_eq!(state.add_effect("Aria", "Bleeding (EoT)").unwrap(), 2);
        assert_eq!(state.remove_effect("Aria", 1).unwrap(), "Slowed");
        assert!(state.remove_effect("Aria", 2).is_err());
        assert_eq!(state.remove_effect("Aria", 1).unwrap(), "Bleeding (EoT)");
        assert_eq!(
            state.remove_effect("Aria", 1).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_normalize_repairs_state() {
        let json = r#"{
            "entries": [
                {"name": "Aria", "stamina": 40, "max_stamina": 30, "status": "done"},
                {"name": "Orc", "stamina": 5, "is_player": false, "group": "Orcs"},
                {"name": "Bard", "stamina": 5, "group": "Band"}
            ],
            "round": 0,
            "current": "Aria"
        }"#;
        let mut state: EncounterState = serde_json::from_str(json).unwrap();
        state.normalize();
        assert_eq!(state.round, 1);
        assert!(state.current.is_none());
        assert_eq!(state.entries[0].stamina, 30);
        assert_eq!(state.monster_groups, vec!["Orcs".to_string()]);
        assert!(state.entries[2].group.is_none());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut state = encounter();
        state.round = 4;
        state.current = Some("Aria".to_string());
        state.clear();
        assert_eq!(state, EncounterState::default());
    }
}

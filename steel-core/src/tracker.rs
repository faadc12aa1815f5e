//! Tracker - the primary public API for running encounters.
//!
//! Wraps the encounter store, the ability/kit library and configuration into
//! one handle. Every command a chat layer can issue maps to a method here;
//! [`Tracker::execute`] dispatches a parsed [`TrackerCommand`].

use crate::combatant::{
    AttackMode, Characteristic, Characteristics, FieldChange, FieldName, FieldUpdate,
    KitSelection, NewCombatant, TurnStatus,
};
use crate::commands::{
    AddCombatant, CommandOutput, RollPower, TrackerCommand, UpdateField, UseAbility,
};
use crate::config::TrackerConfig;
use crate::content::ContentLibrary;
use crate::dice::{eval_dice_expression, DiceRoll};
use crate::encounter::EncounterState;
use crate::error::{Missing, Result, TrackerError};
use crate::render::{render, CombatantSheet, TrackerView};
use crate::resolution::{
    self, AbilityOutcome, AbilityRequest, CharacteristicRoll, RecoveryChange, RollModifiers,
    StaminaReport, StatChoice,
};
use crate::store::{ChannelKey, DocumentMedium, EncounterStore};
use std::sync::Arc;

/// Runs tracker commands against per-channel encounters.
pub struct Tracker {
    store: EncounterStore,
    content: ContentLibrary,
    config: TrackerConfig,
}

impl Tracker {
    pub fn new(
        medium: Arc<dyn DocumentMedium>,
        content: ContentLibrary,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store: EncounterStore::new(medium),
            content,
            config,
        }
    }

    pub fn store(&self) -> &EncounterStore {
        &self.store
    }

    pub fn content(&self) -> &ContentLibrary {
        &self.content
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Run a parsed command in a channel.
    pub async fn execute(
        &self,
        channel: &ChannelKey,
        command: TrackerCommand,
    ) -> Result<CommandOutput> {
        tracing::debug!("Running /{} in {}", command.name(), channel);

        let output = match command {
            TrackerCommand::AddCombatant(cmd) => {
                let name = self.add_combatant(channel, cmd).await?;
                let view = self.show_encounter(channel).await?;
                CommandOutput::Added { name, view }
            }
            TrackerCommand::UpdateField(cmd) => {
                CommandOutput::Updated(self.update_field(channel, cmd).await?)
            }
            TrackerCommand::RemoveCombatant(cmd) => {
                let (name, remaining) = self.remove_combatant(channel, &cmd.character).await?;
                CommandOutput::Removed { name, remaining }
            }
            TrackerCommand::ClearEncounter(_) => {
                self.clear_encounter(channel).await?;
                CommandOutput::Cleared
            }
            TrackerCommand::StartTurn(cmd) => {
                CommandOutput::TurnStarted(self.start_turn(channel, &cmd.character).await?)
            }
            TrackerCommand::EndTurn(cmd) => {
                CommandOutput::TurnEnded(self.end_turn(channel, cmd.character.as_deref()).await?)
            }
            TrackerCommand::SetStatus(cmd) => {
                let status: TurnStatus = cmd.status.parse()?;
                let name = self.set_status(channel, &cmd.character, status).await?;
                CommandOutput::StatusSet {
                    name,
                    status: status.to_string(),
                }
            }
            TrackerCommand::NextRound(_) => {
                let (round, readied, view) = self.next_round(channel).await?;
                CommandOutput::RoundAdvanced {
                    round,
                    readied,
                    view,
                }
            }
            TrackerCommand::SetRound(cmd) => {
                let view = self
                    .set_round(channel, cmd.round_number, cmd.ready_all)
                    .await?;
                CommandOutput::RoundSet {
                    round: cmd.round_number,
                    ready_all: cmd.ready_all,
                    view,
                }
            }
            TrackerCommand::ResetRound(cmd) => {
                let view = self.reset_round(channel, cmd.ready_all).await?;
                CommandOutput::RoundSet {
                    round: 1,
                    ready_all: cmd.ready_all,
                    view,
                }
            }
            TrackerCommand::ApplyDamage(cmd) => {
                CommandOutput::Damage(self.apply_damage(channel, &cmd.target, cmd.amount).await?)
            }
            TrackerCommand::ApplyHeal(cmd) => {
                CommandOutput::Heal(self.apply_heal(channel, &cmd.target, cmd.amount).await?)
            }
            TrackerCommand::AdjustRecoveries(cmd) => CommandOutput::Recoveries(
                self.adjust_recoveries(channel, &cmd.character, cmd.amount)
                    .await?,
            ),
            TrackerCommand::AddEffect(cmd) => {
                let name = self.add_effect(channel, &cmd.target, &cmd.effect).await?;
                CommandOutput::EffectAdded {
                    name,
                    effect: cmd.effect.trim().to_string(),
                    view: self.show_encounter(channel).await?,
                }
            }
            TrackerCommand::RemoveEffect(cmd) => {
                let (name, effect) = self
                    .remove_effect(channel, &cmd.target, cmd.effect_index)
                    .await?;
                CommandOutput::EffectRemoved {
                    name,
                    effect,
                    view: self.show_encounter(channel).await?,
                }
            }
            TrackerCommand::UseAbility(cmd) => {
                CommandOutput::Ability(Box::new(self.use_ability(channel, cmd).await?))
            }
            TrackerCommand::RollDice(cmd) => CommandOutput::Roll(self.roll(&cmd.expr)?),
            TrackerCommand::RollPower(cmd) => {
                CommandOutput::PowerRoll(self.power_roll(channel, cmd).await?)
            }
            TrackerCommand::ShowCombatant(cmd) => {
                CommandOutput::Sheet(self.show_combatant(channel, &cmd.character).await?)
            }
            TrackerCommand::ShowEncounter(_) => {
                CommandOutput::Tracker(self.show_encounter(channel).await?)
            }
        };

        Ok(output)
    }

    // ========================================================================
    // Roster
    // ========================================================================

    /// Add a combatant, resolving a named kit against the library first.
    pub async fn add_combatant(&self, channel: &ChannelKey, cmd: AddCombatant) -> Result<String> {
        let kit = KitSelection::from_options(
            cmd.kit.as_deref(),
            cmd.kit_melee.as_deref(),
            cmd.kit_ranged.as_deref(),
        )?;
        let loadout = kit.resolve(&self.content)?;

        let mut new = NewCombatant::new(cmd.name.trim(), cmd.stamina)
            .with_characteristics(Characteristics::new(cmd.m, cmd.a, cmd.r, cmd.i, cmd.p))
            .with_recoveries(cmd.recoveries)
            .with_kit(kit)
            .with_surges(cmd.su);
        new.stability = cmd.stability;
        new.speed = cmd.speed;
        new.shift = cmd.shift;
        new.heroic_resource = cmd.hr;
        if !cmd.is_player {
            new = new.monster(cmd.group.as_deref().map(str::trim));
        } else {
            new.group = cmd.group.clone();
        }

        let name = self
            .store
            .transact(channel, move |state| {
                state.add_combatant(new, loadout).map(|c| c.name.clone())
            })
            .await?;
        tracing::info!("Added {} to {}", name, channel);
        Ok(name)
    }

    pub async fn update_field(
        &self,
        channel: &ChannelKey,
        cmd: UpdateField,
    ) -> Result<FieldChange> {
        let field: FieldName = cmd.field.parse()?;
        let update = FieldUpdate::parse(field, &cmd.value, &self.content)?;
        self.store
            .transact(channel, |state| state.update_field(&cmd.name, update))
            .await
    }

    /// Remove a combatant, returning its name and how many remain.
    pub async fn remove_combatant(
        &self,
        channel: &ChannelKey,
        name: &str,
    ) -> Result<(String, usize)> {
        let removal = self
            .store
            .transact(channel, |state| state.remove_combatant(name))
            .await?;
        tracing::info!("Removed {} from {}", removal.removed.name, channel);
        Ok((removal.removed.name, removal.remaining))
    }

    pub async fn clear_encounter(&self, channel: &ChannelKey) -> Result<()> {
        self.store
            .transact(channel, |state| {
                state.clear();
                Ok(())
            })
            .await?;
        tracing::info!("Cleared encounter in {}", channel);
        Ok(())
    }

    // ========================================================================
    // Turns and Rounds
    // ========================================================================

    pub async fn start_turn(&self, channel: &ChannelKey, name: &str) -> Result<String> {
        self.store
            .transact(channel, |state| state.start_turn(name))
            .await
    }

    /// End the named combatant's turn, or the current one.
    pub async fn end_turn(&self, channel: &ChannelKey, name: Option<&str>) -> Result<String> {
        let name = name.filter(|n| !n.trim().is_empty());
        self.store
            .transact(channel, |state| state.end_turn(name))
            .await
    }

    pub async fn set_status(
        &self,
        channel: &ChannelKey,
        name: &str,
        status: TurnStatus,
    ) -> Result<String> {
        self.store
            .transact(channel, |state| state.set_status(name, status))
            .await
    }

    /// Advance the round, returning the new round, how many were readied and
    /// the tracker as it now stands.
    pub async fn next_round(&self, channel: &ChannelKey) -> Result<(u32, usize, TrackerView)> {
        self.store
            .transact(channel, |state| {
                let readied = state.next_round();
                Ok((state.round, readied, render(state)))
            })
            .await
    }

    pub async fn set_round(
        &self,
        channel: &ChannelKey,
        round: u32,
        ready_all: bool,
    ) -> Result<TrackerView> {
        self.store
            .transact(channel, |state| {
                state.set_round(round, ready_all)?;
                Ok(render(state))
            })
            .await
    }

    pub async fn reset_round(&self, channel: &ChannelKey, ready_all: bool) -> Result<TrackerView> {
        self.store
            .transact(channel, |state| {
                state.reset_round(ready_all);
                Ok(render(state))
            })
            .await
    }

    // ========================================================================
    // Stamina, Recoveries and Effects
    // ========================================================================

    pub async fn apply_damage(
        &self,
        channel: &ChannelKey,
        target: &str,
        amount: i32,
    ) -> Result<StaminaReport> {
        self.store
            .transact(channel, |state| resolution::apply_damage(state, target, amount))
            .await
    }

    pub async fn apply_heal(
        &self,
        channel: &ChannelKey,
        target: &str,
        amount: i32,
    ) -> Result<StaminaReport> {
        self.store
            .transact(channel, |state| resolution::apply_heal(state, target, amount))
            .await
    }

    pub async fn adjust_recoveries(
        &self,
        channel: &ChannelKey,
        name: &str,
        delta: i32,
    ) -> Result<RecoveryChange> {
        self.store
            .transact(channel, |state| {
                resolution::adjust_recoveries(state, name, delta)
            })
            .await
    }

    /// Attach an effect, returning the combatant's stored name.
    pub async fn add_effect(&self, channel: &ChannelKey, name: &str, effect: &str) -> Result<String> {
        self.store
            .transact(channel, |state| {
                state.add_effect(name, effect)?;
                Ok(state.get(name)?.name.clone())
            })
            .await
    }

    /// Remove the effect at 1-based `position`, returning the combatant's
    /// name and the removed text.
    pub async fn remove_effect(
        &self,
        channel: &ChannelKey,
        name: &str,
        position: usize,
    ) -> Result<(String, String)> {
        self.store
            .transact(channel, |state| {
                let effect = state.remove_effect(name, position)?;
                Ok((state.get(name)?.name.clone(), effect))
            })
            .await
    }

    // ========================================================================
    // Rolls and Abilities
    // ========================================================================

    /// Resolve an ability. With a target the damage and surges are applied;
    /// without one it is a roll only and nothing is saved.
    pub async fn use_ability(&self, channel: &ChannelKey, cmd: UseAbility) -> Result<AbilityOutcome> {
        let ability = self
            .content
            .ability(&cmd.ability)
            .ok_or_else(|| TrackerError::not_found(Missing::Ability, cmd.ability.trim()))?;

        let mode: AttackMode = cmd.mode.parse()?;
        let stat: StatChoice = cmd.stat.as_deref().unwrap_or("Auto").parse()?;
        let mut request = AbilityRequest::new(cmd.character.trim(), mode)
            .with_stat(stat)
            .with_modifiers(RollModifiers::new(cmd.edges, cmd.banes)?)
            .with_surges(cmd.surges);
        if let Some(target) = cmd.target.as_deref().filter(|t| !t.trim().is_empty()) {
            request = request.with_target(target);
        }

        let outcome = if request.target.is_some() {
            self.store
                .transact(channel, |state| {
                    resolution::resolve_ability(state, ability, &request, &mut rand::thread_rng())
                })
                .await?
        } else {
            let mut state = self.store.snapshot(channel).await?;
            resolution::resolve_ability(&mut state, ability, &request, &mut rand::thread_rng())?
        };

        if let Some(hit) = &outcome.hit {
            tracing::info!(
                "{} used {} on {} for {} damage",
                outcome.actor,
                outcome.ability,
                hit.name,
                hit.damage
            );
        }
        Ok(outcome)
    }

    /// Free-form dice roll.
    pub fn roll(&self, expr: &str) -> Result<DiceRoll> {
        Ok(eval_dice_expression(expr, self.config.dice_limits)?)
    }

    /// Power roll for a test, using a combatant's characteristic if one is named.
    pub async fn power_roll(&self, channel: &ChannelKey, cmd: RollPower) -> Result<CharacteristicRoll> {
        let characteristic: Characteristic = cmd.stat.parse()?;
        let character = cmd.character.as_deref().filter(|c| !c.trim().is_empty());

        let state = match character {
            Some(_) => self.store.snapshot(channel).await?,
            None => EncounterState::new(),
        };
        resolution::characteristic_roll(
            &state,
            characteristic,
            character,
            cmd.skilled,
            cmd.modifier,
            &mut rand::thread_rng(),
        )
    }

    // ========================================================================
    // Views and Suggestions
    // ========================================================================

    pub async fn show_combatant(&self, channel: &ChannelKey, name: &str) -> Result<CombatantSheet> {
        let state = self.store.snapshot(channel).await?;
        Ok(CombatantSheet::from(state.get(name)?))
    }

    pub async fn show_encounter(&self, channel: &ChannelKey) -> Result<TrackerView> {
        let state = self.store.snapshot(channel).await?;
        Ok(render(&state))
    }

    /// Combatant names starting with `prefix` (case-insensitive).
    pub async fn list_combatant_names(&self, channel: &ChannelKey, prefix: &str) -> Result<Vec<String>> {
        let state = self.store.snapshot(channel).await?;
        let names = state.entries.iter().map(|c| c.name.clone());
        Ok(self.suggest(names, prefix))
    }

    /// Monster group names starting with `prefix` (case-insensitive).
    pub async fn list_groups(&self, channel: &ChannelKey, prefix: &str) -> Result<Vec<String>> {
        let state = self.store.snapshot(channel).await?;
        Ok(self.suggest(state.group_names().into_iter(), prefix))
    }

    pub fn ability_names(&self, prefix: &str) -> Vec<String> {
        self.content
            .ability_names(prefix, self.config.suggestion_limit)
    }

    pub fn kit_names(&self, prefix: &str) -> Vec<String> {
        self.content.kit_names(prefix, self.config.suggestion_limit)
    }

    fn suggest(&self, names: impl Iterator<Item = String>, prefix: &str) -> Vec<String> {
        let prefix = prefix.trim().to_lowercase();
        names
            .filter(|name| name.to_lowercase().starts_with(&prefix))
            .take(self.config.suggestion_limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::KitBonuses;
    use crate::commands::ApplyDamage;
    use crate::content::{AbilityDefinition, KitDefinition, TierOutcome, TierTable};
    use crate::error::ErrorKind;
    use crate::store::InMemoryMedium;
    use serde_json::json;

    fn library() -> ContentLibrary {
        let mut library = ContentLibrary::new();
        library.insert_kit(KitDefinition {
            name: "Panther".to_string(),
            melee: KitBonuses::new(2, 2, 2),
            ranged: KitBonuses::new(0, 0, 0),
        });
        library.insert_ability(AbilityDefinition {
            name: "Brutal Slam".to_string(),
            stats: vec!["M".to_string()],
            tiers: TierTable {
                tier1: TierOutcome {
                    damage: 3,
                    ..Default::default()
                },
                tier2: TierOutcome {
                    damage: 6,
                    ..Default::default()
                },
                tier3: TierOutcome {
                    damage: 9,
                    ..Default::default()
                },
            },
            ..Default::default()
        });
        library
    }

    fn tracker() -> Tracker {
        Tracker::new(
            Arc::new(InMemoryMedium::new()),
            library(),
            TrackerConfig::new(),
        )
    }

    async fn run(tracker: &Tracker, channel: &ChannelKey, name: &str, args: serde_json::Value) -> Result<CommandOutput> {
        let command = TrackerCommand::from_invocation(name, args)?;
        tracker.execute(channel, command).await
    }

    fn hero(name: &str) -> serde_json::Value {
        json!({
            "name": name, "stamina": 30, "stability": 1,
            "m": 2, "a": 1, "r": 0, "i": 0, "p": 1,
            "speed": 5, "shift": 1, "recoveries": 8, "su": 3
        })
    }

    #[tokio::test]
    async fn test_add_with_named_kit() {
        let tracker = tracker();
        let channel = ChannelKey::from("table");

        let mut args = hero("Aria");
        args["kit"] = json!("panther");
        run(&tracker, &channel, "add_combatant", args).await.unwrap();

        let state = tracker.store().snapshot(&channel).await.unwrap();
        let aria = state.get("aria").unwrap();
        assert_eq!(aria.loadout.kit.as_deref(), Some("Panther"));
        assert_eq!(aria.loadout.melee, KitBonuses::new(2, 2, 2));
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_kit_and_mixed_kit() {
        let tracker = tracker();
        let channel = ChannelKey::from("table");

        let mut args = hero("Aria");
        args["kit"] = json!("Nope");
        let err = run(&tracker, &channel, "add_combatant", args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut args = hero("Aria");
        args["kit"] = json!("Panther");
        args["kit_melee"] = json!("1 1 1");
        let err = run(&tracker, &channel, "add_combatant", args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(tracker.store().snapshot(&channel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ability_with_target_spends_surges() {
        let tracker = tracker();
        let channel = ChannelKey::from("table");
        run(&tracker, &channel, "add_combatant", hero("Aria")).await.unwrap();
        run(&tracker, &channel, "add_combatant", hero("Goblin")).await.unwrap();

        let output = run(
            &tracker,
            &channel,
            "use_ability",
            json!({"character": "Aria", "ability": "brutal slam", "mode": "Melee", "surges": 2, "target": "Goblin"}),
        )
        .await
        .unwrap();

        let CommandOutput::Ability(outcome) = output else {
            panic!("expected an ability outcome");
        };
        let hit = outcome.hit.as_ref().unwrap();

        let state = tracker.store().snapshot(&channel).await.unwrap();
        assert_eq!(state.get("Aria").unwrap().surges, 1);
        assert_eq!(state.get("Goblin").unwrap().stamina, 30 - hit.damage);
    }

    #[tokio::test]
    async fn test_ability_without_target_changes_nothing() {
        let tracker = tracker();
        let channel = ChannelKey::from("table");
        run(&tracker, &channel, "add_combatant", hero("Aria")).await.unwrap();

        let before = tracker.store().snapshot(&channel).await.unwrap();
        run(
            &tracker,
            &channel,
            "use_ability",
            json!({"character": "Aria", "ability": "Brutal Slam", "mode": "Melee", "surges": 2}),
        )
        .await
        .unwrap();
        assert_eq!(tracker.store().snapshot(&channel).await.unwrap(), before);

        let err = run(
            &tracker,
            &channel,
            "use_ability",
            json!({"character": "Aria", "ability": "Fireball", "mode": "Melee"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_suggestions() {
        let tracker = tracker();
        let channel = ChannelKey::from("table");
        run(&tracker, &channel, "add_combatant", hero("Aria")).await.unwrap();
        run(&tracker, &channel, "add_combatant", hero("Arden")).await.unwrap();
        run(&tracker, &channel, "add_combatant", hero("Borin")).await.unwrap();

        let names = tracker.list_combatant_names(&channel, "ar").await.unwrap();
        assert_eq!(names, vec!["Aria".to_string(), "Arden".to_string()]);
        assert_eq!(tracker.ability_names("bru"), vec!["brutal_slam".to_string()]);
        assert_eq!(tracker.kit_names(""), vec!["panther".to_string()]);
    }

    #[tokio::test]
    async fn test_execute_direct_command() {
        let tracker = tracker();
        let channel = ChannelKey::from("table");
        run(&tracker, &channel, "add_combatant", hero("Aria")).await.unwrap();

        let output = tracker
            .execute(
                &channel,
                TrackerCommand::ApplyDamage(ApplyDamage {
                    target: "aria".to_string(),
                    amount: 40,
                }),
            )
            .await
            .unwrap();
        assert!(output.to_string().contains("Stamina 0/30"));
    }

    #[tokio::test]
    async fn test_huge_heal_stops_at_max() {
        let tracker = tracker();
        let channel = ChannelKey::from("table");
        run(&tracker, &channel, "add_combatant", hero("Aria")).await.unwrap();

        tracker.apply_damage(&channel, "Aria", 10).await.unwrap();
        let report = tracker.apply_heal(&channel, "Aria", i32::MAX).await.unwrap();
        assert_eq!(report.change.before, 20);
        assert_eq!(report.change.after, 30);

        let report = tracker.apply_damage(&channel, "Aria", i32::MAX).await.unwrap();
        assert_eq!(report.change.after, 0);
    }
}

//! Commands the tracker exposes to a chat layer.
//!
//! Each command is a typed struct deriving [`Command`], so its name,
//! description and option schema come from the struct itself. A chat layer
//! registers [`TrackerCommand::definitions`] and turns invocations back into
//! commands with [`TrackerCommand::from_invocation`].

use crate::combatant::FieldChange;
use crate::dice::DiceRoll;
use crate::error::{Result, TrackerError};
use crate::render::{CombatantSheet, TrackerView};
use crate::resolution::{AbilityOutcome, CharacteristicRoll, RecoveryChange, StaminaReport};
use crate::Command;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A command as registered with a chat layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the command's options.
    pub options: serde_json::Value,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Roster
// ============================================================================

/// Add a Draw Steel character to the tracker
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "add_combatant")]
pub struct AddCombatant {
    pub name: String,
    /// Stamina
    pub stamina: i32,
    /// Stability (STA)
    pub stability: i32,
    /// Might
    pub m: i32,
    /// Agility
    pub a: i32,
    /// Reason
    pub r: i32,
    /// Intuition
    pub i: i32,
    /// Presence
    pub p: i32,
    pub speed: i32,
    pub shift: i32,
    /// Maximum recoveries
    pub recoveries: i32,
    /// Pick a kit (or leave blank to enter custom bonuses)
    pub kit: Option<String>,
    /// Melee kit bonuses (e.g. '1 2 2')
    pub kit_melee: Option<String>,
    /// Ranged kit bonuses (e.g. '1 1 1')
    pub kit_ranged: Option<String>,
    #[serde(default = "default_true")]
    #[command(optional)]
    pub is_player: bool,
    /// Monster initiative group (enemies only)
    pub group: Option<String>,
    /// Surges
    #[serde(default)]
    #[command(optional)]
    pub su: i32,
    /// Heroic Resources
    #[serde(default)]
    #[command(optional)]
    pub hr: i32,
}

/// Update a single field on a character in the tracker
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "update_field")]
pub struct UpdateField {
    /// Existing character name
    pub name: String,
    /// Which field to update
    #[command(
        choices = "name,stamina,max_stamina,recoveries,max_recoveries,STA,M,A,R,I,P,speed,shift,kit_melee,kit_ranged,is_player,group,kit,Su,HR"
    )]
    pub field: String,
    /// New value (e.g. '27' or '1 2 2' or 'true')
    pub value: String,
}

/// Remove a character from the tracker
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "remove_combatant")]
pub struct RemoveCombatant {
    pub character: String,
}

/// Clear the tracker
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "clear_encounter")]
pub struct ClearEncounter {}

// ============================================================================
// Turns and Rounds
// ============================================================================

/// Start a character's turn (sets the arrow)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "start_turn")]
pub struct StartTurn {
    pub character: String,
}

/// End a character's turn (moves them to Turn Over)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "end_turn")]
pub struct EndTurn {
    /// Defaults to the current turn
    pub character: Option<String>,
}

/// Manually set a character's status (ready/done)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "set_status")]
pub struct SetStatus {
    pub character: String,
    #[command(choices = "ready,done")]
    pub status: String,
}

/// Start next round (move everyone from Turn Over back to ready)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "next_round")]
pub struct NextRound {}

/// Set the current round number (e.g., 1)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "set_round")]
pub struct SetRound {
    pub round_number: u32,
    /// If true, move everyone to Ready
    #[serde(default)]
    #[command(optional)]
    pub ready_all: bool,
}

/// Reset the round counter to 1 (optionally ready everyone)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "reset_round")]
pub struct ResetRound {
    #[serde(default)]
    #[command(optional)]
    pub ready_all: bool,
}

// ============================================================================
// Stamina, Recoveries and Effects
// ============================================================================

/// Deal damage to a character in the tracker
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "apply_damage")]
pub struct ApplyDamage {
    pub target: String,
    /// Damage to apply (positive integer)
    pub amount: i32,
}

/// Heal a character in the tracker (cannot exceed max_stamina)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "apply_heal")]
pub struct ApplyHeal {
    pub target: String,
    /// Healing amount (positive integer)
    pub amount: i32,
}

/// Use or restore recoveries for a character
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "adjust_recoveries")]
pub struct AdjustRecoveries {
    pub character: String,
    /// Amount to change (negative to use, positive to restore)
    pub amount: i32,
}

/// Add an effect to a character (shows in tracker)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "add_effect")]
pub struct AddEffect {
    /// Character to apply effect to
    pub target: String,
    /// Effect description (e.g., 'Stunned until round 3')
    pub effect: String,
}

/// Remove an effect from a character
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "remove_effect")]
pub struct RemoveEffect {
    /// Character to remove effect from
    pub target: String,
    /// Effect number to remove (1 = first effect)
    pub effect_index: usize,
}

// ============================================================================
// Rolls and Abilities
// ============================================================================

/// Use a Draw Steel ability (applies kit bonuses)
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "use_ability")]
pub struct UseAbility {
    /// Character name in this channel's tracker
    pub character: String,
    /// Ability name (e.g., Fade)
    pub ability: String,
    #[command(choices = "Melee,Ranged")]
    pub mode: String,
    /// Characteristic to roll with (Auto picks the best allowed one)
    #[command(choices = "Auto,M,A,R,I,P")]
    pub stat: Option<String>,
    /// 0, 1 (+2), or 2 (tier up 1)
    #[serde(default)]
    #[command(optional)]
    pub edges: u8,
    /// 0, 1 (-2), or 2 (tier down 1)
    #[serde(default)]
    #[command(optional)]
    pub banes: u8,
    /// Number of surges to use (adds stat bonus damage per surge)
    #[serde(default)]
    #[command(optional)]
    pub surges: u32,
    /// Target character to apply damage to
    pub target: Option<String>,
}

/// Freeform dice roll like '2d10+3+1d4-2'
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "roll")]
pub struct RollDice {
    /// Dice expression (e.g., 2d10+3+1d4-2)
    pub expr: String,
}

/// Power Roll (2d10 + stat [+2 if Skilled] + mod). If a character is given, pulls their stat.
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "power_roll")]
pub struct RollPower {
    #[command(choices = "M,A,R,I,P")]
    pub stat: String,
    pub character: Option<String>,
    #[serde(default)]
    #[command(optional)]
    pub skilled: bool,
    #[serde(default, rename = "mod")]
    #[command(optional, rename = "mod")]
    pub modifier: i32,
}

/// Show a character's full stats
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "show_combatant")]
pub struct ShowCombatant {
    pub character: String,
}

/// Show the current initiative tracker state
#[derive(Command, Debug, Clone, PartialEq, Deserialize)]
#[command(name = "show_encounter")]
pub struct ShowEncounter {}

// ============================================================================
// Dispatch
// ============================================================================

/// Any tracker command.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCommand {
    AddCombatant(AddCombatant),
    UpdateField(UpdateField),
    RemoveCombatant(RemoveCombatant),
    ClearEncounter(ClearEncounter),
    StartTurn(StartTurn),
    EndTurn(EndTurn),
    SetStatus(SetStatus),
    NextRound(NextRound),
    SetRound(SetRound),
    ResetRound(ResetRound),
    ApplyDamage(ApplyDamage),
    ApplyHeal(ApplyHeal),
    AdjustRecoveries(AdjustRecoveries),
    AddEffect(AddEffect),
    RemoveEffect(RemoveEffect),
    UseAbility(UseAbility),
    RollDice(RollDice),
    RollPower(RollPower),
    ShowCombatant(ShowCombatant),
    ShowEncounter(ShowEncounter),
}

fn parse_args<T: for<'de> Deserialize<'de>>(name: &str, args: serde_json::Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| TrackerError::validation(format!("Bad options for /{name}: {e}")))
}

impl TrackerCommand {
    /// Definitions of every command, in registration order.
    pub fn definitions() -> Vec<CommandDefinition> {
        vec![
            AddCombatant::definition(),
            UpdateField::definition(),
            RemoveCombatant::definition(),
            ClearEncounter::definition(),
            StartTurn::definition(),
            EndTurn::definition(),
            SetStatus::definition(),
            NextRound::definition(),
            SetRound::definition(),
            ResetRound::definition(),
            ApplyDamage::definition(),
            ApplyHeal::definition(),
            AdjustRecoveries::definition(),
            AddEffect::definition(),
            RemoveEffect::definition(),
            UseAbility::definition(),
            RollDice::definition(),
            RollPower::definition(),
            ShowCombatant::definition(),
            ShowEncounter::definition(),
        ]
    }

    /// Build a command from its name and a JSON object of options.
    pub fn from_invocation(name: &str, args: serde_json::Value) -> Result<Self> {
        let name = name.trim().trim_start_matches('/');
        let args = if args.is_null() {
            serde_json::json!({})
        } else {
            args
        };

        let command = match name {
            n if n == AddCombatant::command_name() => Self::AddCombatant(parse_args(n, args)?),
            n if n == UpdateField::command_name() => Self::UpdateField(parse_args(n, args)?),
            n if n == RemoveCombatant::command_name() => {
                Self::RemoveCombatant(parse_args(n, args)?)
            }
            n if n == ClearEncounter::command_name() => Self::ClearEncounter(parse_args(n, args)?),
            n if n == StartTurn::command_name() => Self::StartTurn(parse_args(n, args)?),
            n if n == EndTurn::command_name() => Self::EndTurn(parse_args(n, args)?),
            n if n == SetStatus::command_name() => Self::SetStatus(parse_args(n, args)?),
            n if n == NextRound::command_name() => Self::NextRound(parse_args(n, args)?),
            n if n == SetRound::command_name() => Self::SetRound(parse_args(n, args)?),
            n if n == ResetRound::command_name() => Self::ResetRound(parse_args(n, args)?),
            n if n == ApplyDamage::command_name() => Self::ApplyDamage(parse_args(n, args)?),
            n if n == ApplyHeal::command_name() => Self::ApplyHeal(parse_args(n, args)?),
            n if n == AdjustRecoveries::command_name() => {
                Self::AdjustRecoveries(parse_args(n, args)?)
            }
            n if n == AddEffect::command_name() => Self::AddEffect(parse_args(n, args)?),
            n if n == RemoveEffect::command_name() => Self::RemoveEffect(parse_args(n, args)?),
            n if n == UseAbility::command_name() => Self::UseAbility(parse_args(n, args)?),
            n if n == RollDice::command_name() => Self::RollDice(parse_args(n, args)?),
            n if n == RollPower::command_name() => Self::RollPower(parse_args(n, args)?),
            n if n == ShowCombatant::command_name() => Self::ShowCombatant(parse_args(n, args)?),
            n if n == ShowEncounter::command_name() => Self::ShowEncounter(parse_args(n, args)?),
            other => {
                return Err(TrackerError::validation(format!("Unknown command: /{other}")))
            }
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddCombatant(_) => AddCombatant::command_name(),
            Self::UpdateField(_) => UpdateField::command_name(),
            Self::RemoveCombatant(_) => RemoveCombatant::command_name(),
            Self::ClearEncounter(_) => ClearEncounter::command_name(),
            Self::StartTurn(_) => StartTurn::command_name(),
            Self::EndTurn(_) => EndTurn::command_name(),
            Self::SetStatus(_) => SetStatus::command_name(),
            Self::NextRound(_) => NextRound::command_name(),
            Self::SetRound(_) => SetRound::command_name(),
            Self::ResetRound(_) => ResetRound::command_name(),
            Self::ApplyDamage(_) => ApplyDamage::command_name(),
            Self::ApplyHeal(_) => ApplyHeal::command_name(),
            Self::AdjustRecoveries(_) => AdjustRecoveries::command_name(),
            Self::AddEffect(_) => AddEffect::command_name(),
            Self::RemoveEffect(_) => RemoveEffect::command_name(),
            Self::UseAbility(_) => UseAbility::command_name(),
            Self::RollDice(_) => RollDice::command_name(),
            Self::RollPower(_) => RollPower::command_name(),
            Self::ShowCombatant(_) => ShowCombatant::command_name(),
            Self::ShowEncounter(_) => ShowEncounter::command_name(),
        }
    }

    /// Whether the command can change the encounter.
    pub fn is_mutation(&self) -> bool {
        match self {
            Self::UseAbility(cmd) => cmd.target.is_some(),
            Self::RollDice(_) | Self::RollPower(_) | Self::ShowCombatant(_) | Self::ShowEncounter(_) => {
                false
            }
            _ => true,
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// What a command produced.
#[derive(Debug, Clone)]
pub enum CommandOutput {
    Added { name: String, view: TrackerView },
    Updated(FieldChange),
    Removed { name: String, remaining: usize },
    Cleared,
    TurnStarted(String),
    TurnEnded(String),
    StatusSet { name: String, status: String },
    RoundAdvanced { round: u32, readied: usize, view: TrackerView },
    RoundSet { round: u32, ready_all: bool, view: TrackerView },
    Damage(StaminaReport),
    Heal(StaminaReport),
    Recoveries(RecoveryChange),
    EffectAdded { name: String, effect: String, view: TrackerView },
    EffectRemoved { name: String, effect: String, view: TrackerView },
    Ability(Box<AbilityOutcome>),
    Roll(DiceRoll),
    PowerRoll(CharacteristicRoll),
    Sheet(CombatantSheet),
    Tracker(TrackerView),
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Added { view, .. } => write!(f, "{view}"),
            CommandOutput::Updated(change) => write!(
                f,
                "✏️ Character Updated: {} • {} `{}` → `{}`",
                change.combatant, change.field, change.old, change.new
            ),
            CommandOutput::Removed { name, remaining } => {
                write!(f, "🗑️ Removed **{name}** • {remaining} combatant(s) remaining")
            }
            CommandOutput::Cleared => write!(f, "Cleared."),
            CommandOutput::TurnStarted(name) => write!(f, "➡️ It is now **{name}**'s turn."),
            CommandOutput::TurnEnded(name) => write!(f, "✅ **{name}** moved to **Turn Over**."),
            CommandOutput::StatusSet { name, status } => {
                write!(f, "Set **{name}** to `{status}`.")
            }
            CommandOutput::RoundAdvanced {
                round,
                readied,
                view,
            } => write!(
                f,
                "🔁 **Round {round}** begins. {readied} combatant(s) readied.\n{view}"
            ),
            CommandOutput::RoundSet {
                round,
                ready_all,
                view,
            } => {
                let suffix = if *ready_all {
                    " and all combatants readied."
                } else {
                    "."
                };
                write!(f, "⏱️ Round set to **{round}**{suffix}\n{view}")
            }
            CommandOutput::Damage(report) => write!(
                f,
                "⚔️ **{}** takes {} damage • Stamina {}/{}",
                report.name, report.amount, report.change.after, report.change.max
            ),
            CommandOutput::Heal(report) => write!(
                f,
                "🩹 **{}** heals {} • Stamina {}/{}",
                report.name, report.amount, report.change.after, report.change.max
            ),
            CommandOutput::Recoveries(change) => write!(f, "{change}"),
            CommandOutput::EffectAdded { name, effect, view } => {
                write!(f, "✨ Effect added to **{name}**: {effect}\n{view}")
            }
            CommandOutput::EffectRemoved { name, effect, view } => {
                write!(f, "🗑️ Effect removed from **{name}**: {effect}\n{view}")
            }
            CommandOutput::Ability(outcome) => write!(f, "{outcome}"),
            CommandOutput::Roll(roll) => write!(f, "{roll}"),
            CommandOutput::PowerRoll(roll) => write!(f, "{roll}"),
            CommandOutput::Sheet(sheet) => write!(f, "{sheet}"),
            CommandOutput::Tracker(view) => write!(f, "{view}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_definitions_cover_every_command() {
        let definitions = TrackerCommand::definitions();
        assert_eq!(definitions.len(), 20);

        let mut names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 20);
        assert!(definitions.iter().all(|d| !d.description.is_empty()));
    }

    #[test]
    fn test_schema_marks_required_and_choices() {
        let schema = UseAbility::options_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "character"));
        assert!(required.iter().any(|v| v == "mode"));
        assert!(!required.iter().any(|v| v == "target"));
        assert!(!required.iter().any(|v| v == "edges"));
        assert_eq!(schema["properties"]["mode"]["enum"], json!(["Melee", "Ranged"]));
        assert_eq!(schema["properties"]["surges"]["minimum"], 0);

        let schema = RollPower::options_schema();
        assert!(schema["properties"]["mod"].is_object());
    }

    #[test]
    fn test_from_invocation() {
        let command = TrackerCommand::from_invocation(
            "/apply_damage",
            json!({"target": "Goblin", "amount": 5}),
        )
        .unwrap();
        assert_eq!(
            command,
            TrackerCommand::ApplyDamage(ApplyDamage {
                target: "Goblin".to_string(),
                amount: 5
            })
        );
        assert_eq!(command.name(), "apply_damage");
        assert!(command.is_mutation());

        let command = TrackerCommand::from_invocation("next_round", serde_json::Value::Null).unwrap();
        assert_eq!(command, TrackerCommand::NextRound(NextRound {}));

        let command =
            TrackerCommand::from_invocation("power_roll", json!({"stat": "M", "mod": 2})).unwrap();
        match command {
            TrackerCommand::RollPower(roll) => {
                assert_eq!(roll.modifier, 2);
                assert!(!roll.skilled);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_add_combatant_defaults() {
        let command = TrackerCommand::from_invocation(
            "add_combatant",
            json!({
                "name": "Aria", "stamina": 30, "stability": 1,
                "m": 2, "a": 1, "r": 0, "i": 0, "p": 1,
                "speed": 5, "shift": 1, "recoveries": 8
            }),
        )
        .unwrap();
        match command {
            TrackerCommand::AddCombatant(add) => {
                assert!(add.is_player);
                assert_eq!(add.su, 0);
                assert!(add.kit.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_invocations() {
        let err = TrackerCommand::from_invocation("fireball", json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = TrackerCommand::from_invocation("apply_heal", json!({"target": "Aria"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

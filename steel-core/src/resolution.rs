//! Combat resolution: abilities, damage, healing and recoveries.
//!
//! Resolution validates everything it needs (actor, surges, target) before
//! touching the encounter, so a failed request leaves the state unchanged.

use crate::combatant::{AttackMode, Characteristic, Combatant, StaminaChange};
use crate::content::AbilityDefinition;
use crate::dice::{power_roll_with_rng, PowerRoll, Tier};
use crate::encounter::EncounterState;
use crate::error::{Missing, Result, TrackerError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Edges and Banes
// ============================================================================

/// How many edges (or banes) apply to a roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeCount {
    #[default]
    None,
    Single,
    Double,
}

impl EdgeCount {
    pub fn count(&self) -> u8 {
        match self {
            EdgeCount::None => 0,
            EdgeCount::Single => 1,
            EdgeCount::Double => 2,
        }
    }
}

impl TryFrom<u8> for EdgeCount {
    type Error = TrackerError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(EdgeCount::None),
            1 => Ok(EdgeCount::Single),
            2 => Ok(EdgeCount::Double),
            _ => Err(TrackerError::validation(format!(
                "Edges and banes range from 0 to 2, got {value}"
            ))),
        }
    }
}

/// What the edge/bane combination does to a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollAdjustment {
    None,
    /// Added to the roll total before the tier is read.
    Numeric(i32),
    /// Applied to the tier after it is read, clamped to 1..=3.
    TierShift(i32),
}

impl RollAdjustment {
    pub fn numeric(&self) -> i32 {
        match self {
            RollAdjustment::Numeric(n) => *n,
            _ => 0,
        }
    }

    pub fn tier_shift(&self) -> i32 {
        match self {
            RollAdjustment::TierShift(n) => *n,
            _ => 0,
        }
    }
}

/// Edges and banes on one roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollModifiers {
    pub edges: EdgeCount,
    pub banes: EdgeCount,
}

impl RollModifiers {
    pub fn new(edges: u8, banes: u8) -> Result<Self> {
        Ok(Self {
            edges: EdgeCount::try_from(edges)?,
            banes: EdgeCount::try_from(banes)?,
        })
    }

    pub fn adjustment(&self) -> RollAdjustment {
        use EdgeCount::{Double, None, Single};

        match (self.edges, self.banes) {
            (Single, None) => RollAdjustment::Numeric(2),
            (None, Single) => RollAdjustment::Numeric(-2),
            (Double, None) => RollAdjustment::TierShift(1),
            (None, Double) => RollAdjustment::TierShift(-1),
            (None, None)
            | (Single, Single)
            | (Single, Double)
            | (Double, Single)
            | (Double, Double) => RollAdjustment::None,
        }
    }
}

// ============================================================================
// Abilities
// ============================================================================

/// Which characteristic an ability is rolled with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatChoice {
    #[default]
    Auto,
    Fixed(Characteristic),
}

impl FromStr for StatChoice {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() || s.trim().eq_ignore_ascii_case("auto") {
            Ok(StatChoice::Auto)
        } else {
            Ok(StatChoice::Fixed(s.parse()?))
        }
    }
}

/// A request to use an ability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityRequest {
    pub actor: String,
    pub mode: AttackMode,
    pub stat: StatChoice,
    pub modifiers: RollModifiers,
    pub surges: u32,
    pub target: Option<String>,
}

impl AbilityRequest {
    pub fn new(actor: impl Into<String>, mode: AttackMode) -> Self {
        Self {
            actor: actor.into(),
            mode,
            stat: StatChoice::Auto,
            modifiers: RollModifiers::default(),
            surges: 0,
            target: None,
        }
    }

    pub fn with_stat(mut self, stat: StatChoice) -> Self {
        self.stat = stat;
        self
    }

    pub fn with_modifiers(mut self, modifiers: RollModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_surges(mut self, surges: u32) -> Self {
        self.surges = surges;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Damage landed on a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHit {
    pub name: String,
    pub damage: i32,
    pub stamina: StaminaChange,
}

/// Everything worth showing about a resolved ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityOutcome {
    pub ability: String,
    pub tags: Vec<String>,
    pub action: Option<String>,
    pub range: Option<String>,
    pub ability_target: Option<String>,
    pub allowed_stats: Vec<Characteristic>,
    pub cost: Option<String>,
    pub extra_effect: Option<String>,

    pub actor: String,
    pub mode: AttackMode,
    pub modifiers: RollModifiers,
    pub stat: Characteristic,
    pub stat_value: i32,
    pub dice: [u32; 2],
    pub adjustment: RollAdjustment,
    pub total: i32,
    pub natural_tier: Tier,
    pub tier: Tier,

    pub base_damage: i32,
    pub kit_bonus: i32,
    pub surges: u32,
    pub surge_bonus: i32,
    pub total_damage: i32,
    pub effects: Vec<String>,
    pub rider: Option<String>,

    /// Set only when a target was supplied and damage applied.
    pub hit: Option<TargetHit>,
}

/// ` + 3` or ` - 3`, for joining onto a running sum.
fn signed_term(value: i32) -> String {
    if value < 0 {
        format!(" - {}", value.unsigned_abs())
    } else {
        format!(" + {value}")
    }
}

impl AbilityOutcome {
    pub fn roll_breakdown(&self) -> String {
        let mut text = format!(
            "{} + {}{}({})",
            self.dice[0],
            self.dice[1],
            signed_term(self.stat_value),
            self.stat
        );
        let numeric = self.adjustment.numeric();
        if numeric != 0 {
            text.push_str(&format!("{} (edge/bane)", signed_term(numeric)));
        }
        format!("{text} = **{}**", self.total)
    }

    /// Explains a tier moved by a double edge or bane.
    pub fn tier_note(&self) -> Option<&'static str> {
        if self.tier == self.natural_tier {
            return None;
        }
        match self.adjustment.tier_shift() {
            1 => Some("↑ from Double Edge"),
            -1 => Some("↓ from Double Bane"),
            _ => None,
        }
    }

    pub fn damage_breakdown(&self) -> String {
        if self.base_damage == 0 {
            return format!("**{}**", self.total_damage);
        }
        let mut text = format!(
            "{}{} (stat){} (kit)",
            self.base_damage,
            signed_term(self.stat_value),
            signed_term(self.kit_bonus)
        );
        if self.surge_bonus != 0 {
            text.push_str(&format!("{} (surges)", signed_term(self.surge_bonus)));
        }
        text.push_str(&format!(" = **{}**", self.total_damage));
        text
    }
}

impl fmt::Display for AbilityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✨ {}", self.ability)?;
        if !self.tags.is_empty() {
            writeln!(f, "Tags: {}", self.tags.join(", "))?;
        }
        if let Some(range) = &self.range {
            writeln!(f, "Range: {range}")?;
        }
        if let Some(action) = &self.action {
            writeln!(f, "Action: {action}")?;
        }
        if let Some(target) = &self.ability_target {
            writeln!(f, "Ability Target: {target}")?;
        }
        if !self.allowed_stats.is_empty() {
            let stats: Vec<&str> = self.allowed_stats.iter().map(|c| c.abbreviation()).collect();
            writeln!(f, "Allowed Stats: {}", stats.join(", "))?;
        }
        if let Some(cost) = &self.cost {
            writeln!(f, "Cost: {cost}")?;
        }
        writeln!(f, "Roll: {}", self.roll_breakdown())?;
        match self.tier_note() {
            Some(note) => writeln!(f, "Tier: {} ({note})", self.tier.number())?,
            None => writeln!(f, "Tier: {}", self.tier.number())?,
        }
        writeln!(f, "Damage: {}", self.damage_breakdown())?;
        if !self.effects.is_empty() {
            writeln!(f, "Effects:")?;
            for effect in &self.effects {
                writeln!(f, "• {effect}")?;
            }
        }
        if let Some(rider) = &self.rider {
            writeln!(f, "Rider: {rider}")?;
        }
        if let Some(extra) = &self.extra_effect {
            writeln!(f, "Effect: {extra}")?;
        }
        if let Some(hit) = &self.hit {
            writeln!(
                f,
                "Target: **{}** took **{}** damage (Stamina {}/{})",
                hit.name, hit.damage, hit.stamina.after, hit.stamina.max
            )?;
        }
        write!(
            f,
            "{} • Stat {} • Edges {} • Banes {}",
            self.mode,
            self.stat,
            self.modifiers.edges.count(),
            self.modifiers.banes.count()
        )?;
        if self.surges > 0 {
            write!(f, " • Surges {}", self.surges)?;
        }
        Ok(())
    }
}

/// Roll an ability for `request.actor` and, when a target is named, apply
/// the damage and spend the surges.
pub fn resolve_ability<R: Rng>(
    state: &mut EncounterState,
    ability: &AbilityDefinition,
    request: &AbilityRequest,
    rng: &mut R,
) -> Result<AbilityOutcome> {
    let actor = state.get(&request.actor)?.clone();

    if request.surges as i64 > actor.surges as i64 {
        return Err(TrackerError::validation(format!(
            "You only have {} surge(s) to use but you selected {}.",
            actor.surges, request.surges
        )));
    }

    let target_index = match &request.target {
        Some(name) => Some(
            state
                .position(name)
                .ok_or_else(|| TrackerError::not_found(Missing::Combatant, name.trim()))?,
        ),
        None => None,
    };

    let allowed = ability.allowed_stats();
    let stat = match request.stat {
        StatChoice::Fixed(c) => c,
        StatChoice::Auto => actor.characteristics.highest_among(&allowed),
    };
    let stat_value = actor.characteristic(stat);

    let adjustment = request.modifiers.adjustment();
    let roll = power_roll_with_rng(rng, stat_value, false, adjustment.numeric());
    let tier = roll.tier.shifted(adjustment.tier_shift());
    let outcome = ability.tiers.get(tier);

    let surge_bonus = actor.characteristics.highest().saturating_mul(request.surges as i32);
    let (kit_bonus, total_damage) = damage_for(
        &actor,
        request.mode,
        tier,
        outcome.damage,
        stat_value,
        surge_bonus,
    );

    let hit = match target_index {
        Some(index) => {
            let target = &mut state.entries[index];
            let stamina = target.take_damage(total_damage);
            let name = target.name.clone();
            if let Some(actor) = state.find_mut(&actor.name) {
                actor.surges -= request.surges as i32;
            }
            Some(TargetHit {
                name,
                damage: total_damage,
                stamina,
            })
        }
        None => None,
    };

    Ok(AbilityOutcome {
        ability: ability.name.clone(),
        tags: ability.tags.clone(),
        action: ability.action.clone(),
        range: ability
            .range
            .as_ref()
            .filter(|r| !r.is_empty())
            .map(|r| r.to_string()),
        ability_target: ability.target.clone(),
        allowed_stats: allowed,
        cost: ability.cost_text(),
        extra_effect: ability.extra_effect.clone(),
        actor: actor.name.clone(),
        mode: request.mode,
        modifiers: request.modifiers,
        stat,
        stat_value,
        dice: roll.dice,
        adjustment,
        total: roll.total,
        natural_tier: roll.tier,
        tier,
        base_damage: outcome.damage,
        kit_bonus,
        surges: request.surges,
        surge_bonus,
        total_damage,
        effects: outcome.effects.clone(),
        rider: outcome.rider.clone().filter(|r| !r.trim().is_empty()),
        hit,
    })
}

/// Kit bonus and total damage for a tier. No tier damage means no damage at all.
fn damage_for(
    actor: &Combatant,
    mode: AttackMode,
    tier: Tier,
    base_damage: i32,
    stat_value: i32,
    surge_bonus: i32,
) -> (i32, i32) {
    if base_damage == 0 {
        return (0, 0);
    }
    let kit_bonus = actor.kit_bonus(mode, tier);
    let total = base_damage
        .saturating_add(stat_value)
        .saturating_add(kit_bonus)
        .saturating_add(surge_bonus)
        .max(0);
    (kit_bonus, total)
}

// ============================================================================
// Power Rolls, Damage and Healing
// ============================================================================

/// A power roll made for a test, optionally on behalf of a combatant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacteristicRoll {
    pub character: Option<String>,
    pub characteristic: Characteristic,
    pub roll: PowerRoll,
}

impl fmt::Display for CharacteristicRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🎲 Draw Steel Power Roll")?;
        writeln!(f, "{}", self.roll)?;
        if let Some(name) = &self.character {
            write!(f, "{name} • ")?;
        }
        let skill = if self.roll.skill_bonus != 0 {
            "Skilled"
        } else {
            "Unskilled"
        };
        write!(f, "Stat {} • {skill}", self.characteristic)
    }
}

/// Power roll using a combatant's characteristic, or 0 when no one is named.
pub fn characteristic_roll<R: Rng>(
    state: &EncounterState,
    characteristic: Characteristic,
    character: Option<&str>,
    skilled: bool,
    modifier: i32,
    rng: &mut R,
) -> Result<CharacteristicRoll> {
    let (name, stat_value) = match character.filter(|c| !c.trim().is_empty()) {
        Some(name) => {
            let entry = state.get(name)?;
            (Some(entry.name.clone()), entry.characteristic(characteristic))
        }
        None => (None, 0),
    };

    Ok(CharacteristicRoll {
        character: name,
        characteristic,
        roll: power_roll_with_rng(rng, stat_value, skilled, modifier),
    })
}

/// Stamina change from a damage or heal command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaminaReport {
    pub name: String,
    pub amount: i32,
    pub change: StaminaChange,
}

fn check_amount(amount: i32) -> Result<()> {
    if amount < 0 {
        return Err(TrackerError::validation("Amount must be a positive integer."));
    }
    Ok(())
}

pub fn apply_damage(state: &mut EncounterState, target: &str, amount: i32) -> Result<StaminaReport> {
    check_amount(amount)?;
    let entry = state.get_mut(target)?;
    Ok(StaminaReport {
        name: entry.name.clone(),
        amount,
        change: entry.take_damage(amount),
    })
}

pub fn apply_heal(state: &mut EncounterState, target: &str, amount: i32) -> Result<StaminaReport> {
    check_amount(amount)?;
    let entry = state.get_mut(target)?;
    Ok(StaminaReport {
        name: entry.name.clone(),
        amount,
        change: entry.heal(amount),
    })
}

/// Result of spending or restoring recoveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryChange {
    pub name: String,
    pub before: i32,
    pub after: i32,
    pub max: i32,
    /// Stamina one recovery is worth.
    pub per_recovery: i32,
    /// Stamina the spent recoveries were worth before the cap.
    pub nominal_heal: i32,
    pub stamina: StaminaChange,
}

impl RecoveryChange {
    pub fn used(&self) -> i32 {
        (self.before - self.after).max(0)
    }

    pub fn restored(&self) -> i32 {
        (self.after - self.before).max(0)
    }

    pub fn healed(&self) -> i32 {
        self.stamina.delta()
    }

    pub fn capped(&self) -> bool {
        self.healed() < self.nominal_heal
    }
}

impl fmt::Display for RecoveryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (action, count) = match (self.used(), self.restored()) {
            (0, 0) => ("unchanged", 0),
            (0, restored) => ("restored", restored),
            (used, _) => ("used", used),
        };
        write!(
            f,
            "🔄 {}: recoveries {action} {count} (now {}/{})",
            self.name, self.after, self.max
        )?;
        if self.healed() > 0 {
            write!(
                f,
                "\nHealed {} • Stamina {}/{}",
                self.healed(),
                self.stamina.after,
                self.stamina.max
            )?;
            if self.capped() {
                write!(f, " (capped from {})", self.nominal_heal)?;
            }
        }
        Ok(())
    }
}

/// Spend (negative delta) or restore (positive delta) recoveries.
///
/// Each recovery actually spent heals a third of maximum stamina.
pub fn adjust_recoveries(state: &mut EncounterState, name: &str, delta: i32) -> Result<RecoveryChange> {
    let entry = state.get_mut(name)?;

    let before = entry.recoveries;
    let after = (before.saturating_add(delta)).clamp(0, entry.max_recoveries.max(0));
    entry.recoveries = after;

    let used = before.saturating_sub(after).max(0);
    let per_recovery = entry.max_stamina / 3;
    let nominal_heal = per_recovery.saturating_mul(used);
    let stamina = entry.heal(nominal_heal);

    Ok(RecoveryChange {
        name: entry.name.clone(),
        before,
        after,
        max: entry.max_recoveries,
        per_recovery,
        nominal_heal,
        stamina,
    })
}

//! Projection of an encounter into a readable tracker view.
//!
//! Combatants are split into four lanes (heroes and monsters, each Ready or
//! Done). Monsters are further clustered by group: a group with anyone left
//! to act appears as a cluster in the active section, a group that has fully
//! acted appears as a cluster under Turn Over, and the Done members of a
//! partly-acted group are listed individually under Turn Over.

use crate::combatant::{Characteristics, Combatant, KitBonuses};
use crate::encounter::EncounterState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One combatant as shown in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantLine {
    pub name: String,
    pub is_current: bool,
    pub stamina: i32,
    pub max_stamina: i32,
    pub characteristics: Characteristics,
    pub stability: i32,
    pub speed: i32,
    pub shift: i32,
    pub recoveries: i32,
    pub effects: Vec<String>,
}

impl CombatantLine {
    fn new(entry: &Combatant, state: &EncounterState) -> Self {
        Self {
            name: entry.name.clone(),
            is_current: state.is_current(&entry.name),
            stamina: entry.stamina,
            max_stamina: entry.max_stamina,
            characteristics: entry.characteristics,
            stability: entry.stability,
            speed: entry.speed,
            shift: entry.shift,
            recoveries: entry.recoveries,
            effects: entry.effects.clone(),
        }
    }
}

impl fmt::Display for CombatantLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_current { "➡️ " } else { "• " };
        write!(
            f,
            "{marker}**{}** | Stamina {}/{} | {} STA:{} | SPD:{} SHIFT:{} REC:{}",
            self.name,
            self.stamina,
            self.max_stamina,
            self.characteristics,
            self.stability,
            self.speed,
            self.shift,
            self.recoveries
        )?;
        if !self.effects.is_empty() {
            write!(f, " | _{}_", self.effects.join("; "))?;
        }
        Ok(())
    }
}

/// Members of one monster group shown together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCluster {
    pub name: String,
    pub members: Vec<CombatantLine>,
}

/// The populated lanes of a tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lanes {
    pub heroes_ready: Vec<CombatantLine>,
    pub groups_ready: Vec<GroupCluster>,
    pub monsters_ready: Vec<CombatantLine>,
    pub heroes_done: Vec<CombatantLine>,
    pub groups_done: Vec<GroupCluster>,
    pub stragglers_done: Vec<CombatantLine>,
    pub monsters_done: Vec<CombatantLine>,
}

impl Lanes {
    pub fn is_empty(&self) -> bool {
        !self.has_active() && !self.has_turn_over()
    }

    fn has_active(&self) -> bool {
        !self.heroes_ready.is_empty() || self.has_active_monsters()
    }

    fn has_active_monsters(&self) -> bool {
        !self.groups_ready.is_empty() || !self.monsters_ready.is_empty()
    }

    fn has_turn_over(&self) -> bool {
        !self.heroes_done.is_empty()
            || !self.groups_done.is_empty()
            || !self.stragglers_done.is_empty()
            || !self.monsters_done.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewBody {
    Empty,
    NoCombatants,
    Lanes(Lanes),
}

/// Rendered tracker for one encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerView {
    pub round: u32,
    pub body: ViewBody,
}

/// Project an encounter into its tracker view.
pub fn render(state: &EncounterState) -> TrackerView {
    if state.entries.is_empty() {
        return TrackerView {
            round: state.round,
            body: ViewBody::Empty,
        };
    }

    let line = |entry: &Combatant| CombatantLine::new(entry, state);
    let mut lanes = Lanes::default();

    for hero in state.entries.iter().filter(|e| e.is_player) {
        if hero.is_ready() {
            lanes.heroes_ready.push(line(hero));
        } else {
            lanes.heroes_done.push(line(hero));
        }
    }

    let monsters: Vec<&Combatant> = state.entries.iter().filter(|e| !e.is_player).collect();

    for group in state.group_names() {
        let members: Vec<&Combatant> = monsters
            .iter()
            .copied()
            .filter(|m| m.group.as_deref() == Some(group.as_str()))
            .collect();
        let (ready, done): (Vec<&Combatant>, Vec<&Combatant>) =
            members.into_iter().partition(|m| m.is_ready());

        match (ready.is_empty(), done.is_empty()) {
            (true, true) => {}
            (false, _) => {
                lanes.groups_ready.push(GroupCluster {
                    name: group.clone(),
                    members: ready.into_iter().map(line).collect(),
                });
                lanes.stragglers_done.extend(done.into_iter().map(line));
            }
            (true, false) => lanes.groups_done.push(GroupCluster {
                name: group,
                members: done.into_iter().map(line).collect(),
            }),
        }
    }

    for &monster in monsters.iter().filter(|m| m.group.is_none()) {
        if monster.is_ready() {
            lanes.monsters_ready.push(line(monster));
        } else {
            lanes.monsters_done.push(line(monster));
        }
    }

    let body = if lanes.is_empty() {
        ViewBody::NoCombatants
    } else {
        ViewBody::Lanes(lanes)
    };

    TrackerView {
        round: state.round,
        body,
    }
}

impl TrackerView {
    pub fn title(&self) -> String {
        format!("🧭 Draw Steel Tracker • Round {}", self.round)
    }

    /// The body text, without the title.
    pub fn description(&self) -> String {
        let lanes = match &self.body {
            ViewBody::Empty => return "_Empty tracker_".to_string(),
            ViewBody::NoCombatants => return "_No combatants._".to_string(),
            ViewBody::Lanes(lanes) => lanes,
        };

        let mut chunks: Vec<String> = Vec::new();
        let lines = |chunks: &mut Vec<String>, lines: &[CombatantLine]| {
            chunks.extend(lines.iter().map(|l| l.to_string()));
            chunks.push(String::new());
        };
        let cluster = |chunks: &mut Vec<String>, group: &GroupCluster| {
            chunks.push(format!("__**{} ({})**__", group.name, group.members.len()));
            chunks.extend(group.members.iter().map(|l| l.to_string()));
            chunks.push(String::new());
        };

        if !lanes.heroes_ready.is_empty() {
            chunks.push("__**Heroes**__".to_string());
            lines(&mut chunks, &lanes.heroes_ready);
        }

        if lanes.has_active_monsters() {
            chunks.push("__**Monsters**__".to_string());
            for group in &lanes.groups_ready {
                cluster(&mut chunks, group);
            }
            if !lanes.monsters_ready.is_empty() {
                lines(&mut chunks, &lanes.monsters_ready);
            }
        }

        if lanes.has_turn_over() {
            chunks.push("__**Turn Over**__".to_string());
            if !lanes.heroes_done.is_empty() {
                chunks.push("_Heroes_".to_string());
                lines(&mut chunks, &lanes.heroes_done);
            }
            for group in &lanes.groups_done {
                cluster(&mut chunks, group);
            }
            if !lanes.stragglers_done.is_empty() {
                lines(&mut chunks, &lanes.stragglers_done);
            }
            if !lanes.monsters_done.is_empty() {
                chunks.push("_Monsters_".to_string());
                lines(&mut chunks, &lanes.monsters_done);
            }
        }

        chunks.join("\n").trim_end().to_string()
    }
}

impl fmt::Display for TrackerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title())?;
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Character Sheet
// ============================================================================

/// Full stat block for one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSheet {
    pub name: String,
    pub is_player: bool,
    pub group: Option<String>,
    pub stamina: i32,
    pub max_stamina: i32,
    pub stability: i32,
    pub speed: i32,
    pub shift: i32,
    pub recoveries: i32,
    pub max_recoveries: i32,
    pub characteristics: Characteristics,
    pub kit: Option<String>,
    pub kit_melee: KitBonuses,
    pub kit_ranged: KitBonuses,
    pub surges: i32,
    pub heroic_resource: i32,
    pub effects: Vec<String>,
}

impl From<&Combatant> for CombatantSheet {
    fn from(entry: &Combatant) -> Self {
        Self {
            name: entry.name.clone(),
            is_player: entry.is_player,
            group: entry.group.clone(),
            stamina: entry.stamina,
            max_stamina: entry.max_stamina,
            stability: entry.stability,
            speed: entry.speed,
            shift: entry.shift,
            recoveries: entry.recoveries,
            max_recoveries: entry.max_recoveries,
            characteristics: entry.characteristics,
            kit: entry.loadout.kit.clone(),
            kit_melee: entry.loadout.melee,
            kit_ranged: entry.loadout.ranged,
            surges: entry.surges,
            heroic_resource: entry.heroic_resource,
            effects: entry.effects.clone(),
        }
    }
}

impl fmt::Display for CombatantSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.is_player { "PC" } else { "NPC" };
        writeln!(f, "📜 {} ({role})", self.name)?;
        if let Some(group) = &self.group {
            writeln!(f, "Group: {group}")?;
        }
        writeln!(f, "Stamina: {}/{}", self.stamina, self.max_stamina)?;
        writeln!(f, "Stability (STA): {}", self.stability)?;
        writeln!(
            f,
            "Speed / Shift / Rec: {} / {} / {}/{}",
            self.speed, self.shift, self.recoveries, self.max_recoveries
        )?;
        let c = &self.characteristics;
        writeln!(
            f,
            "Stats: M {} | A {} | R {} | I {} | P {}",
            c.might, c.agility, c.reason, c.intuition, c.presence
        )?;
        if let Some(kit) = &self.kit {
            writeln!(f, "Kit: {kit}")?;
        }
        writeln!(f, "Kit (Melee): {}", self.kit_melee)?;
        writeln!(f, "Kit (Ranged): {}", self.kit_ranged)?;
        write!(f, "Surges: {} | Heroic Resource: {}", self.surges, self.heroic_resource)?;
        if !self.effects.is_empty() {
            write!(f, "\nEffects:")?;
            for (i, effect) in self.effects.iter().enumerate() {
                write!(f, "\n{}. {effect}", i + 1)?;
            }
        }
        Ok(())
    }
}

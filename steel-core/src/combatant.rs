//! Combatant records: one participant in an encounter.
//!
//! The serialized form keeps the short keys used by tracker documents
//! (`M`, `A`, `R`, `I`, `P`, `STA`, `Su`, `HR`, `kit_melee`, ...), so older
//! documents stay loadable.

use crate::content::ContentLibrary;
use crate::dice::Tier;
use crate::error::{Missing, Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Characteristics
// ============================================================================

/// The five Draw Steel characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Characteristic {
    #[serde(rename = "M", alias = "m", alias = "Might")]
    Might,
    #[serde(rename = "A", alias = "a", alias = "Agility")]
    Agility,
    #[serde(rename = "R", alias = "r", alias = "Reason")]
    Reason,
    #[serde(rename = "I", alias = "i", alias = "Intuition")]
    Intuition,
    #[serde(rename = "P", alias = "p", alias = "Presence")]
    Presence,
}

impl Characteristic {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Characteristic::Might => "M",
            Characteristic::Agility => "A",
            Characteristic::Reason => "R",
            Characteristic::Intuition => "I",
            Characteristic::Presence => "P",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Characteristic::Might => "Might",
            Characteristic::Agility => "Agility",
            Characteristic::Reason => "Reason",
            Characteristic::Intuition => "Intuition",
            Characteristic::Presence => "Presence",
        }
    }

    /// All five, in sheet order.
    pub fn all() -> [Characteristic; 5] {
        [
            Characteristic::Might,
            Characteristic::Agility,
            Characteristic::Reason,
            Characteristic::Intuition,
            Characteristic::Presence,
        ]
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for Characteristic {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "might" => Ok(Characteristic::Might),
            "a" | "agility" => Ok(Characteristic::Agility),
            "r" | "reason" => Ok(Characteristic::Reason),
            "i" | "intuition" => Ok(Characteristic::Intuition),
            "p" | "presence" => Ok(Characteristic::Presence),
            _ => Err(TrackerError::validation(format!(
                "Unknown characteristic '{s}' (expected M, A, R, I or P)"
            ))),
        }
    }
}

/// Characteristic scores. These may be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristics {
    #[serde(rename = "M", default)]
    pub might: i32,
    #[serde(rename = "A", default)]
    pub agility: i32,
    #[serde(rename = "R", default)]
    pub reason: i32,
    #[serde(rename = "I", default)]
    pub intuition: i32,
    #[serde(rename = "P", default)]
    pub presence: i32,
}

impl Characteristics {
    pub fn new(might: i32, agility: i32, reason: i32, intuition: i32, presence: i32) -> Self {
        Self {
            might,
            agility,
            reason,
            intuition,
            presence,
        }
    }

    pub fn get(&self, characteristic: Characteristic) -> i32 {
        match characteristic {
            Characteristic::Might => self.might,
            Characteristic::Agility => self.agility,
            Characteristic::Reason => self.reason,
            Characteristic::Intuition => self.intuition,
            Characteristic::Presence => self.presence,
        }
    }

    pub fn set(&mut self, characteristic: Characteristic, value: i32) {
        match characteristic {
            Characteristic::Might => self.might = value,
            Characteristic::Agility => self.agility = value,
            Characteristic::Reason => self.reason = value,
            Characteristic::Intuition => self.intuition = value,
            Characteristic::Presence => self.presence = value,
        }
    }

    /// Highest score across all five.
    pub fn highest(&self) -> i32 {
        Characteristic::all()
            .iter()
            .map(|c| self.get(*c))
            .max()
            .unwrap_or(0)
    }

    /// The best characteristic among `allowed` (all five when empty).
    ///
    /// Candidates are considered in M, A, R, I, P order and the first one
    /// wins a tie.
    pub fn highest_among(&self, allowed: &[Characteristic]) -> Characteristic {
        let mut best = None;
        for candidate in Characteristic::all() {
            if !allowed.is_empty() && !allowed.contains(&candidate) {
                continue;
            }
            match best {
                Some(current) if self.get(candidate) <= self.get(current) => {}
                _ => best = Some(candidate),
            }
        }
        best.unwrap_or(Characteristic::Might)
    }
}

impl fmt::Display for Characteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "M:{} A:{} R:{} I:{} P:{}",
            self.might, self.agility, self.reason, self.intuition, self.presence
        )
    }
}

// ============================================================================
// Kits
// ============================================================================

/// Which kit bonus array an attack draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackMode {
    Melee,
    Ranged,
}

impl fmt::Display for AttackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackMode::Melee => write!(f, "Melee"),
            AttackMode::Ranged => write!(f, "Ranged"),
        }
    }
}

impl FromStr for AttackMode {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "melee" => Ok(AttackMode::Melee),
            "ranged" => Ok(AttackMode::Ranged),
            _ => Err(TrackerError::validation(format!(
                "Unknown mode '{s}' (expected Melee or Ranged)"
            ))),
        }
    }
}

/// Per-tier damage bonuses; always exactly three values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<i32>", into = "Vec<i32>")]
pub struct KitBonuses(pub [i32; 3]);

impl KitBonuses {
    pub fn new(tier1: i32, tier2: i32, tier3: i32) -> Self {
        Self([tier1, tier2, tier3])
    }

    pub fn for_tier(&self, tier: Tier) -> i32 {
        self.0[tier.index()]
    }

    /// Parse whitespace-separated integers such as `"1 2 2"`.
    ///
    /// Fewer than three values are padded with zeroes; blank input is `0 0 0`.
    pub fn parse(raw: &str) -> Result<Self> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.len() > 3 {
            return Err(TrackerError::validation(format!(
                "Expected at most three bonuses, got '{raw}'"
            )));
        }

        let mut values = [0; 3];
        for (slot, token) in values.iter_mut().zip(tokens) {
            *slot = token.parse().map_err(|_| {
                TrackerError::validation(format!("Could not parse '{token}' as a number"))
            })?;
        }
        Ok(Self(values))
    }
}

impl From<Vec<i32>> for KitBonuses {
    fn from(values: Vec<i32>) -> Self {
        let mut bonuses = [0; 3];
        for (slot, value) in bonuses.iter_mut().zip(values) {
            *slot = value;
        }
        Self(bonuses)
    }
}

impl From<KitBonuses> for Vec<i32> {
    fn from(bonuses: KitBonuses) -> Self {
        bonuses.0.to_vec()
    }
}

impl fmt::Display for KitBonuses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.0[0], self.0[1], self.0[2])
    }
}

/// A combatant's kit name and the bonus arrays it grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loadout {
    #[serde(rename = "kit", default)]
    pub kit: Option<String>,
    #[serde(rename = "kit_melee", default)]
    pub melee: KitBonuses,
    #[serde(rename = "kit_ranged", default)]
    pub ranged: KitBonuses,
}

impl Loadout {
    pub fn bonuses(&self, mode: AttackMode) -> KitBonuses {
        match mode {
            AttackMode::Melee => self.melee,
            AttackMode::Ranged => self.ranged,
        }
    }

    /// Look a kit up and copy its bonuses.
    pub fn from_kit(name: &str, library: &ContentLibrary) -> Result<Self> {
        let kit = library
            .kit(name)
            .ok_or_else(|| TrackerError::not_found(Missing::Kit, name.trim()))?;
        Ok(Self {
            kit: Some(kit.name.clone()),
            melee: kit.melee,
            ranged: kit.ranged,
        })
    }
}

/// How a new combatant's kit bonuses are chosen: a named kit or explicit
/// triples, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KitSelection {
    Named(String),
    Custom { melee: KitBonuses, ranged: KitBonuses },
}

impl KitSelection {
    pub fn from_options(
        kit: Option<&str>,
        melee: Option<&str>,
        ranged: Option<&str>,
    ) -> Result<Self> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.trim().is_empty())
        }

        match (present(kit), present(melee), present(ranged)) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(TrackerError::validation(
                "Pick a kit or enter custom bonuses, not both",
            )),
            (Some(name), None, None) => Ok(KitSelection::Named(name.trim().to_string())),
            (None, melee, ranged) => Ok(KitSelection::Custom {
                melee: KitBonuses::parse(melee.unwrap_or(""))?,
                ranged: KitBonuses::parse(ranged.unwrap_or(""))?,
            }),
        }
    }

    pub fn resolve(&self, library: &ContentLibrary) -> Result<Loadout> {
        match self {
            KitSelection::Named(name) => Loadout::from_kit(name, library),
            KitSelection::Custom { melee, ranged } => Ok(Loadout {
                kit: None,
                melee: *melee,
                ranged: *ranged,
            }),
        }
    }
}

impl Default for KitSelection {
    fn default() -> Self {
        KitSelection::Custom {
            melee: KitBonuses::default(),
            ranged: KitBonuses::default(),
        }
    }
}

// ============================================================================
// Combatant
// ============================================================================

/// Whether a combatant has acted this round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    #[default]
    Ready,
    Done,
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnStatus::Ready => write!(f, "ready"),
            TurnStatus::Done => write!(f, "done"),
        }
    }
}

impl FromStr for TurnStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ready" => Ok(TurnStatus::Ready),
            "done" => Ok(TurnStatus::Done),
            _ => Err(TrackerError::validation(format!(
                "Unknown status '{s}' (expected ready or done)"
            ))),
        }
    }
}

/// One participant in an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CombatantRecord")]
pub struct Combatant {
    pub name: String,
    pub stamina: i32,
    pub max_stamina: i32,
    pub recoveries: i32,
    pub max_recoveries: i32,
    #[serde(rename = "Su")]
    pub surges: i32,
    #[serde(rename = "HR")]
    pub heroic_resource: i32,
    #[serde(flatten)]
    pub characteristics: Characteristics,
    #[serde(rename = "STA")]
    pub stability: i32,
    pub speed: i32,
    pub shift: i32,
    #[serde(flatten)]
    pub loadout: Loadout,
    pub is_player: bool,
    pub group: Option<String>,
    pub status: TurnStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<String>,
}

/// Stored shape of a combatant; absent maxima fall back to the current values.
#[derive(Deserialize)]
struct CombatantRecord {
    name: String,
    #[serde(default)]
    stamina: i32,
    max_stamina: Option<i32>,
    #[serde(default)]
    recoveries: i32,
    max_recoveries: Option<i32>,
    #[serde(rename = "Su", default)]
    surges: i32,
    #[serde(rename = "HR", default)]
    heroic_resource: i32,
    #[serde(flatten)]
    characteristics: Characteristics,
    #[serde(rename = "STA", default)]
    stability: i32,
    #[serde(default)]
    speed: i32,
    #[serde(default)]
    shift: i32,
    #[serde(flatten)]
    loadout: Loadout,
    #[serde(default = "default_is_player")]
    is_player: bool,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    status: TurnStatus,
    #[serde(default)]
    effects: Vec<String>,
}

fn default_is_player() -> bool {
    true
}

impl From<CombatantRecord> for Combatant {
    fn from(record: CombatantRecord) -> Self {
        Self {
            max_stamina: record.max_stamina.unwrap_or(record.stamina),
            max_recoveries: record.max_recoveries.unwrap_or(record.recoveries),
            name: record.name,
            stamina: record.stamina,
            recoveries: record.recoveries,
            surges: record.surges,
            heroic_resource: record.heroic_resource,
            characteristics: record.characteristics,
            stability: record.stability,
            speed: record.speed,
            shift: record.shift,
            loadout: record.loadout,
            is_player: record.is_player,
            group: record.group,
            status: record.status,
            effects: record.effects,
        }
    }
}

/// Stamina before and after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaminaChange {
    pub before: i32,
    pub after: i32,
    pub max: i32,
}

impl StaminaChange {
    pub fn delta(&self) -> i32 {
        self.after.saturating_sub(self.before)
    }
}

impl Combatant {
    pub fn new(new: NewCombatant, loadout: Loadout) -> Self {
        Self {
            name: new.name.trim().to_string(),
            stamina: new.stamina,
            max_stamina: new.stamina,
            recoveries: new.recoveries,
            max_recoveries: new.recoveries,
            surges: new.surges,
            heroic_resource: new.heroic_resource,
            characteristics: new.characteristics,
            stability: new.stability,
            speed: new.speed,
            shift: new.shift,
            loadout,
            is_player: new.is_player,
            group: new.group.filter(|g| !g.trim().is_empty()).map(|g| g.trim().to_string()),
            status: TurnStatus::Ready,
            effects: Vec::new(),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    pub fn is_ready(&self) -> bool {
        self.status == TurnStatus::Ready
    }

    pub fn characteristic(&self, characteristic: Characteristic) -> i32 {
        self.characteristics.get(characteristic)
    }

    pub fn kit_bonus(&self, mode: AttackMode, tier: Tier) -> i32 {
        self.loadout.bonuses(mode).for_tier(tier)
    }

    /// Lose stamina, never dropping below zero.
    pub fn take_damage(&mut self, amount: i32) -> StaminaChange {
        let before = self.stamina;
        self.stamina = self.stamina.saturating_sub(amount.max(0)).max(0);
        StaminaChange {
            before,
            after: self.stamina,
            max: self.max_stamina,
        }
    }

    /// Regain stamina, never rising above the maximum.
    pub fn heal(&mut self, amount: i32) -> StaminaChange {
        let before = self.stamina;
        self.stamina = self.stamina.saturating_add(amount.max(0)).min(self.max_stamina);
        StaminaChange {
            before,
            after: self.stamina,
            max: self.max_stamina,
        }
    }

    /// Pull every field back inside its legal range.
    pub fn clamp_resources(&mut self) {
        self.max_stamina = self.max_stamina.max(0);
        self.stamina = self.stamina.clamp(0, self.max_stamina);
        self.max_recoveries = self.max_recoveries.max(0);
        self.recoveries = self.recoveries.clamp(0, self.max_recoveries);
        self.surges = self.surges.max(0);
        self.heroic_resource = self.heroic_resource.max(0);
        if self.is_player {
            self.group = None;
        }
        if self.group.as_deref().is_some_and(|g| g.trim().is_empty()) {
            self.group = None;
        }
    }
}

/// Everything needed to add a combatant to an encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCombatant {
    pub name: String,
    pub stamina: i32,
    pub stability: i32,
    pub characteristics: Characteristics,
    pub speed: i32,
    pub shift: i32,
    pub recoveries: i32,
    pub kit: KitSelection,
    pub is_player: bool,
    pub group: Option<String>,
    pub surges: i32,
    pub heroic_resource: i32,
}

impl NewCombatant {
    pub fn new(name: impl Into<String>, stamina: i32) -> Self {
        Self {
            name: name.into(),
            stamina,
            stability: 0,
            characteristics: Characteristics::default(),
            speed: 5,
            shift: 1,
            recoveries: 0,
            kit: KitSelection::default(),
            is_player: true,
            group: None,
            surges: 0,
            heroic_resource: 0,
        }
    }

    pub fn with_characteristics(mut self, characteristics: Characteristics) -> Self {
        self.characteristics = characteristics;
        self
    }

    pub fn with_recoveries(mut self, recoveries: i32) -> Self {
        self.recoveries = recoveries;
        self
    }

    pub fn with_kit(mut self, kit: KitSelection) -> Self {
        self.kit = kit;
        self
    }

    pub fn with_surges(mut self, surges: i32) -> Self {
        self.surges = surges;
        self
    }

    /// A non-player combatant, optionally in a monster group.
    pub fn monster(mut self, group: Option<&str>) -> Self {
        self.is_player = false;
        self.group = group.map(str::to_string);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TrackerError::validation("Name cannot be empty."));
        }
        let has_group = self.group.as_deref().is_some_and(|g| !g.trim().is_empty());
        if has_group && self.is_player {
            return Err(TrackerError::validation(
                "Groups are for monsters only; set is_player to false to assign a group.",
            ));
        }
        for (label, value) in [
            ("stamina", self.stamina),
            ("stability", self.stability),
            ("speed", self.speed),
            ("shift", self.shift),
            ("recoveries", self.recoveries),
            ("Su", self.surges),
            ("HR", self.heroic_resource),
        ] {
            if value < 0 {
                return Err(TrackerError::validation(format!(
                    "Value for {label} cannot be negative"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Field Updates
// ============================================================================

/// Fields that can be edited one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    Name,
    Stamina,
    MaxStamina,
    Recoveries,
    MaxRecoveries,
    Stability,
    Characteristic(Characteristic),
    Speed,
    Shift,
    KitMelee,
    KitRanged,
    IsPlayer,
    Group,
    Kit,
    Surges,
    HeroicResource,
}

impl FieldName {
    pub fn all() -> Vec<FieldName> {
        let mut fields = vec![
            FieldName::Name,
            FieldName::Stamina,
            FieldName::MaxStamina,
            FieldName::Recoveries,
            FieldName::MaxRecoveries,
            FieldName::Stability,
        ];
        fields.extend(Characteristic::all().into_iter().map(FieldName::Characteristic));
        fields.extend([
            FieldName::Speed,
            FieldName::Shift,
            FieldName::KitMelee,
            FieldName::KitRanged,
            FieldName::IsPlayer,
            FieldName::Group,
            FieldName::Kit,
            FieldName::Surges,
            FieldName::HeroicResource,
        ]);
        fields
    }

    /// The key as it appears in stored documents.
    pub fn key(&self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::Stamina => "stamina",
            FieldName::MaxStamina => "max_stamina",
            FieldName::Recoveries => "recoveries",
            FieldName::MaxRecoveries => "max_recoveries",
            FieldName::Stability => "STA",
            FieldName::Characteristic(c) => c.abbreviation(),
            FieldName::Speed => "speed",
            FieldName::Shift => "shift",
            FieldName::KitMelee => "kit_melee",
            FieldName::KitRanged => "kit_ranged",
            FieldName::IsPlayer => "is_player",
            FieldName::Group => "group",
            FieldName::Kit => "kit",
            FieldName::Surges => "Su",
            FieldName::HeroicResource => "HR",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for FieldName {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s.trim().to_lowercase().as_str() {
            "name" => FieldName::Name,
            "stamina" => FieldName::Stamina,
            "max_stamina" => FieldName::MaxStamina,
            "recoveries" => FieldName::Recoveries,
            "max_recoveries" => FieldName::MaxRecoveries,
            "sta" | "stability" => FieldName::Stability,
            "speed" => FieldName::Speed,
            "shift" => FieldName::Shift,
            "kit_melee" => FieldName::KitMelee,
            "kit_ranged" => FieldName::KitRanged,
            "is_player" => FieldName::IsPlayer,
            "group" => FieldName::Group,
            "kit" => FieldName::Kit,
            "su" | "surges" => FieldName::Surges,
            "hr" | "heroic_resource" => FieldName::HeroicResource,
            other => match other.parse::<Characteristic>() {
                Ok(c) => FieldName::Characteristic(c),
                Err(_) => {
                    return Err(TrackerError::validation(format!("Unsupported field: `{s}`")))
                }
            },
        };
        Ok(field)
    }
}

/// A parsed, typed value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Name(String),
    Stamina(i32),
    MaxStamina(i32),
    Recoveries(i32),
    MaxRecoveries(i32),
    Stability(i32),
    Characteristic(Characteristic, i32),
    Speed(i32),
    Shift(i32),
    KitMelee(KitBonuses),
    KitRanged(KitBonuses),
    IsPlayer(bool),
    Group(Option<String>),
    Kit(Loadout),
    Surges(i32),
    HeroicResource(i32),
}

impl FieldUpdate {
    /// Coerce a raw value for `field`. Kit names are resolved against `library`.
    pub fn parse(field: FieldName, raw: &str, library: &ContentLibrary) -> Result<Self> {
        let update = match field {
            FieldName::Name => {
                let name = raw.trim();
                if name.is_empty() {
                    return Err(TrackerError::validation("Name cannot be empty."));
                }
                FieldUpdate::Name(name.to_string())
            }
            FieldName::Stamina => FieldUpdate::Stamina(parse_int(field, raw)?),
            FieldName::MaxStamina => FieldUpdate::MaxStamina(parse_non_negative(field, raw)?),
            FieldName::Recoveries => FieldUpdate::Recoveries(parse_int(field, raw)?),
            FieldName::MaxRecoveries => {
                FieldUpdate::MaxRecoveries(parse_non_negative(field, raw)?)
            }
            FieldName::Stability => FieldUpdate::Stability(parse_non_negative(field, raw)?),
            FieldName::Characteristic(c) => FieldUpdate::Characteristic(c, parse_int(field, raw)?),
            FieldName::Speed => FieldUpdate::Speed(parse_non_negative(field, raw)?),
            FieldName::Shift => FieldUpdate::Shift(parse_non_negative(field, raw)?),
            FieldName::KitMelee => FieldUpdate::KitMelee(KitBonuses::parse(raw)?),
            FieldName::KitRanged => FieldUpdate::KitRanged(KitBonuses::parse(raw)?),
            FieldName::IsPlayer => FieldUpdate::IsPlayer(parse_bool_word(raw)?),
            FieldName::Group => {
                let group = raw.trim();
                FieldUpdate::Group((!group.is_empty()).then(|| group.to_string()))
            }
            FieldName::Kit => {
                if raw.trim().is_empty() {
                    FieldUpdate::Kit(Loadout::default())
                } else {
                    FieldUpdate::Kit(Loadout::from_kit(raw, library)?)
                }
            }
            FieldName::Surges => FieldUpdate::Surges(parse_non_negative(field, raw)?),
            FieldName::HeroicResource => {
                FieldUpdate::HeroicResource(parse_non_negative(field, raw)?)
            }
        };
        Ok(update)
    }

    pub fn field(&self) -> FieldName {
        match self {
            FieldUpdate::Name(_) => FieldName::Name,
            FieldUpdate::Stamina(_) => FieldName::Stamina,
            FieldUpdate::MaxStamina(_) => FieldName::MaxStamina,
            FieldUpdate::Recoveries(_) => FieldName::Recoveries,
            FieldUpdate::MaxRecoveries(_) => FieldName::MaxRecoveries,
            FieldUpdate::Stability(_) => FieldName::Stability,
            FieldUpdate::Characteristic(c, _) => FieldName::Characteristic(*c),
            FieldUpdate::Speed(_) => FieldName::Speed,
            FieldUpdate::Shift(_) => FieldName::Shift,
            FieldUpdate::KitMelee(_) => FieldName::KitMelee,
            FieldUpdate::KitRanged(_) => FieldName::KitRanged,
            FieldUpdate::IsPlayer(_) => FieldName::IsPlayer,
            FieldUpdate::Group(_) => FieldName::Group,
            FieldUpdate::Kit(_) => FieldName::Kit,
            FieldUpdate::Surges(_) => FieldName::Surges,
            FieldUpdate::HeroicResource(_) => FieldName::HeroicResource,
        }
    }
}

/// Old and new value of an edited field, formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub combatant: String,
    pub field: String,
    pub old: String,
    pub new: String,
}

impl Combatant {
    /// Current value of `field`, formatted for display.
    pub fn field_value(&self, field: FieldName) -> String {
        match field {
            FieldName::Name => self.name.clone(),
            FieldName::Stamina => self.stamina.to_string(),
            FieldName::MaxStamina => self.max_stamina.to_string(),
            FieldName::Recoveries => self.recoveries.to_string(),
            FieldName::MaxRecoveries => self.max_recoveries.to_string(),
            FieldName::Stability => self.stability.to_string(),
            FieldName::Characteristic(c) => self.characteristic(c).to_string(),
            FieldName::Speed => self.speed.to_string(),
            FieldName::Shift => self.shift.to_string(),
            FieldName::KitMelee => self.loadout.melee.to_string(),
            FieldName::KitRanged => self.loadout.ranged.to_string(),
            FieldName::IsPlayer => self.is_player.to_string(),
            FieldName::Group => self.group.clone().unwrap_or_default(),
            FieldName::Kit => self.loadout.kit.clone().unwrap_or_default(),
            FieldName::Surges => self.surges.to_string(),
            FieldName::HeroicResource => self.heroic_resource.to_string(),
        }
    }

    /// Apply an update that needs no knowledge of the rest of the encounter.
    ///
    /// Renames and group changes are checked by the encounter before they
    /// reach this point.
    pub(crate) fn apply_update(&mut self, update: FieldUpdate) -> Result<()> {
        match update {
            FieldUpdate::Name(name) => self.name = name,
            FieldUpdate::Stamina(value) => self.stamina = value.clamp(0, self.max_stamina),
            FieldUpdate::MaxStamina(value) => {
                self.max_stamina = value;
                self.stamina = self.stamina.clamp(0, value);
            }
            FieldUpdate::Recoveries(value) => {
                self.recoveries = value.clamp(0, self.max_recoveries)
            }
            FieldUpdate::MaxRecoveries(value) => {
                self.max_recoveries = value;
                self.recoveries = self.recoveries.clamp(0, value);
            }
            FieldUpdate::Stability(value) => self.stability = value,
            FieldUpdate::Characteristic(c, value) => self.characteristics.set(c, value),
            FieldUpdate::Speed(value) => self.speed = value,
            FieldUpdate::Shift(value) => self.shift = value,
            FieldUpdate::KitMelee(bonuses) => self.loadout.melee = bonuses,
            FieldUpdate::KitRanged(bonuses) => self.loadout.ranged = bonuses,
            FieldUpdate::IsPlayer(is_player) => {
                if is_player && self.group.is_some() {
                    return Err(TrackerError::validation(
                        "Cannot make a grouped monster a player; clear its group first.",
                    ));
                }
                self.is_player = is_player;
            }
            FieldUpdate::Group(group) => {
                if group.is_some() && self.is_player {
                    return Err(TrackerError::validation("Cannot assign a group to a player."));
                }
                self.group = group;
            }
            FieldUpdate::Kit(loadout) => self.loadout = loadout,
            FieldUpdate::Surges(value) => self.surges = value,
            FieldUpdate::HeroicResource(value) => self.heroic_resource = value,
        }
        Ok(())
    }
}

fn parse_int(field: FieldName, raw: &str) -> Result<i32> {
    raw.trim()
        .parse()
        .map_err(|_| TrackerError::validation(format!("Could not parse `{raw}` for `{field}`.")))
}

fn parse_non_negative(field: FieldName, raw: &str) -> Result<i32> {
    let value = parse_int(field, raw)?;
    if value < 0 {
        return Err(TrackerError::validation(format!(
            "Value for {field} cannot be negative"
        )));
    }
    Ok(value)
}

/// Parse yes/no style words into a boolean.
pub fn parse_bool_word(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(TrackerError::validation(format!(
            "Could not parse `{raw}` as true/false"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::KitDefinition;

    fn hero() -> Combatant {
        Combatant::new(
            NewCombatant::new("Aria", 30)
                .with_characteristics(Characteristics::new(2, 1, 0, -1, 1))
                .with_recoveries(3),
            Loadout::default(),
        )
    }

    #[test]
    fn test_highest_among_prefers_first_on_tie() {
        let stats = Characteristics::new(2, 2, 0, 1, 2);
        assert_eq!(stats.highest_among(&[]), Characteristic::Might);
        assert_eq!(
            stats.highest_among(&[Characteristic::Presence, Characteristic::Agility]),
            Characteristic::Agility
        );
        assert_eq!(
            stats.highest_among(&[Characteristic::Reason, Characteristic::Intuition]),
            Characteristic::Intuition
        );
        assert_eq!(stats.highest(), 2);
    }

    #[test]
    fn test_kit_bonuses_parse() {
        assert_eq!(KitBonuses::parse("1 2 2").unwrap(), KitBonuses::new(1, 2, 2));
        assert_eq!(KitBonuses::parse("4").unwrap(), KitBonuses::new(4, 0, 0));
        assert_eq!(KitBonuses::parse("  ").unwrap(), KitBonuses::default());
        assert_eq!(KitBonuses::parse("-1 0 3").unwrap(), KitBonuses::new(-1, 0, 3));
        assert!(KitBonuses::parse("1 2 3 4").is_err());
        assert!(KitBonuses::parse("1 x 3").is_err());
    }

    #[test]
    fn test_kit_bonuses_from_short_vec() {
        let bonuses: KitBonuses = serde_json::from_str("[2]").unwrap();
        assert_eq!(bonuses, KitBonuses::new(2, 0, 0));
        let bonuses: KitBonuses = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(bonuses, KitBonuses::new(1, 2, 3));
    }

    #[test]
    fn test_bool_words() {
        for word in ["1", "true", "Yes", "y", "ON"] {
            assert!(parse_bool_word(word).unwrap());
        }
        for word in ["0", "false", "no", "N", "off"] {
            assert!(!parse_bool_word(word).unwrap());
        }
        assert!(parse_bool_word("maybe").is_err());
    }

    #[test]
    fn test_kit_selection_rejects_both() {
        let err = KitSelection::from_options(Some("Panther"), Some("1 1 1"), None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let selection = KitSelection::from_options(Some("  "), Some("1 2"), None).unwrap();
        assert_eq!(
            selection,
            KitSelection::Custom {
                melee: KitBonuses::new(1, 2, 0),
                ranged: KitBonuses::default()
            }
        );
    }

    #[test]
    fn test_named_kit_resolves_from_library() {
        let mut library = ContentLibrary::new();
        library.insert_kit(KitDefinition {
            name: "Panther".to_string(),
            melee: KitBonuses::new(1, 1, 1),
            ranged: KitBonuses::default(),
        });

        let loadout = KitSelection::Named("panther".to_string())
            .resolve(&library)
            .unwrap();
        assert_eq!(loadout.kit.as_deref(), Some("Panther"));
        assert_eq!(loadout.melee, KitBonuses::new(1, 1, 1));

        let err = KitSelection::Named("Cloak".to_string()).resolve(&library).unwrap_err();
        assert_eq!(err.to_string(), "Kit 'Cloak' not found");
    }

    #[test]
    fn test_legacy_record_defaults() {
        let json = r#"{"name":"Goblin","stamina":12,"recoveries":2,"M":1,"kit_melee":[1]}"#;
        let goblin: Combatant = serde_json::from_str(json).unwrap();
        assert_eq!(goblin.max_stamina, 12);
        assert_eq!(goblin.max_recoveries, 2);
        assert!(goblin.is_player);
        assert_eq!(goblin.status, TurnStatus::Ready);
        assert_eq!(goblin.characteristics.might, 1);
        assert_eq!(goblin.loadout.melee, KitBonuses::new(1, 0, 0));
    }

    #[test]
    fn test_serialized_keys() {
        let value = serde_json::to_value(hero()).unwrap();
        for key in ["M", "A", "R", "I", "P", "STA", "Su", "HR", "kit", "kit_melee"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["status"], "ready");
        assert!(value.get("effects").is_none());
    }

    #[test]
    fn test_damage_and_heal_stay_in_range() {
        let mut aria = hero();
        let change = aria.take_damage(1000);
        assert_eq!(change.after, 0);
        let change = aria.heal(1000);
        assert_eq!(change.after, 30);
        assert_eq!(change.delta(), 30);
    }

    #[test]
    fn test_extreme_amounts_saturate() {
        let mut aria = hero();
        aria.take_damage(10);
        let change = aria.heal(i32::MAX);
        assert_eq!(change.before, 20);
        assert_eq!(change.after, 30);

        let change = aria.take_damage(i32::MAX);
        assert_eq!(change.after, 0);

        aria.stamina = -5;
        assert_eq!(aria.take_damage(i32::MAX).after, 0);
    }

    #[test]
    fn test_field_update_parsing() {
        let library = ContentLibrary::new();
        assert_eq!(
            FieldUpdate::parse("M".parse().unwrap(), "-1", &library).unwrap(),
            FieldUpdate::Characteristic(Characteristic::Might, -1)
        );
        assert!(FieldUpdate::parse(FieldName::Speed, "fast", &library).is_err());
        assert!(FieldUpdate::parse(FieldName::Surges, "-2", &library).is_err());
        assert!(FieldUpdate::parse(FieldName::Name, "  ", &library).is_err());
        assert_eq!(
            FieldUpdate::parse(FieldName::Kit, "", &library).unwrap(),
            FieldUpdate::Kit(Loadout::default())
        );
        assert!("wings".parse::<FieldName>().is_err());
    }

    #[test]
    fn test_stamina_update_is_clamped() {
        let mut aria = hero();
        aria.apply_update(FieldUpdate::Stamina(99)).unwrap();
        assert_eq!(aria.stamina, 30);
        aria.apply_update(FieldUpdate::MaxStamina(20)).unwrap();
        assert_eq!(aria.stamina, 20);
    }
}

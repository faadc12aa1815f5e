//! Dice rolling for Draw Steel.
//!
//! Two kinds of rolls live here: the 2d10 power roll that every ability and
//! test uses, and free-form expressions such as `2d10+3+1d4-2`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sides on each die of a power roll.
pub const POWER_DIE_SIDES: u32 = 10;

/// Highest power-roll total that still lands on tier 1.
pub const TIER_ONE_MAX: i32 = 11;

/// Highest power-roll total that still lands on tier 2.
pub const TIER_TWO_MAX: i32 = 16;

/// Bonus a skilled character adds to a power roll.
pub const SKILL_BONUS: i32 = 2;

/// Error type for dice parsing and rolling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("No valid dice terms found.")]
    NoTerms,
    #[error("Dice limits exceeded: {count}d{sides}")]
    LimitsExceeded { count: String, sides: String },
    #[error("Number too large: {0}")]
    NumberTooLarge(String),
}

// ============================================================================
// Tiers and Power Rolls
// ============================================================================

/// Outcome bucket of a power roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    /// Map a power-roll total onto its tier.
    pub fn from_total(total: i32) -> Tier {
        if total <= TIER_ONE_MAX {
            Tier::One
        } else if total <= TIER_TWO_MAX {
            Tier::Two
        } else {
            Tier::Three
        }
    }

    pub fn from_number(number: i32) -> Tier {
        match number {
            i32::MIN..=1 => Tier::One,
            2 => Tier::Two,
            _ => Tier::Three,
        }
    }

    /// The tier as 1, 2 or 3.
    pub fn number(&self) -> i32 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }

    /// Zero-based position, used to index per-tier tables.
    pub fn index(&self) -> usize {
        (self.number() - 1) as usize
    }

    /// Move the tier up or down, staying within 1..=3.
    pub fn shifted(self, steps: i32) -> Tier {
        Tier::from_number((self.number() + steps).clamp(1, 3))
    }

    /// The totals that land on this tier.
    pub fn range_label(&self) -> &'static str {
        match self {
            Tier::One => "≤11",
            Tier::Two => "12–16",
            Tier::Three => "17+",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier {}", self.number())
    }
}

/// Result of a 2d10 power roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerRoll {
    pub dice: [u32; 2],
    pub characteristic: i32,
    pub skill_bonus: i32,
    pub modifier: i32,
    pub total: i32,
    pub tier: Tier,
}

impl PowerRoll {
    /// Sum of the two dice alone.
    pub fn natural(&self) -> i32 {
        (self.dice[0] + self.dice[1]) as i32
    }
}

impl fmt::Display for PowerRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signed = |value: i32| {
            if value < 0 {
                format!(" - {}", value.unsigned_abs())
            } else {
                format!(" + {value}")
            }
        };
        let mut sum = format!("{} + {}", self.dice[0], self.dice[1]);
        if self.characteristic != 0 {
            sum.push_str(&signed(self.characteristic));
        }
        if self.skill_bonus != 0 {
            sum.push_str(&format!("{}(skill)", signed(self.skill_bonus)));
        }
        if self.modifier != 0 {
            sum.push_str(&signed(self.modifier));
        }
        write!(
            f,
            "({}) = {} → {} ({})",
            sum,
            self.total,
            self.tier,
            self.tier.range_label()
        )
    }
}

/// Roll a single power die.
pub fn roll_power_die<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(1..=POWER_DIE_SIDES)
}

/// Make a power roll: 2d10 + characteristic, +2 when skilled.
pub fn power_roll(characteristic: i32, skilled: bool) -> PowerRoll {
    power_roll_with_rng(&mut rand::thread_rng(), characteristic, skilled, 0)
}

/// Make a power roll with a specific RNG and a flat modifier.
pub fn power_roll_with_rng<R: Rng>(
    rng: &mut R,
    characteristic: i32,
    skilled: bool,
    modifier: i32,
) -> PowerRoll {
    let dice = [roll_power_die(rng), roll_power_die(rng)];
    let skill_bonus = if skilled { SKILL_BONUS } else { 0 };
    let total = ((dice[0] + dice[1]) as i32)
        .saturating_add(characteristic)
        .saturating_add(skill_bonus)
        .saturating_add(modifier);

    PowerRoll {
        dice,
        characteristic,
        skill_bonus,
        modifier,
        total,
        tier: Tier::from_total(total),
    }
}

// ============================================================================
// Free-form Expressions
// ============================================================================

/// Bounds on what a free-form expression may roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceLimits {
    pub max_count: u32,
    pub min_sides: u32,
    pub max_sides: u32,
}

impl Default for DiceLimits {
    fn default() -> Self {
        Self {
            max_count: 200,
            min_sides: 2,
            max_sides: 1000,
        }
    }
}

/// One signed term of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceTerm {
    Dice { negative: bool, count: u32, sides: u32 },
    Constant { negative: bool, value: i64 },
}

impl DiceTerm {
    fn sign(negative: bool) -> char {
        if negative {
            '-'
        } else {
            '+'
        }
    }
}

/// A parsed free-form expression (e.g. `2d10+3+1d4-2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceExpression {
    pub terms: Vec<DiceTerm>,
    pub original: String,
}

impl DiceExpression {
    /// Parse an expression, skipping characters that do not form a term.
    pub fn parse(expr: &str, limits: DiceLimits) -> Result<Self, DiceError> {
        let original = expr.trim().to_string();
        let chars: Vec<char> = original.to_lowercase().chars().collect();

        let mut terms = Vec::new();
        let mut pos = 0;
        while pos < chars.len() {
            match scan_term(&chars, pos) {
                Some((raw, end)) => {
                    terms.push(raw.into_term(limits)?);
                    pos = end;
                }
                None => pos += 1,
            }
        }

        if terms.is_empty() {
            return Err(DiceError::NoTerms);
        }

        Ok(Self { terms, original })
    }

    /// Roll the expression.
    pub fn roll(&self) -> Result<DiceRoll, DiceError> {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Roll with a specific RNG (useful for testing).
    ///
    /// Fails when the total does not fit in an `i64`.
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> Result<DiceRoll, DiceError> {
        let terms: Vec<TermResult> = self
            .terms
            .iter()
            .map(|term| match *term {
                DiceTerm::Dice {
                    negative,
                    count,
                    sides,
                } => {
                    let rolls: Vec<u32> = (0..count).map(|_| rng.gen_range(1..=sides)).collect();
                    let sum: i64 = rolls.iter().map(|&r| r as i64).sum();
                    TermResult {
                        term: term.clone(),
                        rolls,
                        subtotal: if negative { -sum } else { sum },
                    }
                }
                DiceTerm::Constant { negative, value } => TermResult {
                    term: term.clone(),
                    rolls: Vec::new(),
                    subtotal: if negative { -value } else { value },
                },
            })
            .collect();

        let total = terms
            .iter()
            .try_fold(0i64, |acc, t| acc.checked_add(t.subtotal))
            .ok_or_else(|| DiceError::NumberTooLarge(self.original.clone()))?;
        Ok(DiceRoll {
            expression: self.original.clone(),
            terms,
            total,
        })
    }
}

/// A term as scanned, before limits are checked.
enum RawTerm {
    Dice {
        negative: bool,
        count: String,
        sides: String,
    },
    Constant {
        negative: bool,
        digits: String,
    },
}

impl RawTerm {
    fn into_term(self, limits: DiceLimits) -> Result<DiceTerm, DiceError> {
        match self {
            RawTerm::Dice {
                negative,
                count,
                sides,
            } => {
                let exceeded = || DiceError::LimitsExceeded {
                    count: count.clone(),
                    sides: sides.clone(),
                };
                let parsed_count: u32 = if count.is_empty() {
                    1
                } else {
                    count.parse().map_err(|_| exceeded())?
                };
                let parsed_sides: u32 = sides.parse().map_err(|_| exceeded())?;

                if parsed_count < 1
                    || parsed_count > limits.max_count
                    || parsed_sides < limits.min_sides
                    || parsed_sides > limits.max_sides
                {
                    return Err(exceeded());
                }

                Ok(DiceTerm::Dice {
                    negative,
                    count: parsed_count,
                    sides: parsed_sides,
                })
            }
            RawTerm::Constant { negative, digits } => {
                let value: i64 = digits
                    .parse()
                    .map_err(|_| DiceError::NumberTooLarge(digits.clone()))?;
                Ok(DiceTerm::Constant { negative, value })
            }
        }
    }
}

/// Try to read one term starting at `start`: `[sign] [count] d sides` or
/// `[sign] digits`, with optional whitespace after the sign.
fn scan_term(chars: &[char], start: usize) -> Option<(RawTerm, usize)> {
    let mut pos = start;
    let mut negative = false;
    if let Some(&c) = chars.get(pos) {
        if c == '+' || c == '-' {
            negative = c == '-';
            pos += 1;
        }
    }
    while chars.get(pos).is_some_and(|c| c.is_whitespace()) {
        pos += 1;
    }

    let digits_end = scan_digits(chars, pos);
    let leading: String = chars[pos..digits_end].iter().collect();

    if chars.get(digits_end) == Some(&'d') {
        let sides_end = scan_digits(chars, digits_end + 1);
        if sides_end > digits_end + 1 {
            let sides: String = chars[digits_end + 1..sides_end].iter().collect();
            return Some((
                RawTerm::Dice {
                    negative,
                    count: leading,
                    sides,
                },
                sides_end,
            ));
        }
    }

    if !leading.is_empty() {
        return Some((
            RawTerm::Constant {
                negative,
                digits: leading,
            },
            digits_end,
        ));
    }

    None
}

fn scan_digits(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while chars.get(end).is_some_and(|c| c.is_ascii_digit()) {
        end += 1;
    }
    end
}

/// Result of rolling a single term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermResult {
    pub term: DiceTerm,
    pub rolls: Vec<u32>,
    pub subtotal: i64,
}

impl fmt::Display for TermResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.term {
            DiceTerm::Dice {
                negative,
                count,
                sides,
            } => {
                let rolls: Vec<String> = self.rolls.iter().map(|r| r.to_string()).collect();
                write!(
                    f,
                    "{}{}d{} [{}] → {:+}",
                    DiceTerm::sign(*negative),
                    count,
                    sides,
                    rolls.join(", "),
                    self.subtotal
                )
            }
            DiceTerm::Constant { negative, value } => {
                write!(
                    f,
                    "{}{} → {:+}",
                    DiceTerm::sign(*negative),
                    value,
                    self.subtotal
                )
            }
        }
    }
}

/// Complete result of a free-form roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceRoll {
    pub expression: String,
    pub terms: Vec<TermResult>,
    pub total: i64,
}

impl DiceRoll {
    /// One line per term with its rolls and signed subtotal.
    pub fn breakdown(&self) -> String {
        self.terms
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🎲 {}", self.expression)?;
        writeln!(f, "{}", self.breakdown())?;
        write!(f, "Total: **{}**", self.total)
    }
}

/// Parse and roll a free-form expression.
pub fn eval_dice_expression(expr: &str, limits: DiceLimits) -> Result<DiceRoll, DiceError> {
    DiceExpression::parse(expr, limits)?.roll()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::from_total(-3), Tier::One);
        assert_eq!(Tier::from_total(11), Tier::One);
        assert_eq!(Tier::from_total(12), Tier::Two);
        assert_eq!(Tier::from_total(16), Tier::Two);
        assert_eq!(Tier::from_total(17), Tier::Three);
        assert_eq!(Tier::from_total(30), Tier::Three);
    }

    #[test]
    fn test_tier_shift_clamps() {
        assert_eq!(Tier::One.shifted(1), Tier::Two);
        assert_eq!(Tier::Three.shifted(1), Tier::Three);
        assert_eq!(Tier::One.shifted(-1), Tier::One);
        assert_eq!(Tier::Two.shifted(-1), Tier::One);
        assert_eq!(Tier::Two.index(), 1);
    }

    #[test]
    fn test_power_roll_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        for stat in -2..=4 {
            for skilled in [false, true] {
                let roll = power_roll_with_rng(&mut rng, stat, skilled, 0);
                assert!((1..=10).contains(&roll.dice[0]));
                assert!((1..=10).contains(&roll.dice[1]));
                let bonus = if skilled { 2 } else { 0 };
                assert_eq!(roll.total, roll.natural() + stat + bonus);
                assert_eq!(roll.tier, Tier::from_total(roll.total));
            }
        }
    }

    #[test]
    fn test_power_roll_modifier() {
        let mut rng = StdRng::seed_from_u64(11);
        let roll = power_roll_with_rng(&mut rng, 2, true, -3);
        assert_eq!(roll.total, roll.natural() + 2 + 2 - 3);
    }

    #[test]
    fn test_parse_mixed_expression() {
        let expr = DiceExpression::parse("2d10+3+1d4-2", DiceLimits::default()).unwrap();
        assert_eq!(
            expr.terms,
            vec![
                DiceTerm::Dice { negative: false, count: 2, sides: 10 },
                DiceTerm::Constant { negative: false, value: 3 },
                DiceTerm::Dice { negative: false, count: 1, sides: 4 },
                DiceTerm::Constant { negative: true, value: 2 },
            ]
        );
    }

    #[test]
    fn test_roll_mixed_expression_total() {
        let expr = DiceExpression::parse("2d10+3+1d4-2", DiceLimits::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let roll = expr.roll_with_rng(&mut rng).unwrap();

        let d10: i64 = roll.terms[0].rolls.iter().map(|&r| r as i64).sum();
        let d4: i64 = roll.terms[2].rolls.iter().map(|&r| r as i64).sum();
        assert_eq!(roll.terms[0].rolls.len(), 2);
        assert_eq!(roll.terms[2].rolls.len(), 1);
        assert_eq!(roll.total, d10 + 3 + d4 - 2);
        assert_eq!(roll.breakdown().lines().count(), 4);
        assert!(roll.breakdown().lines().last().unwrap().starts_with("-2 → -2"));
    }

    #[test]
    fn test_count_defaults_to_one() {
        let expr = DiceExpression::parse("d6", DiceLimits::default()).unwrap();
        assert_eq!(
            expr.terms,
            vec![DiceTerm::Dice { negative: false, count: 1, sides: 6 }]
        );
    }

    #[test]
    fn test_no_terms() {
        let limits = DiceLimits::default();
        assert_eq!(DiceExpression::parse("", limits).unwrap_err(), DiceError::NoTerms);
        assert_eq!(DiceExpression::parse("abc", limits).unwrap_err(), DiceError::NoTerms);
        assert_eq!(DiceExpression::parse("  + - ", limits).unwrap_err(), DiceError::NoTerms);
    }

    #[test]
    fn test_limits() {
        let limits = DiceLimits::default();
        assert!(DiceExpression::parse("200d1000", limits).is_ok());
        assert!(matches!(
            DiceExpression::parse("201d6", limits),
            Err(DiceError::LimitsExceeded { .. })
        ));
        assert!(matches!(
            DiceExpression::parse("1d1", limits),
            Err(DiceError::LimitsExceeded { .. })
        ));
        assert!(matches!(
            DiceExpression::parse("0d6", limits),
            Err(DiceError::LimitsExceeded { .. })
        ));
        assert!(matches!(
            DiceExpression::parse("1d1001", limits),
            Err(DiceError::LimitsExceeded { .. })
        ));
    }

    #[test]
    fn test_garbage_between_terms_is_skipped() {
        let expr = DiceExpression::parse("2D6 plus 4", DiceLimits::default()).unwrap();
        assert_eq!(expr.terms.len(), 2);
        assert_eq!(expr.terms[1], DiceTerm::Constant { negative: false, value: 4 });
    }

    #[test]
    fn test_constant_breakdown_format() {
        let expr = DiceExpression::parse("-5", DiceLimits::default()).unwrap();
        let roll = expr.roll().unwrap();
        assert_eq!(roll.total, -5);
        assert_eq!(roll.breakdown(), "-5 → -5");
    }

    #[test]
    fn test_total_out_of_range() {
        let limits = DiceLimits::default();
        assert_eq!(
            eval_dice_expression("9223372036854775807+1", limits).unwrap_err(),
            DiceError::NumberTooLarge("9223372036854775807+1".to_string())
        );
        assert!(matches!(
            eval_dice_expression("-9223372036854775807-2", limits),
            Err(DiceError::NumberTooLarge(_))
        ));
        assert_eq!(
            eval_dice_expression("9223372036854775807-1", limits).unwrap().total,
            i64::MAX - 1
        );
    }

    #[test]
    fn test_power_roll_modifier_saturates() {
        let mut rng = StdRng::seed_from_u64(3);
        let roll = power_roll_with_rng(&mut rng, 2, true, i32::MAX);
        assert_eq!(roll.total, i32::MAX);
        assert_eq!(roll.tier, Tier::Three);

        let roll = power_roll_with_rng(&mut rng, -5, false, i32::MIN);
        assert_eq!(roll.total, i32::MIN);
        assert_eq!(roll.tier, Tier::One);
    }

    #[test]
    fn test_power_roll_adds_stat_and_skill() {
        for _ in 0..50 {
            let roll = power_roll(3, true);
            for die in roll.dice {
                assert!((1..=10).contains(&die));
            }
            let natural = (roll.dice[0] + roll.dice[1]) as i32;
            assert_eq!(roll.characteristic, 3);
            assert_eq!(roll.skill_bonus, 2);
            assert_eq!(roll.modifier, 0);
            assert_eq!(roll.total, natural + 3 + 2);
            assert_eq!(roll.tier, Tier::from_total(roll.total));
        }

        let roll = power_roll(-1, true);
        let shown = roll.to_string();
        assert!(
            shown.starts_with(&format!("({} + {} - 1 + 2(skill)) = ", roll.dice[0], roll.dice[1])),
            "{shown}"
        );

        let roll = power_roll(0, false);
        assert_eq!(roll.skill_bonus, 0);
        assert_eq!(roll.total, (roll.dice[0] + roll.dice[1]) as i32);
    }
}

//! Turn and round transitions.
//!
//! Each combatant cycles Ready -> Done -> Ready across rounds. At most one
//! Ready combatant is `current`. The cycle never ends on its own.

use crate::combatant::TurnStatus;
use crate::encounter::EncounterState;
use crate::error::{Result, TrackerError};

impl EncounterState {
    /// Point the turn arrow at a Ready combatant.
    pub fn start_turn(&mut self, name: &str) -> Result<String> {
        let entry = self.get(name)?;
        if entry.status == TurnStatus::Done {
            return Err(TrackerError::conflict(format!(
                "**{}** is already in Turn Over. Start the next round or edit their status.",
                entry.name
            )));
        }
        let resolved = entry.name.clone();
        self.current = Some(resolved.clone());
        Ok(resolved)
    }

    /// Move a combatant to Done. Without a name the current combatant is used.
    pub fn end_turn(&mut self, name: Option<&str>) -> Result<String> {
        let target = match name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name.to_string(),
            None => self.current.clone().ok_or_else(|| {
                TrackerError::conflict(
                    "No active character. Start a turn first or specify a character.",
                )
            })?,
        };
        self.set_status(&target, TurnStatus::Done)
    }

    /// Override a combatant's status.
    pub fn set_status(&mut self, name: &str, status: TurnStatus) -> Result<String> {
        let entry = self.get_mut(name)?;
        entry.status = status;
        let resolved = entry.name.clone();
        if status == TurnStatus::Done && self.is_current(&resolved) {
            self.current = None;
        }
        Ok(resolved)
    }

    /// Ready every Done combatant and advance the round by one.
    ///
    /// Returns how many combatants were readied.
    pub fn next_round(&mut self) -> usize {
        let mut readied = 0;
        for entry in &mut self.entries {
            if entry.status == TurnStatus::Done {
                entry.status = TurnStatus::Ready;
                readied += 1;
            }
        }
        self.current = None;
        self.round = self.round.saturating_add(1);
        readied
    }

    /// Jump to a round, optionally readying everyone.
    pub fn set_round(&mut self, round: u32, ready_all: bool) -> Result<()> {
        if round < 1 {
            return Err(TrackerError::validation("Round must be at least 1."));
        }
        self.round = round;
        if ready_all {
            for entry in &mut self.entries {
                entry.status = TurnStatus::Ready;
            }
        }
        self.current = None;
        Ok(())
    }

    pub fn reset_round(&mut self, ready_all: bool) {
        self.round = 1;
        if ready_all {
            for entry in &mut self.entries {
                entry.status = TurnStatus::Ready;
            }
        }
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Loadout, NewCombatant};
    use crate::error::ErrorKind;

    fn encounter() -> EncounterState {
        let mut state = EncounterState::new();
        for name in ["Aria", "Bram", "Cole"] {
            state
                .add_combatant(NewCombatant::new(name, 20), Loadout::default())
                .unwrap();
        }
        state
    }

    #[test]
    fn test_start_and_end_turn() {
        let mut state = encounter();
        assert_eq!(state.start_turn("aria").unwrap(), "Aria");
        assert_eq!(state.current.as_deref(), Some("Aria"));

        assert_eq!(state.end_turn(None).unwrap(), "Aria");
        assert!(state.current.is_none());
        assert_eq!(state.entries[0].status, TurnStatus::Done);
    }

    #[test]
    fn test_start_turn_rejects_done() {
        let mut state = encounter();
        state.set_status("Bram", TurnStatus::Done).unwrap();
        let err = state.start_turn("Bram").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(state.current.is_none());
    }

    #[test]
    fn test_end_turn_without_target() {
        let mut state = encounter();
        let err = state.end_turn(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            state.end_turn(Some("Nobody")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_end_turn_of_other_keeps_current() {
        let mut state = encounter();
        state.start_turn("Aria").unwrap();
        state.end_turn(Some("Cole")).unwrap();
        assert_eq!(state.current.as_deref(), Some("Aria"));
    }

    #[test]
    fn test_set_status_done_clears_current() {
        let mut state = encounter();
        state.start_turn("Cole").unwrap();
        state.set_status("COLE", TurnStatus::Done).unwrap();
        assert!(state.current.is_none());
    }

    #[test]
    fn test_next_round_readies_done() {
        let mut state = encounter();
        state.set_status("Aria", TurnStatus::Done).unwrap();
        state.set_status("Cole", TurnStatus::Done).unwrap();
        state.start_turn("Bram").unwrap();

        assert_eq!(state.next_round(), 2);
        assert_eq!(state.round, 2);
        assert!(state.current.is_none());
        assert_eq!(state.ready_count(), 3);
    }

    #[test]
    fn test_set_round() {
        let mut state = encounter();
        state.set_status("Aria", TurnStatus::Done).unwrap();
        state.start_turn("Bram").unwrap();

        state.set_round(5, false).unwrap();
        assert_eq!(state.round, 5);
        assert!(state.current.is_none());
        assert_eq!(state.entries[0].status, TurnStatus::Done);

        state.set_round(2, true).unwrap();
        assert_eq!(state.ready_count(), 3);

        assert_eq!(state.set_round(0, true).unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(state.round, 2);
    }

    #[test]
    fn test_next_round_at_last_round() {
        let mut state = encounter();
        state.set_round(u32::MAX, false).unwrap();
        state.next_round();
        assert_eq!(state.round, u32::MAX);
    }

    #[test]
    fn test_reset_round() {
        let mut state = encounter();
        state.next_round();
        state.next_round();
        state.reset_round(false);
        assert_eq!(state.round, 1);
    }
}

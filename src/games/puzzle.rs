//! Turn-limited swap puzzle engine for game level 1.
//!
//! The engine is a pure state machine over a [`PuzzleState`]: it validates a
//! swap, applies it, and reports the resulting status. Already-solved and
//! already-locked states short-circuit without mutating anything, so a client
//! re-polling after the fact (page refresh, duplicate submit) never spends an
//! extra turn.

use serde::{Deserialize, Serialize};

use super::board::{self, BOARD_TILES};

/// Errors surfaced by the games subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// A swap coordinate was outside [0, 25) or not an integer.
    #[error("swap index out of range")]
    InvalidIndex,

    /// A move was submitted with no (or someone else's) puzzle state.
    #[error("no puzzle state")]
    NoActiveState,

    /// A game level outside {1, 2, 3} was requested.
    #[error("unknown game level")]
    UnknownLevel,
}

/// Per-session puzzle record: the board, spent turns, move budget, and the
/// user the state belongs to. Valid only while `owner` matches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleState {
    pub owner: String,
    pub board: Vec<u8>,
    pub turns: u32,
    pub limit: u32,
}

impl PuzzleState {
    /// Fresh state with a newly shuffled board and zero turns spent.
    pub fn new(owner: &str, limit: u32) -> Self {
        PuzzleState {
            owner: owner.to_string(),
            board: board::generate(),
            turns: 0,
            limit,
        }
    }

    pub fn is_solved(&self) -> bool {
        board::is_solved(&self.board)
    }

    /// Locked means the move budget is exhausted while unsolved.
    pub fn is_locked(&self) -> bool {
        self.turns >= self.limit && !self.is_solved()
    }
}

/// Snapshot returned by every accepted [`swap`] call, whether or not a turn
/// was spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapOutcome {
    pub board: Vec<u8>,
    pub turns: u32,
    pub limit: u32,
    pub solved: bool,
    pub passed: bool,
    pub locked: bool,
}

impl SwapOutcome {
    fn snapshot(state: &PuzzleState, solved: bool, passed: bool, locked: bool) -> Self {
        SwapOutcome {
            board: state.board.clone(),
            turns: state.turns,
            limit: state.limit,
            solved,
            passed,
            locked,
        }
    }
}

/// Apply one swap move to `state`.
///
/// Rules, in order:
/// - indices outside the board are rejected with [`GameError::InvalidIndex`];
/// - a solved board returns `solved=true, passed=true` without spending a turn;
/// - an exhausted budget returns `locked=true` without mutating anything;
/// - otherwise the two positions are swapped unconditionally and one turn is
///   consumed. A swap with `a == b` still costs a turn: every accepted call
///   is a turn spent.
pub fn swap(state: &mut PuzzleState, a: usize, b: usize) -> Result<SwapOutcome, GameError> {
    if a >= BOARD_TILES || b >= BOARD_TILES {
        return Err(GameError::InvalidIndex);
    }

    if state.is_solved() {
        return Ok(SwapOutcome::snapshot(state, true, true, false));
    }

    if state.turns >= state.limit {
        return Ok(SwapOutcome::snapshot(state, false, false, true));
    }

    state.board.swap(a, b);
    state.turns += 1;

    let solved = state.is_solved();
    let passed = solved && state.turns <= state.limit;
    let locked = state.turns >= state.limit && !solved;
    Ok(SwapOutcome::snapshot(state, solved, passed, locked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::board::solved_board;

    fn nearly_solved(owner: &str, limit: u32) -> PuzzleState {
        let mut state = PuzzleState::new(owner, limit);
        state.board = solved_board();
        state.board.swap(0, 1);
        state
    }

    #[test]
    fn out_of_range_indices_rejected() {
        let mut state = PuzzleState::new("alice", 25);
        assert_eq!(swap(&mut state, 25, 0), Err(GameError::InvalidIndex));
        assert_eq!(swap(&mut state, 0, 99), Err(GameError::InvalidIndex));
        assert_eq!(state.turns, 0, "rejected move must not spend a turn");
    }

    #[test]
    fn self_swap_spends_a_turn() {
        let mut state = nearly_solved("alice", 25);
        let outcome = swap(&mut state, 7, 7).unwrap();
        assert_eq!(outcome.turns, 1);
        assert!(!outcome.solved);
    }

    #[test]
    fn solving_move_passes() {
        let mut state = nearly_solved("alice", 25);
        let outcome = swap(&mut state, 0, 1).unwrap();
        assert!(outcome.solved);
        assert!(outcome.passed);
        assert!(!outcome.locked);
        assert_eq!(outcome.turns, 1);
    }

    #[test]
    fn solved_board_short_circuits_without_spending_turns() {
        let mut state = PuzzleState::new("alice", 25);
        state.board = solved_board();
        state.turns = 3;
        for _ in 0..5 {
            let outcome = swap(&mut state, 0, 1).unwrap();
            assert!(outcome.solved);
            assert!(outcome.passed);
            assert_eq!(outcome.turns, 3, "post-solve polls are idempotent");
        }
        assert_eq!(state.board, solved_board());
    }

    #[test]
    fn locked_state_rejects_further_moves_without_mutation() {
        let mut state = nearly_solved("alice", 1);
        // Burn the single turn on a non-solving move.
        let outcome = swap(&mut state, 2, 3).unwrap();
        assert_eq!(outcome.turns, 1);
        assert!(outcome.locked);
        assert!(!outcome.solved);

        let before = state.board.clone();
        let outcome = swap(&mut state, 0, 1).unwrap();
        assert!(outcome.locked);
        assert!(!outcome.passed);
        assert_eq!(outcome.turns, 1);
        assert_eq!(state.board, before);
    }

    #[test]
    fn solving_on_the_last_turn_passes_and_does_not_lock() {
        let mut state = nearly_solved("alice", 1);
        let outcome = swap(&mut state, 0, 1).unwrap();
        assert!(outcome.solved);
        assert!(outcome.passed);
        assert!(!outcome.locked);
        assert_eq!(outcome.turns, 1);
    }

    #[test]
    fn turns_are_monotonic_across_any_call_sequence() {
        let mut state = PuzzleState::new("alice", 10);
        let mut last = 0;
        for i in 0..20 {
            let outcome = swap(&mut state, i % 25, (i * 7) % 25).unwrap();
            assert!(outcome.turns >= last);
            last = outcome.turns;
        }
    }
}

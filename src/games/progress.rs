//! Forward-only level unlock tracking.
//!
//! Completion flags on the user record (`game1_done`, `game2_done`) gate the
//! three game levels: the puzzle is always open, the volume challenge needs
//! level 1, and the hint reveal needs both. Flags are terminal once set;
//! there is no revocation path.

use crate::storage::User;

use super::puzzle::GameError;

/// The three game levels, in unlock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Puzzle,
    Volume,
    Hint,
}

impl Level {
    /// Map a user-supplied level number to a [`Level`].
    pub fn from_number(n: i64) -> Result<Level, GameError> {
        match n {
            1 => Ok(Level::Puzzle),
            2 => Ok(Level::Volume),
            3 => Ok(Level::Hint),
            _ => Err(GameError::UnknownLevel),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Level::Puzzle => 1,
            Level::Volume => 2,
            Level::Hint => 3,
        }
    }

    /// Stable identifier used in logs and activity counters.
    pub fn slug(self) -> &'static str {
        match self {
            Level::Puzzle => "puzzle",
            Level::Volume => "volume",
            Level::Hint => "hint",
        }
    }
}

/// Whether `user` may enter `level`. Level 1 is always enterable; each later
/// level requires every earlier completion flag.
pub fn can_enter(user: &User, level: Level) -> bool {
    match level {
        Level::Puzzle => true,
        Level::Volume => user.game1_done,
        Level::Hint => user.game1_done && user.game2_done,
    }
}

/// Where to send a caller the gate turned away: the earliest level they have
/// not cleared yet.
pub fn fallback(user: &User, _denied: Level) -> Level {
    if !user.game1_done {
        Level::Puzzle
    } else {
        Level::Volume
    }
}

/// Set the completion flag for `level` exactly once. Returns `true` when the
/// flag was newly set, `false` when it was already set (a no-op; setting an
/// already-true flag never errors or double-fires). Level 3 carries no flag
/// of its own and is rejected.
pub fn mark_complete(user: &mut User, level: Level) -> Result<bool, GameError> {
    let flag = match level {
        Level::Puzzle => &mut user.game1_done,
        Level::Volume => &mut user.game2_done,
        Level::Hint => return Err(GameError::UnknownLevel),
    };
    let newly_set = !*flag;
    *flag = true;
    Ok(newly_set)
}

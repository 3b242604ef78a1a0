//! Mini-game chain gating the final hint.
//!
//! Three levels, cleared in order: the turn-limited tile puzzle (level 1),
//! the volume challenge (level 2, client-side with a server completion
//! callback), and the hint reveal (level 3). The pieces here are plain state
//! machines with no HTTP awareness; the web layer composes them per request.
//!
//! - [`board`] - shuffled 5x5 tile board generation
//! - [`puzzle`] - the swap engine and per-session [`PuzzleState`]
//! - [`store`] - session-token-keyed state store with an owner guard
//! - [`progress`] - forward-only completion flags and level gating

pub mod board;
pub mod progress;
pub mod puzzle;
pub mod store;

pub use progress::Level;
pub use puzzle::{GameError, PuzzleState, SwapOutcome};
pub use store::PuzzleStore;

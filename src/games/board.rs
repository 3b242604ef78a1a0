//! Board generation for the level 1 tile puzzle.
//!
//! A board is an ordered sequence of the 25 distinct tile values 1..=25.
//! `generate` shuffles with `rand`'s Fisher-Yates implementation so every
//! permutation is equally likely; two generations are uncorrelated.

use rand::seq::SliceRandom;

/// Number of tiles on the puzzle board (5x5).
pub const BOARD_TILES: usize = 25;

/// Produce a freshly shuffled board: a uniform permutation of 1..=25.
pub fn generate() -> Vec<u8> {
    let mut board: Vec<u8> = (1..=BOARD_TILES as u8).collect();
    board.shuffle(&mut rand::thread_rng());
    board
}

/// A board is solved iff it reads 1..=25 ascending.
pub fn is_solved(board: &[u8]) -> bool {
    board.len() == BOARD_TILES && board.iter().enumerate().all(|(i, &v)| v as usize == i + 1)
}

/// The solved reference sequence, used for seeding deterministic tests.
pub fn solved_board() -> Vec<u8> {
    (1..=BOARD_TILES as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_a_permutation_of_1_to_25() {
        let board = generate();
        assert_eq!(board.len(), BOARD_TILES);
        let mut sorted = board.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, solved_board());
    }

    #[test]
    fn solved_detection() {
        assert!(is_solved(&solved_board()));
        let mut board = solved_board();
        board.swap(0, 24);
        assert!(!is_solved(&board));
        // Wrong length is never solved
        assert!(!is_solved(&board[..24]));
    }
}

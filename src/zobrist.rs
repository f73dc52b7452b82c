use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::{Color, Piece, BOARD_SIZE};
use crate::movegen::Position;

const SQUARES: usize = BOARD_SIZE * BOARD_SIZE;
const ZOBRIST_SEED: u64 = 0x00c4_ec4e_25ba_5e11;

struct ZobristKeys {
    pieces: [[u64; 4]; SQUARES],
    continuing: [u64; SQUARES],
    black_to_move: u64,
}

static KEYS: LazyLock<ZobristKeys> = LazyLock::new(|| {
    let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
    let mut pieces = [[0u64; 4]; SQUARES];
    for square in pieces.iter_mut() {
        for key in square.iter_mut() {
            *key = rng.gen();
        }
    }
    let mut continuing = [0u64; SQUARES];
    for key in continuing.iter_mut() {
        *key = rng.gen();
    }
    ZobristKeys {
        pieces,
        continuing,
        black_to_move: rng.gen(),
    }
});

fn piece_index(piece: Piece) -> usize {
    match (piece.color, piece.is_king) {
        (Color::White, false) => 0,
        (Color::White, true) => 1,
        (Color::Black, false) => 2,
        (Color::Black, true) => 3,
    }
}

/// Hash of board, side to move and the forced-continuation square.
pub fn position_key(position: &Position) -> u64 {
    let keys = &*KEYS;
    let mut hash = 0u64;
    for (square, piece) in position.board.pieces() {
        hash ^= keys.pieces[square.index()][piece_index(piece)];
    }
    if position.side_to_move == Color::Black {
        hash ^= keys.black_to_move;
    }
    if let Some(square) = position.continuing_from {
        hash ^= keys.continuing[square.index()];
    }
    hash
}

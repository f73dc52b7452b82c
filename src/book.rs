use crate::board::{Board, Color, Square};
use crate::movegen::{Move, Position};

/// Positions with more pieces than this still count as the opening.
pub const EARLY_GAME_PIECES: usize = 20;

type Line = (Color, (u8, u8), (u8, u8));

const STANDARD_LINES: &[Line] = &[
    (Color::White, (5, 2), (4, 3)),
    (Color::White, (5, 4), (4, 3)),
    (Color::White, (5, 4), (4, 5)),
    (Color::White, (5, 2), (4, 1)),
    (Color::White, (5, 6), (4, 5)),
    (Color::Black, (2, 5), (3, 4)),
    (Color::Black, (2, 3), (3, 4)),
    (Color::Black, (2, 3), (3, 2)),
    (Color::Black, (2, 5), (3, 6)),
    (Color::Black, (2, 1), (3, 2)),
];

/// Pre-approved first moves, looked up by side and `from -> to`.
#[derive(Debug, Clone, Default)]
pub struct OpeningBook {
    lines: Vec<(Color, Square, Square)>,
}

impl OpeningBook {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Central developing moves for both sides.
    pub fn standard() -> Self {
        let mut book = Self::empty();
        for &(color, from, to) in STANDARD_LINES {
            book.register(color, Square::at(from.0, from.1), Square::at(to.0, to.1));
        }
        book
    }

    pub fn register(&mut self, color: Color, from: Square, to: Square) {
        if !self.contains(color, from, to) {
            self.lines.push((color, from, to));
        }
    }

    pub fn contains(&self, color: Color, from: Square, to: Square) -> bool {
        self.lines
            .iter()
            .any(|&(c, f, t)| c == color && f == from && t == to)
    }

    pub fn is_early_game(board: &Board) -> bool {
        board.total_pieces() > EARLY_GAME_PIECES
    }

    /// Legal moves that are also book moves. Empty outside the opening or mid-chain.
    pub fn candidates<'a>(&self, position: &Position, legal: &'a [Move]) -> Vec<&'a Move> {
        if position.continuing_from.is_some() || !Self::is_early_game(&position.board) {
            return Vec::new();
        }
        legal
            .iter()
            .filter(|mv| self.contains(position.side_to_move, mv.from, mv.to))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

use std::collections::HashSet;

use crate::board::{Board, Color, Piece, Square, BOARD_SIZE, DIAGONALS};
use crate::movegen::MoveGenerator;

/// Score of a won position. Anything at or beyond `WIN_SCORE - MAX_PLY` is decisive.
pub const WIN_SCORE: i32 = 1_000_000;
pub const MAX_PLY: i32 = 512;

pub fn is_decisive(score: i32) -> bool {
    score.abs() >= WIN_SCORE - MAX_PLY
}

pub struct Evaluator {
    // Piece values
    pub man_value: i32,
    pub king_value: i32,
    pub endgame_king_bonus: i32,
    pub endgame_piece_threshold: usize,

    // Per-piece positional terms
    pub center_weight: i32,
    pub advance_weight: i32,
    pub near_promotion_bonus: i32,
    pub protection_bonus: i32,
    pub main_diagonal_bonus: i32,
    pub king_edge_bonus: i32,
    pub back_rank_guard_bonus: i32,
    pub local_mobility_weight: i32,

    // Whole-side terms
    pub material_weight: i32,
    pub king_count_weight: i32,
    pub mobility_weight: i32,
    pub center_square_weight: i32,
    pub advanced_piece_weight: i32,
    pub back_row_weight: i32,
    pub blocked_piece_penalty: i32,
    pub threatened_piece_penalty: i32,
    pub threatening_bonus: i32,

    move_generator: MoveGenerator,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            man_value: 100,
            king_value: 250,
            endgame_king_bonus: 75,
            endgame_piece_threshold: 10,

            center_weight: 1,
            advance_weight: 1,
            near_promotion_bonus: 20,
            protection_bonus: 4,
            main_diagonal_bonus: 3,
            king_edge_bonus: 6,
            back_rank_guard_bonus: 8,
            local_mobility_weight: 2,

            material_weight: 40,
            king_count_weight: 30,
            mobility_weight: 3,
            center_square_weight: 5,
            advanced_piece_weight: 4,
            back_row_weight: 6,
            blocked_piece_penalty: 5,
            threatened_piece_penalty: 12,
            threatening_bonus: 8,

            move_generator: MoveGenerator::new(),
        }
    }

    /// Score from `color`'s point of view. Outside terminal positions
    /// `evaluate(b, White) == -evaluate(b, Black)`.
    pub fn evaluate(&self, board: &Board, color: Color) -> i32 {
        if let Some(score) = self.terminal_score(board, color) {
            return score;
        }

        let endgame = board.total_pieces() < self.endgame_piece_threshold;
        self.side_score(board, color, endgame) - self.side_score(board, color.opposite(), endgame)
    }

    /// A side without pieces or without legal moves has lost.
    pub fn terminal_score(&self, board: &Board, color: Color) -> Option<i32> {
        let opponent = color.opposite();
        if board.count(color) == 0 {
            return Some(-WIN_SCORE);
        }
        if board.count(opponent) == 0 {
            return Some(WIN_SCORE);
        }
        if !self.move_generator.has_legal_moves(board, color) {
            return Some(-WIN_SCORE);
        }
        if !self.move_generator.has_legal_moves(board, opponent) {
            return Some(WIN_SCORE);
        }
        None
    }

    fn side_score(&self, board: &Board, color: Color, endgame: bool) -> i32 {
        let mut score = 0;
        let (mut pieces, mut kings) = (0, 0);
        let (mut center, mut advanced, mut back_row, mut blocked) = (0, 0, 0, 0);

        for (square, piece) in board.pieces_of(color) {
            score += self.piece_score(board, square, piece, endgame);

            pieces += 1;
            if piece.is_king {
                kings += 1;
            } else if square.row == color.home_row() {
                back_row += 1;
            }
            if (3..=4).contains(&square.row) && (2..=5).contains(&square.col) {
                center += 1;
            }
            if in_opponent_half(square, color) {
                advanced += 1;
            }
            if self.move_generator.simple_moves_for_piece(board, square).is_empty()
                && self.move_generator.captures_for_piece(board, square).is_empty()
            {
                blocked += 1;
            }
        }

        let mobility = self.move_generator.generate_moves(board, color).len() as i32;
        let own_threatened = self.threatened_pieces(board, color);
        let enemy_threatened = self.threatened_pieces(board, color.opposite());

        score += self.material_weight * pieces;
        score += self.king_count_weight * kings;
        score += self.mobility_weight * mobility;
        score += self.center_square_weight * center;
        score += self.advanced_piece_weight * advanced;
        score += self.back_row_weight * back_row;
        score -= self.blocked_piece_penalty * blocked;
        score -= self.threatened_piece_penalty * own_threatened;
        score += self.threatening_bonus * enemy_threatened;
        score
    }

    fn piece_score(&self, board: &Board, square: Square, piece: Piece, endgame: bool) -> i32 {
        let color = piece.color;
        let mut value = if piece.is_king {
            self.king_value + if endgame { self.endgame_king_bonus } else { 0 }
        } else {
            self.man_value
        };

        // Doubled distance from the board centre, 2 for the four middle squares up to 14 in a corner.
        let distance = (2 * square.row as i32 - 7).abs() + (2 * square.col as i32 - 7).abs();
        value += self.center_weight * (14 - distance);

        if piece.is_king {
            if is_edge(square) {
                value += self.king_edge_bonus;
            }
        } else {
            let progress = color.progress(square.row);
            value += self.advance_weight * progress * progress;
            if progress == 6 {
                value += self.near_promotion_bonus;
            }
            if square.row == color.home_row() {
                value += self.back_rank_guard_bonus;
            }
        }

        let mut protected = false;
        let mut reachable = 0;
        for &(dr, dc) in &DIAGONALS {
            let Some(next) = square.offset(dr, dc) else {
                continue;
            };
            match board.get(next) {
                Some(other) if other.color == color => protected = true,
                None if piece.is_king || dr == color.forward() => reachable += 1,
                _ => {}
            }
        }
        if protected {
            value += self.protection_bonus;
        }
        if square.row + square.col == 7 {
            value += self.main_diagonal_bonus;
        }
        value + self.local_mobility_weight * reachable
    }

    /// Number of `color`'s pieces the opponent could jump right now.
    fn threatened_pieces(&self, board: &Board, color: Color) -> i32 {
        let victims: HashSet<Square> = board
            .pieces_of(color.opposite())
            .flat_map(|(square, _)| self.move_generator.captures_for_piece(board, square))
            .flat_map(|mv| mv.captured)
            .collect();
        victims.len() as i32
    }
}

fn is_edge(square: Square) -> bool {
    let last = (BOARD_SIZE - 1) as u8;
    square.row == 0 || square.col == 0 || square.row == last || square.col == last
}

fn in_opponent_half(square: Square, color: Color) -> bool {
    match color {
        Color::White => square.row <= 3,
        Color::Black => square.row >= 4,
    }
}

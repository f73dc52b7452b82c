use std::fmt;

use serde::Serialize;

use crate::board::{Board, Color, Piece, Square, DIAGONALS};

/// One step or one jump. A capture chain is a series of single-jump moves
/// played by the same side while `Position::continuing_from` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub captured: Vec<Square>,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            captured: Vec::new(),
        }
    }

    pub fn new_capture(from: Square, to: Square, captured: Square) -> Self {
        Self {
            from,
            to,
            captured: vec![captured],
        }
    }

    pub fn is_capture(&self) -> bool {
        !self.captured.is_empty()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sep = if self.is_capture() { 'x' } else { '-' };
        write!(f, "{}{}{}", self.from, sep, self.to)
    }
}

/// A board together with whose turn it is and, mid-chain, which piece must keep jumping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub board: Board,
    pub side_to_move: Color,
    pub continuing_from: Option<Square>,
}

impl Position {
    pub fn new(board: Board, side_to_move: Color) -> Self {
        Self {
            board,
            side_to_move,
            continuing_from: None,
        }
    }

    /// Applies a generated move. After a capture the turn stays with the mover
    /// if the same piece can jump again from its landing square, otherwise it
    /// passes. Returns whether the move promoted.
    pub fn make_move(&mut self, mv: &Move) -> bool {
        let promoted = self.board.make_move(mv);
        let continues =
            mv.is_capture() && !MoveGenerator::new().captures_for_piece(&self.board, mv.to).is_empty();

        if continues {
            self.continuing_from = Some(mv.to);
        } else {
            self.continuing_from = None;
            self.side_to_move = self.side_to_move.opposite();
        }
        promoted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Ongoing,
    Won(Color),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MoveGenerator;

impl MoveGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Legal moves for `color`. If any piece can capture, only captures are returned.
    pub fn generate_moves(&self, board: &Board, color: Color) -> Vec<Move> {
        let captures = self.generate_captures(board, color);
        if !captures.is_empty() {
            return captures;
        }

        board
            .pieces_of(color)
            .flat_map(|(square, _)| self.simple_moves_for_piece(board, square))
            .collect()
    }

    /// Legal moves in a position, restricted to the continuing piece mid-chain.
    pub fn legal_moves(&self, position: &Position) -> Vec<Move> {
        match position.continuing_from {
            Some(square) => match position.board.get(square) {
                Some(piece) if piece.color == position.side_to_move => {
                    self.captures_for_piece(&position.board, square)
                }
                _ => Vec::new(),
            },
            None => self.generate_moves(&position.board, position.side_to_move),
        }
    }

    pub fn generate_captures(&self, board: &Board, color: Color) -> Vec<Move> {
        board
            .pieces_of(color)
            .flat_map(|(square, _)| self.captures_for_piece(board, square))
            .collect()
    }

    pub fn has_capture(&self, board: &Board, color: Color) -> bool {
        board
            .pieces_of(color)
            .any(|(square, _)| !self.captures_for_piece(board, square).is_empty())
    }

    pub fn has_legal_moves(&self, board: &Board, color: Color) -> bool {
        board.pieces_of(color).any(|(square, _)| {
            !self.simple_moves_for_piece(board, square).is_empty()
                || !self.captures_for_piece(board, square).is_empty()
        })
    }

    /// Non-capturing moves: one forward step for men, a slide of any length for kings.
    pub fn simple_moves_for_piece(&self, board: &Board, from: Square) -> Vec<Move> {
        let mut moves = Vec::new();
        let Some(piece) = board.get(from) else {
            return moves;
        };

        for &(dr, dc) in &DIAGONALS {
            if !piece.is_king && dr != piece.color.forward() {
                continue;
            }
            let mut current = from;
            while let Some(next) = current.offset(dr, dc) {
                if !board.is_empty_at(next) {
                    break;
                }
                moves.push(Move::new(from, next));
                if !piece.is_king {
                    break;
                }
                current = next;
            }
        }
        moves
    }

    /// Single jumps available to the piece on `from`, in any of the four directions.
    pub fn captures_for_piece(&self, board: &Board, from: Square) -> Vec<Move> {
        let mut moves = Vec::new();
        let Some(piece) = board.get(from) else {
            return moves;
        };

        for &(dr, dc) in &DIAGONALS {
            if piece.is_king {
                self.king_captures_along(board, from, piece, (dr, dc), &mut moves);
            } else {
                let (Some(over), Some(landing)) = (from.offset(dr, dc), from.offset(2 * dr, 2 * dc))
                else {
                    continue;
                };
                let jumps_enemy = board.get(over).is_some_and(|p| p.color != piece.color);
                if jumps_enemy && board.is_empty_at(landing) {
                    moves.push(Move::new_capture(from, landing, over));
                }
            }
        }
        moves
    }

    /// Scans one ray: empties, then exactly one opposing piece, then every empty
    /// square up to the next piece or the edge is a landing square.
    fn king_captures_along(
        &self,
        board: &Board,
        from: Square,
        piece: Piece,
        (dr, dc): (i8, i8),
        moves: &mut Vec<Move>,
    ) {
        let mut current = from;
        let mut jumped = None;

        while let Some(next) = current.offset(dr, dc) {
            current = next;
            match (board.get(next), jumped) {
                (None, None) => {}
                (None, Some(over)) => moves.push(Move::new_capture(from, next, over)),
                (Some(other), None) if other.color != piece.color => jumped = Some(next),
                (Some(_), _) => break,
            }
        }
    }

    pub fn game_state(&self, position: &Position) -> GameState {
        let side = position.side_to_move;
        if self.legal_moves(position).is_empty() {
            GameState::Won(side.opposite())
        } else {
            GameState::Ongoing
        }
    }
}

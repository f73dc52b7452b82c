use crate::board::{Color, Square};
use crate::error::MoveError;
use crate::movegen::{Move, MoveGenerator, Position};

/// Result of accepting a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub position: Position,
    pub applied: Move,
    pub was_capture: bool,
    pub promoted: bool,
    /// The same piece must jump again before the turn passes.
    pub must_continue: bool,
}

/// Checks externally proposed moves against the generated legal set. Pure: the
/// caller's position is never modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesValidator {
    move_generator: MoveGenerator,
}

impl RulesValidator {
    pub fn new() -> Self {
        Self {
            move_generator: MoveGenerator::new(),
        }
    }

    /// Resolves `from -> to` for `actor` into the matching legal move, including
    /// the square it jumps over.
    pub fn validate(
        &self,
        position: &Position,
        actor: Color,
        from: Square,
        to: Square,
    ) -> Result<Move, MoveError> {
        if actor != position.side_to_move {
            return Err(MoveError::NotYourTurn(actor));
        }
        if let Some(required) = position.continuing_from {
            if from != required {
                return Err(MoveError::MustContinueFrom(required));
            }
        }

        let board = &position.board;
        let piece = board
            .get(from)
            .filter(|piece| piece.color == actor)
            .ok_or(MoveError::NoPiece { color: actor, square: from })?;
        if !board.is_empty_at(to) {
            return Err(MoveError::Occupied(to));
        }

        let dr = to.row as i32 - from.row as i32;
        let dc = to.col as i32 - from.col as i32;
        if dr == 0 || dr.abs() != dc.abs() {
            return Err(MoveError::NotDiagonal { from, to });
        }
        let distance = dr.abs();
        let (step_r, step_c) = (dr.signum() as i8, dc.signum() as i8);

        let mut enemies = 0;
        let mut current = from;
        for _ in 1..distance {
            let Some(next) = current.offset(step_r, step_c) else {
                break;
            };
            current = next;
            if let Some(other) = board.get(next) {
                if other.color == actor {
                    return Err(MoveError::PathBlocked { from, to });
                }
                enemies += 1;
            }
        }

        let is_capture = if piece.is_king {
            if enemies > 1 {
                return Err(MoveError::PathBlocked { from, to });
            }
            enemies == 1
        } else {
            match distance {
                1 if step_r != actor.forward() => return Err(MoveError::WrongDirection),
                1 => false,
                2 if enemies == 0 => return Err(MoveError::NothingToCapture),
                2 => true,
                _ => return Err(MoveError::TooFar),
            }
        };

        if !is_capture
            && (position.continuing_from.is_some() || self.move_generator.has_capture(board, actor))
        {
            return Err(MoveError::CaptureRequired);
        }

        self.move_generator
            .legal_moves(position)
            .into_iter()
            .find(|mv| mv.from == from && mv.to == to)
            .ok_or(MoveError::Illegal { from, to })
    }

    /// Applies an already-resolved legal move.
    pub fn apply(&self, position: &Position, mv: Move) -> MoveOutcome {
        let mut next = position.clone();
        let promoted = next.make_move(&mv);
        MoveOutcome {
            must_continue: next.continuing_from.is_some(),
            was_capture: mv.is_capture(),
            promoted,
            applied: mv,
            position: next,
        }
    }

    pub fn play(
        &self,
        position: &Position,
        actor: Color,
        from: Square,
        to: Square,
    ) -> Result<MoveOutcome, MoveError> {
        let mv = self.validate(position, actor, from, to)?;
        Ok(self.apply(position, mv))
    }
}

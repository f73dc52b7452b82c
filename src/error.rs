use thiserror::Error;

use crate::board::{Color, Square};
use crate::session::{ParticipantId, SessionId};

/// Why a proposed move was refused. The session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("malformed coordinates {0:?}")]
    Malformed(String),

    #[error("square ({row}, {col}) is off the board")]
    OffBoard { row: i32, col: i32 },

    #[error("it is not {0}'s turn")]
    NotYourTurn(Color),

    #[error("no {color} piece on {square}")]
    NoPiece { color: Color, square: Square },

    #[error("destination {0} is occupied")]
    Occupied(Square),

    #[error("move from {from} to {to} is not a diagonal line")]
    NotDiagonal { from: Square, to: Square },

    #[error("men only step forward")]
    WrongDirection,

    #[error("men move one square or jump two")]
    TooFar,

    #[error("path from {from} to {to} is blocked")]
    PathBlocked { from: Square, to: Square },

    #[error("a jump must pass over an opposing piece")]
    NothingToCapture,

    #[error("a capture is available and must be taken")]
    CaptureRequired,

    #[error("the capturing piece on {0} must keep jumping")]
    MustContinueFrom(Square),

    #[error("move from {from} to {to} is not legal here")]
    Illegal { from: Square, to: Square },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("session {0} is not active")]
    NotActive(SessionId),

    #[error("stale submission: expected ply {expected}, session is at ply {actual}")]
    StaleSubmission { expected: u32, actual: u32 },

    #[error("{0} is not seated in this session")]
    NotParticipant(ParticipantId),

    #[error("a session takes one or two distinct participants")]
    InvalidParticipants,

    #[error(transparent)]
    InvalidMove(#[from] MoveError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardParseError {
    #[error("expected 8 rows, found {0}")]
    RowCount(usize),

    #[error("row {row} has {len} cells, expected 8")]
    RowLength { row: usize, len: usize },

    #[error("unknown cell {cell:?} at ({row}, {col})")]
    UnknownCell { cell: char, row: usize, col: usize },

    #[error("piece on light square ({row}, {col})")]
    LightSquare { row: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown difficulty {0:?} (expected easy, medium, hard or expert)")]
    UnknownDifficulty(String),
}

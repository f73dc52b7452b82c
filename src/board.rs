use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{BoardParseError, MoveError};
use crate::movegen::Move;

pub const BOARD_SIZE: usize = 8;

/// The four diagonal directions as (row, col) deltas.
pub const DIAGONALS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row delta of a forward step. White starts on rows 5-7 and moves toward row 0.
    pub fn forward(&self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    pub fn promotion_row(&self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    pub fn home_row(&self) -> u8 {
        self.opposite().promotion_row()
    }

    /// How many rows a man on `row` has advanced from its home row (0..=7).
    pub fn progress(&self, row: u8) -> i32 {
        match self {
            Color::White => 7 - row as i32,
            Color::Black => row as i32,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Piece {
    pub color: Color,
    #[serde(rename = "isKing")]
    pub is_king: bool,
}

impl Piece {
    pub fn man(color: Color) -> Self {
        Self { color, is_king: false }
    }

    pub fn king(color: Color) -> Self {
        Self { color, is_king: true }
    }

    pub fn promoted(self) -> Self {
        Self::king(self.color)
    }

    fn symbol(&self) -> char {
        match (self.color, self.is_king) {
            (Color::White, false) => 'w',
            (Color::White, true) => 'W',
            (Color::Black, false) => 'b',
            (Color::Black, true) => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    pub const fn at(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Returns `None` when the coordinates fall off the board.
    pub fn new(row: i32, col: i32) -> Option<Self> {
        let range = 0..BOARD_SIZE as i32;
        if range.contains(&row) && range.contains(&col) {
            Some(Self::at(row as u8, col as u8))
        } else {
            None
        }
    }

    pub fn offset(&self, dr: i8, dc: i8) -> Option<Self> {
        Self::new(self.row as i32 + dr as i32, self.col as i32 + dc as i32)
    }

    pub fn is_dark(&self) -> bool {
        (self.row + self.col) % 2 == 1
    }

    pub fn index(&self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Parses `row,col`, e.g. `5,2`.
impl FromStr for Square {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MoveError::Malformed(s.to_string());
        let (row, col) = s.split_once(',').ok_or_else(malformed)?;
        let row: i32 = row.trim().parse().map_err(|_| malformed())?;
        let col: i32 = col.trim().parse().map_err(|_| malformed())?;
        Square::new(row, col).ok_or(MoveError::OffBoard { row, col })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Option<Piece>; BOARD_SIZE]; BOARD_SIZE],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Standard layout: Black men on the dark squares of rows 0-2, White men on rows 5-7.
    pub fn new() -> Self {
        let mut board = Self::empty();
        for row in 0..BOARD_SIZE as u8 {
            let color = match row {
                0..=2 => Color::Black,
                5..=7 => Color::White,
                _ => continue,
            };
            for col in 0..BOARD_SIZE as u8 {
                let square = Square::at(row, col);
                if square.is_dark() {
                    board.place(square, Piece::man(color));
                }
            }
        }
        board
    }

    pub fn empty() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Reads eight rows of `.`/`w`/`W`/`b`/`B`, row 0 first. Whitespace inside a row is ignored.
    pub fn from_diagram(diagram: &str) -> Result<Self, BoardParseError> {
        let rows: Vec<Vec<char>> = diagram
            .lines()
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect::<Vec<_>>())
            .filter(|row| !row.is_empty())
            .collect();
        if rows.len() != BOARD_SIZE {
            return Err(BoardParseError::RowCount(rows.len()));
        }

        let mut board = Self::empty();
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != BOARD_SIZE {
                return Err(BoardParseError::RowLength { row, len: cells.len() });
            }
            for (col, &cell) in cells.iter().enumerate() {
                let piece = match cell {
                    '.' | '-' => continue,
                    'w' => Piece::man(Color::White),
                    'W' => Piece::king(Color::White),
                    'b' => Piece::man(Color::Black),
                    'B' => Piece::king(Color::Black),
                    _ => return Err(BoardParseError::UnknownCell { cell, row, col }),
                };
                let square = Square::at(row as u8, col as u8);
                if !square.is_dark() {
                    return Err(BoardParseError::LightSquare { row, col });
                }
                board.place(square, piece);
            }
        }
        Ok(board)
    }

    pub fn get(&self, square: Square) -> Option<Piece> {
        self.cells[square.row as usize][square.col as usize]
    }

    pub fn is_empty_at(&self, square: Square) -> bool {
        self.get(square).is_none()
    }

    pub fn place(&mut self, square: Square, piece: Piece) {
        self.cells[square.row as usize][square.col as usize] = Some(piece);
    }

    pub fn remove(&mut self, square: Square) -> Option<Piece> {
        self.cells[square.row as usize][square.col as usize].take()
    }

    /// Occupied squares in row-major order.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells.iter().enumerate().filter_map(move |(col, cell)| {
                cell.map(|piece| (Square::at(row as u8, col as u8), piece))
            })
        })
    }

    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.pieces().filter(move |(_, piece)| piece.color == color)
    }

    pub fn count(&self, color: Color) -> usize {
        self.pieces_of(color).count()
    }

    pub fn total_pieces(&self) -> usize {
        self.pieces().count()
    }

    /// Moves the piece, lifts every jumped piece and promotes a man that lands on
    /// its promotion row. Returns whether a promotion happened.
    pub fn make_move(&mut self, mv: &Move) -> bool {
        let Some(piece) = self.remove(mv.from) else {
            return false;
        };
        for &square in &mv.captured {
            self.remove(square);
        }

        let promote = !piece.is_king && mv.to.row == piece.color.promotion_row();
        self.place(mv.to, if promote { piece.promoted() } else { piece });
        promote
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in &self.cells {
            let line: Vec<String> = row
                .iter()
                .map(|cell| cell.map_or('.', |piece| piece.symbol()).to_string())
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

//! Board and position model
//!
//! [`Board`] is the 64-square occupancy the vision side works in; [`Position`]
//! wraps a `shakmaty` position for side to move, castling rights, en passant
//! target and the move counters, and serializes as a FEN record. The
//! reconciler owns exactly one authoritative [`Position`] and replaces it
//! wholesale on commit via [`Position::apply`].
//!
//! # Grid Orientation
//!
//! The board mapper hands over an 8×8 [`Grid`] indexed `grid[row][col]`, row 0
//! being the far edge of the camera image. [`Orientation`] says which side of
//! the board faces the camera:
//!
//! | Orientation   | `grid[0][0]` | `grid[7][7]` |
//! |---------------|--------------|--------------|
//! | `WhiteBottom` | a8           | h1           |
//! | `BlackBottom` | h1           | a8           |

use crate::error::{FenError, RulesError};
use crate::rules::{LegalMove, ShakmatyRules};
use crate::types::{Color, Piece, Square};
use serde::{Deserialize, Serialize};
use shakmaty::fen::{Fen, ParseFenError};
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position as _, PositionError};
use std::fmt;
use std::str::FromStr;

/// Standard initial arrangement
pub const STANDARD_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Camera-space grid produced by the board mapper
pub type Grid = [[Option<Piece>; 8]; 8];

/// Which side of the physical board is nearest the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    WhiteBottom,
    BlackBottom,
}

impl Orientation {
    /// Board square shown at `grid[row][col]`
    pub fn square_at(self, row: usize, col: usize) -> Square {
        let (row, col) = (row as u8 & 7, col as u8 & 7);
        let (file, rank) = match self {
            Orientation::WhiteBottom => (col, 7 - row),
            Orientation::BlackBottom => (7 - col, row),
        };
        Square::new(file, rank).unwrap_or_else(|| unreachable!("coordinates are masked to 0..8"))
    }
}

/// Occupancy of all 64 squares
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    squares: [Option<Piece>; 64],
}

impl Default for Board {
    fn default() -> Self {
        Board::empty()
    }
}

impl Board {
    pub fn empty() -> Self {
        Board {
            squares: [None; 64],
        }
    }

    /// Standard initial arrangement
    pub fn standard() -> Self {
        Board::from_chess(&shakmaty::Board::new())
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    /// Put `piece` on `square` (or clear it), returning the previous occupant
    pub fn set_piece_at(&mut self, square: Square, piece: Option<Piece>) -> Option<Piece> {
        std::mem::replace(&mut self.squares[square.index()], piece)
    }

    pub fn count(&self, piece: Piece) -> usize {
        self.squares.iter().filter(|p| **p == Some(piece)).count()
    }

    /// Occupied squares with their pieces, in index order
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.squares.iter().enumerate().filter_map(|(index, piece)| {
            let square = Square::from_index(index as u8)?;
            piece.map(|p| (square, p))
        })
    }

    /// Build a board from a camera-space grid
    pub fn from_grid(grid: &Grid, orientation: Orientation) -> Board {
        let mut board = Board::empty();
        for (row, cells) in grid.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                board.set_piece_at(orientation.square_at(row, col), *cell);
            }
        }
        board
    }

    /// Render the board back into a camera-space grid
    pub fn to_grid(&self, orientation: Orientation) -> Grid {
        let mut grid: Grid = [[None; 8]; 8];
        for (row, cells) in grid.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                *cell = self.piece_at(orientation.square_at(row, col));
            }
        }
        grid
    }

    /// Piece-placement field of a FEN record
    pub fn placement(&self) -> String {
        self.to_chess().to_string()
    }

    /// Parse a piece-placement field
    pub fn from_placement(placement: &str) -> Result<Board, FenError> {
        let parsed: shakmaty::Board = placement.parse().map_err(|e: ParseFenError| FenError::Syntax {
            fen: placement.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Board::from_chess(&parsed))
    }

    fn from_chess(board: &shakmaty::Board) -> Board {
        let mut out = Board::empty();
        for (square, piece) in board {
            out.set_piece_at(square.into(), Some(piece.into()));
        }
        out
    }

    fn to_chess(&self) -> shakmaty::Board {
        self.pieces()
            .map(|(square, piece)| (shakmaty::Square::from(square), shakmaty::Piece::from(piece)))
            .collect()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.placement())
    }
}

/// A full chess position: board plus game-state fields.
///
/// Rules state lives in a `shakmaty` [`Chess`]; the [`Board`] view is
/// refreshed whenever a new position is built.
#[derive(Debug, Clone)]
pub struct Position {
    chess: Chess,
    board: Board,
}

impl Default for Position {
    fn default() -> Self {
        Position::standard()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.to_fen() == other.to_fen()
    }
}

impl Eq for Position {}

impl From<Chess> for Position {
    fn from(chess: Chess) -> Self {
        let board = Board::from_chess(chess.board());
        Position { chess, board }
    }
}

impl Position {
    /// Standard initial position, White to move
    pub fn standard() -> Self {
        Position::from(Chess::default())
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Underlying rules state
    pub fn chess(&self) -> &Chess {
        &self.chess
    }

    pub fn turn(&self) -> Color {
        self.chess.turn().into()
    }

    /// En passant target, only when a legal capture onto it exists
    pub fn en_passant(&self) -> Option<Square> {
        self.chess.ep_square(EnPassantMode::Legal).map(Square::from)
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.chess.halfmoves()
    }

    pub fn fullmove_number(&self) -> u32 {
        self.chess.fullmoves().get()
    }

    /// Parse a FEN record.
    ///
    /// Missing counters default to `0 1`. Castling rights whose king or rook
    /// is off its home square and unusable en passant targets are dropped
    /// rather than rejected.
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let parsed: Fen = fen.parse().map_err(|e: ParseFenError| FenError::Syntax {
            fen: fen.to_string(),
            reason: e.to_string(),
        })?;
        let chess = parsed
            .into_position::<Chess>(CastlingMode::Standard)
            .or_else(PositionError::ignore_invalid_castling_rights)
            .or_else(PositionError::ignore_invalid_ep_square)
            .map_err(|e| FenError::Illegal {
                fen: fen.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Position::from(chess))
    }

    pub fn to_fen(&self) -> String {
        Fen::from_position(&self.chess, EnPassantMode::Legal).to_string()
    }

    /// Play `mv` and return the resulting position
    pub fn apply(&self, mv: &LegalMove) -> Result<Position, RulesError> {
        let chess_move = ShakmatyRules::resolve(&self.chess, mv).ok_or_else(|| RulesError::IllegalMove {
            uci: mv.uci(),
            fen: self.to_fen(),
        })?;
        let mut chess = self.chess.clone();
        chess.play_unchecked(chess_move);
        Ok(Position::from(chess))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fen())
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MoveFlavor;
    use crate::types::PieceKind;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    fn played(fen: &str, mv: LegalMove) -> String {
        Position::from_fen(fen).unwrap().apply(&mv).unwrap().to_fen()
    }

    #[test]
    fn test_standard_position_fen() {
        assert_eq!(Position::standard().to_fen(), STANDARD_FEN);
        assert_eq!(Position::from_fen(STANDARD_FEN).unwrap(), Position::standard());
        assert_eq!(Board::standard().placement(), "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR");
    }

    #[test]
    fn test_short_fen_defaults_counters() {
        let pos = Position::from_fen("8/8/8/8/8/8/8/K6k b - -").unwrap();
        assert_eq!(pos.turn(), Color::Black);
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.fullmove_number(), 1);
    }

    #[test]
    fn test_rejects_malformed_fen() {
        assert!(matches!(
            Position::from_fen("rnbqkbnr/pppppppp w"),
            Err(FenError::Syntax { .. })
        ));
        assert!(matches!(
            Position::from_fen("rnbqkbnr/ppppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::Syntax { .. })
        ));
        assert!(matches!(
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1"),
            Err(FenError::Syntax { .. })
        ));
    }

    #[test]
    fn test_kingless_position_is_rejected() {
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::Illegal { .. })
        ));
    }

    #[test]
    fn test_castling_rights_are_sanitized() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w KQkq - 0 1").unwrap();
        assert_eq!(pos.to_fen(), "4k3/8/8/8/8/8/8/4K3 w - - 0 1");
    }

    #[test]
    fn test_placement_round_trip() {
        let placement = "r3k2r/8/8/3pP3/8/8/8/R3K2R";
        let board = Board::from_placement(placement).unwrap();
        assert_eq!(board.placement(), placement);
        assert_eq!(board.count(Piece::from_symbol('r').unwrap()), 2);
        assert!(Board::from_placement("8/8/8").is_err());
    }

    #[test]
    fn test_grid_orientation_round_trip() {
        let board = Board::standard();
        let white_view = board.to_grid(Orientation::WhiteBottom);
        assert_eq!(white_view[0][0], Piece::from_symbol('r'));
        assert_eq!(white_view[7][4], Piece::from_symbol('K'));

        let black_view = board.to_grid(Orientation::BlackBottom);
        assert_eq!(black_view[0][0], Piece::from_symbol('R'));
        assert_eq!(black_view[7][3], Piece::from_symbol('k'));

        assert_eq!(Board::from_grid(&black_view, Orientation::BlackBottom), board);
    }

    #[test]
    fn test_apply_double_push_without_capturer_sets_no_ep() {
        assert_eq!(
            played(STANDARD_FEN, LegalMove::quiet(sq("e2"), sq("e4"))),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn test_apply_double_push_next_to_enemy_pawn_sets_ep() {
        let pos = Position::from_fen("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1").unwrap();
        let next = pos.apply(&LegalMove::quiet(sq("e2"), sq("e4"))).unwrap();
        assert_eq!(next.en_passant(), Some(sq("e3")));
    }

    #[test]
    fn test_apply_castle_moves_rook_and_clears_rights() {
        let mv = LegalMove {
            from: sq("e1"),
            to: sq("g1"),
            promotion: None,
            flavor: MoveFlavor::Castle,
        };
        assert_eq!(
            played("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 3 10", mv),
            "r3k2r/8/8/8/8/8/8/R4RK1 b kq - 4 10"
        );
    }

    #[test]
    fn test_apply_en_passant_removes_victim() {
        let mv = LegalMove {
            from: sq("e5"),
            to: sq("d6"),
            promotion: None,
            flavor: MoveFlavor::EnPassant,
        };
        assert_eq!(
            played("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 3", mv),
            "4k3/8/3P4/8/8/8/8/4K3 b - - 0 3"
        );
    }

    #[test]
    fn test_apply_promotion_and_fullmove_counter() {
        let mv = LegalMove {
            from: sq("a2"),
            to: sq("a1"),
            promotion: Some(PieceKind::Queen),
            flavor: MoveFlavor::Quiet,
        };
        let next = Position::from_fen("4k3/8/8/8/8/8/p7/4K3 b - - 5 40")
            .unwrap()
            .apply(&mv)
            .unwrap();
        assert_eq!(next.to_fen(), "4k3/8/8/8/8/8/8/q3K3 w - - 0 41");
        assert_eq!(next.board().piece_at(sq("a1")), Piece::from_symbol('q'));
    }

    #[test]
    fn test_apply_rejects_illegal_move() {
        let pos = Position::standard();
        assert!(matches!(
            pos.apply(&LegalMove::quiet(sq("e2"), sq("e5"))),
            Err(RulesError::IllegalMove { .. })
        ));
    }
}

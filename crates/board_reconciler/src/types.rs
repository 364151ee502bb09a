//! Piece, color and square primitives shared by every stage of reconciliation
//!
//! Pieces carry two textual encodings:
//!
//! - **FEN symbol**: `P N B R Q K` for White, lowercase for Black
//! - **Detector label**: `white_pawn`, `black_queen`, ... as emitted by the piece
//!   detector and echoed back in outbound notifications
//!
//! Squares are indexed `rank * 8 + file` (a1 = 0, h8 = 63).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Lowercase name used on the wire (`"white"` / `"black"`)
    pub fn name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }

    /// Rank (0-based) a pawn of this color promotes on
    pub fn promotion_rank(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Color::White),
            "black" | "b" => Ok(Color::Black),
            other => Err(format!("unknown color '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub fn name(self) -> &'static str {
        match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        }
    }

    /// Uppercase letter used in FEN and SAN
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }

    fn from_name(name: &str) -> Option<PieceKind> {
        Some(match name {
            "pawn" => PieceKind::Pawn,
            "knight" => PieceKind::Knight,
            "bishop" => PieceKind::Bishop,
            "rook" => PieceKind::Rook,
            "queen" => PieceKind::Queen,
            "king" => PieceKind::King,
            _ => return None,
        })
    }
}

/// A colored piece as it stands on a square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Piece { kind, color }
    }

    /// FEN symbol (`P`, `n`, ...)
    pub fn symbol(self) -> char {
        match self.color {
            Color::White => self.kind.letter(),
            Color::Black => self.kind.letter().to_ascii_lowercase(),
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Piece> {
        let color = if symbol.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match symbol.to_ascii_uppercase() {
            'P' => PieceKind::Pawn,
            'N' => PieceKind::Knight,
            'B' => PieceKind::Bishop,
            'R' => PieceKind::Rook,
            'Q' => PieceKind::Queen,
            'K' => PieceKind::King,
            _ => return None,
        };
        Some(Piece { kind, color })
    }

    /// Detector label (`white_pawn`, `black_king`, ...)
    pub fn label(self) -> String {
        format!("{}_{}", self.color.name(), self.kind.name())
    }

    /// Parse a detector label. Unknown labels yield `None`; the board mapper
    /// treats them as an empty cell.
    pub fn from_label(label: &str) -> Option<Piece> {
        let (color, kind) = label.split_once('_')?;
        let color = match color {
            "white" => Color::White,
            "black" => Color::Black,
            _ => return None,
        };
        Some(Piece {
            kind: PieceKind::from_name(kind)?,
            color,
        })
    }

    pub fn is_king_or_queen(self) -> bool {
        matches!(self.kind, PieceKind::King | PieceKind::Queen)
    }

    pub fn is_king_or_rook(self) -> bool {
        matches!(self.kind, PieceKind::King | PieceKind::Rook)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Board square, `rank * 8 + file`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Square> {
        (file < 8 && rank < 8).then(|| Square(rank * 8 + file))
    }

    pub fn from_index(index: u8) -> Option<Square> {
        (index < 64).then_some(Square(index))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn file(self) -> u8 {
        self.0 % 8
    }

    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    pub fn file_char(self) -> char {
        (b'a' + self.file()) as char
    }

    pub fn rank_char(self) -> char {
        (b'1' + self.rank()) as char
    }

    /// Shift by a file/rank delta, `None` when it leaves the board
    pub fn offset(self, files: i8, ranks: i8) -> Option<Square> {
        let file = self.file() as i8 + files;
        let rank = self.rank() as i8 + ranks;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Square::new(file as u8, rank as u8)
        } else {
            None
        }
    }

    /// All squares in scan order: file a→h, and within a file rank 1→8.
    ///
    /// Edit pairing is order-sensitive, so every diff walks squares in
    /// exactly this order.
    pub fn scan_order() -> impl Iterator<Item = Square> {
        (0..8u8).flat_map(|file| (0..8u8).map(move |rank| Square(rank * 8 + file)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

impl FromStr for Square {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(format!("invalid square '{s}'"));
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| format!("invalid square '{s}'"))
    }
}

// ============================================================================
// shakmaty conversions
// ============================================================================

impl From<shakmaty::Color> for Color {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        }
    }
}

impl From<Color> for shakmaty::Color {
    fn from(color: Color) -> Self {
        match color {
            Color::White => shakmaty::Color::White,
            Color::Black => shakmaty::Color::Black,
        }
    }
}

impl From<shakmaty::Role> for PieceKind {
    fn from(role: shakmaty::Role) -> Self {
        match role {
            shakmaty::Role::Pawn => PieceKind::Pawn,
            shakmaty::Role::Knight => PieceKind::Knight,
            shakmaty::Role::Bishop => PieceKind::Bishop,
            shakmaty::Role::Rook => PieceKind::Rook,
            shakmaty::Role::Queen => PieceKind::Queen,
            shakmaty::Role::King => PieceKind::King,
        }
    }
}

impl From<PieceKind> for shakmaty::Role {
    fn from(kind: PieceKind) -> Self {
        match kind {
            PieceKind::Pawn => shakmaty::Role::Pawn,
            PieceKind::Knight => shakmaty::Role::Knight,
            PieceKind::Bishop => shakmaty::Role::Bishop,
            PieceKind::Rook => shakmaty::Role::Rook,
            PieceKind::Queen => shakmaty::Role::Queen,
            PieceKind::King => shakmaty::Role::King,
        }
    }
}

impl From<shakmaty::Piece> for Piece {
    fn from(piece: shakmaty::Piece) -> Self {
        Piece::new(piece.role.into(), piece.color.into())
    }
}

impl From<Piece> for shakmaty::Piece {
    fn from(piece: Piece) -> Self {
        shakmaty::Piece {
            color: piece.color.into(),
            role: piece.kind.into(),
        }
    }
}

// Both sides index a1 = 0 through h8 = 63.
impl From<shakmaty::Square> for Square {
    fn from(square: shakmaty::Square) -> Self {
        Square(square as u8)
    }
}

impl From<Square> for shakmaty::Square {
    fn from(square: Square) -> Self {
        shakmaty::Square::new(u32::from(square.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_round_trip_covers_all_pieces() {
        for symbol in "PNBRQKpnbrqk".chars() {
            let piece = Piece::from_symbol(symbol).expect("valid symbol");
            assert_eq!(piece.symbol(), symbol);
        }
        assert!(Piece::from_symbol('x').is_none());
    }

    #[test]
    fn test_labels_match_detector_names() {
        let piece = Piece::from_label("black_knight").unwrap();
        assert_eq!(piece, Piece::new(PieceKind::Knight, Color::Black));
        assert_eq!(piece.label(), "black_knight");
        assert!(Piece::from_label("green_knight").is_none());
        assert!(Piece::from_label("white_archbishop").is_none());
        assert!(Piece::from_label("hand").is_none());
    }

    #[test]
    fn test_square_names() {
        let e4: Square = "e4".parse().unwrap();
        assert_eq!(e4.file(), 4);
        assert_eq!(e4.rank(), 3);
        assert_eq!(e4.to_string(), "e4");
        assert!("i9".parse::<Square>().is_err());
        assert!("e".parse::<Square>().is_err());
    }

    #[test]
    fn test_scan_order_walks_files_first() {
        let order: Vec<String> = Square::scan_order().take(10).map(|s| s.to_string()).collect();
        assert_eq!(
            order,
            vec!["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "b1", "b2"]
        );
        assert_eq!(Square::scan_order().count(), 64);
    }

    #[test]
    fn test_shakmaty_conversions_agree_on_indexing() {
        let e4: Square = "e4".parse().unwrap();
        assert_eq!(shakmaty::Square::from(e4), shakmaty::Square::E4);
        assert_eq!(Square::from(shakmaty::Square::H8).to_string(), "h8");

        let piece = Piece::from_symbol('n').unwrap();
        let theirs = shakmaty::Piece::from(piece);
        assert_eq!(theirs.char(), 'n');
        assert_eq!(Piece::from(theirs), piece);
    }

    #[test]
    fn test_offset_stays_on_board() {
        let h8: Square = "h8".parse().unwrap();
        assert!(h8.offset(1, 0).is_none());
        assert_eq!(h8.offset(-1, -1).unwrap().to_string(), "g7");
    }
}

//! Rules-engine seam
//!
//! Move generation and game-state detection are delegated to a
//! [`RulesEngine`]. The production engine, [`ShakmatyRules`], reads the
//! `shakmaty` position held by [`Position`] and converts its legal moves into
//! crate types. [`ShakmatyRules::resolve`] maps a crate move back onto the
//! `shakmaty` move it came from, for playing and for SAN.

use crate::error::RulesError;
use crate::position::Position;
use crate::status::GameStatus;
use crate::types::{PieceKind, Square};
use shakmaty::{Chess, Move, Position as _};
use std::fmt;

/// What a legal move does beyond relocating one piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveFlavor {
    Quiet,
    Capture,
    EnPassant,
    /// King leg; `from`/`to` are the king's squares and the rook follows
    Castle,
}

/// A legal move in crate terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LegalMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub flavor: MoveFlavor,
}

impl LegalMove {
    pub fn quiet(from: Square, to: Square) -> Self {
        LegalMove {
            from,
            to,
            promotion: None,
            flavor: MoveFlavor::Quiet,
        }
    }

    pub fn is_castle(&self) -> bool {
        self.flavor == MoveFlavor::Castle
    }

    pub fn is_capture(&self) -> bool {
        matches!(self.flavor, MoveFlavor::Capture | MoveFlavor::EnPassant)
    }

    /// UCI spelling with the king-destination castle convention (`e1g1`)
    pub fn uci(&self) -> String {
        let mut out = format!("{}{}", self.from, self.to);
        if let Some(kind) = self.promotion {
            out.push(kind.letter().to_ascii_lowercase());
        }
        out
    }
}

impl fmt::Display for LegalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uci())
    }
}

/// Legal-move generation and terminal-state detection
pub trait RulesEngine: Send + Sync {
    fn legal_moves(&self, position: &Position) -> Result<Vec<LegalMove>, RulesError>;

    fn status(&self, position: &Position) -> Result<GameStatus, RulesError>;

    fn is_legal(&self, position: &Position, mv: &LegalMove) -> Result<bool, RulesError> {
        Ok(self.legal_moves(position)?.contains(mv))
    }

    /// Find the legal move between two squares in either order.
    ///
    /// When both orders are legal the `(a, b)` order wins. A `promotion`
    /// filter is honoured only for promoting moves.
    fn find_move(
        &self,
        position: &Position,
        a: Square,
        b: Square,
        promotion: Option<PieceKind>,
    ) -> Result<Option<LegalMove>, RulesError> {
        let moves = self.legal_moves(position)?;
        let matches = |from: Square, to: Square| {
            moves.iter().copied().find(|mv| {
                mv.from == from
                    && mv.to == to
                    && (mv.promotion.is_none() || mv.promotion == promotion.or(Some(PieceKind::Queen)))
            })
        };
        Ok(matches(a, b).or_else(|| matches(b, a)))
    }
}

/// [`RulesEngine`] backed by `shakmaty`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        ShakmatyRules
    }

    /// The `shakmaty` move in `chess` that `mv` describes
    pub fn resolve(chess: &Chess, mv: &LegalMove) -> Option<Move> {
        chess
            .legal_moves()
            .into_iter()
            .find(|candidate| Self::convert(candidate).as_ref() == Some(mv))
    }

    fn convert(mv: &Move) -> Option<LegalMove> {
        match *mv {
            Move::Castle { king, rook } => {
                let king = Square::from(king);
                let rook = Square::from(rook);
                let file = if rook.file() > king.file() { 6 } else { 2 };
                Square::new(file, king.rank()).map(|to| LegalMove {
                    from: king,
                    to,
                    promotion: None,
                    flavor: MoveFlavor::Castle,
                })
            }
            // Drops only exist in crazyhouse-style variants
            Move::Put { .. } => None,
            other => other.from().map(|from| LegalMove {
                from: from.into(),
                to: other.to().into(),
                promotion: other.promotion().map(PieceKind::from),
                flavor: if other.is_en_passant() {
                    MoveFlavor::EnPassant
                } else if other.is_capture() {
                    MoveFlavor::Capture
                } else {
                    MoveFlavor::Quiet
                },
            }),
        }
    }
}

impl RulesEngine for ShakmatyRules {
    fn legal_moves(&self, position: &Position) -> Result<Vec<LegalMove>, RulesError> {
        Ok(position
            .chess()
            .legal_moves()
            .iter()
            .filter_map(Self::convert)
            .collect())
    }

    fn status(&self, position: &Position) -> Result<GameStatus, RulesError> {
        let chess = position.chess();
        Ok(GameStatus::new(
            position,
            chess.is_check(),
            chess.is_checkmate(),
            chess.is_stalemate(),
            chess.is_insufficient_material(),
            self.legal_moves(position)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_standard_position_has_twenty_moves() {
        let moves = ShakmatyRules.legal_moves(&Position::standard()).unwrap();
        assert_eq!(moves.len(), 20);
        assert!(moves.iter().all(|m| m.flavor == MoveFlavor::Quiet));
    }

    #[test]
    fn test_find_move_accepts_either_square_order() {
        let pos = Position::standard();
        let forward = ShakmatyRules.find_move(&pos, sq("e2"), sq("e4"), None).unwrap();
        let reversed = ShakmatyRules.find_move(&pos, sq("e4"), sq("e2"), None).unwrap();
        assert_eq!(forward, reversed);
        assert_eq!(forward.unwrap().uci(), "e2e4");
        assert!(ShakmatyRules
            .find_move(&pos, sq("e2"), sq("e5"), None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_castle_reported_with_king_destination() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castles: Vec<String> = ShakmatyRules
            .legal_moves(&pos)
            .unwrap()
            .into_iter()
            .filter(LegalMove::is_castle)
            .map(|m| m.uci())
            .collect();
        assert!(castles.contains(&"e1g1".to_string()));
        assert!(castles.contains(&"e1c1".to_string()));
    }

    #[test]
    fn test_promotion_filter_defaults_to_queen() {
        let pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let queen = ShakmatyRules.find_move(&pos, sq("a7"), sq("a8"), None).unwrap();
        assert_eq!(queen.unwrap().promotion, Some(PieceKind::Queen));
        let knight = ShakmatyRules
            .find_move(&pos, sq("a7"), sq("a8"), Some(PieceKind::Knight))
            .unwrap();
        assert_eq!(knight.unwrap().uci(), "a7a8n");
    }

    #[test]
    fn test_resolve_maps_castle_back_to_king_and_rook() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castle = ShakmatyRules
            .find_move(&pos, sq("e1"), sq("c1"), None)
            .unwrap()
            .unwrap();
        assert_eq!(
            ShakmatyRules::resolve(pos.chess(), &castle),
            Some(Move::Castle {
                king: shakmaty::Square::E1,
                rook: shakmaty::Square::A1,
            })
        );
        assert_eq!(ShakmatyRules::resolve(pos.chess(), &LegalMove::quiet(sq("e1"), sq("e3"))), None);
    }

    #[test]
    fn test_status_exposes_legal_moves() {
        let status = ShakmatyRules.status(&Position::standard()).unwrap();
        assert_eq!(status.legal_moves.len(), 20);
        assert!(status.legal_moves.contains(&LegalMove::quiet(sq("g1"), sq("f3"))));
    }
}

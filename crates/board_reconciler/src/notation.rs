//! Standard algebraic notation and move descriptions
//!
//! [`describe_move`] produces the `move` object of an outbound move
//! notification: kind, squares, piece labels, SAN and whether the move gives
//! check.

use crate::error::RulesError;
use crate::position::Position;
use crate::rules::{LegalMove, MoveFlavor, ShakmatyRules};
use serde::{Deserialize, Serialize};
use shakmaty::san::SanPlus;

/// Kind reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    Move,
    Attack,
    Castle,
}

impl MoveKind {
    pub fn of(mv: &LegalMove) -> MoveKind {
        match mv.flavor {
            MoveFlavor::Castle => MoveKind::Castle,
            MoveFlavor::Capture | MoveFlavor::EnPassant => MoveKind::Attack,
            MoveFlavor::Quiet => MoveKind::Move,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MoveKind::Move => "move",
            MoveKind::Attack => "attack",
            MoveKind::Castle => "castle",
        }
    }
}

/// Structured description of one played move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSummary {
    #[serde(rename = "type")]
    pub kind: MoveKind,
    pub from: String,
    pub to: String,
    pub from_piece: String,
    pub to_piece: Option<String>,
    pub notation: String,
    pub results_in_check: bool,
}

/// SAN for `mv` played from `position`, with any `+`/`#` suffix
pub fn san(position: &Position, mv: &LegalMove) -> Result<String, RulesError> {
    let chess_move = ShakmatyRules::resolve(position.chess(), mv).ok_or_else(|| RulesError::IllegalMove {
        uci: mv.uci(),
        fen: position.to_fen(),
    })?;
    Ok(SanPlus::from_move(position.chess().clone(), chess_move).to_string())
}

/// Describe `mv` played from `position`
pub fn describe_move(position: &Position, mv: &LegalMove) -> Result<MoveSummary, RulesError> {
    let board = position.board();
    let from_piece = board.piece_at(mv.from).ok_or_else(|| RulesError::IllegalMove {
        uci: mv.uci(),
        fen: position.to_fen(),
    })?;
    let to_piece = match mv.flavor {
        MoveFlavor::EnPassant => crate::types::Square::new(mv.to.file(), mv.from.rank())
            .and_then(|victim| board.piece_at(victim)),
        _ => board.piece_at(mv.to),
    };
    let notation = san(position, mv)?;
    let results_in_check = notation.ends_with('+') || notation.ends_with('#');

    Ok(MoveSummary {
        kind: MoveKind::of(mv),
        from: mv.from.to_string(),
        to: mv.to.to_string(),
        from_piece: from_piece.label(),
        to_piece: to_piece.map(|p| p.label()),
        notation,
        results_in_check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesEngine;
    use crate::types::Square;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    fn played(fen: &str, from: &str, to: &str) -> (Position, LegalMove) {
        let pos = Position::from_fen(fen).unwrap();
        let mv = ShakmatyRules
            .find_move(&pos, sq(from), sq(to), None)
            .unwrap()
            .expect("legal move");
        (pos, mv)
    }

    #[test]
    fn test_pawn_push() {
        let (pos, mv) = played(crate::position::STANDARD_FEN, "e2", "e4");
        assert_eq!(san(&pos, &mv).unwrap(), "e4");
    }

    #[test]
    fn test_knight_disambiguation_by_file() {
        let (pos, mv) = played("4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1", "b1", "d2");
        assert_eq!(san(&pos, &mv).unwrap(), "Nbd2");
    }

    #[test]
    fn test_castle_and_mate_suffix() {
        let (pos, mv) = played("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1", "e1", "c1");
        assert_eq!(san(&pos, &mv).unwrap(), "O-O-O");

        let (pos, mv) = played("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1", "a1", "a8");
        assert_eq!(san(&pos, &mv).unwrap(), "Ra8#");
    }

    #[test]
    fn test_describe_capture_with_promotion() {
        let (pos, mv) = played("1r2k3/P7/8/8/8/8/8/4K3 w - - 0 1", "a7", "b8");
        let summary = describe_move(&pos, &mv).unwrap();
        assert_eq!(summary.kind, MoveKind::Attack);
        assert_eq!(summary.from_piece, "white_pawn");
        assert_eq!(summary.to_piece.as_deref(), Some("black_rook"));
        assert_eq!(summary.notation, "axb8=Q+");
        assert!(summary.results_in_check);
    }

    #[test]
    fn test_rank_disambiguation_and_en_passant() {
        let (pos, mv) = played("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1", "a1", "a3");
        assert_eq!(san(&pos, &mv).unwrap(), "R1a3");

        let (pos, mv) = played("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 3", "e5", "d6");
        let summary = describe_move(&pos, &mv).unwrap();
        assert_eq!(summary.notation, "exd6");
        assert_eq!(summary.to_piece.as_deref(), Some("black_pawn"));
    }
}

//! Game status of the authoritative position
//!
//! Recomputed after every committed move and after the robot's own moves.
//!
//! # Terminal Conditions
//!
//! | Outcome                | Winner            | Wire reason             |
//! |------------------------|-------------------|-------------------------|
//! | `Checkmate`            | side that mated   | `checkmate`             |
//! | `Stalemate`            | none              | `stalemate`             |
//! | `InsufficientMaterial` | none              | `game_over`             |
//! | `SeventyFiveMoves`     | none              | `game_over`             |
//!
//! The seventy-five-move rule fires automatically once the halfmove clock
//! reaches 150 plies. Repetition draws need the move history and are not
//! detected.

use crate::position::Position;
use crate::rules::LegalMove;
use crate::types::Color;

/// Plies without capture or pawn move that end the game automatically
pub const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;

/// Snapshot of check and terminal flags for one position, with the moves
/// available to the side to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatus {
    pub turn: Color,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub is_insufficient_material: bool,
    pub is_game_over: bool,
    pub legal_moves: Vec<LegalMove>,
    pub outcome: Option<GameOutcome>,
}

impl GameStatus {
    pub fn new(
        position: &Position,
        is_check: bool,
        is_checkmate: bool,
        is_stalemate: bool,
        is_insufficient_material: bool,
        legal_moves: Vec<LegalMove>,
    ) -> Self {
        let turn = position.turn();
        let outcome = if is_checkmate {
            Some(GameOutcome::Checkmate {
                winner: turn.opposite(),
            })
        } else if is_stalemate {
            Some(GameOutcome::Stalemate)
        } else if is_insufficient_material {
            Some(GameOutcome::InsufficientMaterial)
        } else if position.halfmove_clock() >= SEVENTY_FIVE_MOVE_PLIES {
            Some(GameOutcome::SeventyFiveMoves)
        } else {
            None
        };
        GameStatus {
            turn,
            is_check,
            is_checkmate,
            is_stalemate,
            is_insufficient_material,
            is_game_over: outcome.is_some(),
            legal_moves,
            outcome,
        }
    }

    /// Side currently in check, if any
    pub fn player_in_check(&self) -> Option<Color> {
        (self.is_check && !self.is_checkmate).then_some(self.turn)
    }
}

/// How a finished game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoves,
}

impl GameOutcome {
    pub fn winner(&self) -> Option<Color> {
        match self {
            GameOutcome::Checkmate { winner } => Some(*winner),
            _ => None,
        }
    }

    /// Reason string carried by the `game_over` notice
    pub fn reason(&self) -> &'static str {
        match self {
            GameOutcome::Checkmate { .. } => "checkmate",
            GameOutcome::Stalemate => "stalemate",
            GameOutcome::InsufficientMaterial | GameOutcome::SeventyFiveMoves => "game_over",
        }
    }

    /// Human-readable result line
    pub fn message(&self) -> String {
        match self {
            GameOutcome::Checkmate { winner } => format!("Checkmate! {winner} wins."),
            GameOutcome::Stalemate => "Stalemate. The game is a draw.".to_string(),
            GameOutcome::InsufficientMaterial => {
                "Draw by insufficient material.".to_string()
            }
            GameOutcome::SeventyFiveMoves => "Draw by the seventy-five-move rule.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RulesEngine, ShakmatyRules};

    #[test]
    fn test_checkmate_winner_is_side_not_to_move() {
        let pos = Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
            .unwrap();
        let status = GameStatus::new(&pos, true, true, false, false, Vec::new());
        assert!(status.is_game_over);
        assert_eq!(
            status.outcome,
            Some(GameOutcome::Checkmate {
                winner: Color::Black
            })
        );
        assert_eq!(status.player_in_check(), None);
        assert_eq!(status.outcome.unwrap().reason(), "checkmate");
    }

    #[test]
    fn test_check_without_mate_names_player() {
        let status = GameStatus::new(&Position::standard(), true, false, false, false, Vec::new());
        assert!(!status.is_game_over);
        assert_eq!(status.player_in_check(), Some(Color::White));
    }

    #[test]
    fn test_halfmove_clock_triggers_seventy_five_move_draw() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 150 120").unwrap();
        let status = ShakmatyRules.status(&pos).unwrap();
        assert!(!status.legal_moves.is_empty());
        assert_eq!(status.outcome, Some(GameOutcome::SeventyFiveMoves));
        assert_eq!(status.outcome.unwrap().winner(), None);
    }
}

//! Move-oracle seam
//!
//! The lifecycle asks a [`MoveOracle`] for the robot's move whenever the
//! robot is to move. The production oracle drives Stockfish over UCI
//! ([`crate::StockfishOracle`]); tests plug in scripted oracles.

use crate::difficulty::DifficultyProfile;
use crate::error::OracleResult;
use async_trait::async_trait;
use board_reconciler::{describe_move, LegalMove, MoveSummary, Position};

/// The oracle's chosen move and its outbound description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleMove {
    pub mv: LegalMove,
    pub summary: MoveSummary,
}

impl OracleMove {
    /// Pair a legal move with its description in `position`
    pub fn describe(position: &Position, mv: LegalMove) -> OracleResult<OracleMove> {
        let summary = describe_move(position, &mv)?;
        Ok(OracleMove { mv, summary })
    }
}

/// Source of best moves
#[async_trait]
pub trait MoveOracle: Send {
    /// Best move for the side to move in `position`.
    ///
    /// Bounded by the profile's time budget; any error ends the session.
    async fn best_move(
        &mut self,
        position: &Position,
        profile: &DifficultyProfile,
    ) -> OracleResult<OracleMove>;
}

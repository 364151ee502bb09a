//! Stockfish-backed [`MoveOracle`]
//!
//! The engine process is started lazily on the first request and reused for
//! the rest of the process. Each request:
//!
//! 1. sets `Skill Level` from the [`DifficultyProfile`]
//! 2. runs `go movetime <budget> depth <cap>`
//! 3. waits at most budget + grace for `bestmove`
//! 4. maps the UCI answer onto a legal move of the position
//!
//! A timed-out or broken engine is dropped (killing the process) so the next
//! request starts a fresh one.

use crate::difficulty::DifficultyProfile;
use crate::error::{OracleError, OracleResult};
use crate::oracle::{MoveOracle, OracleMove};
use crate::uci::UciEngine;
use async_trait::async_trait;
use board_reconciler::{LegalMove, Position, RulesEngine, ShakmatyRules, Square};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// Extra time allowed beyond the search budget before giving up
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

pub struct StockfishOracle {
    path: PathBuf,
    grace: Duration,
    engine: Option<UciEngine>,
    rules: ShakmatyRules,
}

impl StockfishOracle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StockfishOracle {
            path: path.into(),
            grace: DEFAULT_GRACE,
            engine: None,
            rules: ShakmatyRules,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    async fn engine(&mut self) -> OracleResult<&mut UciEngine> {
        if self.engine.is_none() {
            info!("[ORACLE] Starting engine at {}", self.path.display());
            let mut engine = UciEngine::spawn(&self.path)?;
            engine.handshake().await?;
            self.engine = Some(engine);
        }
        self.engine.as_mut().ok_or(OracleError::Closed)
    }

    async fn search(
        &mut self,
        position: &Position,
        profile: &DifficultyProfile,
    ) -> OracleResult<Option<String>> {
        let fen = position.to_fen();
        let limits = profile.limits();
        let engine = self.engine().await?;
        engine
            .set_option("Skill Level", &profile.skill_level.to_string())
            .await?;
        let outcome = engine.search(&fen, limits).await?;
        debug!(
            "[ORACLE] {} pv: {}",
            profile.name,
            outcome.pv.join(" ")
        );
        Ok(outcome.best_move)
    }

    /// Shut the engine down if it is running
    pub async fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if let Err(e) = engine.quit().await {
                warn!("[ORACLE] Engine did not take quit: {e}");
            }
        }
    }
}

#[async_trait]
impl MoveOracle for StockfishOracle {
    async fn best_move(
        &mut self,
        position: &Position,
        profile: &DifficultyProfile,
    ) -> OracleResult<OracleMove> {
        let budget = profile.search_time() + self.grace;
        let answer = match tokio::time::timeout(budget, self.search(position, profile)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                self.engine = None;
                return Err(e);
            }
            Err(_) => {
                warn!("[ORACLE] No bestmove after {budget:?}, dropping engine");
                self.engine = None;
                return Err(OracleError::Timeout(budget));
            }
        };

        let uci = answer.ok_or_else(|| OracleError::NoMove {
            fen: position.to_fen(),
        })?;
        let mv = resolve_uci(position, &uci, &self.rules)?;
        info!("[ORACLE] {} plays {}", profile.name, mv);
        OracleMove::describe(position, mv)
    }
}

/// Map a UCI move string onto a legal move of `position`.
///
/// Castles are accepted both as king destination (`e1g1`) and as king takes
/// rook (`e1h1`).
pub fn resolve_uci(
    position: &Position,
    uci: &str,
    rules: &dyn RulesEngine,
) -> OracleResult<LegalMove> {
    let illegal = || OracleError::IllegalMove {
        uci: uci.to_string(),
        fen: position.to_fen(),
    };
    let from: Square = uci.get(0..2).and_then(|s| s.parse().ok()).ok_or_else(illegal)?;
    let to: Square = uci.get(2..4).and_then(|s| s.parse().ok()).ok_or_else(illegal)?;
    let promotion = uci.get(4..5);

    let moves = rules.legal_moves(position)?;
    moves
        .into_iter()
        .find(|mv| {
            if mv.from != from {
                return false;
            }
            if mv.is_castle() {
                let rook_file = if mv.to.file() > mv.from.file() { 7 } else { 0 };
                return mv.to == to || Square::new(rook_file, from.rank()) == Some(to);
            }
            let promo = mv.promotion.map(|k| k.letter().to_ascii_lowercase().to_string());
            mv.to == to && promo.as_deref() == promotion
        })
        .ok_or_else(illegal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_reconciler::{MoveFlavor, PieceKind};

    #[test]
    fn test_resolve_plain_and_promotion_moves() {
        let pos = Position::standard();
        let mv = resolve_uci(&pos, "g1f3", &ShakmatyRules).unwrap();
        assert_eq!(mv.uci(), "g1f3");

        let pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mv = resolve_uci(&pos, "a7a8r", &ShakmatyRules).unwrap();
        assert_eq!(mv.promotion, Some(PieceKind::Rook));
        assert!(resolve_uci(&pos, "a7a8", &ShakmatyRules).is_err());
    }

    #[test]
    fn test_resolve_castle_in_both_spellings() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
        for uci in ["e8g8", "e8h8"] {
            let mv = resolve_uci(&pos, uci, &ShakmatyRules).unwrap();
            assert_eq!(mv.flavor, MoveFlavor::Castle);
            assert_eq!(mv.to.to_string(), "g8");
        }
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        let pos = Position::standard();
        assert!(matches!(
            resolve_uci(&pos, "e2e5", &ShakmatyRules),
            Err(OracleError::IllegalMove { .. })
        ));
        assert!(resolve_uci(&pos, "zz", &ShakmatyRules).is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let mut oracle = StockfishOracle::new("/nonexistent/stockfish-binary");
        let result = oracle
            .best_move(&Position::standard(), &DifficultyProfile::default())
            .await;
        assert!(matches!(result, Err(OracleError::Spawn { .. })));
    }
}

//! Error types for the move oracle

use board_reconciler::RulesError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while asking the engine for a move.
///
/// Every variant is fatal to the current game session.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The engine binary could not be started
    #[error("failed to start engine '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the engine failed
    #[error("engine I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The engine closed its output stream
    #[error("engine closed its output")]
    Closed,

    /// No answer within the search budget plus grace
    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),

    /// `bestmove (none)` in a position that should have moves
    #[error("engine returned no move for '{fen}'")]
    NoMove { fen: String },

    /// The engine answered with a move the rules engine does not accept
    #[error("engine move '{uci}' is not legal in '{fen}'")]
    IllegalMove { uci: String, fen: String },

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Result type alias for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

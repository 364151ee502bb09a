//! Error types for board reconciliation
//!
//! Frame-level rejections (hand over the board, ambiguous edits, illegal moves)
//! are *not* errors: they are ordinary [`crate::Outcome`] values. The types here
//! cover malformed positions and rules-engine failures.

use thiserror::Error;

/// Errors raised while parsing a FEN record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// Text is not a FEN record
    #[error("invalid FEN '{fen}': {reason}")]
    Syntax { fen: String, reason: String },

    /// Well-formed record describing an impossible position
    #[error("FEN '{fen}' is not a legal position: {reason}")]
    Illegal { fen: String, reason: String },
}

/// Errors raised by the rules engine seam
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// A move was applied that is not legal in the position
    #[error("move {uci} is not legal in '{fen}'")]
    IllegalMove { uci: String, fen: String },
}

/// Errors that abort a reconciliation attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Result type alias for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

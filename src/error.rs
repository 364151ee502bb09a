//! Error types for the service layer
//!
//! Frame-level problems (noise, illegal moves) are not errors; they are
//! reconciliation outcomes. What ends up here either aborts a session or
//! stops the process.

use board_reconciler::ReconcileError;
use std::path::PathBuf;
use thiserror::Error;

/// Control-channel I/O failures. Fatal to the process.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("control channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("control channel closed")]
    Closed,
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Errors from the frame source
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("frame stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("undecodable frame: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },

    /// Grid of the wrong shape or with an unknown label
    #[error("malformed grid: {0}")]
    Grid(String),

    #[error("frame stream ended")]
    Closed,
}

pub type VisionResult<T> = Result<T, VisionError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Errors that stop the lifecycle controller
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

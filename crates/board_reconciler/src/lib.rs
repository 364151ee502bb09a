//! Board-state reconciliation
//!
//! Turns noisy per-frame board observations into an authoritative, legal game
//! state. The camera-facing side hands over an 8×8 grid of detector labels;
//! this crate decides whether it shows exactly one legal move from the
//! authoritative position and, if so, commits it.
//!
//! # Modules
//!
//! | Module         | Responsibility                                        |
//! |----------------|-------------------------------------------------------|
//! | [`types`]      | Colors, pieces, squares and their text encodings      |
//! | [`position`]   | Board, grid orientation, FEN and move application     |
//! | [`diff`]       | Changed squares between two boards                    |
//! | [`classifier`] | Pairing changes into moves, captures and misreads     |
//! | [`rules`]      | Rules-engine seam and the `shakmaty` implementation   |
//! | [`status`]     | Check and terminal-state snapshot                     |
//! | [`notation`]   | SAN and outbound move descriptions                    |
//! | [`reconciler`] | The observe/commit pipeline                           |

pub mod classifier;
pub mod diff;
pub mod error;
pub mod notation;
pub mod position;
pub mod reconciler;
pub mod rules;
pub mod status;
pub mod types;

pub use classifier::{classify, ChangeSet, EditRelation, PairedEdit, Repair, Singleton, SingletonKind};
pub use diff::{diff, SquareChange};
pub use error::{FenError, ReconcileError, ReconcileResult, RulesError};
pub use notation::{describe_move, san, MoveKind, MoveSummary};
pub use position::{Board, Grid, Orientation, Position, STANDARD_FEN};
pub use reconciler::{Commit, Edit, IllegalMoveReport, Outcome, Reconciler, RejectReason};
pub use rules::{LegalMove, MoveFlavor, RulesEngine, ShakmatyRules};
pub use status::{GameOutcome, GameStatus};
pub use types::{Color, Piece, PieceKind, Square};

//! Move oracle backed by a UCI engine
//!
//! Supplies the robot's moves: given a position and a [`DifficultyProfile`],
//! returns the engine's choice together with the description sent to the
//! controller.
//!
//! ```rust,ignore
//! let mut oracle = StockfishOracle::new("/usr/games/stockfish");
//! let reply = oracle.best_move(&position, &Difficulty::Hard.profile()).await?;
//! println!("{} ({})", reply.summary.notation, reply.mv);
//! ```

pub mod difficulty;
pub mod error;
pub mod oracle;
pub mod stockfish;
pub mod uci;

pub use difficulty::{Difficulty, DifficultyProfile, SearchLimits};
pub use error::{OracleError, OracleResult};
pub use oracle::{MoveOracle, OracleMove};
pub use stockfish::{resolve_uci, StockfishOracle, DEFAULT_GRACE};
pub use uci::{parse_bestmove, parse_info_pv, SearchOutcome, UciEngine};

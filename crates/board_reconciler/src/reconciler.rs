//! Reconciler: the single owner of the authoritative position
//!
//! Each observed board is turned into at most one committed move. Frames that
//! cannot be explained by exactly one legal move are rejected and the next
//! frame is tried; the authoritative position is only ever replaced by
//! `position.apply(legal_move)`, never by the raw observation.
//!
//! # Pipeline
//!
//! 1. Hand over the board → `Rejected(HandPresent)`.
//! 2. Candidate repair: king/queen multiplicity pre-pass, then same-colour
//!    misreads are reset to the authoritative piece.
//! 3. Diff + classify. Pair repairs (royal flips) are applied to build the
//!    *evidence* board; singleton repairs are applied on top of that to get the
//!    *repaired* board.
//! 4. Diff + classify the repaired board. Exactly one paired edit, or a castle
//!    signature, must survive.
//! 5. The edit must match a legal move (either square order).
//! 6. Every square the legal move changes must read, on the evidence board,
//!    as the resulting position says.
//! 7. Commit.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut reconciler = Reconciler::new(Arc::new(ShakmatyRules));
//! match reconciler.observe(&Board::from_grid(&grid, orientation), hand_present)? {
//!     Outcome::Accepted(commit) => publish(commit.summary),
//!     Outcome::IllegalMove(report) => warn_player(report),
//!     Outcome::Rejected(_) => {} // try the next frame
//! }
//! ```

use crate::classifier::{classify, ChangeSet, PairedEdit, Singleton, SingletonKind};
use crate::diff::diff;
use crate::error::{ReconcileResult, RulesError};
use crate::notation::{describe_move, MoveKind, MoveSummary};
use crate::position::{Board, Position};
use crate::rules::{LegalMove, MoveFlavor, RulesEngine};
use crate::status::GameStatus;
use crate::types::{Color, Piece, PieceKind, Square};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a frame was dropped without a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A hand is over the board
    HandPresent,
    /// Observation matches the authoritative position
    NoChange,
    /// Only unpaired misreads, all repaired away
    SensorNoise,
    /// More than one edit survived
    Ambiguous,
    /// The move is recognized but not every affected square shows it yet
    Incomplete,
}

/// Semantic description of a committed change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Move {
        from: Square,
        to: Square,
        piece: Piece,
    },
    Capture {
        from: Square,
        to: Square,
        attacker: Piece,
        captured: Piece,
    },
    Castle {
        king_from: Square,
        king_to: Square,
        rook_from: Square,
        rook_to: Square,
    },
    SensorError {
        square: Square,
        reason: SingletonKind,
    },
}

impl Edit {
    fn from_move(position: &Position, mv: &LegalMove) -> Result<Edit, RulesError> {
        let board = position.board();
        let illegal = || RulesError::IllegalMove {
            uci: mv.uci(),
            fen: position.to_fen(),
        };
        let piece = board.piece_at(mv.from).ok_or_else(illegal)?;
        Ok(match mv.flavor {
            MoveFlavor::Castle => {
                let rank = mv.from.rank();
                let (rook_from, rook_to) = if mv.to.file() > mv.from.file() {
                    (Square::new(7, rank), Square::new(5, rank))
                } else {
                    (Square::new(0, rank), Square::new(3, rank))
                };
                Edit::Castle {
                    king_from: mv.from,
                    king_to: mv.to,
                    rook_from: rook_from.ok_or_else(illegal)?,
                    rook_to: rook_to.ok_or_else(illegal)?,
                }
            }
            MoveFlavor::Capture | MoveFlavor::EnPassant => {
                let victim_square = if mv.flavor == MoveFlavor::EnPassant {
                    Square::new(mv.to.file(), mv.from.rank()).ok_or_else(illegal)?
                } else {
                    mv.to
                };
                Edit::Capture {
                    from: mv.from,
                    to: mv.to,
                    attacker: piece,
                    captured: board.piece_at(victim_square).ok_or_else(illegal)?,
                }
            }
            MoveFlavor::Quiet => Edit::Move {
                from: mv.from,
                to: mv.to,
                piece,
            },
        })
    }
}

impl From<Singleton> for Edit {
    fn from(singleton: Singleton) -> Self {
        Edit::SensorError {
            square: singleton.change.square,
            reason: singleton.kind,
        }
    }
}

/// A move that was observed but is not legal in the authoritative position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalMoveReport {
    /// Side to move in the authoritative position
    pub player: Color,
    pub from: Square,
    pub to: Square,
    pub piece: Option<Piece>,
    pub captured: Option<Piece>,
    pub move_type: MoveKind,
    /// Authoritative FEN, unchanged
    pub fen: String,
}

impl IllegalMoveReport {
    fn from_edit(position: &Position, edit: &PairedEdit) -> Self {
        IllegalMoveReport {
            player: position.turn(),
            from: edit.departure.square,
            to: edit.arrival.square,
            piece: edit.mover(),
            captured: edit.arrival.before,
            move_type: if edit.relation.is_capture() {
                MoveKind::Attack
            } else {
                MoveKind::Move
            },
            fen: position.to_fen(),
        }
    }

    pub fn message(&self) -> String {
        let piece = self.piece.map_or_else(|| "piece".to_string(), |p| p.label());
        format!("Illegal move: {} {} from {} to {}", self.player, piece, self.from, self.to)
    }
}

impl fmt::Display for IllegalMoveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// A committed move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub edit: Edit,
    pub played: LegalMove,
    pub summary: MoveSummary,
    /// New authoritative position
    pub position: Position,
    pub status: GameStatus,
}

/// Result of one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Box<Commit>),
    Rejected(RejectReason),
    IllegalMove(IllegalMoveReport),
}

pub struct Reconciler {
    position: Position,
    rules: Arc<dyn RulesEngine>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("position", &self.position.to_fen())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler at the standard initial position
    pub fn new(rules: Arc<dyn RulesEngine>) -> Self {
        Self::with_position(Position::standard(), rules)
    }

    pub fn with_position(position: Position, rules: Arc<dyn RulesEngine>) -> Self {
        Reconciler { position, rules }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn rules(&self) -> &dyn RulesEngine {
        self.rules.as_ref()
    }

    /// Replace the authoritative position (session start, puzzle load, reset)
    pub fn reset(&mut self, position: Position) {
        debug!("[RECONCILER] Reset to {}", position);
        self.position = position;
    }

    pub fn status(&self) -> Result<GameStatus, RulesError> {
        self.rules.status(&self.position)
    }

    /// Candidate repair applied before diffing: king/queen multiplicity
    /// pre-pass, then same-colour misreads.
    pub fn repair_candidate(&self, observed: &Board) -> Board {
        let authoritative = self.position.board();
        let mut candidate = observed.clone();

        let count = |kind, color| candidate.count(Piece::new(kind, color));
        let kings = [count(PieceKind::King, Color::White), count(PieceKind::King, Color::Black)];
        let queens = [count(PieceKind::Queen, Color::White), count(PieceKind::Queen, Color::Black)];
        let royal_mixup = (kings.iter().any(|n| *n > 1) && queens.iter().any(|n| *n == 0))
            || (kings.iter().any(|n| *n == 0) && queens.iter().any(|n| *n > 1));

        for change in diff(authoritative, observed) {
            let (Some(before), Some(after)) = (change.before, change.after) else {
                continue;
            };
            let flipped_royal = royal_mixup && before.is_king_or_queen() && after.is_king_or_queen();
            if flipped_royal || before.color == after.color {
                candidate.set_piece_at(change.square, Some(before));
            }
        }
        candidate
    }

    /// Reconcile one observed board against the authoritative position.
    ///
    /// Errors only when the rules engine offers a move the position cannot
    /// play; every frame-level problem is an [`Outcome`].
    pub fn observe(&mut self, observed: &Board, hand_present: bool) -> ReconcileResult<Outcome> {
        if hand_present {
            debug!("[RECONCILER] Hand over the board, frame skipped");
            return Ok(Outcome::Rejected(RejectReason::HandPresent));
        }

        let authoritative = self.position.board();
        let candidate = self.repair_candidate(observed);
        let first = classify(&diff(authoritative, &candidate));
        if first.is_empty() {
            return Ok(Outcome::Rejected(RejectReason::NoChange));
        }

        let mut evidence = candidate;
        for edit in first.paired() {
            if let Some(repair) = edit.relation.repair() {
                repair.apply(&mut evidence);
            }
        }
        let mut repaired = evidence.clone();
        for singleton in &first.unmatched {
            debug!("[RECONCILER] {:?} ({})", Edit::from(*singleton), singleton.change);
            singleton.repair().apply(&mut repaired);
        }

        let changes = classify(&diff(authoritative, &repaired));
        let mv = match self.select_move(&changes)? {
            Selection::Move(mv) => mv,
            Selection::Rejected(reason) => {
                debug!("[RECONCILER] Frame rejected: {:?}", reason);
                return Ok(Outcome::Rejected(reason));
            }
            Selection::Illegal(report) => {
                info!("[RECONCILER] {}", report);
                return Ok(Outcome::IllegalMove(report));
            }
        };

        let next = self.position.apply(&mv)?;
        let incomplete = diff(authoritative, next.board())
            .iter()
            .any(|c| evidence.piece_at(c.square) != c.after);
        if incomplete {
            debug!("[RECONCILER] {} seen but board does not match yet", mv);
            return Ok(Outcome::Rejected(RejectReason::Incomplete));
        }

        Ok(Outcome::Accepted(Box::new(self.commit(mv, next)?)))
    }

    /// Commit a move chosen elsewhere (the robot's own move)
    pub fn play(&mut self, mv: &LegalMove) -> ReconcileResult<Commit> {
        if !self.rules.is_legal(&self.position, mv)? {
            return Err(RulesError::IllegalMove {
                uci: mv.uci(),
                fen: self.position.to_fen(),
            }
            .into());
        }
        let next = self.position.apply(mv)?;
        self.commit(*mv, next)
    }

    fn commit(&mut self, mv: LegalMove, next: Position) -> ReconcileResult<Commit> {
        let summary = describe_move(&self.position, &mv)?;
        let edit = Edit::from_move(&self.position, &mv)?;
        let status = self.rules.status(&next)?;
        info!(
            "[RECONCILER] Committed {} ({}) -> {}",
            summary.notation, mv, next
        );
        self.position = next.clone();
        Ok(Commit {
            edit,
            played: mv,
            summary,
            position: next,
            status,
        })
    }

    fn select_move(&self, changes: &ChangeSet) -> Result<Selection, RulesError> {
        if changes.moves.is_empty() && changes.captures.is_empty() {
            return Ok(Selection::Rejected(RejectReason::SensorNoise));
        }

        if changes.is_castle_signature() {
            let touched: BTreeSet<Square> = changes
                .moves
                .iter()
                .flat_map(|e| [e.departure.square, e.arrival.square])
                .collect();
            let castle = self
                .rules
                .legal_moves(&self.position)?
                .into_iter()
                .find(|mv| mv.is_castle() && touched.contains(&mv.from) && touched.contains(&mv.to));
            return Ok(match castle {
                Some(mv) => Selection::Move(mv),
                None => Selection::Illegal(IllegalMoveReport::from_edit(&self.position, &changes.moves[0])),
            });
        }

        if changes.moves.len() + changes.captures.len() > 1 || changes.unmatched.len() > 1 {
            return Ok(Selection::Rejected(RejectReason::Ambiguous));
        }

        let Some(edit) = changes.paired().next() else {
            return Ok(Selection::Rejected(RejectReason::SensorNoise));
        };
        let promotion = match (edit.mover(), edit.landed()) {
            (Some(mover), Some(landed))
                if mover.kind == PieceKind::Pawn && landed.kind != PieceKind::Pawn =>
            {
                Some(landed.kind)
            }
            _ => None,
        };
        let found = self.rules.find_move(
            &self.position,
            edit.departure.square,
            edit.arrival.square,
            promotion,
        )?;
        Ok(match found {
            Some(mv) => Selection::Move(mv),
            None => Selection::Illegal(IllegalMoveReport::from_edit(&self.position, edit)),
        })
    }
}

enum Selection {
    Move(LegalMove),
    Rejected(RejectReason),
    Illegal(IllegalMoveReport),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ShakmatyRules;

    fn reconciler(fen: &str) -> Reconciler {
        Reconciler::with_position(Position::from_fen(fen).unwrap(), Arc::new(ShakmatyRules))
    }

    fn board(placement: &str) -> Board {
        Board::from_placement(placement).unwrap()
    }

    #[test]
    fn test_hand_present_skips_frame() {
        let mut r = reconciler(crate::position::STANDARD_FEN);
        let observed = board("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR");
        assert_eq!(
            r.observe(&observed, true).unwrap(),
            Outcome::Rejected(RejectReason::HandPresent)
        );
        assert_eq!(r.position(), &Position::standard());
    }

    #[test]
    fn test_unchanged_board_is_no_change() {
        let mut r = reconciler(crate::position::STANDARD_FEN);
        let observed = Board::standard();
        assert_eq!(
            r.observe(&observed, false).unwrap(),
            Outcome::Rejected(RejectReason::NoChange)
        );
    }

    #[test]
    fn test_same_colour_misread_is_repaired() {
        let r = reconciler(crate::position::STANDARD_FEN);
        let observed = board("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RBBQKBNR");
        assert_eq!(r.repair_candidate(&observed), Board::standard());
    }

    #[test]
    fn test_two_separate_moves_are_ambiguous() {
        let mut r = reconciler(crate::position::STANDARD_FEN);
        let observed = board("rnbqkbnr/pppppppp/8/8/3PP3/8/PPP2PPP/RNBQKBNR");
        assert_eq!(
            r.observe(&observed, false).unwrap(),
            Outcome::Rejected(RejectReason::Ambiguous)
        );
    }

    #[test]
    fn test_en_passant_waits_for_victim_removal() {
        let mut r = reconciler("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 3");
        let pawn_moved_only = board("4k3/8/3P4/3p4/8/8/8/4K3");
        assert_eq!(
            r.observe(&pawn_moved_only, false).unwrap(),
            Outcome::Rejected(RejectReason::Incomplete)
        );

        let complete = board("4k3/8/3P4/8/8/8/8/4K3");
        let Outcome::Accepted(commit) = r.observe(&complete, false).unwrap() else {
            panic!("en passant should commit");
        };
        assert_eq!(commit.played.flavor, MoveFlavor::EnPassant);
        assert!(matches!(commit.edit, Edit::Capture { .. }));
        assert_eq!(commit.summary.notation, "exd6");
    }

    #[test]
    fn test_robot_move_is_committed_with_play() {
        let mut r = reconciler(crate::position::STANDARD_FEN);
        let mv = r
            .rules()
            .find_move(r.position(), "g1".parse().unwrap(), "f3".parse().unwrap(), None)
            .unwrap()
            .unwrap();
        let commit = r.play(&mv).unwrap();
        assert_eq!(commit.summary.notation, "Nf3");
        assert_eq!(r.position().turn(), Color::Black);
        assert!(r.play(&mv).is_err());
    }
}

//! Edit classification
//!
//! Pairs the square changes of one observation into semantic edits. Every
//! change lands in exactly one bucket of the resulting [`ChangeSet`]:
//!
//! | Bucket      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | `moves`     | departure + arrival on an empty square                    |
//! | `captures`  | departure + arrival on a square held by the other side    |
//! | `unmatched` | leftovers: `Missing` (now empty) or `RecogError` (misread) |
//!
//! Pairing is greedy: for each change in diff order, the first later change
//! that relates to it wins. A single human move changes at most four squares
//! (castling), which keeps the quadratic scan and first-match tie-breaking
//! acceptable.
//!
//! # King/Queen Flips
//!
//! The detector confuses kings and queens of the same colour more than any
//! other pair. When a departure and arrival line up except that the arrival
//! reads as the other royal piece, the pair is still formed and carries a
//! [`Repair`] putting the departing piece on the arrival square.

use crate::diff::SquareChange;
use crate::position::Board;
use crate::types::{Piece, PieceKind, Square};

/// Overwrite `square` with `piece` in the observed board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repair {
    pub square: Square,
    pub piece: Option<Piece>,
}

impl Repair {
    pub fn apply(&self, board: &mut Board) {
        board.set_piece_at(self.square, self.piece);
    }
}

/// How two square changes relate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRelation {
    NoRelation,
    Move,
    Attack,
    MoveRecogError { repair: Repair },
    AttackRecogError { repair: Repair },
}

impl EditRelation {
    pub fn is_capture(&self) -> bool {
        matches!(self, EditRelation::Attack | EditRelation::AttackRecogError { .. })
    }

    pub fn repair(&self) -> Option<Repair> {
        match self {
            EditRelation::MoveRecogError { repair } | EditRelation::AttackRecogError { repair } => {
                Some(*repair)
            }
            _ => None,
        }
    }
}

/// Two changes paired into one edit, normalized to departure/arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedEdit {
    pub departure: SquareChange,
    pub arrival: SquareChange,
    pub relation: EditRelation,
}

impl PairedEdit {
    /// Piece that left the departure square
    pub fn mover(&self) -> Option<Piece> {
        self.departure.before
    }

    /// Piece standing on the arrival square after any repair
    pub fn landed(&self) -> Option<Piece> {
        match self.relation.repair() {
            Some(repair) => repair.piece,
            None => self.arrival.after,
        }
    }

    pub fn involves_king_or_rook(&self) -> bool {
        [self.departure.before, self.arrival.after]
            .iter()
            .flatten()
            .any(|p| p.is_king_or_rook())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingletonKind {
    /// Piece vanished; assume occlusion
    Missing,
    /// Square reads differently from the authoritative occupant
    RecogError,
}

/// A change nothing paired with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Singleton {
    pub change: SquareChange,
    pub kind: SingletonKind,
}

impl Singleton {
    /// Reassert the authoritative occupant
    pub fn repair(&self) -> Repair {
        Repair {
            square: self.change.square,
            piece: self.change.before,
        }
    }
}

/// Classified changes of one observation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub unmatched: Vec<Singleton>,
    pub moves: Vec<PairedEdit>,
    pub captures: Vec<PairedEdit>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.unmatched.is_empty() && self.moves.is_empty() && self.captures.is_empty()
    }

    pub fn paired(&self) -> impl Iterator<Item = &PairedEdit> {
        self.moves.iter().chain(self.captures.iter())
    }

    /// Castling shape: two king/rook moves and nothing else
    pub fn is_castle_signature(&self) -> bool {
        self.moves.len() == 2
            && self.captures.is_empty()
            && self.unmatched.is_empty()
            && self.moves.iter().all(PairedEdit::involves_king_or_rook)
    }
}

/// True when `mover` leaving `from` can show up as `landed` on `to`,
/// promotion included
fn arrives_as(mover: Piece, landed: Piece, to: Square) -> bool {
    if mover == landed {
        return true;
    }
    mover.kind == PieceKind::Pawn
        && landed.color == mover.color
        && !matches!(landed.kind, PieceKind::Pawn | PieceKind::King)
        && to.rank() == mover.color.promotion_rank()
}

/// Same-colour king/queen confusion
fn royal_flip(mover: Piece, landed: Piece) -> bool {
    mover.is_king_or_queen()
        && landed.is_king_or_queen()
        && mover.color == landed.color
        && mover.kind != landed.kind
}

/// Relation of `departure` → `arrival` in that order only
fn directed(departure: &SquareChange, arrival: &SquareChange) -> EditRelation {
    let (Some(mover), None) = (departure.before, departure.after) else {
        return EditRelation::NoRelation;
    };
    let Some(landed) = arrival.after else {
        return EditRelation::NoRelation;
    };
    let capture = match arrival.before {
        None => false,
        Some(victim) if victim.color != mover.color => true,
        Some(_) => return EditRelation::NoRelation,
    };
    let repair = Repair {
        square: arrival.square,
        piece: Some(mover),
    };
    match (arrives_as(mover, landed, arrival.square), capture) {
        (true, false) => EditRelation::Move,
        (true, true) => EditRelation::Attack,
        (false, false) if royal_flip(mover, landed) => EditRelation::MoveRecogError { repair },
        (false, true) if royal_flip(mover, landed) => EditRelation::AttackRecogError { repair },
        _ => EditRelation::NoRelation,
    }
}

/// Relate two changes in either order; `(a, b)` is tried first
pub fn relate(a: &SquareChange, b: &SquareChange) -> Option<PairedEdit> {
    [(a, b), (b, a)].into_iter().find_map(|(departure, arrival)| {
        match directed(departure, arrival) {
            EditRelation::NoRelation => None,
            relation => Some(PairedEdit {
                departure: *departure,
                arrival: *arrival,
                relation,
            }),
        }
    })
}

/// Greedily pair `changes` (in diff order) into a [`ChangeSet`]
pub fn classify(changes: &[SquareChange]) -> ChangeSet {
    let mut used = vec![false; changes.len()];
    let mut set = ChangeSet::default();

    for i in 0..changes.len() {
        if used[i] {
            continue;
        }
        let paired = (i + 1..changes.len())
            .filter(|j| !used[*j])
            .find_map(|j| relate(&changes[i], &changes[j]).map(|edit| (j, edit)));

        match paired {
            Some((j, edit)) => {
                used[i] = true;
                used[j] = true;
                if edit.relation.is_capture() {
                    set.captures.push(edit);
                } else {
                    set.moves.push(edit);
                }
            }
            None => {
                used[i] = true;
                let kind = if changes[i].after.is_none() {
                    SingletonKind::Missing
                } else {
                    SingletonKind::RecogError
                };
                set.unmatched.push(Singleton {
                    change: changes[i],
                    kind,
                });
            }
        }
    }
    set
}

//! Square-level difference between two boards

use crate::position::Board;
use crate::types::{Piece, Square};
use std::fmt;

/// One square whose occupant differs between two boards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareChange {
    pub square: Square,
    pub before: Option<Piece>,
    pub after: Option<Piece>,
}

impl fmt::Display for SquareChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |p: Option<Piece>| p.map_or('.', Piece::symbol);
        write!(f, "{}:{}>{}", self.square, show(self.before), show(self.after))
    }
}

/// Changed squares from `old` to `new`, in [`Square::scan_order`].
///
/// Pairing in the classifier is first-match-wins, so this order is part of
/// the contract.
pub fn diff(old: &Board, new: &Board) -> Vec<SquareChange> {
    Square::scan_order()
        .filter_map(|square| {
            let before = old.piece_at(square);
            let after = new.piece_at(square);
            (before != after).then_some(SquareChange {
                square,
                before,
                after,
            })
        })
        .collect()
}

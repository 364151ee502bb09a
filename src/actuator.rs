//! Move commands for the manipulator
//!
//! The robot's own moves are handed to an [`Actuator`] as a [`MoveCommand`]:
//! which piece to lift where, what to clear off the board first and, for
//! castles, the rook's leg. Waypoints and arm kinematics are the actuator's
//! business.
//!
//! Captured pieces go to a per-colour graveyard lane. [`GraveyardSlots`]
//! belongs to the session and is reset when a new game starts.

use board_reconciler::{Color, LegalMove, MoveFlavor, Piece, PieceKind, Position, Square};
use tracing::info;

/// Slots per graveyard lane; later captures wrap around
pub const GRAVEYARD_LANE: u8 = 8;

/// Next free graveyard slot per colour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraveyardSlots {
    white: u8,
    black: u8,
}

impl GraveyardSlots {
    /// Claim the next slot in `color`'s lane
    pub fn next_slot(&mut self, color: Color) -> u8 {
        let counter = match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        let slot = *counter % GRAVEYARD_LANE;
        *counter = counter.wrapping_add(1);
        slot
    }

    pub fn reset(&mut self) {
        *self = GraveyardSlots::default();
    }
}

/// Piece taken off the board, and where it goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLeg {
    /// Square the captured piece stands on (differs from `to` for en passant)
    pub square: Square,
    pub piece: Piece,
    pub slot: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCommand {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    /// Executed before the main leg
    pub capture: Option<CaptureLeg>,
    /// Rook leg of a castle, executed after the king
    pub rook: Option<(Square, Square)>,
    pub promotion: Option<PieceKind>,
}

impl MoveCommand {
    /// Plan `mv` in `position`, claiming a graveyard slot for any capture.
    ///
    /// `None` if `from` is empty, which a legal move never has.
    pub fn plan(position: &Position, mv: &LegalMove, slots: &mut GraveyardSlots) -> Option<MoveCommand> {
        let board = position.board();
        let piece = board.piece_at(mv.from)?;

        let victim_square = match mv.flavor {
            MoveFlavor::EnPassant => Square::new(mv.to.file(), mv.from.rank()),
            MoveFlavor::Capture => Some(mv.to),
            MoveFlavor::Quiet | MoveFlavor::Castle => None,
        };
        let capture = victim_square.and_then(|square| {
            let victim = board.piece_at(square)?;
            Some(CaptureLeg {
                square,
                piece: victim,
                slot: slots.next_slot(victim.color),
            })
        });

        let rook = if mv.flavor == MoveFlavor::Castle {
            let rank = mv.from.rank();
            let (from_file, to_file) = if mv.to.file() > mv.from.file() { (7, 5) } else { (0, 3) };
            Square::new(from_file, rank).zip(Square::new(to_file, rank))
        } else {
            None
        };

        Some(MoveCommand {
            from: mv.from,
            to: mv.to,
            piece,
            capture,
            rook,
            promotion: mv.promotion,
        })
    }
}

/// Executes move commands on the physical board
pub trait Actuator: Send {
    fn execute(&mut self, command: &MoveCommand);
}

/// Actuator that only logs; used when no arm is attached
#[derive(Debug, Default)]
pub struct LoggingActuator;

impl Actuator for LoggingActuator {
    fn execute(&mut self, command: &MoveCommand) {
        if let Some(capture) = &command.capture {
            info!(
                "[ACTUATOR] Remove {} from {} to graveyard slot {}",
                capture.piece.label(),
                capture.square,
                capture.slot
            );
        }
        info!(
            "[ACTUATOR] Move {} {} -> {}",
            command.piece.label(),
            command.from,
            command.to
        );
        if let Some((from, to)) = command.rook {
            info!("[ACTUATOR] Move rook {from} -> {to}");
        }
        if let Some(kind) = command.promotion {
            info!("[ACTUATOR] Promote on {} to {:?}", command.to, kind);
        }
    }
}

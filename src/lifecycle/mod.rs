//! Session lifecycle
//!
//! | Module         | Responsibility                                         |
//! |----------------|--------------------------------------------------------|
//! | [`state`]      | Lifecycle states, session attributes, status mailbox   |
//! | [`outbox`]     | Outbound publishing with repeat suppression            |
//! | [`controller`] | State machine and play loop                            |

pub mod controller;
pub mod outbox;
pub mod state;

pub use controller::{ControllerOptions, LifecycleController};
pub use outbox::Outbox;
pub use state::{LifecycleState, SessionAttributes, StatusMailbox};

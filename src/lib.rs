//! Vision-driven chess robot game service
//!
//! Connects a remote game controller, a camera-fed board mapper, a move
//! oracle and a robot arm. Board reconciliation itself lives in
//! `board_reconciler`; this crate runs the session around it.
//!
//! # Modules
//!
//! | Module        | Responsibility                                          |
//! |---------------|---------------------------------------------------------|
//! | [`config`]    | Settings file, environment and CLI layering             |
//! | [`transport`] | Control-channel sinks and sources (TCP, in-memory)      |
//! | [`control`]   | Control-receive task feeding the status mailbox         |
//! | [`vision`]    | Frame decoding and frame sources                        |
//! | [`actuator`]  | Move commands for the arm, graveyard slots              |
//! | [`lifecycle`] | Session state machine and play loop                     |
//! | [`error`]     | Error types                                             |

pub mod actuator;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod transport;
pub mod vision;

pub use actuator::{Actuator, CaptureLeg, GraveyardSlots, LoggingActuator, MoveCommand};
pub use config::{Cli, Settings};
pub use control::run_control_channel;
pub use error::{ConfigError, LifecycleError, LifecycleResult, TransportError, TransportResult, VisionError, VisionResult};
pub use lifecycle::{ControllerOptions, LifecycleController, LifecycleState, Outbox, SessionAttributes, StatusMailbox};
pub use transport::{ChannelSink, ChannelSource, LineSink, LineSource, MessageSink, MessageSource};
pub use vision::{Corners, Frame, StreamVision, VisionSource};

//! Game lifecycle controller
//!
//! Drives one game at a time from control-channel requests, feeding camera
//! frames through the [`Reconciler`] while a game is on.
//!
//! # States
//!
//! ```text
//! Waiting ──start/resume──▶ AwaitingCorners ──corners──▶ Playing
//!    ▲                            │ timeout / end           │ game over / end / engine failure
//!    └────────────────────────────┴──────── Ending ◀────────┘
//! ```
//!
//! An engine failure suspends the game instead of closing it: the position
//! and the cached corners are kept, and `resume` continues from them without
//! a new corner search. `start` discards a suspended game and `end` closes it.
//!
//! `verify_board_setup` is answered from any state: the controller briefly
//! enters `AwaitingSetupVerification`, compares one frame with the expected
//! arrangement and returns to where it was. A session command arriving
//! meanwhile cancels the verification without a report.
//!
//! # Suspension points
//!
//! The controller only waits for a frame, for a control message, or for the
//! oracle. Frame waits are raced against the [`StatusMailbox`], so `end`
//! interrupts a game even while the camera is quiet. Oracle searches are
//! bounded by the difficulty profile and not interrupted.

use super::outbox::Outbox;
use super::state::{LifecycleState, SessionAttributes, StatusMailbox};
use crate::actuator::{Actuator, LoggingActuator, MoveCommand};
use crate::config::Settings;
use crate::error::LifecycleResult;
use crate::transport::MessageSink;
use crate::vision::{Corners, Frame, VisionSource};
use board_reconciler::{
    Board, Color, Commit, GameOutcome, Orientation, Outcome, Position, ReconcileError,
    Reconciler, RejectReason, ShakmatyRules,
};
use shared::{
    GameType, MoveNotification, Notice, SessionCommand, SessionStatusKind, StartGamePayload,
    VerifyBoardPayload,
};
use std::sync::Arc;
use std::time::Duration;
use stockfish_oracle::{Difficulty, MoveOracle};
use tracing::{debug, error, info, warn};

/// Controller knobs, usually taken from [`Settings`]
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub ai_id: String,
    /// `None`: no automated side, the oracle is never consulted
    pub robot_color: Option<Color>,
    pub orientation: Orientation,
    pub default_difficulty: Difficulty,
    pub corner_timeout: Duration,
    pub verify_timeout: Duration,
}

impl ControllerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        ControllerOptions {
            ai_id: settings.control.ai_id.clone(),
            robot_color: settings.session.robot_color,
            orientation: settings.session.orientation,
            default_difficulty: settings.engine.default_difficulty,
            corner_timeout: settings.session.corner_timeout(),
            verify_timeout: settings.session.verify_timeout(),
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// How a session left `Playing`
#[derive(Debug)]
enum SessionExit {
    /// Checkmate, stalemate or draw
    Finished,
    /// `end` from the controller
    Ended,
    /// Position failure
    Aborted,
    /// Oracle failure; the game waits for `resume`
    Suspended,
    /// Control channel gone
    Disconnected,
    /// A new `start` replaced the running game
    Restart(StartGamePayload),
}

enum CornerWait {
    Found(Corners),
    TimedOut,
    Interrupted(StartGamePayload),
    Closed,
}

enum Wake {
    Frame(Frame),
    Control,
}

enum VerifyWait {
    Frame(Frame),
    TimedOut,
    Interrupted,
}

pub struct LifecycleController {
    state: LifecycleState,
    session: SessionAttributes,
    reconciler: Reconciler,
    outbox: Outbox,
    vision: Box<dyn VisionSource>,
    oracle: Box<dyn MoveOracle>,
    actuator: Box<dyn Actuator>,
    mailbox: Arc<StatusMailbox>,
    options: ControllerOptions,
    /// Board as it stood before the robot's last move, until the camera
    /// shows the move carried out
    robot_move_pending: Option<Board>,
}

impl LifecycleController {
    pub fn new(
        options: ControllerOptions,
        mailbox: Arc<StatusMailbox>,
        sink: Box<dyn MessageSink>,
        vision: Box<dyn VisionSource>,
        oracle: Box<dyn MoveOracle>,
    ) -> Self {
        LifecycleController {
            state: LifecycleState::Waiting,
            session: SessionAttributes::default(),
            reconciler: Reconciler::new(Arc::new(ShakmatyRules)),
            outbox: Outbox::new(sink),
            vision,
            oracle,
            actuator: Box::new(LoggingActuator),
            mailbox,
            options,
            robot_move_pending: None,
        }
    }

    pub fn with_actuator(mut self, actuator: Box<dyn Actuator>) -> Self {
        self.actuator = actuator;
        self
    }

    /// Serve control requests until the control channel closes
    pub async fn run(mut self) -> LifecycleResult<()> {
        info!(
            "[LIFECYCLE] Up as '{}', robot plays {}",
            self.options.ai_id,
            self.options.robot_color.map_or("no side", |c| c.name())
        );
        self.outbox
            .publish(Notice::AiIdentify {
                ai_id: self.options.ai_id.clone(),
            })
            .await?;

        loop {
            if let Some(request) = self.mailbox.take_verify() {
                self.verify_setup(request).await?;
                continue;
            }
            if let Some(command) = self.mailbox.take_session() {
                self.handle_session(command).await?;
                continue;
            }
            if self.mailbox.is_closed() {
                info!("[LIFECYCLE] Control channel closed, stopping");
                return Ok(());
            }
            self.mailbox.changed().await;
        }
    }

    fn set_state(&mut self, state: LifecycleState) {
        if self.state != state {
            info!("[LIFECYCLE] {} -> {}", self.state, state);
            self.state = state;
        }
    }

    async fn handle_session(&mut self, command: StartGamePayload) -> LifecycleResult<()> {
        let mut next = Some(command);
        while let Some(command) = next.take() {
            next = match command.status {
                SessionCommand::End => {
                    if self.session.in_progress {
                        self.announce_ended().await?;
                        self.close_session();
                    } else {
                        debug!("[LIFECYCLE] End requested with no game in progress");
                    }
                    None
                }
                SessionCommand::Start => self.run_session(command, false).await?,
                SessionCommand::Resume => self.run_session(command, true).await?,
            };
        }
        Ok(())
    }

    /// Start or resume a game and play it to the end.
    ///
    /// Returns a command that interrupted the session and still needs
    /// handling.
    async fn run_session(
        &mut self,
        command: StartGamePayload,
        resume: bool,
    ) -> LifecycleResult<Option<StartGamePayload>> {
        let resuming = resume && self.session.in_progress;
        if resuming {
            info!("[LIFECYCLE] Resuming game {:?}", self.session.game_id);
        } else {
            let session = SessionAttributes::start(&command, self.options.default_difficulty);
            let position = match self.initial_position(&session) {
                Ok(position) => position,
                Err(e) => {
                    warn!("[LIFECYCLE] Cannot start game {:?}: {e}", session.game_id);
                    self.outbox
                        .publish(Notice::session_status(
                            session.game_id,
                            SessionStatusKind::InvalidPosition,
                            format!("Invalid starting position: {e}"),
                        ))
                        .await?;
                    return Ok(None);
                }
            };
            info!(
                "[LIFECYCLE] Starting game {:?} ({:?}, {}) from {}",
                session.game_id, session.game_type, session.difficulty, position
            );
            self.session = session;
            self.reconciler.reset(position);
            self.outbox.reset();
            self.robot_move_pending = None;
        }

        let cached = self.session.last_known_corners.filter(|_| resuming);
        let corners = match cached {
            Some(corners) => corners,
            None => match self.acquire_corners(self.options.corner_timeout).await? {
                CornerWait::Found(corners) => corners,
                CornerWait::TimedOut => {
                    warn!(
                        "[LIFECYCLE] No board corners within {:?}",
                        self.options.corner_timeout
                    );
                    self.outbox
                        .publish(Notice::session_status(
                            self.session.game_id.clone(),
                            SessionStatusKind::CornerTimeout,
                            "Board corners not detected, game not started",
                        ))
                        .await?;
                    self.set_state(LifecycleState::Waiting);
                    return Ok(None);
                }
                CornerWait::Interrupted(command) if command.status == SessionCommand::End => {
                    self.announce_ended().await?;
                    self.close_session();
                    return Ok(None);
                }
                CornerWait::Interrupted(command) => {
                    self.set_state(LifecycleState::Waiting);
                    return Ok(Some(command));
                }
                CornerWait::Closed => {
                    self.set_state(LifecycleState::Waiting);
                    return Ok(None);
                }
            },
        };
        self.session.last_known_corners = Some(corners);
        self.session.in_progress = true;
        self.set_state(LifecycleState::Playing);

        match self.play().await? {
            SessionExit::Restart(command) => Ok(Some(command)),
            SessionExit::Suspended => {
                info!(
                    "[LIFECYCLE] Game {:?} suspended at {}, waiting for resume",
                    self.session.game_id,
                    self.reconciler.position()
                );
                self.robot_move_pending = None;
                self.set_state(LifecycleState::Waiting);
                Ok(None)
            }
            exit => {
                info!("[LIFECYCLE] Game {:?} over: {:?}", self.session.game_id, exit);
                self.close_session();
                Ok(None)
            }
        }
    }

    fn initial_position(&self, session: &SessionAttributes) -> Result<Position, ReconcileError> {
        let position = match (&session.game_type, &session.puzzle_fen) {
            (GameType::TrainingPuzzle, Some(fen)) => Position::from_fen(fen)?,
            _ => Position::standard(),
        };
        self.reconciler.rules().status(&position)?;
        Ok(position)
    }

    /// Arrangement `verify_board_setup` compares against
    fn expected_setup(&self) -> Board {
        match (&self.session.game_type, &self.session.puzzle_fen) {
            (GameType::TrainingPuzzle, Some(fen)) => Position::from_fen(fen)
                .map(|p| p.board().clone())
                .unwrap_or_else(|_| Board::standard()),
            _ => Board::standard(),
        }
    }

    /// Back to `Waiting` with a fresh standard position
    fn close_session(&mut self) {
        self.reconciler.reset(Position::standard());
        self.session = SessionAttributes::default();
        self.outbox.reset();
        self.robot_move_pending = None;
        self.set_state(LifecycleState::Waiting);
    }

    async fn acquire_corners(&mut self, timeout: Duration) -> LifecycleResult<CornerWait> {
        self.set_state(LifecycleState::AwaitingCorners);
        let mailbox = Arc::clone(&self.mailbox);
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = mailbox.changed() => {
                    if let Some(command) = mailbox.take_session() {
                        info!("[LIFECYCLE] Corner detection interrupted by {:?}", command.status);
                        return Ok(CornerWait::Interrupted(command));
                    }
                    if mailbox.is_closed() {
                        return Ok(CornerWait::Closed);
                    }
                }
                _ = &mut deadline => return Ok(CornerWait::TimedOut),
                frame = self.vision.next_frame() => {
                    if let Some(corners) = frame?.corners {
                        info!("[VISION] Board corners found");
                        return Ok(CornerWait::Found(corners));
                    }
                }
            }
        }
    }

    async fn play(&mut self) -> LifecycleResult<SessionExit> {
        let status = match self.reconciler.status() {
            Ok(status) => status,
            Err(e) => return self.abort(SessionStatusKind::InvalidPosition, e.to_string()).await,
        };
        if let Some(outcome) = status.outcome {
            return self.announce_game_over(outcome).await;
        }
        if let Some(exit) = self.robot_turn().await? {
            return Ok(exit);
        }

        let mailbox = Arc::clone(&self.mailbox);
        loop {
            let wake = tokio::select! {
                biased;
                _ = mailbox.changed() => Wake::Control,
                frame = self.vision.next_frame() => Wake::Frame(frame?),
            };
            if let Some(exit) = self.poll_control().await? {
                return Ok(exit);
            }
            let Wake::Frame(frame) = wake else {
                continue;
            };

            if let Some(exit) = self.process_frame(frame).await? {
                return Ok(exit);
            }
            if let Some(exit) = self.poll_control().await? {
                return Ok(exit);
            }
        }
    }

    async fn process_frame(&mut self, frame: Frame) -> LifecycleResult<Option<SessionExit>> {
        let observed = Board::from_grid(&frame.grid, self.options.orientation);
        if let Some(before) = &self.robot_move_pending {
            if !frame.hand_present && observed == *before {
                debug!("[LIFECYCLE] Waiting for the robot move to show on the board");
                return Ok(None);
            }
        }

        let outcome = match self.reconciler.observe(&observed, frame.hand_present) {
            Ok(outcome) => outcome,
            Err(e) => {
                return self
                    .abort(SessionStatusKind::InvalidPosition, e.to_string())
                    .await
                    .map(Some)
            }
        };

        match outcome {
            Outcome::Rejected(reason) => {
                if reason == RejectReason::NoChange {
                    self.robot_move_pending = None;
                }
                Ok(None)
            }
            Outcome::IllegalMove(report) if self.robot_move_pending.is_some() => {
                debug!("[LIFECYCLE] Ignoring {report} while the robot move is carried out");
                Ok(None)
            }
            Outcome::IllegalMove(report) => {
                self.outbox
                    .publish_frame_result(Notice::illegal_move(self.session.game_id.clone(), &report))
                    .await?;
                Ok(None)
            }
            Outcome::Accepted(commit) => {
                self.robot_move_pending = None;
                if let Some(exit) = self.announce(&commit).await? {
                    return Ok(Some(exit));
                }
                if let Some(exit) = self.poll_control().await? {
                    return Ok(Some(exit));
                }
                self.robot_turn().await
            }
        }
    }

    /// Handle whatever the control task posted since the last look
    async fn poll_control(&mut self) -> LifecycleResult<Option<SessionExit>> {
        if let Some(request) = self.mailbox.take_verify() {
            self.verify_setup(request).await?;
        }
        if let Some(command) = self.mailbox.take_session() {
            match command.status {
                SessionCommand::End => {
                    self.announce_ended().await?;
                    return Ok(Some(SessionExit::Ended));
                }
                SessionCommand::Resume => debug!("[LIFECYCLE] Resume while playing, nothing to do"),
                SessionCommand::Start => {
                    info!("[LIFECYCLE] New game requested during play");
                    return Ok(Some(SessionExit::Restart(command)));
                }
            }
        }
        if self.mailbox.is_closed() {
            return Ok(Some(SessionExit::Disconnected));
        }
        Ok(None)
    }

    /// Ask the oracle for a move when the robot is to move, and play it
    async fn robot_turn(&mut self) -> LifecycleResult<Option<SessionExit>> {
        let position = self.reconciler.position().clone();
        if self.options.robot_color != Some(position.turn()) {
            return Ok(None);
        }

        let profile = self.session.difficulty.profile();
        let reply = match self.oracle.best_move(&position, &profile).await {
            Ok(reply) => reply,
            Err(e) => return self.suspend(format!("Move oracle failed: {e}")).await.map(Some),
        };
        let commit = match self.reconciler.play(&reply.mv) {
            Ok(commit) => commit,
            Err(e) => return self.suspend(format!("Oracle move rejected: {e}")).await.map(Some),
        };

        if let Some(command) = MoveCommand::plan(&position, &reply.mv, &mut self.session.graveyard) {
            self.actuator.execute(&command);
        }
        self.robot_move_pending = Some(position.board().clone());
        self.announce(&commit).await
    }

    /// Publish a commit and its consequences
    async fn announce(&mut self, commit: &Commit) -> LifecycleResult<Option<SessionExit>> {
        let fen = commit.position.to_fen();
        self.outbox
            .publish_move(MoveNotification {
                fen_str: fen.clone(),
                played: Some(commit.summary.clone()),
            })
            .await?;

        if let Some(outcome) = commit.status.outcome {
            return self.announce_game_over(outcome).await.map(Some);
        }
        if let Some(color) = commit.status.player_in_check() {
            info!("[LIFECYCLE] {color} is in check");
            self.outbox
                .publish(Notice::check_detected(self.session.game_id.clone(), color, fen))
                .await?;
        }
        Ok(None)
    }

    async fn announce_game_over(&mut self, outcome: GameOutcome) -> LifecycleResult<SessionExit> {
        self.set_state(LifecycleState::Ending);
        info!("[LIFECYCLE] {}", outcome.message());
        self.outbox
            .publish(Notice::GameOver {
                game_id: self.session.game_id.clone(),
                reason: outcome.reason().to_string(),
                winner: outcome.winner(),
                fen_str: self.reconciler.position().to_fen(),
                message: outcome.message(),
            })
            .await?;
        Ok(SessionExit::Finished)
    }

    async fn announce_ended(&mut self) -> LifecycleResult<()> {
        self.set_state(LifecycleState::Ending);
        self.outbox
            .publish(Notice::GameOver {
                game_id: self.session.game_id.clone(),
                reason: "ended".to_string(),
                winner: None,
                fen_str: self.reconciler.position().to_fen(),
                message: "Game ended by the controller".to_string(),
            })
            .await?;
        Ok(())
    }

    async fn abort(
        &mut self,
        status: SessionStatusKind,
        message: String,
    ) -> LifecycleResult<SessionExit> {
        error!("[LIFECYCLE] Aborting game {:?}: {message}", self.session.game_id);
        self.set_state(LifecycleState::Ending);
        self.outbox
            .publish(Notice::session_status(self.session.game_id.clone(), status, message))
            .await?;
        Ok(SessionExit::Aborted)
    }

    /// Report an oracle failure and keep the game for a later `resume`
    async fn suspend(&mut self, message: String) -> LifecycleResult<SessionExit> {
        error!("[LIFECYCLE] Suspending game {:?}: {message}", self.session.game_id);
        self.set_state(LifecycleState::Ending);
        self.outbox
            .publish(Notice::session_status(
                self.session.game_id.clone(),
                SessionStatusKind::EngineFailure,
                message,
            ))
            .await?;
        Ok(SessionExit::Suspended)
    }

    /// Compare one frame with the expected arrangement and report it
    async fn verify_setup(&mut self, request: VerifyBoardPayload) -> LifecycleResult<()> {
        let previous = self.state;
        self.set_state(LifecycleState::AwaitingSetupVerification);
        let game_id = request.game_id.or_else(|| self.session.game_id.clone());
        let expected = self.expected_setup();
        let need_corners = self.session.last_known_corners.is_none();
        let timeout = self.options.verify_timeout;

        let mailbox = Arc::clone(&self.mailbox);
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let wait = loop {
            tokio::select! {
                biased;
                _ = mailbox.changed() => {
                    // The caller takes the session command once we return
                    if mailbox.has_session() || mailbox.is_closed() {
                        break VerifyWait::Interrupted;
                    }
                }
                _ = &mut deadline => break VerifyWait::TimedOut,
                frame = self.vision.next_frame() => {
                    let frame = frame?;
                    if frame.hand_present || (need_corners && frame.corners.is_none()) {
                        continue;
                    }
                    break VerifyWait::Frame(frame);
                }
            }
        };

        let notice = match wait {
            VerifyWait::Frame(frame) => {
                let detected = Board::from_grid(&frame.grid, self.options.orientation);
                let correct = detected == expected;
                info!(
                    "[LIFECYCLE] Board setup {}",
                    if correct { "correct" } else { "incorrect" }
                );
                Notice::board_status(game_id, correct, expected.placement(), detected.placement())
            }
            VerifyWait::TimedOut => {
                warn!("[LIFECYCLE] No usable frame for setup verification within {timeout:?}");
                Notice::session_status(
                    game_id,
                    SessionStatusKind::CornerTimeout,
                    "Board corners not detected for setup verification",
                )
            }
            VerifyWait::Interrupted => {
                info!("[LIFECYCLE] Setup verification interrupted by a session command");
                self.set_state(previous);
                return Ok(());
            }
        };
        self.outbox.publish(notice).await?;
        self.set_state(previous);
        Ok(())
    }
}

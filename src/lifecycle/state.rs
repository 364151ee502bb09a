//! Lifecycle state and the shared status mailbox
//!
//! The control task and the play loop share exactly one record, the
//! [`StatusMailbox`]. The control task posts the latest session command and
//! the latest verification request; the lifecycle takes them when it is
//! ready. Each slot holds only the most recent message.

use crate::actuator::GraveyardSlots;
use crate::vision::Corners;
use parking_lot::Mutex;
use shared::{ControlMessage, GameType, StartGamePayload, VerifyBoardPayload};
use std::fmt;
use stockfish_oracle::Difficulty;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Waiting,
    AwaitingCorners,
    Playing,
    AwaitingSetupVerification,
    Ending,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Waiting => "waiting",
            LifecycleState::AwaitingCorners => "awaiting_corners",
            LifecycleState::Playing => "playing",
            LifecycleState::AwaitingSetupVerification => "awaiting_setup_verification",
            LifecycleState::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// Per-session attributes; reset to defaults when a session ends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionAttributes {
    pub game_id: Option<String>,
    pub game_type: GameType,
    pub difficulty: Difficulty,
    pub puzzle_fen: Option<String>,
    /// Corners from the last successful detection in this session
    pub last_known_corners: Option<Corners>,
    /// A game has been started and has not ended
    pub in_progress: bool,
    pub graveyard: GraveyardSlots,
}

impl SessionAttributes {
    /// Select the difficulty by name; unknown or missing names use `fallback`
    pub fn set_difficulty(&mut self, name: Option<&str>, fallback: Difficulty) -> Difficulty {
        self.difficulty = name
            .and_then(|name| name.parse().ok())
            .unwrap_or(fallback);
        self.difficulty
    }

    /// Attributes of a freshly started session
    pub fn start(payload: &StartGamePayload, fallback: Difficulty) -> Self {
        let mut session = SessionAttributes {
            game_id: payload.game_id.clone(),
            game_type: payload.game_type,
            puzzle_fen: payload.puzzle_fen.clone(),
            ..SessionAttributes::default()
        };
        session.set_difficulty(payload.difficulty.as_deref(), fallback);
        session
    }
}

#[derive(Debug, Default)]
struct Slots {
    session: Option<StartGamePayload>,
    verify: Option<VerifyBoardPayload>,
    closed: bool,
}

/// Latest-write-wins record between the control task and the lifecycle
#[derive(Debug, Default)]
pub struct StatusMailbox {
    slots: Mutex<Slots>,
    notify: Notify,
}

impl StatusMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a control message, replacing any unread one of the same kind
    pub fn post(&self, message: ControlMessage) {
        {
            let mut slots = self.slots.lock();
            match message {
                ControlMessage::StartGame(payload) => slots.session = Some(payload),
                ControlMessage::VerifyBoardSetup(payload) => slots.verify = Some(payload),
            }
        }
        self.notify.notify_one();
    }

    pub fn take_session(&self) -> Option<StartGamePayload> {
        self.slots.lock().session.take()
    }

    /// An unread session command is waiting; it stays in the slot
    pub fn has_session(&self) -> bool {
        self.slots.lock().session.is_some()
    }

    pub fn take_verify(&self) -> Option<VerifyBoardPayload> {
        self.slots.lock().verify.take()
    }

    /// Mark the control channel as gone
    pub fn close(&self) {
        self.slots.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.lock().closed
    }

    /// Resolves after the next `post` or `close` (or immediately if one
    /// happened since the last wake-up)
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::SessionCommand;
    use std::sync::Arc;
    use std::time::Duration;

    fn start(status: SessionCommand, game_id: &str) -> StartGamePayload {
        StartGamePayload {
            status,
            game_id: Some(game_id.to_string()),
            difficulty: Some("hard".to_string()),
            game_type: GameType::NormalGame,
            puzzle_fen: None,
        }
    }

    #[test]
    fn test_latest_session_command_wins() {
        let mailbox = StatusMailbox::new();
        mailbox.post(ControlMessage::StartGame(start(SessionCommand::Start, "a")));
        mailbox.post(ControlMessage::StartGame(start(SessionCommand::End, "a")));
        mailbox.post(ControlMessage::VerifyBoardSetup(VerifyBoardPayload::default()));

        assert_eq!(mailbox.take_session().map(|p| p.status), Some(SessionCommand::End));
        assert_eq!(mailbox.take_session(), None);
        assert!(mailbox.take_verify().is_some());
        assert!(!mailbox.is_closed());
    }

    #[test]
    fn test_has_session_leaves_command_in_place() {
        let mailbox = StatusMailbox::new();
        assert!(!mailbox.has_session());
        mailbox.post(ControlMessage::VerifyBoardSetup(VerifyBoardPayload::default()));
        assert!(!mailbox.has_session());

        mailbox.post(ControlMessage::StartGame(start(SessionCommand::End, "a")));
        assert!(mailbox.has_session());
        assert!(mailbox.has_session());
        assert_eq!(mailbox.take_session().map(|p| p.status), Some(SessionCommand::End));
        assert!(!mailbox.has_session());
    }

    #[tokio::test]
    async fn test_changed_wakes_waiter() {
        let mailbox = Arc::new(StatusMailbox::new());
        let waiter = {
            let mailbox = Arc::clone(&mailbox);
            tokio::spawn(async move { mailbox.changed().await })
        };
        tokio::task::yield_now().await;
        mailbox.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        assert!(mailbox.is_closed());
    }

    #[test]
    fn test_difficulty_selection() {
        let payload = start(SessionCommand::Start, "g");
        let mut session = SessionAttributes::start(&payload, Difficulty::Medium);
        assert_eq!(session.difficulty, Difficulty::Hard);
        assert_eq!(session.game_id.as_deref(), Some("g"));

        assert_eq!(session.set_difficulty(Some("Easy"), Difficulty::Medium), Difficulty::Easy);
        assert_eq!(session.set_difficulty(Some("grandmaster"), Difficulty::Medium), Difficulty::Medium);
        assert_eq!(session.set_difficulty(None, Difficulty::Hard), Difficulty::Hard);
        assert_eq!(Difficulty::Hard.profile().skill_level, 15);
    }
}

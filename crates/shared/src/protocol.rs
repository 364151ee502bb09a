//! Control-channel wire protocol
//!
//! Newline-delimited JSON in both directions.
//!
//! # Inbound
//!
//! ```json
//! {"Type":"ai_request","Command":"start_game",
//!  "Payload":{"status":"start","game_id":"42","difficulty":"easy","game_type":"normal_game"}}
//! {"Type":"ai_request","Command":"verify_board_setup","Payload":{"game_id":"42"}}
//! ```
//!
//! Envelopes with another `Type` are addressed to other services and ignored.
//!
//! # Outbound
//!
//! | Message                | Shape                                                     |
//! |------------------------|-----------------------------------------------------------|
//! | move notification      | `{"fen_str", "move"?}` (no `type` field)                  |
//! | `ai_identify`          | `{"type","ai_id"}`                                        |
//! | `board_status`         | `{"type","status","game_id","expected","detected","message"}` |
//! | `illegal_move`         | `{"type","game_id","player","move","current_fen","message"}` |
//! | `check_detected`       | `{"type","game_id","player_in_check","fen_str","message"}` |
//! | `game_over`            | `{"type","game_id","reason","winner","fen_str","message"}` |
//! | `session_status`       | `{"type","game_id","status","message"}`                   |

use board_reconciler::{Color, IllegalMoveReport, MoveKind, MoveSummary};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Envelope `Type` carrying requests for this service
pub const AI_REQUEST: &str = "ai_request";

/// Errors decoding inbound control messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Line is not a JSON envelope
    #[error("malformed control message: {0}")]
    Json(#[from] serde_json::Error),

    /// Known command with a payload that does not fit it
    #[error("invalid payload for '{command}': {source}")]
    Payload {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Inbound
// ============================================================================

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ControlEnvelope {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Command", default)]
    pub command: String,
    #[serde(rename = "Payload", default)]
    pub payload: Value,
}

/// `status` field of a `start_game` request
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionCommand {
    Start,
    Resume,
    End,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    #[default]
    NormalGame,
    TrainingPuzzle,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StartGamePayload {
    pub status: SessionCommand,
    #[serde(default, deserialize_with = "game_id")]
    pub game_id: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub game_type: GameType,
    #[serde(default)]
    pub puzzle_fen: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VerifyBoardPayload {
    #[serde(default, deserialize_with = "game_id")]
    pub game_id: Option<String>,
}

/// A decoded request for this service
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    StartGame(StartGamePayload),
    VerifyBoardSetup(VerifyBoardPayload),
}

/// Game ids arrive as strings or numbers; keep them as strings
fn game_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id),
        Some(other) => Some(other.to_string()),
    })
}

/// Decode one inbound line.
///
/// `Ok(None)` for blank lines and envelopes meant for another service.
pub fn decode_control(line: &str) -> ProtocolResult<Option<ControlMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let envelope: ControlEnvelope = serde_json::from_str(line)?;
    if envelope.kind != AI_REQUEST {
        return Ok(None);
    }

    let payload_error = |source| ProtocolError::Payload {
        command: envelope.command.clone(),
        source,
    };
    let message = match envelope.command.as_str() {
        "start_game" => ControlMessage::StartGame(
            serde_json::from_value(envelope.payload.clone()).map_err(payload_error)?,
        ),
        "verify_board_setup" => ControlMessage::VerifyBoardSetup(if envelope.payload.is_null() {
            VerifyBoardPayload::default()
        } else {
            serde_json::from_value(envelope.payload.clone()).map_err(payload_error)?
        }),
        other => return Err(ProtocolError::UnknownCommand(other.to_string())),
    };
    Ok(Some(message))
}

// ============================================================================
// Outbound
// ============================================================================

/// Published after every commit
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoveNotification {
    pub fen_str: String,
    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub played: Option<MoveSummary>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SetupStatus {
    Correct,
    Incorrect,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatusKind {
    CornerTimeout,
    EngineFailure,
    InvalidPosition,
}

/// `move` object of an `illegal_move` notice
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AttemptedMove {
    pub from: String,
    pub to: String,
    pub piece: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<String>,
    pub move_type: MoveKind,
}

/// Every typed outbound message
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    AiIdentify {
        ai_id: String,
    },
    BoardStatus {
        status: SetupStatus,
        game_id: Option<String>,
        expected: String,
        detected: String,
        message: String,
    },
    IllegalMove {
        game_id: Option<String>,
        player: Color,
        #[serde(rename = "move")]
        attempted: AttemptedMove,
        current_fen: String,
        message: String,
    },
    CheckDetected {
        game_id: Option<String>,
        player_in_check: Color,
        fen_str: String,
        message: String,
    },
    GameOver {
        game_id: Option<String>,
        reason: String,
        winner: Option<Color>,
        fen_str: String,
        message: String,
    },
    SessionStatus {
        game_id: Option<String>,
        status: SessionStatusKind,
        message: String,
    },
}

impl Notice {
    pub fn board_status(
        game_id: Option<String>,
        correct: bool,
        expected: String,
        detected: String,
    ) -> Notice {
        let (status, message) = if correct {
            (SetupStatus::Correct, "Board setup is correct")
        } else {
            (
                SetupStatus::Incorrect,
                "Board setup is incorrect - please adjust pieces",
            )
        };
        Notice::BoardStatus {
            status,
            game_id,
            expected,
            detected,
            message: message.to_string(),
        }
    }

    pub fn illegal_move(game_id: Option<String>, report: &IllegalMoveReport) -> Notice {
        Notice::IllegalMove {
            game_id,
            player: report.player,
            attempted: AttemptedMove {
                from: report.from.to_string(),
                to: report.to.to_string(),
                piece: report.piece.map(|p| p.label()),
                captured: report.captured.map(|p| p.label()),
                move_type: report.move_type,
            },
            current_fen: report.fen.clone(),
            message: report.message(),
        }
    }

    pub fn check_detected(game_id: Option<String>, player_in_check: Color, fen_str: String) -> Notice {
        Notice::CheckDetected {
            game_id,
            player_in_check,
            message: format!("{player_in_check} is in check"),
            fen_str,
        }
    }

    pub fn session_status(
        game_id: Option<String>,
        status: SessionStatusKind,
        message: impl Into<String>,
    ) -> Notice {
        Notice::SessionStatus {
            game_id,
            status,
            message: message.into(),
        }
    }
}

/// Anything the service writes to the control channel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Outbound {
    Notice(Notice),
    Move(MoveNotification),
}

impl Outbound {
    /// Single JSON line, without the trailing newline
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Notice> for Outbound {
    fn from(notice: Notice) -> Self {
        Outbound::Notice(notice)
    }
}

impl From<MoveNotification> for Outbound {
    fn from(notification: MoveNotification) -> Self {
        Outbound::Move(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_start_game() {
        let line = r#"{"Type":"ai_request","Command":"start_game","Payload":{"status":"start","game_id":"g-1","difficulty":"easy","game_type":"normal_game"}}"#;
        let Some(ControlMessage::StartGame(payload)) = decode_control(line).unwrap() else {
            panic!("expected start_game");
        };
        assert_eq!(payload.status, SessionCommand::Start);
        assert_eq!(payload.game_id.as_deref(), Some("g-1"));
        assert_eq!(payload.difficulty.as_deref(), Some("easy"));
        assert_eq!(payload.game_type, GameType::NormalGame);
        assert_eq!(payload.puzzle_fen, None);
    }

    #[test]
    fn test_decode_puzzle_with_numeric_game_id() {
        let line = r#"{"Type":"ai_request","Command":"start_game","Payload":{"status":"resume","game_id":17,"game_type":"training_puzzle","puzzle_fen":"4k3/8/8/8/8/8/8/4K2R w K - 0 1"}}"#;
        let Some(ControlMessage::StartGame(payload)) = decode_control(line).unwrap() else {
            panic!("expected start_game");
        };
        assert_eq!(payload.status, SessionCommand::Resume);
        assert_eq!(payload.game_id.as_deref(), Some("17"));
        assert_eq!(payload.game_type, GameType::TrainingPuzzle);
        assert!(payload.puzzle_fen.is_some());
    }

    #[test]
    fn test_decode_verify_and_foreign_envelopes() {
        let verify = r#"{"Type":"ai_request","Command":"verify_board_setup","Payload":{"game_id":"g-2"}}"#;
        assert_eq!(
            decode_control(verify).unwrap(),
            Some(ControlMessage::VerifyBoardSetup(VerifyBoardPayload {
                game_id: Some("g-2".to_string())
            }))
        );
        let robot = r#"{"Type":"robot_request","Command":"reset_board","Payload":{}}"#;
        assert_eq!(decode_control(robot).unwrap(), None);
        assert_eq!(decode_control("   ").unwrap(), None);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_control("{not json"), Err(ProtocolError::Json(_))));
        let bad_status = r#"{"Type":"ai_request","Command":"start_game","Payload":{"status":"pause"}}"#;
        assert!(matches!(
            decode_control(bad_status),
            Err(ProtocolError::Payload { .. })
        ));
        let unknown = r#"{"Type":"ai_request","Command":"self_destruct","Payload":{}}"#;
        assert!(matches!(
            decode_control(unknown),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_move_notification_shape() {
        let bare = Outbound::from(MoveNotification {
            fen_str: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string(),
            played: None,
        });
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            json!({"fen_str": "8/8/8/8/8/8/8/K6k w - - 0 1"})
        );
    }

    #[test]
    fn test_notice_shapes() {
        let notice = Outbound::from(Notice::board_status(
            Some("g".to_string()),
            false,
            "a".to_string(),
            "b".to_string(),
        ));
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(value["type"], "board_status");
        assert_eq!(value["status"], "incorrect");

        let game_over = Outbound::from(Notice::GameOver {
            game_id: None,
            reason: "stalemate".to_string(),
            winner: None,
            fen_str: "f".to_string(),
            message: "m".to_string(),
        });
        let value = serde_json::to_value(&game_over).unwrap();
        assert_eq!(value["type"], "game_over");
        assert!(value["winner"].is_null());

        let line = Outbound::from(Notice::session_status(
            Some("g".to_string()),
            SessionStatusKind::CornerTimeout,
            "no corners",
        ))
        .encode()
        .unwrap();
        let decoded: Outbound = serde_json::from_str(&line).unwrap();
        assert!(matches!(
            decoded,
            Outbound::Notice(Notice::SessionStatus {
                status: SessionStatusKind::CornerTimeout,
                ..
            })
        ));
    }
}

use serde::{Deserialize, Serialize};

use xo_store::games::GameRow;

pub const CMD_GENERATE_NEW_GAME: &str = "GENERATE_NEW_GAME";
pub const CMD_JOIN_GAME: &str = "JOIN_GAME";
pub const CMD_MAKE_MOVE: &str = "MAKE_MOVE";

/// Inbound request frame.
#[derive(Debug, Default, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub game_info: GameParams,
}

/// The `game_info` block of a request. All fields optional on the wire;
/// each operation validates the ones it needs.
#[derive(Debug, Default, Deserialize)]
pub struct GameParams {
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub last_move_user_id: String,
}

/// Game record fields exposed over the wire. Unset participants are
/// empty strings, matching the record shape clients expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameInfo {
    pub game_id: String,
    pub first_user_id: String,
    pub second_user_id: String,
    pub state: String,
    pub last_move_user_id: String,
}

impl From<&GameRow> for GameInfo {
    fn from(row: &GameRow) -> Self {
        Self {
            game_id: row.id.as_str().to_string(),
            first_user_id: row.first_user_id.as_str().to_string(),
            second_user_id: row
                .second_user_id
                .as_ref()
                .map(|u| u.as_str().to_string())
                .unwrap_or_default(),
            state: row.state.clone(),
            last_move_user_id: row
                .last_move_user_id
                .as_ref()
                .map(|u| u.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Outbound success frame.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub command: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_info: Option<GameInfo>,
    pub message: String,
}

/// Outbound error frame.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: u16,
    pub error: String,
}

/// Exactly one frame goes out per request; this is the total mapping
/// from a dispatch outcome to the wire.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Frame {
    Ok(Response),
    Err(ErrorFrame),
}

impl Response {
    pub fn with_game(command: &str, code: u16, game_info: GameInfo) -> Self {
        Self {
            command: command.to_string(),
            code,
            game_info: Some(game_info),
            message: status_text(code).to_string(),
        }
    }

    /// Bare acknowledgment for unrecognized commands (connection-health probe).
    pub fn ack(command: &str) -> Self {
        Self {
            command: command.to_string(),
            code: 200,
            game_info: None,
            message: status_text(200).to_string(),
        }
    }
}

impl ErrorFrame {
    pub fn new(code: u16, error: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(400, error)
    }
}

/// HTTP-style status text for the codes this protocol uses.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

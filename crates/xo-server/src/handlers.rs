//! Command dispatch: one operation per protocol command, all running
//! against an explicitly injected store handle.

use std::sync::Arc;

use xo_core::ids::{GameId, PlayerId};
use xo_store::games::{GameRepo, GameRow};
use xo_store::{Database, StoreError};

use crate::protocol::{
    ErrorFrame, Frame, GameParams, Request, Response, CMD_GENERATE_NEW_GAME, CMD_JOIN_GAME,
    CMD_MAKE_MOVE,
};

/// Shared state available to all command handlers.
pub struct HandlerState {
    pub db: Database,
}

impl HandlerState {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Typed failure of an operation. Mapped 1:1 onto wire error frames.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    pub fn code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<DispatchError> for ErrorFrame {
    fn from(e: DispatchError) -> Self {
        ErrorFrame::new(e.code(), e.to_string())
    }
}

/// Dispatch a decoded request to the matching operation and map the
/// outcome to exactly one outbound frame.
pub fn dispatch(state: &Arc<HandlerState>, request: &Request) -> Frame {
    let outcome = match request.command.as_str() {
        CMD_GENERATE_NEW_GAME => generate_new_game(state).map(|g| (201, g)),
        CMD_JOIN_GAME => join_game(state, &request.game_info).map(|g| (200, g)),
        CMD_MAKE_MOVE => make_move(state, &request.game_info).map(|g| (200, g)),
        // Anything else acknowledges the connection without touching the store.
        _ => return Frame::Ok(Response::ack(&request.command)),
    };

    match outcome {
        Ok((code, game)) => Frame::Ok(Response::with_game(&request.command, code, (&game).into())),
        Err(e) => Frame::Err(e.into()),
    }
}

/// Create a fresh game with a fresh creator id.
fn generate_new_game(state: &Arc<HandlerState>) -> Result<GameRow, DispatchError> {
    let game_id = GameId::new();
    let user_id = PlayerId::new();
    tracing::info!(game_id = %game_id, user_id = %user_id, "generating new game");

    let repo = GameRepo::new(state.db.clone());
    Ok(repo.create(&game_id, &user_id)?)
}

/// Register a fresh participant as the game's second user.
fn join_game(state: &Arc<HandlerState>, params: &GameParams) -> Result<GameRow, DispatchError> {
    if params.game_id.is_empty() {
        return Err(DispatchError::BadRequest("no game id provided".into()));
    }

    let repo = GameRepo::new(state.db.clone());
    let mut game = repo.get(&GameId::from_raw(&params.game_id))?;

    if game.is_full() {
        return Err(DispatchError::BadRequest("game is full".into()));
    }

    let user_id = PlayerId::new();
    tracing::info!(game_id = %game.id, user_id = %user_id, "joining game");

    game.second_user_id = Some(user_id);
    Ok(repo.update(&game)?)
}

/// Overwrite the game's state blob and last mover. The blob is opaque here:
/// no legality, turn-order, or terminal-state checks.
fn make_move(state: &Arc<HandlerState>, params: &GameParams) -> Result<GameRow, DispatchError> {
    if params.game_id.is_empty() || params.state.is_empty() {
        return Err(DispatchError::BadRequest("no game id or state provided".into()));
    }

    let repo = GameRepo::new(state.db.clone());
    let mut game = repo.get(&GameId::from_raw(&params.game_id))?;

    tracing::info!(game_id = %game.id, user_id = %params.last_move_user_id, "making move");

    game.state = params.state.clone();
    game.last_move_user_id = if params.last_move_user_id.is_empty() {
        None
    } else {
        Some(PlayerId::from_raw(&params.last_move_user_id))
    };
    Ok(repo.update(&game)?)
}

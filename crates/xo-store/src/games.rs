use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use xo_core::ids::{GameId, PlayerId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// One game session as persisted in the `games` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRow {
    pub id: GameId,
    pub first_user_id: PlayerId,
    pub second_user_id: Option<PlayerId>,
    pub state: String,
    pub last_move_user_id: Option<PlayerId>,
    pub created_at: String,
    pub updated_at: String,
}

impl GameRow {
    /// Whether both participant slots are taken.
    pub fn is_full(&self) -> bool {
        self.second_user_id.is_some()
    }
}

pub struct GameRepo {
    db: Database,
}

impl GameRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new game with the given id and creator.
    #[instrument(skip(self), fields(game_id = %id, first_user_id = %first_user_id))]
    pub fn create(&self, id: &GameId, first_user_id: &PlayerId) -> Result<GameRow, StoreError> {
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO games (id, first_user_id, state, created_at, updated_at)
                 VALUES (?1, ?2, '', ?3, ?4)",
                rusqlite::params![id.as_str(), first_user_id.as_str(), now, now],
            )?;

            Ok(GameRow {
                id: id.clone(),
                first_user_id: first_user_id.clone(),
                second_user_id: None,
                state: String::new(),
                last_move_user_id: None,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Get a game by id.
    #[instrument(skip(self), fields(game_id = %id))]
    pub fn get(&self, id: &GameId) -> Result<GameRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, first_user_id, second_user_id, state, last_move_user_id,
                        created_at, updated_at
                 FROM games WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_game(row),
                None => Err(StoreError::NotFound(format!("game {id}"))),
            }
        })
    }

    /// Persist the mutable columns of a game record and return the stored row.
    /// Each call is a single atomic statement; concurrent updates are last-write-wins.
    #[instrument(skip(self, game), fields(game_id = %game.id))]
    pub fn update(&self, game: &GameRow) -> Result<GameRow, StoreError> {
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE games SET second_user_id = ?1, state = ?2, last_move_user_id = ?3,
                        updated_at = ?4
                 WHERE id = ?5",
                rusqlite::params![
                    game.second_user_id.as_ref().map(|u| u.as_str()),
                    game.state,
                    game.last_move_user_id.as_ref().map(|u| u.as_str()),
                    now,
                    game.id.as_str(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("game {}", game.id)));
            }

            Ok(GameRow {
                updated_at: now,
                ..game.clone()
            })
        })
    }
}

fn row_to_game(row: &rusqlite::Row<'_>) -> Result<GameRow, StoreError> {
    Ok(GameRow {
        id: GameId::from_raw(row_helpers::get::<String>(row, 0, "games", "id")?),
        first_user_id: PlayerId::from_raw(row_helpers::get::<String>(
            row, 1, "games", "first_user_id",
        )?),
        second_user_id: row_helpers::get_opt::<String>(row, 2, "games", "second_user_id")?
            .map(PlayerId::from_raw),
        state: row_helpers::get(row, 3, "games", "state")?,
        last_move_user_id: row_helpers::get_opt::<String>(row, 4, "games", "last_move_user_id")?
            .map(PlayerId::from_raw),
        created_at: row_helpers::get(row, 5, "games", "created_at")?,
        updated_at: row_helpers::get(row, 6, "games", "updated_at")?,
    })
}

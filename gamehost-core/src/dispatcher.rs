//! Dispatcher translating control-surface calls into room operations
//!
//! Every public method maps to one inbound call. The dispatcher owns the
//! invariants that are not the room table's business: player index range,
//! seat bookkeeping, and telling a game's rejection of an input
//! ([`DispatchError::GameLogic`]) apart from a game failing to report its
//! state ([`DispatchError::GameState`]).

use std::sync::Arc;

use crate::erased::GameState;
use crate::registry::EngineRegistry;
use crate::room::{RoomError, RoomSettings, RoomSummary, RoomTable};
use crate::typed::PlayerIndex;

/// Errors returned by dispatcher operations
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("player index {player_index} is outside 0..{max_players}")]
    InvalidPlayer { player_index: i64, max_players: u8 },

    /// The game rejected the input; the message is the game's own.
    #[error("{message}")]
    GameLogic { message: String },

    /// The game could not produce a state snapshot.
    #[error("game state unavailable: {message}")]
    GameState { message: String },
}

impl DispatchError {
    /// `true` for errors caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            DispatchError::Room(RoomError::Instantiate { .. })
                | DispatchError::Room(RoomError::Poisoned { .. })
                | DispatchError::GameState { .. }
        )
    }
}

/// Acknowledgement of an init call
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InitAck {
    pub room_id: String,
    /// `false` when the room already existed
    pub created: bool,
    pub max_players: u8,
}

/// Routes calls to rooms
#[derive(Debug)]
pub struct Dispatcher {
    rooms: RoomTable,
}

impl Dispatcher {
    pub fn new(engines: Arc<EngineRegistry>, settings: RoomSettings) -> Self {
        Self {
            rooms: RoomTable::new(engines, settings),
        }
    }

    pub fn engines(&self) -> &EngineRegistry {
        self.rooms.engines()
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    /// Create the room on first reference, otherwise return it untouched
    pub fn init(&self, game_type: &str, room_id: &str) -> Result<InitAck, DispatchError> {
        let (room, created) = self.rooms.get_or_create(game_type, room_id)?;
        tracing::debug!(game_type, room_id, created, "init");

        Ok(InitAck {
            room_id: room.room_id().to_string(),
            created,
            max_players: room.max_players(),
        })
    }

    /// Apply a player's input to an existing room
    ///
    /// The player takes their seat on their first accepted index. The game is
    /// never called for an out-of-range index.
    pub fn update(
        &self,
        game_type: &str,
        room_id: &str,
        player_index: i64,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        let room = self.rooms.find(game_type, room_id)?;
        let player = checked_player(player_index, room.max_players())?;

        if room.seat(player) {
            tracing::debug!(game_type, room_id, player_index, "player seated");
        }

        let mut instance = room.write_instance()?;
        instance.play(payload, player).map_err(|e| {
            tracing::debug!(game_type, room_id, player_index, error = %e, "move rejected");
            DispatchError::GameLogic { message: e.to_string() }
        })
    }

    /// Current game state of an existing room, verbatim
    pub fn state(&self, game_type: &str, room_id: &str) -> Result<GameState, DispatchError> {
        let room = self.rooms.find(game_type, room_id)?;
        let instance = room.read_instance()?;
        instance.state().map_err(|e| {
            tracing::error!(game_type, room_id, error = %e, "game failed to report state");
            DispatchError::GameState { message: e.to_string() }
        })
    }

    /// Free a player's seat; leaving an empty seat is not an error
    pub fn leave(&self, game_type: &str, room_id: &str, player_index: i64) -> Result<(), DispatchError> {
        let room = self.rooms.find(game_type, room_id)?;
        let player = checked_player(player_index, room.max_players())?;

        if room.unseat(player) {
            tracing::debug!(game_type, room_id, player_index, "player left");
        }
        Ok(())
    }

    /// Remove a room; calls already running against it still complete
    pub fn close(&self, game_type: &str, room_id: &str) -> Result<(), DispatchError> {
        self.rooms.close(game_type, room_id)?;
        Ok(())
    }

    pub fn list_rooms(&self, game_type: &str) -> Result<Vec<RoomSummary>, DispatchError> {
        Ok(self.rooms.list(game_type)?)
    }
}

fn checked_player(player_index: i64, max_players: u8) -> Result<PlayerIndex, DispatchError> {
    if player_index < 0 || player_index >= i64::from(max_players) {
        return Err(DispatchError::InvalidPlayer {
            player_index,
            max_players,
        });
    }
    // max_players is a u8, so anything below it fits
    Ok(player_index as PlayerIndex)
}

//! Room table: live game instances keyed by game type and room id
//!
//! The outer map has one slot per registered game type and is fixed when the
//! table is built. Each slot holds its own `RwLock`ed map of rooms, so room
//! creation in one game type never contends with lookups in another.
//!
//! Rooms are handed out as `Arc<Room>`. Closing a room only removes it from
//! the table; calls that already hold the `Arc` finish against the same
//! instance, which is dropped once the last of them returns.

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::erased::ErasedGame;
use crate::registry::EngineRegistry;
use crate::typed::PlayerIndex;

/// Longest accepted room id, in bytes
pub const MAX_ROOM_ID_LEN: usize = 128;

/// Errors that can occur during room operations
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("unknown game type '{0}'")]
    UnknownGameType(String),

    #[error("room '{room_id}' not found for game '{game_type}'")]
    RoomNotFound { game_type: String, room_id: String },

    #[error("invalid room id: {0}")]
    InvalidRoomId(String),

    /// The engine could not produce or initialize a fresh instance.
    #[error("could not start a '{game_type}' instance: {reason}")]
    Instantiate { game_type: String, reason: String },

    /// A game panicked while holding the instance lock.
    #[error("room '{room_id}' of game '{game_type}' is unusable after a game panic")]
    Poisoned { game_type: String, room_id: String },
}

/// Settings copied into every room at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// Maximum simultaneous players per room
    pub max_players: u8,
    /// Base seed for deterministic room RNGs; random per room when `None`
    pub rng_seed: Option<u64>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: 2,
            rng_seed: None,
        }
    }
}

/// One independent match of a game type
pub struct Room {
    game_type: String,
    room_id: String,
    max_players: u8,
    created_at: SystemTime,
    instance: RwLock<Box<dyn ErasedGame>>,
    seats: Mutex<Vec<bool>>,
}

/// Metadata snapshot of a room, without game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub player_count: usize,
    pub max_players: u8,
    pub created_unix_ms: u64,
}

impl Room {
    fn new(game_type: &str, room_id: &str, max_players: u8, instance: Box<dyn ErasedGame>) -> Self {
        Self {
            game_type: game_type.to_string(),
            room_id: room_id.to_string(),
            max_players,
            created_at: SystemTime::now(),
            instance: RwLock::new(instance),
            seats: Mutex::new(vec![false; max_players as usize]),
        }
    }

    pub fn game_type(&self) -> &str {
        &self.game_type
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn max_players(&self) -> u8 {
        self.max_players
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Number of seats currently taken
    pub fn player_count(&self) -> usize {
        self.lock_seats().iter().filter(|taken| **taken).count()
    }

    pub fn is_seated(&self, player: PlayerIndex) -> bool {
        self.lock_seats().get(player as usize).copied().unwrap_or(false)
    }

    /// Take seat `player`; returns `true` if it was free
    ///
    /// Callers validate `player < max_players` first.
    pub(crate) fn seat(&self, player: PlayerIndex) -> bool {
        match self.lock_seats().get_mut(player as usize) {
            Some(seat) if !*seat => {
                *seat = true;
                true
            }
            _ => false,
        }
    }

    /// Free seat `player`; returns `true` if it was taken
    pub(crate) fn unseat(&self, player: PlayerIndex) -> bool {
        match self.lock_seats().get_mut(player as usize) {
            Some(seat) if *seat => {
                *seat = false;
                true
            }
            _ => false,
        }
    }

    /// Shared access to the instance; concurrent with other readers only
    pub fn read_instance(&self) -> Result<RwLockReadGuard<'_, Box<dyn ErasedGame>>, RoomError> {
        self.instance.read().map_err(|_| self.poisoned())
    }

    /// Exclusive access to the instance; serializes all mutation of a room
    pub fn write_instance(&self) -> Result<RwLockWriteGuard<'_, Box<dyn ErasedGame>>, RoomError> {
        self.instance.write().map_err(|_| self.poisoned())
    }

    pub fn summary(&self) -> RoomSummary {
        let created_unix_ms = self
            .created_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        RoomSummary {
            room_id: self.room_id.clone(),
            player_count: self.player_count(),
            max_players: self.max_players,
            created_unix_ms,
        }
    }

    // Seat bookkeeping cannot be left half-written, so a poisoned lock is safe to reuse.
    fn lock_seats(&self) -> std::sync::MutexGuard<'_, Vec<bool>> {
        self.seats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poisoned(&self) -> RoomError {
        RoomError::Poisoned {
            game_type: self.game_type.clone(),
            room_id: self.room_id.clone(),
        }
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("game_type", &self.game_type)
            .field("room_id", &self.room_id)
            .field("max_players", &self.max_players)
            .field("player_count", &self.player_count())
            .finish_non_exhaustive()
    }
}

type RoomMap = HashMap<String, Arc<Room>>;

/// Mapping from game type to its rooms
pub struct RoomTable {
    engines: Arc<EngineRegistry>,
    rooms: HashMap<String, RwLock<RoomMap>>,
    settings: RoomSettings,
}

impl RoomTable {
    pub fn new(engines: Arc<EngineRegistry>, settings: RoomSettings) -> Self {
        for descriptor in engines.short_of_seats(settings.max_players) {
            tracing::warn!(
                game_type = descriptor.game_type(),
                seats = descriptor.capabilities().seats,
                max_players = settings.max_players,
                "rooms offer more seats than the game supports"
            );
        }

        let rooms = engines
            .game_types()
            .into_iter()
            .map(|game_type| (game_type, RwLock::new(RoomMap::new())))
            .collect();

        Self {
            engines,
            rooms,
            settings,
        }
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    pub fn settings(&self) -> RoomSettings {
        self.settings
    }

    /// Return the room, creating and initializing it on first reference
    ///
    /// The boolean is `true` when this call created the room. The existence
    /// check, construction, `init` and insert all happen under the game type's
    /// write lock, so concurrent callers with the same id get the same room and
    /// the instance is initialized exactly once.
    pub fn get_or_create(&self, game_type: &str, room_id: &str) -> Result<(Arc<Room>, bool), RoomError> {
        let slot = self.slot(game_type)?;
        validate_room_id(room_id)?;

        if let Some(room) = read_map(slot).get(room_id) {
            return Ok((Arc::clone(room), false));
        }

        let mut rooms = write_map(slot);
        let entry = match rooms.entry(room_id.to_string()) {
            Entry::Occupied(existing) => return Ok((Arc::clone(existing.get()), false)),
            Entry::Vacant(entry) => entry,
        };

        let mut instance = self.engines.create(game_type).ok_or_else(|| RoomError::Instantiate {
            game_type: game_type.to_string(),
            reason: "engine factory returned no instance".to_string(),
        })?;
        instance
            .init(self.seed_for(game_type, room_id))
            .map_err(|e| RoomError::Instantiate {
                game_type: game_type.to_string(),
                reason: e.to_string(),
            })?;

        let room = Arc::new(Room::new(game_type, room_id, self.settings.max_players, instance));
        entry.insert(Arc::clone(&room));

        tracing::info!(game_type, room_id, max_players = self.settings.max_players, "room created");
        Ok((room, true))
    }

    /// Look up an existing room; never creates
    pub fn find(&self, game_type: &str, room_id: &str) -> Result<Arc<Room>, RoomError> {
        let slot = self.slot(game_type)?;
        read_map(slot)
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::RoomNotFound {
                game_type: game_type.to_string(),
                room_id: room_id.to_string(),
            })
    }

    /// Remove a room from the table
    ///
    /// Returns the removed room so callers may inspect it; in-flight calls
    /// keep their own reference.
    pub fn close(&self, game_type: &str, room_id: &str) -> Result<Arc<Room>, RoomError> {
        let slot = self.slot(game_type)?;
        let removed = write_map(slot)
            .remove(room_id)
            .ok_or_else(|| RoomError::RoomNotFound {
                game_type: game_type.to_string(),
                room_id: room_id.to_string(),
            })?;

        tracing::info!(game_type, room_id, "room closed");
        Ok(removed)
    }

    /// Summaries of every room of `game_type`, ordered by room id
    pub fn list(&self, game_type: &str) -> Result<Vec<RoomSummary>, RoomError> {
        let slot = self.slot(game_type)?;
        let rooms: Vec<Arc<Room>> = read_map(slot).values().cloned().collect();

        let mut summaries: Vec<RoomSummary> = rooms.iter().map(|room| room.summary()).collect();
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Ok(summaries)
    }

    /// Number of live rooms of one game type
    pub fn count(&self, game_type: &str) -> Result<usize, RoomError> {
        Ok(read_map(self.slot(game_type)?).len())
    }

    /// Number of live rooms across all game types
    pub fn room_count(&self) -> usize {
        self.rooms.values().map(|slot| read_map(slot).len()).sum()
    }

    fn slot(&self, game_type: &str) -> Result<&RwLock<RoomMap>, RoomError> {
        self.rooms
            .get(game_type)
            .ok_or_else(|| RoomError::UnknownGameType(game_type.to_string()))
    }

    fn seed_for(&self, game_type: &str, room_id: &str) -> u64 {
        match self.settings.rng_seed {
            Some(base) => {
                let mut hasher = DefaultHasher::new();
                base.hash(&mut hasher);
                game_type.hash(&mut hasher);
                room_id.hash(&mut hasher);
                hasher.finish()
            }
            None => rand::random(),
        }
    }
}

impl std::fmt::Debug for RoomTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomTable")
            .field("game_types", &self.engines.game_types())
            .field("rooms", &self.room_count())
            .field("settings", &self.settings)
            .finish()
    }
}

pub fn validate_room_id(room_id: &str) -> Result<(), RoomError> {
    if room_id.is_empty() {
        return Err(RoomError::InvalidRoomId("room id is empty".to_string()));
    }
    if room_id.len() > MAX_ROOM_ID_LEN {
        return Err(RoomError::InvalidRoomId(format!(
            "room id is {} bytes, limit is {}",
            room_id.len(),
            MAX_ROOM_ID_LEN
        )));
    }
    Ok(())
}

// Map mutations are single calls on a HashMap and cannot leave it torn.
fn read_map(slot: &RwLock<RoomMap>) -> RwLockReadGuard<'_, RoomMap> {
    slot.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_map(slot: &RwLock<RoomMap>) -> RwLockWriteGuard<'_, RoomMap> {
    slot.write().unwrap_or_else(PoisonError::into_inner)
}

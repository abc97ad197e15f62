//! Typed Game trait providing ergonomic interface for game developers
//!
//! This trait allows game implementations to work with strongly-typed state
//! and move types while the adapter layer takes care of decoding raw player
//! payloads and producing opaque state snapshots for the server.

use rand_chacha::ChaCha20Rng;
use serde::Serialize;

/// Seat index of a player inside a room
pub type PlayerIndex = u8;

/// Engine identification information
#[derive(Debug, Clone, PartialEq)]
pub struct EngineId {
    pub game_id: String,
    pub build_id: String,
}

/// Game capabilities and configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub id: EngineId,
    /// Number of seats the rules are written for; rooms offering more
    /// seats than this log a warning at startup
    pub seats: u8,
}

/// Main trait for game implementations
///
/// Games implement this trait with their specific `Move` and `State` types.
/// The adapter owns the state between calls and hands it back on every move,
/// so a game value itself can stay stateless.
///
/// # Example
///
/// ```rust
/// # use gamehost_core::typed::*;
/// # use rand_chacha::ChaCha20Rng;
/// #[derive(Default)]
/// struct Counter;
///
/// impl Game for Counter {
///     type Move = u32;
///     type State = u32;
///
///     fn engine_id(&self) -> EngineId {
///         EngineId { game_id: "counter".into(), build_id: "0.1.0".into() }
///     }
///
///     fn capabilities(&self) -> Capabilities {
///         Capabilities {
///             id: self.engine_id(),
///             seats: 1,
///         }
///     }
///
///     fn init(&mut self, _rng: &mut ChaCha20Rng) -> u32 { 0 }
///
///     fn play(&mut self, state: &mut u32, _player: PlayerIndex, mv: u32, _rng: &mut ChaCha20Rng) -> Result<(), RuleViolation> {
///         *state += mv;
///         Ok(())
///     }
///
///     fn decode_move(buf: &[u8]) -> Result<u32, DecodeError> {
///         serde_json::from_slice(buf).map_err(|e| DecodeError::Malformed(e.to_string()))
///     }
/// }
/// ```
pub trait Game: Send + Sync + 'static {
    /// Move type decoded from a player's raw payload
    type Move: Send + 'static;

    /// Game state type, exposed to clients as a snapshot
    type State: Serialize + Send + Sync + 'static;

    /// Get engine identification information
    fn engine_id(&self) -> EngineId;

    /// Get game capabilities and configuration
    fn capabilities(&self) -> Capabilities;

    /// Build the initial state of a fresh match
    ///
    /// # Arguments
    ///
    /// * `rng` - Deterministic random number generator seeded for this room
    fn init(&mut self, rng: &mut ChaCha20Rng) -> Self::State;

    /// Apply one move made by `player`
    ///
    /// On error the state must be left exactly as it was before the call.
    fn play(
        &mut self,
        state: &mut Self::State,
        player: PlayerIndex,
        mv: Self::Move,
        rng: &mut ChaCha20Rng,
    ) -> Result<(), RuleViolation>;

    /// Decode a move from the raw payload bytes sent by a client
    fn decode_move(buf: &[u8]) -> Result<Self::Move, DecodeError>;

    /// Encode state into the self-describing snapshot handed to clients
    fn encode_state(state: &Self::State) -> Result<serde_json::Value, EncodeError> {
        serde_json::to_value(state).map_err(|e| EncodeError::SerializationError(e.to_string()))
    }
}

/// A move rejected by the game's rules
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct RuleViolation(pub String);

impl RuleViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error type for encoding operations
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to encode data: {0}")]
    SerializationError(String),
}

/// Error type for decoding operations
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("Invalid buffer length: expected {expected} but got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

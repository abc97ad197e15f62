//! Erased Game interface for runtime polymorphism
//!
//! This trait is the fixed capability contract every hosted game satisfies:
//! initialize, accept player input, report state. It carries no generics so
//! rooms can hold any registered game behind a `Box<dyn ErasedGame>`, whether
//! it was compiled into the server or loaded from a plugin library.

use crate::typed::{Capabilities, EngineId, PlayerIndex};

/// Opaque, self-describing snapshot of a game's state
///
/// The server passes this through to clients without looking inside it.
pub type GameState = serde_json::Value;

/// Runtime error for erased game operations
#[derive(Debug, thiserror::Error)]
pub enum ErasedGameError {
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Decoding error: {0}")]
    Decoding(String),
    #[error("{0}")]
    Rule(String),
    #[error("Game has not been initialized")]
    NotInitialized,
}

/// Erased game trait that works only with bytes and opaque snapshots
///
/// # Example Usage
///
/// ```rust
/// # use gamehost_core::erased::*;
/// fn first_move(game: &mut dyn ErasedGame) -> Result<GameState, ErasedGameError> {
///     game.init(42)?;
///     game.play(br#"{"position":4}"#, 0)?;
///     game.state()
/// }
/// ```
pub trait ErasedGame: Send + Sync + 'static {
    /// Get engine identification information
    fn engine_id(&self) -> EngineId;

    /// Get game capabilities and configuration
    fn capabilities(&self) -> Capabilities;

    /// Prepare a fresh match
    ///
    /// Called exactly once per room, right after the instance is constructed.
    fn init(&mut self, seed: u64) -> Result<(), ErasedGameError>;

    /// Apply a player's raw input
    ///
    /// # Arguments
    ///
    /// * `payload` - Opaque bytes, interpreted only by the game
    /// * `player` - Seat index of the player making the move
    ///
    /// # Errors
    ///
    /// Returns `ErasedGameError` if the payload cannot be decoded or the game
    /// rejects the move. The state is unchanged in either case.
    fn play(&mut self, payload: &[u8], player: PlayerIndex) -> Result<(), ErasedGameError>;

    /// Snapshot of the current state
    fn state(&self) -> Result<GameState, ErasedGameError>;
}

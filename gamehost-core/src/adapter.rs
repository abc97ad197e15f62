//! Adapter layer converting typed games to erased interface
//!
//! This module provides the `GameAdapter` struct that turns any typed `Game`
//! implementation into an `ErasedGame`: it owns the match state, decodes raw
//! payloads into moves, snapshots state on request and manages the room's
//! random number generator.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::erased::{ErasedGame, ErasedGameError, GameState};
use crate::typed::{Capabilities, EngineId, Game, PlayerIndex};

/// Adapter that converts typed games to erased interface
///
/// The adapter keeps the typed state between calls. It starts out
/// uninitialized; `init` seeds the RNG and builds the initial state, after
/// which `play` and `state` become available.
///
/// # Example
///
/// ```rust
/// # use gamehost_core::typed::*;
/// # use gamehost_core::adapter::GameAdapter;
/// # use gamehost_core::erased::ErasedGame;
/// # use rand_chacha::ChaCha20Rng;
/// # #[derive(Default)]
/// # struct MyGame;
/// # impl Game for MyGame {
/// #     type Move = u8;
/// #     type State = u32;
/// #     fn engine_id(&self) -> EngineId { EngineId { game_id: "my_game".into(), build_id: "0".into() } }
/// #     fn capabilities(&self) -> Capabilities { todo!() }
/// #     fn init(&mut self, _rng: &mut ChaCha20Rng) -> u32 { 0 }
/// #     fn play(&mut self, s: &mut u32, _p: PlayerIndex, m: u8, _rng: &mut ChaCha20Rng) -> Result<(), RuleViolation> { *s += m as u32; Ok(()) }
/// #     fn decode_move(buf: &[u8]) -> Result<u8, DecodeError> { buf.first().copied().ok_or(DecodeError::InvalidLength { expected: 1, actual: 0 }) }
/// # }
/// let mut erased_game: Box<dyn ErasedGame> = Box::new(GameAdapter::new(MyGame::default()));
///
/// erased_game.init(42).unwrap();
/// erased_game.play(&[3], 0).unwrap();
/// assert_eq!(erased_game.state().unwrap(), serde_json::json!(3));
/// ```
pub struct GameAdapter<T: Game> {
    game: T,
    state: Option<T::State>,
    rng: ChaCha20Rng,
}

impl<T: Game> GameAdapter<T> {
    /// Create a new adapter wrapping the given game
    ///
    /// The RNG is re-seeded when `init` runs.
    pub fn new(game: T) -> Self {
        Self {
            game,
            state: None,
            rng: ChaCha20Rng::seed_from_u64(0),
        }
    }

    /// Get a reference to the underlying game
    pub fn game(&self) -> &T {
        &self.game
    }

    /// Typed view of the current state, if initialized
    pub fn typed_state(&self) -> Option<&T::State> {
        self.state.as_ref()
    }

    /// Consume the adapter and return the underlying game
    pub fn into_inner(self) -> T {
        self.game
    }
}

impl<T: Game> ErasedGame for GameAdapter<T> {
    fn engine_id(&self) -> EngineId {
        self.game.engine_id()
    }

    fn capabilities(&self) -> Capabilities {
        self.game.capabilities()
    }

    fn init(&mut self, seed: u64) -> Result<(), ErasedGameError> {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
        self.state = Some(self.game.init(&mut self.rng));
        Ok(())
    }

    fn play(&mut self, payload: &[u8], player: PlayerIndex) -> Result<(), ErasedGameError> {
        let state = self.state.as_mut().ok_or(ErasedGameError::NotInitialized)?;

        let mv = T::decode_move(payload).map_err(|e| ErasedGameError::Decoding(e.to_string()))?;

        self.game
            .play(state, player, mv, &mut self.rng)
            .map_err(|violation| ErasedGameError::Rule(violation.0))
    }

    fn state(&self) -> Result<GameState, ErasedGameError> {
        let state = self.state.as_ref().ok_or(ErasedGameError::NotInitialized)?;
        T::encode_state(state).map_err(|e| ErasedGameError::Encoding(e.to_string()))
    }
}

//! TicTacToe game implementation for the gamehost server
//!
//! This crate provides a complete reference implementation of TicTacToe
//! demonstrating how to implement the Game trait for the host. Player 0 plays
//! X and moves first; player 1 plays O.
//!
//! Moves are JSON objects `{"position": n}` with `n` in `0..9`, counted row by
//! row from the top left.

use gamehost_core::registry::GameCatalog;
use gamehost_core::typed::{Capabilities, DecodeError, EngineId, Game, PlayerIndex, RuleViolation};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Catalog name used in `builtin:` source references
pub const CATALOG_NAME: &str = "tictactoe";

/// Winning positions (rows, columns, diagonals)
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Piece on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    fn of(player: PlayerIndex) -> Self {
        if player == 0 {
            Mark::X
        } else {
            Mark::O
        }
    }
}

/// How the game stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    InProgress,
    Won { winner: PlayerIndex },
    Draw,
}

/// TicTacToe game state
///
/// Serialized as-is for state queries:
/// `{"board":[...],"next_player":0,"outcome":{"status":"in_progress"}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct State {
    board: [Option<Mark>; 9],
    next_player: PlayerIndex,
    outcome: Outcome,
}

impl State {
    /// Create a new initial game state
    pub fn new() -> Self {
        Self {
            board: [None; 9],
            next_player: 0,
            outcome: Outcome::InProgress,
        }
    }

    pub fn board(&self) -> &[Option<Mark>; 9] {
        &self.board
    }

    pub fn next_player(&self) -> PlayerIndex {
        self.next_player
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Check if the game is over
    pub fn is_done(&self) -> bool {
        self.outcome != Outcome::InProgress
    }

    /// Get legal moves (empty positions)
    pub fn legal_moves(&self) -> Vec<u8> {
        if self.is_done() {
            return Vec::new();
        }

        (0..9u8).filter(|&pos| self.board[pos as usize].is_none()).collect()
    }

    /// Place the player's mark, leaving the state untouched on a rule violation
    pub fn make_move(&mut self, player: PlayerIndex, position: u8) -> Result<(), RuleViolation> {
        if self.is_done() {
            return Err(RuleViolation::new("game is over"));
        }
        if player != self.next_player {
            return Err(RuleViolation::new(format!(
                "not player {player}'s turn; player {} moves next",
                self.next_player
            )));
        }
        let cell = self
            .board
            .get_mut(position as usize)
            .ok_or_else(|| RuleViolation::new(format!("position {position} is off the board")))?;
        if cell.is_some() {
            return Err(RuleViolation::new(format!("position {position} is already taken")));
        }

        *cell = Some(Mark::of(player));
        self.outcome = Self::check_outcome(&self.board);
        if self.outcome == Outcome::InProgress {
            self.next_player = 1 - self.next_player;
        }
        Ok(())
    }

    fn check_outcome(board: &[Option<Mark>; 9]) -> Outcome {
        for [a, b, c] in LINES {
            if let Some(mark) = board[a] {
                if board[b] == Some(mark) && board[c] == Some(mark) {
                    let winner = if mark == Mark::X { 0 } else { 1 };
                    return Outcome::Won { winner };
                }
            }
        }

        // Board full but no winner
        if board.iter().all(Option::is_some) {
            return Outcome::Draw;
        }

        Outcome::InProgress
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// TicTacToe move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Place {
    pub position: u8,
}

/// TicTacToe game implementation
#[derive(Debug, Default)]
pub struct TicTacToe;

impl TicTacToe {
    /// Create a new TicTacToe game
    pub fn new() -> Self {
        Self
    }
}

impl Game for TicTacToe {
    type Move = Place;
    type State = State;

    fn engine_id(&self) -> EngineId {
        EngineId {
            game_id: CATALOG_NAME.to_string(),
            build_id: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            id: self.engine_id(),
            seats: 2,
        }
    }

    fn init(&mut self, _rng: &mut ChaCha20Rng) -> Self::State {
        State::new()
    }

    fn play(
        &mut self,
        state: &mut Self::State,
        player: PlayerIndex,
        mv: Self::Move,
        _rng: &mut ChaCha20Rng,
    ) -> Result<(), RuleViolation> {
        state.make_move(player, mv.position)
    }

    fn decode_move(buf: &[u8]) -> Result<Self::Move, DecodeError> {
        let mv: Place = serde_json::from_slice(buf).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if mv.position >= 9 {
            return Err(DecodeError::OutOfRange(format!(
                "position {} is outside 0..9",
                mv.position
            )));
        }
        Ok(mv)
    }
}

/// Add TicTacToe to a builtin catalog under [`CATALOG_NAME`]
pub fn register(catalog: &mut GameCatalog) {
    gamehost_core::register_game!(catalog, TicTacToe, CATALOG_NAME);
}

#[cfg(feature = "plugin")]
gamehost_core::export_game_plugin!(TicTacToe::new());

#[cfg(all(test, feature = "plugin"))]
mod plugin_tests {
    use super::*;
    use gamehost_core::plugin::PLUGIN_ABI_VERSION;

    #[test]
    fn test_exported_abi_version() {
        assert_eq!(gamehost_plugin_abi_version(), PLUGIN_ABI_VERSION);
    }

    #[test]
    fn test_exported_create_play_destroy() {
        let raw = gamehost_create_game();
        assert!(!raw.is_null());

        {
            let game = unsafe { &mut *raw };
            assert_eq!(game.engine_id().game_id, CATALOG_NAME);
            game.init(3).unwrap();
            game.play(br#"{"position": 4}"#, 0).unwrap();
            assert_eq!(game.state().unwrap()["board"][4], "X");
        }

        unsafe { gamehost_destroy_game(raw) };
    }

    #[test]
    fn test_destroy_ignores_null() {
        let null: *mut dyn gamehost_core::ErasedGame = std::ptr::null_mut::<gamehost_core::GameAdapter<TicTacToe>>();
        unsafe { gamehost_destroy_game(null) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamehost_core::{ErasedGame, ErasedGameError, GameAdapter};
    use proptest::prelude::*;

    fn started() -> GameAdapter<TicTacToe> {
        let mut game = GameAdapter::new(TicTacToe::new());
        game.init(0).unwrap();
        game
    }

    #[test]
    fn test_initial_state() {
        let state = State::new();
        assert_eq!(state.board, [None; 9]);
        assert_eq!(state.next_player, 0);
        assert_eq!(state.outcome, Outcome::InProgress);
        assert!(!state.is_done());
    }

    #[test]
    fn test_legal_moves() {
        let mut state = State::new();
        assert_eq!(state.legal_moves(), (0..9).collect::<Vec<_>>());

        state.make_move(0, 4).unwrap();
        let legal = state.legal_moves();
        assert_eq!(legal.len(), 8);
        assert!(!legal.contains(&4));
    }

    #[test]
    fn test_make_move() {
        let mut state = State::new();
        state.make_move(0, 4).unwrap();

        assert_eq!(state.board[4], Some(Mark::X));
        assert_eq!(state.next_player, 1);
        assert!(!state.is_done());
    }

    #[test]
    fn test_rejected_moves_leave_state_unchanged() {
        let mut state = State::new();
        state.make_move(0, 4).unwrap();
        let before = state;

        let taken = state.make_move(1, 4).unwrap_err();
        assert_eq!(taken.0, "position 4 is already taken");

        let out_of_turn = state.make_move(0, 0).unwrap_err();
        assert_eq!(out_of_turn.0, "not player 0's turn; player 1 moves next");

        assert!(state.make_move(1, 9).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_winning_game() {
        let mut state = State::new();

        // X wins with top row
        for (player, position) in [(0, 0), (1, 3), (0, 1), (1, 4), (0, 2)] {
            state.make_move(player, position).unwrap();
        }

        assert_eq!(state.outcome, Outcome::Won { winner: 0 });
        assert!(state.legal_moves().is_empty());
        assert_eq!(state.make_move(1, 8).unwrap_err().0, "game is over");
    }

    #[test]
    fn test_draw_game() {
        let mut state = State::new();

        // X O X / X O O / O X X
        for (player, position) in [(0, 0), (1, 1), (0, 2), (1, 4), (0, 3), (1, 5), (0, 7), (1, 6), (0, 8)] {
            state.make_move(player, position).unwrap();
        }

        assert_eq!(state.outcome, Outcome::Draw);
        assert!(state.is_done());
    }

    #[test]
    fn test_state_json_shape() {
        let game = started();
        let state = game.state().unwrap();

        assert_eq!(
            state,
            serde_json::json!({
                "board": [null, null, null, null, null, null, null, null, null],
                "next_player": 0,
                "outcome": {"status": "in_progress"}
            })
        );
    }

    #[test]
    fn test_play_through_adapter() {
        let mut game = started();
        game.play(br#"{"position": 4}"#, 0).unwrap();

        let state = game.state().unwrap();
        assert_eq!(state["board"][4], "X");
        assert_eq!(state["next_player"], 1);

        match game.play(br#"{"position": 4}"#, 1) {
            Err(ErasedGameError::Rule(msg)) => assert_eq!(msg, "position 4 is already taken"),
            other => panic!("Expected Rule error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_move() {
        assert_eq!(TicTacToe::decode_move(br#"{"position": 8}"#).unwrap(), Place { position: 8 });
        assert!(matches!(
            TicTacToe::decode_move(br#"{"position": 9}"#),
            Err(DecodeError::OutOfRange(_))
        ));
        assert!(matches!(TicTacToe::decode_move(b"4"), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            TicTacToe::decode_move(br#"{"position": 1, "extra": true}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_register_in_catalog() {
        let mut catalog = GameCatalog::new();
        register(&mut catalog);

        let factory = catalog.factory(CATALOG_NAME).unwrap();
        let game = factory();
        assert_eq!(game.engine_id().game_id, "tictactoe");
        assert_eq!(game.capabilities().seats, 2);
    }

    proptest! {
        #[test]
        fn prop_random_games_stay_consistent(positions in proptest::collection::vec(0u8..9, 0..20)) {
            let mut state = State::new();
            let mut placed = 0;

            for position in positions {
                let player = state.next_player;
                let before = state;
                match state.make_move(player, position) {
                    Ok(()) => placed += 1,
                    Err(_) => prop_assert_eq!(state, before),
                }
            }

            let filled = state.board.iter().filter(|c| c.is_some()).count();
            prop_assert_eq!(filled, placed);
            let xs = state.board.iter().filter(|c| **c == Some(Mark::X)).count();
            let os = filled - xs;
            prop_assert!(xs == os || xs == os + 1);
            if !state.is_done() {
                prop_assert_eq!(state.legal_moves().len(), 9 - filled);
            }
        }
    }
}

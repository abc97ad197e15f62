//! Core traits and types for the gamehost server
//!
//! This crate holds everything below the HTTP surface:
//! - `Game`: Typed trait for ergonomic game development
//! - `ErasedGame`: Runtime interface over JSON state and raw move payloads
//! - `GameAdapter`: Automatic conversion from typed to erased interface
//! - `EngineRegistry`: Game types resolved from builtins or plugin libraries
//! - `RoomTable`: Live rooms keyed by game type and room id
//! - `Dispatcher`: Init, update and state calls routed to rooms

pub mod adapter;
pub mod dispatcher;
pub mod erased;
pub mod plugin;
pub mod registry;
pub mod room;
pub mod typed;

// Re-export main types for convenience
pub use adapter::GameAdapter;
pub use dispatcher::{DispatchError, Dispatcher, InitAck};
pub use erased::{ErasedGame, ErasedGameError, GameState};
pub use registry::{EngineRegistry, GameCatalog, GameFactory, LoadError};
pub use room::{RoomError, RoomSettings, RoomSummary, RoomTable};
pub use typed::{Game, PlayerIndex};

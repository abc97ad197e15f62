//! Game engine registry
//!
//! Games reach the server in one of two ways: compiled into the binary and
//! listed in a [`GameCatalog`], or built as a shared library and loaded at
//! startup (see [`crate::plugin`]). Either way, every configured game type is
//! bound once to an [`EngineDescriptor`] by the [`EngineRegistryBuilder`]; the
//! resulting [`EngineRegistry`] is immutable and can be read from any thread
//! without locking.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::erased::ErasedGame;
use crate::plugin::PluginFactory;
use crate::typed::Capabilities;

/// Factory function type for compiled-in games
pub type GameFactory = fn() -> Box<dyn ErasedGame>;

/// Prefix marking a source reference that names a compiled-in game
pub const BUILTIN_SCHEME: &str = "builtin:";

/// Errors raised while binding game engines at startup
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid game type {0:?}: must be non-empty and contain only [A-Za-z0-9_-]")]
    InvalidGameType(String),
    #[error("game type '{0}' is registered more than once")]
    Duplicate(String),
    #[error("no compiled-in game named '{name}' (available: {available})")]
    UnknownBuiltin { name: String, available: String },
    #[error("plugin source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("failed to load plugin {}: {reason}", .path.display())]
    Library { path: PathBuf, reason: String },
    #[error("plugin {} does not export '{symbol}': {reason}", .path.display())]
    MissingSymbol { path: PathBuf, symbol: String, reason: String },
    #[error("plugin {} targets ABI version {found}, server expects {expected}", .path.display())]
    AbiMismatch { path: PathBuf, found: u32, expected: u32 },
    #[error("factory for '{0}' returned no game instance")]
    NullInstance(String),
}

/// Anything able to produce fresh game instances
///
/// Implemented for plain [`GameFactory`] function pointers and for
/// [`PluginFactory`]. A `None` means the factory broke its contract.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Option<Box<dyn ErasedGame>>;
}

impl EngineFactory for GameFactory {
    fn create(&self) -> Option<Box<dyn ErasedGame>> {
        Some(self())
    }
}

/// Statically linked table of compiled-in games, keyed by name
#[derive(Default, Clone)]
pub struct GameCatalog {
    factories: HashMap<String, GameFactory>,
}

impl GameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compiled-in game
    ///
    /// Registering the same name twice keeps the last factory.
    pub fn register(&mut self, name: impl Into<String>, factory: GameFactory) -> &mut Self {
        let name = name.into();
        if self.factories.contains_key(&name) {
            tracing::warn!(%name, "overriding existing catalog entry");
        }
        self.factories.insert(name, factory);
        self
    }

    pub fn factory(&self, name: &str) -> Option<GameFactory> {
        self.factories.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Sorted list of catalog names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Convenience macro for adding a `Default` game type to a catalog
///
/// # Example
///
/// ```ignore
/// register_game!(catalog, TicTacToe, "tictactoe");
/// ```
#[macro_export]
macro_rules! register_game {
    ($catalog:expr, $game_type:ty, $name:expr) => {{
        fn factory() -> Box<dyn $crate::erased::ErasedGame> {
            Box::new($crate::adapter::GameAdapter::new(<$game_type>::default()))
        }
        $catalog.register($name, factory as $crate::registry::GameFactory);
    }};
}

/// A game type bound to its constructor
#[derive(Clone)]
pub struct EngineDescriptor {
    game_type: String,
    source_ref: String,
    capabilities: Capabilities,
    factory: Arc<dyn EngineFactory>,
}

impl EngineDescriptor {
    pub fn game_type(&self) -> &str {
        &self.game_type
    }

    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    /// Capabilities reported by the probe instance at registration
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Construct a fresh, uninitialized game instance
    pub fn create(&self) -> Option<Box<dyn ErasedGame>> {
        self.factory.create()
    }
}

impl std::fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("game_type", &self.game_type)
            .field("source_ref", &self.source_ref)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Builds the engine registry during startup
pub struct EngineRegistryBuilder<'a> {
    catalog: &'a GameCatalog,
    engines: HashMap<String, EngineDescriptor>,
}

impl<'a> EngineRegistryBuilder<'a> {
    pub fn new(catalog: &'a GameCatalog) -> Self {
        Self {
            catalog,
            engines: HashMap::new(),
        }
    }

    /// Bind `game_type` to the engine found at `source_ref`
    ///
    /// The source is resolved and loaded right away and the factory is probed
    /// once, so any misconfiguration surfaces here instead of on the first
    /// request.
    pub fn register(&mut self, game_type: &str, source_ref: &str) -> Result<&EngineDescriptor, LoadError> {
        if !is_valid_game_type(game_type) {
            return Err(LoadError::InvalidGameType(game_type.to_string()));
        }
        if self.engines.contains_key(game_type) {
            return Err(LoadError::Duplicate(game_type.to_string()));
        }

        let factory: Arc<dyn EngineFactory> = match source_ref.strip_prefix(BUILTIN_SCHEME) {
            Some(name) => {
                let factory = self.catalog.factory(name).ok_or_else(|| LoadError::UnknownBuiltin {
                    name: name.to_string(),
                    available: self.catalog.names().join(", "),
                })?;
                Arc::new(factory)
            }
            None => Arc::new(PluginFactory::open(source_ref)?),
        };

        let probe = factory
            .create()
            .ok_or_else(|| LoadError::NullInstance(game_type.to_string()))?;
        let capabilities = probe.capabilities();
        drop(probe);

        tracing::info!(
            game_type,
            source_ref,
            game_id = %capabilities.id.game_id,
            build_id = %capabilities.id.build_id,
            "registered game engine"
        );

        let descriptor = EngineDescriptor {
            game_type: game_type.to_string(),
            source_ref: source_ref.to_string(),
            capabilities,
            factory,
        };
        Ok(&*self.engines.entry(game_type.to_string()).or_insert(descriptor))
    }

    pub fn build(self) -> EngineRegistry {
        EngineRegistry { engines: self.engines }
    }
}

/// Immutable mapping from game type to engine descriptor
#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: HashMap<String, EngineDescriptor>,
}

impl EngineRegistry {
    /// Register every `(game_type, source_ref)` pair, failing on the first error
    pub fn load<'s, I>(sources: I, catalog: &GameCatalog) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (&'s str, &'s str)>,
    {
        let mut builder = EngineRegistryBuilder::new(catalog);
        for (game_type, source_ref) in sources {
            builder.register(game_type, source_ref)?;
        }
        Ok(builder.build())
    }

    pub fn descriptor(&self, game_type: &str) -> Option<&EngineDescriptor> {
        self.engines.get(game_type)
    }

    pub fn contains(&self, game_type: &str) -> bool {
        self.engines.contains_key(game_type)
    }

    /// Create a fresh instance of `game_type`
    ///
    /// Returns `None` if the game type is unknown or its factory failed.
    pub fn create(&self, game_type: &str) -> Option<Box<dyn ErasedGame>> {
        self.engines.get(game_type).and_then(EngineDescriptor::create)
    }

    /// Engines whose rules are written for fewer than `max_players` seats,
    /// sorted by game type
    pub fn short_of_seats(&self, max_players: u8) -> Vec<&EngineDescriptor> {
        let mut short: Vec<&EngineDescriptor> = self
            .engines
            .values()
            .filter(|d| d.capabilities.seats < max_players)
            .collect();
        short.sort_by(|a, b| a.game_type.cmp(&b.game_type));
        short
    }

    /// Sorted list of registered game types
    pub fn game_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.engines.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

/// Game types end up as URL path segments
fn is_valid_game_type(game_type: &str) -> bool {
    !game_type.is_empty()
        && game_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

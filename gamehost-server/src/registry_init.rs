//! Engine registry initialization
//!
//! Builds the catalog of games compiled into this binary and binds every
//! configured game type to its engine source.

use gamehost_core::{EngineRegistry, GameCatalog, LoadError};

use crate::config::ServerConfig;

/// Catalog of every game linked into the server, addressable as `builtin:<name>`
pub fn builtin_catalog() -> GameCatalog {
    let mut catalog = GameCatalog::new();
    games_tictactoe::register(&mut catalog);
    catalog
}

/// Resolve all configured game types, failing on the first bad entry
pub fn load_engines(config: &ServerConfig, catalog: &GameCatalog) -> Result<EngineRegistry, LoadError> {
    let engines = EngineRegistry::load(config.game_sources(), catalog)?;

    tracing::info!(
        count = engines.len(),
        games = ?engines.game_types(),
        "engine registry loaded"
    );
    Ok(engines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameEntry;

    #[test]
    fn test_default_config_loads() {
        let engines = load_engines(&ServerConfig::default(), &builtin_catalog()).unwrap();
        assert_eq!(engines.game_types(), vec!["tic-tac-toe".to_string()]);
    }

    #[test]
    fn test_same_engine_under_two_names() {
        let mut config = ServerConfig::default();
        config.games.push(GameEntry {
            name: "ttt-ranked".to_string(),
            source: "builtin:tictactoe".to_string(),
        });

        let engines = load_engines(&config, &builtin_catalog()).unwrap();
        assert_eq!(engines.len(), 2);
    }

    #[test]
    fn test_bad_entry_fails_whole_load() {
        let mut config = ServerConfig::default();
        config.games.push(GameEntry {
            name: "chess".to_string(),
            source: "/definitely/missing/libchess.so".to_string(),
        });

        let err = load_engines(&config, &builtin_catalog()).unwrap_err();
        assert!(matches!(err, LoadError::SourceNotFound(_)));
    }
}

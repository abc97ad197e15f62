//! Shared-library game plugins
//!
//! A plugin is a `cdylib` exporting three symbols, normally generated with
//! [`export_game_plugin!`](crate::export_game_plugin):
//!
//! - `gamehost_plugin_abi_version() -> u32`
//! - `gamehost_create_game() -> *mut dyn ErasedGame`
//! - `gamehost_destroy_game(*mut dyn ErasedGame)`
//!
//! Trait objects cross the library boundary as-is, so plugins must be built
//! with the same compiler and the same `gamehost-core` version as the server.
//! The ABI version check catches the second mismatch, not the first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};

use crate::erased::{ErasedGame, ErasedGameError, GameState};
use crate::registry::{EngineFactory, LoadError};
use crate::typed::{Capabilities, EngineId, PlayerIndex};

/// Bumped whenever `ErasedGame` or the exported symbols change shape
pub const PLUGIN_ABI_VERSION: u32 = 1;

pub const ABI_VERSION_SYMBOL: &str = "gamehost_plugin_abi_version";
pub const CREATE_SYMBOL: &str = "gamehost_create_game";
pub const DESTROY_SYMBOL: &str = "gamehost_destroy_game";

/// Function types for plugin entry points
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;
#[allow(improper_ctypes_definitions)]
pub type CreateGameFn = unsafe extern "C" fn() -> *mut dyn ErasedGame;
#[allow(improper_ctypes_definitions)]
pub type DestroyGameFn = unsafe extern "C" fn(*mut dyn ErasedGame);

/// Constructor backed by a loaded plugin library
pub struct PluginFactory {
    path: PathBuf,
    create_fn: CreateGameFn,
    destroy_fn: DestroyGameFn,
    // Must outlive every instance created through `create_fn`
    library: Arc<Library>,
}

impl PluginFactory {
    /// Load the library at `path` and resolve its entry points
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(LoadError::SourceNotFound(path));
        }

        let library = unsafe {
            Library::new(&path).map_err(|e| LoadError::Library {
                path: path.clone(),
                reason: e.to_string(),
            })?
        };

        let version = {
            let abi_version: Symbol<AbiVersionFn> = lookup(&library, &path, ABI_VERSION_SYMBOL)?;
            unsafe { abi_version() }
        };
        check_abi_version(&path, version)?;

        let create_fn = *lookup::<CreateGameFn>(&library, &path, CREATE_SYMBOL)?;
        let destroy_fn = *lookup::<DestroyGameFn>(&library, &path, DESTROY_SYMBOL)?;

        tracing::debug!(path = %path.display(), "loaded game plugin");

        Ok(Self {
            path,
            create_fn,
            destroy_fn,
            library: Arc::new(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EngineFactory for PluginFactory {
    fn create(&self) -> Option<Box<dyn ErasedGame>> {
        let instance = unsafe { (self.create_fn)() };
        if instance.is_null() {
            tracing::error!(path = %self.path.display(), "plugin returned a null game instance");
            return None;
        }
        Some(Box::new(PluginGame {
            instance,
            destroy_fn: self.destroy_fn,
            _library: Arc::clone(&self.library),
        }))
    }
}

fn check_abi_version(path: &Path, found: u32) -> Result<(), LoadError> {
    if found != PLUGIN_ABI_VERSION {
        return Err(LoadError::AbiMismatch {
            path: path.to_path_buf(),
            found,
            expected: PLUGIN_ABI_VERSION,
        });
    }
    Ok(())
}

fn lookup<'lib, T>(library: &'lib Library, path: &Path, name: &str) -> Result<Symbol<'lib, T>, LoadError> {
    let mut symbol = Vec::with_capacity(name.len() + 1);
    symbol.extend_from_slice(name.as_bytes());
    symbol.push(0);

    unsafe {
        library.get(&symbol).map_err(|e| LoadError::MissingSymbol {
            path: path.to_path_buf(),
            symbol: name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Game instance allocated inside a plugin
///
/// Field order matters: the instance is destroyed in `Drop` before the
/// library handle is released.
struct PluginGame {
    instance: *mut dyn ErasedGame,
    destroy_fn: DestroyGameFn,
    _library: Arc<Library>,
}

// The pointee is `ErasedGame`, which is `Send + Sync`; the raw pointer is
// uniquely owned by this wrapper.
unsafe impl Send for PluginGame {}
unsafe impl Sync for PluginGame {}

impl PluginGame {
    fn inner(&self) -> &dyn ErasedGame {
        unsafe { &*self.instance }
    }

    fn inner_mut(&mut self) -> &mut dyn ErasedGame {
        unsafe { &mut *self.instance }
    }
}

impl ErasedGame for PluginGame {
    fn engine_id(&self) -> EngineId {
        self.inner().engine_id()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner().capabilities()
    }

    fn init(&mut self, seed: u64) -> Result<(), ErasedGameError> {
        self.inner_mut().init(seed)
    }

    fn play(&mut self, payload: &[u8], player: PlayerIndex) -> Result<(), ErasedGameError> {
        self.inner_mut().play(payload, player)
    }

    fn state(&self) -> Result<GameState, ErasedGameError> {
        self.inner().state()
    }
}

impl Drop for PluginGame {
    fn drop(&mut self) {
        unsafe { (self.destroy_fn)(self.instance) }
    }
}

/// Emit the plugin entry points for a typed `Game`
///
/// `$ctor` is evaluated on every instance creation.
///
/// ```ignore
/// gamehost_core::export_game_plugin!(TicTacToe::new());
/// ```
#[macro_export]
macro_rules! export_game_plugin {
    ($ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn gamehost_plugin_abi_version() -> u32 {
            $crate::plugin::PLUGIN_ABI_VERSION
        }

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn gamehost_create_game() -> *mut dyn $crate::erased::ErasedGame {
            let game: Box<dyn $crate::erased::ErasedGame> = Box::new($crate::adapter::GameAdapter::new($ctor));
            Box::into_raw(game)
        }

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn gamehost_destroy_game(game: *mut dyn $crate::erased::ErasedGame) {
            if !game.is_null() {
                drop(Box::from_raw(game));
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gamehost-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_source() {
        let result = PluginFactory::open("/no/such/dir/libnothing.so");
        assert!(matches!(result, Err(LoadError::SourceNotFound(_))));
    }

    #[test]
    fn test_directory_is_not_a_source() {
        let result = PluginFactory::open(std::env::temp_dir());
        assert!(matches!(result, Err(LoadError::SourceNotFound(_))));
    }

    #[test]
    fn test_non_library_file_fails_to_load() {
        let path = scratch_file("garbage.so", b"this is not a shared object");

        let result = PluginFactory::open(&path);
        std::fs::remove_file(&path).ok();

        match result {
            Err(LoadError::Library { path: failed, .. }) => assert_eq!(failed, path),
            Err(other) => panic!("Expected Library error, got {other}"),
            Ok(_) => panic!("garbage file loaded as a plugin"),
        }
    }

    #[test]
    fn test_abi_version_must_match() {
        let path = Path::new("/opt/games/libold.so");
        assert!(check_abi_version(path, PLUGIN_ABI_VERSION).is_ok());

        match check_abi_version(path, PLUGIN_ABI_VERSION + 1) {
            Err(LoadError::AbiMismatch { path: p, found, expected }) => {
                assert_eq!(p, path);
                assert_eq!(found, PLUGIN_ABI_VERSION + 1);
                assert_eq!(expected, PLUGIN_ABI_VERSION);
            }
            other => panic!("Expected AbiMismatch, got {other:?}"),
        }
    }

    // Any real shared library without the plugin exports will do.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_plugin_symbols() {
        let candidates = [
            "/lib/x86_64-linux-gnu/libc.so.6",
            "/lib/aarch64-linux-gnu/libc.so.6",
            "/usr/lib/x86_64-linux-gnu/libc.so.6",
            "/usr/lib64/libc.so.6",
            "/lib64/libc.so.6",
            "/usr/lib/libc.so.6",
        ];
        let Some(libc) = candidates.iter().map(Path::new).find(|p| p.is_file()) else {
            eprintln!("no system libc found, skipping");
            return;
        };

        match PluginFactory::open(libc) {
            Err(LoadError::MissingSymbol { symbol, .. }) => assert_eq!(symbol, ABI_VERSION_SYMBOL),
            Err(other) => panic!("Expected MissingSymbol, got {other}"),
            Ok(_) => panic!("libc loaded as a game plugin"),
        }
    }

    #[test]
    fn test_symbol_names_are_nul_free() {
        for name in [ABI_VERSION_SYMBOL, CREATE_SYMBOL, DESTROY_SYMBOL] {
            assert!(!name.contains('\0'));
        }
    }
}

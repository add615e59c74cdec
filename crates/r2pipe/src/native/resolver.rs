//! Process-wide loader for the engine's shared library.
//!
//! The library is searched for once along a fixed, platform-ordered list of
//! candidate paths. The first path that opens wins. Entry points are then
//! looked up by name and cached individually, so a missing symbol leaves the
//! library and any symbols already found in place for the next attempt.
//! Nothing is cached when no candidate opens.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use libloading::Library;
use once_cell::sync::{Lazy, OnceCell};
use tracing::debug;

use super::{
    CREATE_CONTEXT_SYMBOL, CoreApi, CreateContextFn, DESTROY_CONTEXT_SYMBOL, DestroyContextFn,
    EXECUTE_COMMAND_SYMBOL, ExecuteCommandFn, NATIVE_TARGET,
};
use crate::error::PipeError;

/// Library stem searched for by the dynamic transport.
pub const DEFAULT_LIBRARY: &str = "libr_core";

const SYSTEM_DIRECTORIES: &[&str] = &["/usr/lib", "/usr/local/lib", "/opt/homebrew/lib"];

const LINUX_MULTIARCH_DIRECTORIES: &[&str] = &[
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib/i386-linux-gnu",
    "/usr/lib64",
    "/usr/lib32",
];

/// Platform families with distinct library naming and search rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux, which adds multi-arch directories to the search.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
    /// Any other Unix-like system.
    OtherUnix,
}

impl Platform {
    /// The platform this crate was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::OtherUnix
        }
    }

    /// Native shared library extension, including the dot.
    #[must_use]
    pub const fn library_extension(self) -> &'static str {
        match self {
            Self::MacOs => ".dylib",
            Self::Windows => ".dll",
            Self::Linux | Self::OtherUnix => ".so",
        }
    }
}

/// Ordered candidate paths for `stem` on `platform`.
///
/// The bare file name comes first so the platform loader's own search path
/// is honoured, followed by the common system directories and, on Linux
/// only, the multi-arch directories.
#[must_use]
pub fn candidate_paths(stem: &str, platform: Platform) -> Vec<PathBuf> {
    let file_name = format!("{stem}{}", platform.library_extension());
    let multiarch: &[&str] = if platform == Platform::Linux {
        LINUX_MULTIARCH_DIRECTORIES
    } else {
        &[]
    };

    std::iter::once(PathBuf::from(&file_name))
        .chain(
            SYSTEM_DIRECTORIES
                .iter()
                .chain(multiarch)
                .map(|directory| Path::new(directory).join(&file_name)),
        )
        .collect()
}

/// Tries `open` on each candidate in order and returns the first success.
///
/// On failure every attempted path is returned so the caller can report it.
pub(crate) fn open_first<T, E, F>(candidates: &[PathBuf], mut open: F) -> Result<(T, PathBuf), Vec<PathBuf>>
where
    E: fmt::Display,
    F: FnMut(&Path) -> Result<T, E>,
{
    let mut attempted = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match open(candidate) {
            Ok(opened) => {
                debug!(
                    target: NATIVE_TARGET,
                    library = %candidate.display(),
                    "opened engine library"
                );
                return Ok((opened, candidate.clone()));
            }
            Err(error) => {
                debug!(
                    target: NATIVE_TARGET,
                    library = %candidate.display(),
                    %error,
                    "engine library candidate did not open"
                );
                attempted.push(candidate.clone());
            }
        }
    }
    Err(attempted)
}

#[cfg(unix)]
fn open_library(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    // SAFETY: loading the engine runs its initialisers, which are trusted.
    // Global binding lets the engine's own plugins resolve its symbols.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_library(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: loading the engine runs its initialisers, which are trusted.
    unsafe { Library::new(path) }
}

struct LoadedLibrary {
    library: Library,
    path: PathBuf,
}

/// Cached library handle and entry points.
///
/// Initialisation is serialised by the cells, so concurrent first use opens
/// the library once.
pub(crate) struct Resolver {
    stem: &'static str,
    library: OnceCell<LoadedLibrary>,
    create: OnceCell<CreateContextFn>,
    destroy: OnceCell<DestroyContextFn>,
    execute: OnceCell<ExecuteCommandFn>,
}

static GLOBAL_RESOLVER: Resolver = Resolver::new(DEFAULT_LIBRARY);

static NAMED_RESOLVERS: Lazy<Mutex<HashMap<String, &'static Resolver>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

impl Resolver {
    const fn new(stem: &'static str) -> Self {
        Self {
            stem,
            library: OnceCell::new(),
            create: OnceCell::new(),
            destroy: OnceCell::new(),
            execute: OnceCell::new(),
        }
    }

    /// The process-wide resolver for [`DEFAULT_LIBRARY`].
    pub(crate) fn global() -> &'static Self {
        &GLOBAL_RESOLVER
    }

    /// The process-wide resolver for `stem`, created on first request.
    ///
    /// Resolvers live for the rest of the process, like the libraries they
    /// load.
    pub(crate) fn for_library(stem: &str) -> &'static Self {
        if stem == DEFAULT_LIBRARY {
            return Self::global();
        }
        let mut resolvers = NAMED_RESOLVERS
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *resolvers.entry(stem.to_owned()).or_insert_with(|| {
            let stem: &'static str = Box::leak(stem.to_owned().into_boxed_str());
            Box::leak(Box::new(Self::new(stem)))
        })
    }

    /// Library stem this resolver searches for.
    pub(crate) fn stem(&self) -> &'static str {
        self.stem
    }

    /// Opens the library and resolves all entry points, reusing whatever an
    /// earlier call already cached. Calling it again after success is a
    /// cheap no-op.
    pub(crate) fn ensure_initialized(&'static self) -> Result<CoreApi, PipeError> {
        let loaded = self.library.get_or_try_init(|| self.load())?;
        self.resolve_entry_points(loaded)
    }

    /// Looks up each entry point not yet cached. A failed lookup keeps the
    /// ones found before it.
    fn resolve_entry_points<S: SymbolSource>(&self, source: &S) -> Result<CoreApi, PipeError> {
        let create = *self
            .create
            .get_or_try_init(|| source.lookup(CREATE_CONTEXT_SYMBOL))?;
        let destroy = *self
            .destroy
            .get_or_try_init(|| source.lookup(DESTROY_CONTEXT_SYMBOL))?;
        let execute = *self
            .execute
            .get_or_try_init(|| source.lookup(EXECUTE_COMMAND_SYMBOL))?;
        Ok(CoreApi {
            create,
            destroy,
            execute,
        })
    }

    /// Path of the opened library, once one has been opened.
    pub(crate) fn library_path(&self) -> Option<&Path> {
        self.library.get().map(|loaded| loaded.path.as_path())
    }

    fn load(&self) -> Result<LoadedLibrary, PipeError> {
        let candidates = candidate_paths(self.stem, Platform::current());
        let (library, path) =
            open_first(&candidates, open_library).map_err(|attempted| PipeError::LibraryNotFound {
                library: self.stem.to_owned(),
                attempted,
            })?;
        Ok(LoadedLibrary { library, path })
    }
}

/// Something entry points can be looked up in by name.
trait SymbolSource {
    fn lookup<T: Copy + 'static>(&self, symbol: &'static str) -> Result<T, PipeError>;
}

impl SymbolSource for LoadedLibrary {
    fn lookup<T: Copy + 'static>(&self, symbol: &'static str) -> Result<T, PipeError> {
        // SAFETY: `T` is the documented C signature of `symbol`, and loaded
        // libraries sit in process-wide cells so the pointer never dangles.
        let resolved = unsafe { self.library.get::<T>(symbol.as_bytes()) }.map_err(|source| {
            PipeError::SymbolNotFound {
                symbol,
                library: self.path.clone(),
                source: Arc::new(source),
            }
        })?;
        debug!(
            target: NATIVE_TARGET,
            symbol,
            library = %self.path.display(),
            "resolved engine entry point"
        );
        Ok(*resolved)
    }
}

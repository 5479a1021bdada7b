//! WebAssembly module compilation and caching.
//!
//! [`CompiledModule`] wraps a Wasmtime [`Module`] compiled from a file on
//! disk. [`ModuleCache`] optionally keeps compiled modules between calls.
//!
//! # Cache invalidation
//!
//! Entries are keyed by module path and carry the file length and
//! modification time seen at compile time. A lookup stats the file and
//! recompiles whenever either has changed, so replacing an artifact on disk
//! takes effect on the next call.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use dashmap::DashMap;
use tracing::{debug, info, instrument};
use wasmtime::{Engine, Module};

use fnhost_common::EngineError;

/// A compiled WebAssembly module.
///
/// Cloning is cheap; the compiled code is shared.
#[derive(Clone)]
pub struct CompiledModule {
    module: Module,

    /// Hash of the original module bytes.
    content_hash: String,

    compiled_at: Instant,
}

impl CompiledModule {
    /// Compile a module from bytes.
    ///
    /// Both binary modules and WAT text are accepted. `path` is only used in
    /// error messages.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, path: &str, bytes: &[u8]) -> Result<Self, EngineError> {
        let start = Instant::now();

        let module =
            Module::new(engine, bytes).map_err(|e| EngineError::compile(path, format!("{e:#}")))?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(Self {
            module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Read and compile the module at `path`.
    pub fn from_file(engine: &Engine, path: &Path) -> Result<Self, EngineError> {
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|source| EngineError::ReadModule {
            path: display.clone(),
            source,
        })?;

        Self::from_bytes(engine, &display, &bytes)
    }

    /// Hash of the original module bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// When this module was compiled.
    pub fn compiled_at(&self) -> Instant {
        self.compiled_at
    }

    /// The underlying Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.module
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// File identity used to detect a changed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self, EngineError> {
        let metadata = std::fs::metadata(path).map_err(|source| EngineError::ReadModule {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Compiled modules keyed by path.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: DashMap<PathBuf, (Fingerprint, CompiledModule)>,
}

impl ModuleCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached module for `path`, compiling it if absent or stale.
    pub fn get_or_compile(&self, engine: &Engine, path: &Path) -> Result<CompiledModule, EngineError> {
        let fingerprint = Fingerprint::of(path)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.0 == fingerprint {
                debug!(
                    path = %path.display(),
                    age_ms = entry.1.compiled_at().elapsed().as_millis(),
                    "Module cache hit"
                );
                return Ok(entry.1.clone());
            }
        }

        debug!(path = %path.display(), "Module cache miss");
        let compiled = CompiledModule::from_file(engine, path)?;
        self.entries
            .insert(path.to_path_buf(), (fingerprint, compiled.clone()));

        Ok(compiled)
    }

    /// Drop the entry for `path`.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

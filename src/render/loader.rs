//! Module loading strategies.
//!
//! Production loads the bundle once at startup and reuses it for the
//! process lifetime. Development recompiles the source tree whenever its
//! fingerprint changes, so edits show up on the next request.
//!
//! # Design Decisions
//! - The current build lives in an `ArcSwapOption`; readers never block
//! - A single rebuild runs at a time. Requests arriving during a rebuild
//!   get the previous build when there is one, otherwise they wait
//! - A failed rebuild keeps the last good build installed but reports the
//!   error for the request that triggered it

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::{Mode, RenderConfig};
use crate::observability::metrics;
use crate::render::bundle::{ServerBuild, FORMAT_VERSION};
use crate::render::compile::{compile, CompileError, SourceTree};
use crate::render::entry::RenderEntry;

/// Failure to produce a render entry.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read bundle {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bundle {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("bundle {path} has format version {found}, expected {expected}")]
    Incompatible {
        path: String,
        found: u32,
        expected: u32,
    },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("rebuild task failed: {0}")]
    Task(String),
}

/// Supplies the render entry for each request.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    fn mode(&self) -> Mode;

    /// The entry to render the current request with.
    async fn resolve(&self) -> Result<Arc<dyn RenderEntry>, LoadError>;
}

/// Pick the loader for `mode`.
///
/// Production reads the bundle here, so a broken bundle fails startup.
pub fn from_config(config: &RenderConfig, mode: Mode) -> Result<Arc<dyn ModuleLoader>, LoadError> {
    match mode {
        Mode::Production => Ok(Arc::new(StaticLoader::load(&config.bundle_path)?)),
        Mode::Development => Ok(Arc::new(DynamicLoader::new(&config.source_dir))),
    }
}

/// Loads the prebuilt bundle once.
pub struct StaticLoader {
    build: Arc<ServerBuild>,
}

impl StaticLoader {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: display.clone(),
            source,
        })?;
        let build: ServerBuild =
            serde_json::from_slice(&bytes).map_err(|source| LoadError::Corrupt {
                path: display.clone(),
                source,
            })?;
        if build.format_version != FORMAT_VERSION {
            return Err(LoadError::Incompatible {
                path: display,
                found: build.format_version,
                expected: FORMAT_VERSION,
            });
        }

        tracing::info!(
            bundle = %path.display(),
            routes = build.routes.len(),
            "Loaded server bundle"
        );
        Ok(Self {
            build: Arc::new(build),
        })
    }
}

#[async_trait]
impl ModuleLoader for StaticLoader {
    fn mode(&self) -> Mode {
        Mode::Production
    }

    async fn resolve(&self) -> Result<Arc<dyn RenderEntry>, LoadError> {
        Ok(self.build.clone())
    }
}

struct Snapshot {
    fingerprint: blake3::Hash,
    build: Arc<ServerBuild>,
}

/// Recompiles the source tree when it changes.
pub struct DynamicLoader {
    source_dir: PathBuf,
    current: ArcSwapOption<Snapshot>,
    rebuild: Mutex<()>,
}

impl DynamicLoader {
    pub fn new(source_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            current: ArcSwapOption::empty(),
            rebuild: Mutex::new(()),
        }
    }

    /// Read the tree and recompile if its fingerprint moved.
    async fn refresh(&self) -> Result<Arc<ServerBuild>, LoadError> {
        let previous = self.current.load_full();
        let source_dir = self.source_dir.clone();
        let known = previous.as_ref().map(|snapshot| snapshot.fingerprint);

        let start = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || {
            let tree = SourceTree::read(&source_dir)?;
            let fingerprint = tree.fingerprint();
            if known == Some(fingerprint) {
                return Ok(None);
            }
            compile(&tree).map(|build| Some((fingerprint, build)))
        })
        .await
        .map_err(|e| LoadError::Task(e.to_string()))?;

        match outcome {
            Ok(None) => match previous {
                Some(snapshot) => {
                    metrics::record_module_rebuild("reused");
                    Ok(snapshot.build.clone())
                }
                None => Err(LoadError::Task("no build installed".to_string())),
            },
            Ok(Some((fingerprint, build))) => {
                let build = Arc::new(build);
                self.current.store(Some(Arc::new(Snapshot {
                    fingerprint,
                    build: build.clone(),
                })));
                metrics::record_module_rebuild("compiled");
                tracing::info!(
                    source = %self.source_dir.display(),
                    routes = build.routes.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Rebuilt server modules"
                );
                Ok(build)
            }
            Err(e) => {
                metrics::record_module_rebuild("failed");
                tracing::error!(
                    source = %self.source_dir.display(),
                    error = %e,
                    "Server module rebuild failed"
                );
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ModuleLoader for DynamicLoader {
    fn mode(&self) -> Mode {
        Mode::Development
    }

    async fn resolve(&self) -> Result<Arc<dyn RenderEntry>, LoadError> {
        let _guard = match self.rebuild.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(snapshot) = self.current.load_full() {
                    tracing::debug!("Rebuild in progress, serving previous build");
                    return Ok(snapshot.build.clone());
                }
                self.rebuild.lock().await
            }
        };
        let build: Arc<dyn RenderEntry> = self.refresh().await?;
        Ok(build)
    }
}

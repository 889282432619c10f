//! Server-side rendering subsystem.
//!
//! # Data Flow
//! ```text
//! app/ source tree
//!     → compile.rs (route files → ranked ServerBuild)
//!     → bundle.rs (match path, render document + route body)
//!
//! Request:
//!     → renderer.rs (context from request parts)
//!     → loader.rs (production: bundle loaded once,
//!                  development: recompile when the tree changes)
//!     → entry.rs (RenderEntry::render)
//!     → HTML response
//! ```

pub mod bundle;
pub mod compile;
pub mod entry;
pub mod loader;
pub mod renderer;
pub mod template;

pub use bundle::ServerBuild;
pub use compile::{build_bundle, CompileError};
pub use entry::{RenderContext, RenderEntry, RenderError, RenderOutput};
pub use loader::{DynamicLoader, LoadError, ModuleLoader, StaticLoader};
pub use renderer::SsrRenderer;

//! Static asset subsystem.
//!
//! # Data Flow
//! ```text
//! GET/HEAD path (production only)
//!     → resolve.rs (decode, normalize, confine to root)
//!     → Found     → server.rs (ServeFile + Cache-Control) → 200/206/304
//!     → Forbidden → 403, logged as a security event
//!     → NotFound  → router falls through to rendering
//! ```

pub mod resolve;
pub mod server;

pub use resolve::{AssetLookup, ResolvedFile};
pub use server::StaticAssetServer;

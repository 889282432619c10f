//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (FrontController::decide)
//!         path under API prefix       → Proxy
//!         production, GET/HEAD, file  → StaticAsset(File)
//!         production, escapes root    → StaticAsset(Forbidden)
//!         otherwise                   → Render
//!     → matcher.rs (prefix and method primitives)
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input and filesystem state, same decision

pub mod matcher;
pub mod router;

pub use router::{Asset, FrontController, RoutingDecision};

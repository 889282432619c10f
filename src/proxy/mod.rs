//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! /api request
//!     → forward.rs (rewrite URI, sanitize headers)
//!     → pooled hyper client → upstream API
//!     → response streamed back, hop-by-hop headers removed
//!     → on failure: 502 Bad Gateway / 504 Gateway Timeout
//! ```

pub mod forward;

pub use forward::ReverseProxy;

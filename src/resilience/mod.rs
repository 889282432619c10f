//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce response-header deadline)
//!     → On failure: classify (504 timeout / 502 everything else)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No automatic retries; that policy belongs to the calling client

pub mod timeouts;

pub use timeouts::{with_deadline, UpstreamError};

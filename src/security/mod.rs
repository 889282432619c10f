//! Security subsystem.
//!
//! Header hygiene for proxied traffic. Asset path containment lives with
//! the asset server (`assets::resolve`).

pub mod headers;

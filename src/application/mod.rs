//! Application layer containing the request lifecycle orchestration.
//!
//! This module defines the `RequestCoordinator`, the single entry point through
//! which requests change state. It serializes work per request and per holder
//! with keyed `tokio` mutexes and hands every committed transition to the
//! injected event dispatcher.

pub mod config;
pub mod coordinator;
pub mod locks;

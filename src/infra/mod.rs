//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod identity;
pub mod memory_store;
pub mod network;
pub mod telemetry;

//! Client surface: request entry points, lifecycle orchestration, replay.
//!
//! Keep the public surface small and predictable. Implementation details
//! are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod execution;

pub use builder::ClientBuilder;
pub use core::Client;

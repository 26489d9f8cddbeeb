//! Shared building blocks for the Tern workspace.

pub mod error;
pub mod paths;
pub mod persist;

//! I/O helpers: configuration, prompt rendering, the generative service
//! client, and persistence of the file tree.

pub mod autosave;
pub mod config;
pub mod generative;
pub mod persistence;
pub mod prompt;

//! Deterministic, pure logic shared by the studio pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod artifact;
pub mod capability;
pub mod files;
pub mod generation;
pub mod history;
pub mod response;
pub mod rules;
pub mod tasks;
pub mod templates;
pub mod types;

//! Multi-stage agent orchestration for generated UI components.
//!
//! One user request is turned into up to three calls against a generative
//! service (architect, developer, qa). Each call is tracked as a task, results
//! are merged into a single editable artifact, and that artifact keeps a linear
//! undo/redo history. The crate is layered:
//!
//! - **[`core`]**: Pure, deterministic logic (rule tables, response parsing,
//!   task tracking, artifact history). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (HTTP calls, config, persistence,
//!   prompt rendering). Isolated behind traits to enable fakes in tests.
//!
//! Orchestration modules ([`session`], [`pipeline`], [`router`]) coordinate
//! core logic with I/O to implement a pipeline run; [`app`] and [`chat`] wire
//! them up for the CLI.

pub mod app;
pub mod chat;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod router;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

//! # versal
//!
//! HTTP API and CLI for the Versal puzzle hunt, on top of `versal-core`.
//!
//! The modules are exposed as a library so integration tests can drive the
//! router directly (via `versal::api::*`).

pub mod api;
pub mod cli;

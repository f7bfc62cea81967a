//! Shared test utilities for apiops integration tests.
//!
//! This module provides:
//! - `TestHarness` for runs against a temp artifact tree and a recording service
//! - `ScriptedHistory`, a commit history with canned change sets
//! - `CancelOnPut`, a remote wrapper that cancels the run mid-call

pub mod cancelling;
pub mod harness;
pub mod history;

pub use cancelling::CancelOnPut;
pub use harness::TestHarness;
pub use history::ScriptedHistory;

//! Core types and trait definitions for the Roll attendance tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alert;
pub mod attendance;
pub mod change;
pub mod error;
pub mod identity;
pub mod notification;
pub mod report;
pub mod schedule;
pub mod store;
pub mod subject;
pub mod tracker;

pub use error::{Error, Result};

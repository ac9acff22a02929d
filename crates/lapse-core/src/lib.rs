//! Core types and trait definitions for the Lapse training compliance engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the three rules every caller must agree on: how an expiry date is derived
//! from a completion date, how a record's status and dates may change
//! together, and which records a caller is allowed to see or touch.
//! [`engine::ComplianceEngine`] is the only entry point that composes them.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod course;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod record;
pub mod scope;
pub mod store;
pub mod transition;

pub use error::{Denial, Error, ErrorKind, Result};

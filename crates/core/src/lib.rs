//! Core business logic for civic-forum.
//!
//! [`engine`] holds the pure state transitions for votes, polls, petitions
//! and comment threads. [`services`] load state through the repositories,
//! run the engines and persist accepted outcomes.

pub mod engine;
pub mod services;

pub use services::*;

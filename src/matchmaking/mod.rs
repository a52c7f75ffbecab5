//! Matchmaking
//!
//! One FIFO pool per human-vs-human mode, plus immediate routing for practice
//! and bot races.

pub mod registry;

pub use registry::{EnqueueOutcome, MatchmakingRegistry, RegistryStats};

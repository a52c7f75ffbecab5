//! Race Room - real-time typing race coordinator
//!
//! This crate pairs players into two-person typing races over a line-framed
//! JSON protocol, drives each race's broadcast loop, applies the elimination
//! health and attack rules, and seats simulated bots as opponents.

pub mod bot;
pub mod config;
pub mod connection;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod protocol;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RaceError, Result};
pub use types::*;

// Re-export key components
pub use connection::{MemoryClient, Transport};
pub use content::{ContentSource, StaticContentSource};
pub use coordinator::Coordinator;
pub use protocol::Message;
pub use store::{InMemoryResultStore, MatchResult, ResultStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

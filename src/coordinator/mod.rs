//! Connection acceptance and the live-race set

pub mod active;
pub mod server;

pub use active::ActiveSessions;
pub use server::{Coordinator, CoordinatorStats, SHUTDOWN_REASON};

//! Outbound reporting of race results

pub mod results;

pub use results::{InMemoryResultStore, MatchResult, ResultStore};

#[cfg(test)]
pub use results::MockResultStore;

//! Word content for races

pub mod provider;

pub use provider::{ContentSource, StaticContentSource, WordDifficulty};

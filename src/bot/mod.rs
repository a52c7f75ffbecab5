//! Bot opponents
//!
//! A bot is a simulated participant driven by a target typing speed. It sits
//! in a race exactly like a human connection does.

pub mod difficulty;
pub mod simulator;

pub use difficulty::BotDifficulty;
pub use simulator::{jittered, word_delay, BotSimulator};

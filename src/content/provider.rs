//! Content source traits and implementations
//!
//! The coordinator only asks for word lists; how words are chosen belongs to
//! the content service. `StaticContentSource` is the built-in word bank used
//! when no external source is wired in.

use crate::error::{RaceError, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Difficulty bucket of a single word, by length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordDifficulty {
    Easy,
    Medium,
    Hard,
}

impl WordDifficulty {
    pub fn of(word: &str) -> Self {
        match word.chars().count() {
            0..=3 => WordDifficulty::Easy,
            4..=6 => WordDifficulty::Medium,
            _ => WordDifficulty::Hard,
        }
    }
}

/// Supplier of race words
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Words for one race, in typing order
    async fn word_list(&self, count: usize) -> Result<Vec<String>>;

    /// Hardest-difficulty words, used for attacks
    async fn hard_words(&self, count: usize) -> Result<Vec<String>>;
}

const WORD_BANK: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old",
    "see", "two", "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use",
    "about", "after", "again", "below", "could", "every", "first", "found", "great", "house",
    "large", "learn", "never", "other", "place", "plant", "point", "right", "small", "sound",
    "spell", "still", "study", "their", "there", "these", "thing", "think", "three", "water",
    "where", "which", "world", "would", "write", "answer", "around", "before", "change",
    "differ", "follow", "little", "mother", "number", "people", "picture", "should", "animal",
    "letter", "between", "country", "example", "through", "another", "because", "thought",
    "children", "important", "sentence", "something", "together", "question", "mountain",
    "keyboard", "language", "velocity", "exercise", "beautiful", "knowledge", "challenge",
    "interface", "algorithm", "procedure", "framework", "structure", "spectacular",
    "development", "environment", "performance", "temperature", "perspective",
    "concentrate", "independent", "comfortable", "opportunity", "vocabulary",
];

/// In-process word bank
#[derive(Debug, Clone)]
pub struct StaticContentSource {
    words: Vec<String>,
    hard: Vec<String>,
}

impl StaticContentSource {
    /// Create a source over the built-in word bank
    pub fn new() -> Self {
        Self::with_words(WORD_BANK.iter().map(|w| w.to_string()).collect())
    }

    /// Create a source over a custom word bank
    pub fn with_words(words: Vec<String>) -> Self {
        let hard = words
            .iter()
            .filter(|w| WordDifficulty::of(w) == WordDifficulty::Hard)
            .cloned()
            .collect();
        Self { words, hard }
    }

    fn sample(pool: &[String], count: usize, what: &str) -> Result<Vec<String>> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| {
                pool.choose(&mut rng).cloned().ok_or_else(|| {
                    RaceError::ContentUnavailable {
                        message: format!("no {} words available", what),
                    }
                    .into()
                })
            })
            .collect()
    }
}

impl Default for StaticContentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn word_list(&self, count: usize) -> Result<Vec<String>> {
        Self::sample(&self.words, count, "race")
    }

    async fn hard_words(&self, count: usize) -> Result<Vec<String>> {
        Self::sample(&self.hard, count, "hard")
    }
}

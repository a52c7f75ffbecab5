//! Utility functions for the race coordinator

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Sequential id source such as `P1`, `P2`, ...
///
/// Each owner keeps its own generator, so ids are unique per prefix and
/// there is no process-wide counter.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    /// Hand out the next id
    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_session_id();
        let id2 = generate_session_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_generator_sequence() {
        let ids = IdGenerator::new("P");
        assert_eq!(ids.next_id(), "P1");
        assert_eq!(ids.next_id(), "P2");
        assert_eq!(ids.issued(), 2);

        let bots = IdGenerator::new("BOT-");
        assert_eq!(bots.next_id(), "BOT-1");
    }
}

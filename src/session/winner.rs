//! Winner resolution by standings
//!
//! Standings are compared on words completed, then WPM, then accuracy; the
//! first level that differs decides. Identical standings are a tie. The same
//! rule applies to every mode.

use crate::types::Progress;
use std::cmp::Ordering;

/// The figures a race is decided on
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Standing {
    pub words_completed: u32,
    pub wpm: f64,
    pub accuracy: f64,
}

impl From<Option<&Progress>> for Standing {
    /// A participant that never reported ranks with all zeros
    fn from(progress: Option<&Progress>) -> Self {
        progress
            .map(|p| Standing {
                words_completed: p.words_completed,
                wpm: p.wpm,
                accuracy: p.accuracy,
            })
            .unwrap_or_default()
    }
}

/// The level of comparison that separated two standings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decider {
    Words,
    Wpm,
    Accuracy,
}

/// Outcome of comparing two seats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The seat at this index (0 or 1) won
    Winner { seat: usize, decider: Decider },
    Tie,
}

/// Numeric order, so `-0.0` equals `0.0`; NaN falls back to a total order
fn compare_figure(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Order two standings; `Greater` means `a` ranks higher
pub fn compare(a: &Standing, b: &Standing) -> Ordering {
    a.words_completed
        .cmp(&b.words_completed)
        .then_with(|| compare_figure(a.wpm, b.wpm))
        .then_with(|| compare_figure(a.accuracy, b.accuracy))
}

/// Decide between seat 0 (`a`) and seat 1 (`b`)
pub fn resolve(a: &Standing, b: &Standing) -> Verdict {
    let decider = if a.words_completed != b.words_completed {
        Decider::Words
    } else if compare_figure(a.wpm, b.wpm) != Ordering::Equal {
        Decider::Wpm
    } else if compare_figure(a.accuracy, b.accuracy) != Ordering::Equal {
        Decider::Accuracy
    } else {
        return Verdict::Tie;
    };

    let seat = match compare(a, b) {
        Ordering::Greater => 0,
        _ => 1,
    };
    Verdict::Winner { seat, decider }
}

/// Human-readable reason, winner's figures first
pub fn describe(decider: Decider, winner: &Standing, loser: &Standing) -> String {
    match decider {
        Decider::Words => format!(
            "Completed {} words vs {}",
            winner.words_completed, loser.words_completed
        ),
        Decider::Wpm => format!("Higher WPM: {:.1} vs {:.1}", winner.wpm, loser.wpm),
        Decider::Accuracy => format!(
            "Better accuracy: {:.1}% vs {:.1}%",
            winner.accuracy, loser.accuracy
        ),
    }
}

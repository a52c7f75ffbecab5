//! Race sessions
//!
//! This module contains the per-match state machine, the participant
//! capability it talks to, elimination health, winner resolution and the
//! launcher that turns a matched pair into a running session.

pub mod health;
pub mod launcher;
pub mod participant;
pub mod race;
pub mod state;
pub mod winner;

pub use health::{DamageOutcome, HealthState};
pub use launcher::SessionLauncher;
pub use participant::Participant;
pub use race::{RaceSession, SessionEvents, SessionHandle, SessionSummary};
pub use state::{EndReason, RaceState, SessionPhase};
pub use winner::{resolve, Standing, Verdict};

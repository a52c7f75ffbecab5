//! Player-facing wire protocol
//!
//! Messages are JSON objects, one per line, tagged by their `type` field.

pub mod codec;
pub mod message;

pub use codec::{decode, encode};
pub use message::{Message, TIE_WINNER_ID, WAITING_NOTICE};

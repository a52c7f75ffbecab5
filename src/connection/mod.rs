//! Player connections
//!
//! `channel` abstracts the line-framed transport; `handler` runs the message
//! loop of one connected player and seats it in races.

pub mod channel;
pub mod handler;

pub use channel::{FrameSink, FrameSource, MemoryClient, Transport};
pub use handler::{ConnectionContext, ConnectionHandler, ConnectionPeer, Handshake};

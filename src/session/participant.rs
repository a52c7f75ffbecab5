//! The capability every race seat needs
//!
//! A human connection and a simulated bot are seated the same way: the
//! session only ever delivers messages to a participant, and the participant
//! reports back through the `RaceSession` handle it is attached to.

use crate::error::Result;
use crate::protocol::Message;
use crate::session::SessionHandle;
use crate::types::ParticipantKind;
use async_trait::async_trait;

#[async_trait]
pub trait Participant: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn kind(&self) -> ParticipantKind;

    /// Queue a message for the participant. An error means the participant
    /// can no longer be reached and is treated as a disconnect.
    async fn deliver(&self, message: Message) -> Result<()>;

    /// Bind the participant to the session it was matched into. Called once
    /// per match, before the session starts sending.
    fn attach(&self, session: SessionHandle);
}

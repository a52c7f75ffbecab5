//! Newline-delimited JSON framing

use crate::error::{RaceError, Result};
use crate::protocol::message::Message;

/// Encode a message as one frame, without the trailing newline
pub fn encode(message: &Message) -> Result<String> {
    serde_json::to_string(message).map_err(|e| {
        RaceError::InternalError {
            message: format!("Failed to encode {}: {}", message.tag(), e),
        }
        .into()
    })
}

/// Decode one frame; surrounding whitespace is ignored
pub fn decode(frame: &str) -> Result<Message> {
    serde_json::from_str(frame.trim()).map_err(|e| {
        RaceError::InvalidMessage {
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode("{not json").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RaceError>(),
            Some(RaceError::InvalidMessage { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        assert!(decode(r#"{"type":"TELEPORT"}"#).is_err());
    }

    #[test]
    fn test_decode_tolerates_line_endings() {
        let msg = decode("{\"type\":\"DISCONNECT\"}\r\n").unwrap();
        assert_eq!(msg, Message::Disconnect);
    }

    #[test]
    fn test_encoded_frame_is_single_line() {
        let frame = encode(&Message::error("line\nbreak")).unwrap();
        assert!(!frame.contains('\n'));
        assert_eq!(decode(&frame).unwrap(), Message::error("line\nbreak"));
    }
}

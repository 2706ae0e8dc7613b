//! Opaque identifiers for messages and conversations.

use rand::Rng;
use uuid::Uuid;

const MESSAGE_ID_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Short random id for a single message. Only used for display and keying.
pub fn message_id() -> String {
    let mut rng = rand::thread_rng();
    (0..MESSAGE_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Random UUID v4 identifying one chat session to the remote assistant.
pub fn conversation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_message_id_shape() {
        let id = message_id();
        assert_eq!(id.len(), MESSAGE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_message_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| message_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_conversation_id_is_uuid_v4() {
        let id = conversation_id();
        let parsed = Uuid::parse_str(&id).expect("conversation id should parse as a uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(id, conversation_id());
    }
}

//! Stable card identity derived from immutable message attributes.
//!
//! Every create/update call for one job is addressed by the same
//! [`CardKey`], so repeated progress updates land on a single card.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::message::IncomingMessage;

/// SHA-256 hex digest identifying the reply card of one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardKey(String);

impl CardKey {
    /// Derive the key from sender, sender corp, conversation and message
    /// ids. Each field is length-prefixed before hashing so that no two
    /// distinct tuples produce the same digest input.
    pub fn derive(message: &IncomingMessage) -> Self {
        let mut hasher = Sha256::new();
        for field in [
            &message.sender_id,
            &message.sender_corp_id,
            &message.conversation_id,
            &message.message_id,
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, corp: &str, conversation: &str, id: &str) -> IncomingMessage {
        IncomingMessage {
            sender_id: sender.into(),
            sender_corp_id: corp.into(),
            conversation_id: conversation.into(),
            message_id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn identical_messages_share_a_key() {
        let m = message("u1", "c1", "conv1", "msg1");
        assert_eq!(CardKey::derive(&m), CardKey::derive(&m.clone()));
        assert_eq!(CardKey::derive(&m).as_str().len(), 64);
    }

    #[test]
    fn any_differing_field_changes_the_key() {
        let base = CardKey::derive(&message("u1", "c1", "conv1", "msg1"));
        assert_ne!(base, CardKey::derive(&message("u2", "c1", "conv1", "msg1")));
        assert_ne!(base, CardKey::derive(&message("u1", "c2", "conv1", "msg1")));
        assert_ne!(base, CardKey::derive(&message("u1", "c1", "conv2", "msg1")));
        assert_ne!(base, CardKey::derive(&message("u1", "c1", "conv1", "msg2")));
    }

    #[test]
    fn shifted_boundaries_do_not_collide() {
        let a = CardKey::derive(&message("a_b", "c", "d", "e"));
        let b = CardKey::derive(&message("a", "b_c", "d", "e"));
        assert_ne!(a, b);
    }

    #[test]
    fn unrelated_fields_do_not_affect_the_key() {
        let mut m = message("u1", "c1", "conv1", "msg1");
        let before = CardKey::derive(&m);
        m.text.content = "different prompt".into();
        m.sender_nick = "Bob".into();
        assert_eq!(before, CardKey::derive(&m));
    }
}

//! Identifiers for groups, senders, and their ratchets.
//!
//! A ratchet is addressed by the pair (group, sender). The pair is a proper
//! composite key: equality and hashing compare both components separately,
//! so `("ab", "c")` and `("a", "bc")` never collide.

use std::fmt;

/// Identifier of a group conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(String);

impl GroupId {
    /// Wrap a group identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a message sender (device public key or similar).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SenderIdentity(String);

impl SenderIdentity {
    /// Wrap a sender identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of one sender-key ratchet: a sender within a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SenderKeyId {
    /// Group the ratchet belongs to
    pub group: GroupId,
    /// Sender owning the ratchet
    pub sender: SenderIdentity,
}

impl SenderKeyId {
    /// Address the ratchet of `sender` in `group`.
    pub fn new(group: GroupId, sender: SenderIdentity) -> Self {
        Self { group, sender }
    }
}

impl fmt::Display for SenderKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.sender)
    }
}

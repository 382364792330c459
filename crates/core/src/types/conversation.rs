//! Conversation identifiers.

use core::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Identifier of one chat conversation.
///
/// Conversations live only for the duration of a browser session, so the id
/// needs to be locally unambiguous rather than globally unique: a millisecond
/// timestamp plus a short random base36 suffix (`conv_1718000000000_k3j9x0a2b`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Length of the random suffix.
    pub const SUFFIX_LEN: usize = 9;

    /// Generate a fresh conversation id from the current time.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(chrono::Utc::now().timestamp_millis(), &mut rand::rng())
    }

    /// Generate a conversation id for a given timestamp and random source.
    #[must_use]
    pub fn generate_at(timestamp_millis: i64, rng: &mut impl Rng) -> Self {
        const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

        let suffix: String = (0..Self::SUFFIX_LEN)
            .map(|_| {
                let idx = rng.random_range(0..BASE36.len());
                BASE36.get(idx).map_or('0', |&b| char::from(b))
            })
            .collect();

        Self(format!("conv_{timestamp_millis}_{suffix}"))
    }

    /// Wrap an id supplied by a client.
    #[must_use]
    pub fn from_client(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

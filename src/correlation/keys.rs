//! Type-safe store key builders
//!
//! Every backend stores outcomes under the same key, so an id accepted by
//! one backend is accepted by all of them.

use super::error::{StoreError, StoreResult};
use sha2::{Digest, Sha256};
use std::fmt;

pub const VERSION: &str = "v1";
pub const NAMESPACE: &str = "payflow";

/// Ids longer than this are stored under their SHA-256 digest.
const MAX_INLINE_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutcomeKey {
    segment: String,
}

impl OutcomeKey {
    /// Builds the key for a correlation id. Only an empty id is refused;
    /// long ids and ids with whitespace or control characters are hashed.
    pub fn new(correlation_id: impl AsRef<str>) -> StoreResult<Self> {
        let correlation_id = correlation_id.as_ref();
        if correlation_id.is_empty() {
            return Err(StoreError::KeyError("correlation id is empty".to_string()));
        }

        let needs_hash = correlation_id.len() > MAX_INLINE_ID_LEN
            || correlation_id
                .chars()
                .any(|c| c.is_whitespace() || c.is_control());
        let segment = if needs_hash {
            let mut hasher = Sha256::new();
            hasher.update(correlation_id.as_bytes());
            format!("sha256:{:x}", hasher.finalize())
        } else {
            correlation_id.to_string()
        };

        Ok(Self { segment })
    }
}

impl fmt::Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:outcome:{}", VERSION, NAMESPACE, self.segment)
    }
}

//! Checksums for exported descriptors

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn of_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Checksum of a serializable value's compact JSON form.
    ///
    /// `serde_json` objects keep keys sorted, so equal values hash equally.
    pub fn of_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_vec(&serde_json::to_value(value)?)?;
        Ok(Self::of_bytes(&canonical))
    }

    /// Combine several checksums into one, order-sensitive
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a Checksum>) -> Self {
        let joined = parts
            .into_iter()
            .map(|c| c.0.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Self::of_bytes(joined.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Blake3 fingerprints of source text
//!
//! Ledger records carry the hex form of [`ContentHash`]; the correction
//! loop compares fingerprints to spot a repair that changed nothing.

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Fingerprint of a source string
    #[inline]
    #[must_use]
    pub fn of_source(source: &str) -> Self {
        Self::compute(source.as_bytes())
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Entropy carried by a staging key, in bytes (160 bits).
pub const STAGING_KEY_BYTES: usize = 20;

/// Length of a staging key's string form.
pub const STAGING_KEY_LEN: usize = STAGING_KEY_BYTES * 2;

/// Opaque handle for content sitting in the staging zone.
///
/// Keys are lowercase hex, so they are safe as a path segment and cannot
/// reach outside `tmp/`. A key has no relationship to the content it names;
/// it only exists to keep concurrent uploads apart until their identifier is
/// known. Knowing a key is enough to commit or discard the staged object, so
/// keys must come from a [`KeyGenerator`] backed by a strong random source.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StagingKey(String);

impl StagingKey {
    /// Validate and wrap a key received from a caller.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != STAGING_KEY_LEN {
            return Err(TypeError::InvalidStagingKey(format!(
                "expected {STAGING_KEY_LEN} characters, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(TypeError::InvalidStagingKey(
                "expected lowercase hex characters".into(),
            ));
        }
        Ok(Self(s.to_owned()))
    }

    fn from_entropy(bytes: &[u8; STAGING_KEY_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys are capabilities; keep them out of debug output.
        write!(f, "StagingKey({}..)", &self.0[..8])
    }
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StagingKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StagingKey> for String {
    fn from(key: StagingKey) -> Self {
        key.0
    }
}

/// Source of fresh staging keys.
pub trait KeyGenerator: Send + Sync {
    /// Produce a key that has never been returned before.
    fn generate(&self) -> StagingKey;
}

/// Key generator backed by the operating system's CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> StagingKey {
        let mut bytes = [0u8; STAGING_KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        StagingKey::from_entropy(&bytes)
    }
}

/// Deterministic generator for tests. Keys are predictable; never use it
/// outside tests.
#[derive(Debug, Default)]
pub struct SequentialKeyGenerator {
    next: AtomicU64,
}

impl SequentialKeyGenerator {
    /// Start counting at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl KeyGenerator for SequentialKeyGenerator {
    fn generate(&self) -> StagingKey {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        StagingKey(format!("{n:0width$x}", width = STAGING_KEY_LEN))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn random_keys_have_expected_shape() {
        let key = RandomKeyGenerator.generate();
        assert_eq!(key.as_str().len(), STAGING_KEY_LEN);
        assert!(StagingKey::parse(key.as_str()).is_ok());
    }

    #[test]
    fn random_keys_are_unique() {
        let keys: HashSet<_> = (0..1000).map(|_| RandomKeyGenerator.generate()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn sequential_keys_are_deterministic() {
        let a = SequentialKeyGenerator::starting_at(7);
        let b = SequentialKeyGenerator::starting_at(7);
        assert_eq!(a.generate(), b.generate());
        assert_eq!(a.generate().as_str(), format!("{:040x}", 8));
    }

    #[test]
    fn sequential_keys_parse() {
        let key = SequentialKeyGenerator::default().generate();
        assert_eq!(StagingKey::parse(key.as_str()).unwrap(), key);
    }

    #[test]
    fn parse_rejects_path_traversal() {
        let evil = format!("../blocks/{}", "a".repeat(STAGING_KEY_LEN - 10));
        assert!(StagingKey::parse(&evil).is_err());
    }

    #[test]
    fn parse_rejects_uppercase_and_wrong_length() {
        assert!(StagingKey::parse(&"A".repeat(STAGING_KEY_LEN)).is_err());
        assert!(StagingKey::parse("abcd").is_err());
        assert!(StagingKey::parse("").is_err());
    }

    #[test]
    fn debug_hides_most_of_the_key() {
        let key = RandomKeyGenerator.generate();
        let debug = format!("{key:?}");
        assert!(!debug.contains(key.as_str()));
        assert!(debug.contains(&key.as_str()[..8]));
    }

    #[test]
    fn serde_roundtrip() {
        let key = RandomKeyGenerator.generate();
        let json = serde_json::to_string(&key).unwrap();
        let parsed: StagingKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
        assert!(serde_json::from_str::<StagingKey>("\"../../etc\"").is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_hex_keys_of_right_length_parse(s in "[0-9a-f]{40}") {
            let key = StagingKey::parse(&s)?;
            prop_assert_eq!(key.as_str(), s.as_str());
        }

        #[test]
        fn prop_other_lengths_fail(s in "[0-9a-f]{0,39}|[0-9a-f]{41,80}") {
            prop_assert!(StagingKey::parse(&s).is_err());
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Multibase prefix for lowercase base16.
const MULTIBASE_BASE16: char = 'f';

/// Digest length in bytes for every supported algorithm.
pub const DIGEST_LEN: usize = 32;

/// Hash function a [`ContentId`] was computed with.
///
/// Codes follow the multihash table so the identifier string can be decoded
/// by anything that understands multihash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    /// BLAKE3 with 256-bit output (multihash code `0x1e`).
    Blake3,
}

impl HashAlgorithm {
    /// Multihash code for this algorithm.
    pub fn code(&self) -> u64 {
        match self {
            Self::Blake3 => 0x1e,
        }
    }

    /// Look up an algorithm by multihash code.
    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x1e => Ok(Self::Blake3),
            other => Err(TypeError::UnsupportedAlgorithm(other)),
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
        }
    }

    /// Digest `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        match self {
            Self::Blake3 => *blake3::hash(data).as_bytes(),
        }
    }
}

/// Incremental hashing for content read in chunks.
///
/// Produces the same identifier as [`ContentId::compute`] over the
/// concatenation of every chunk passed to [`update`](Self::update).
#[derive(Clone)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
    inner: blake3::Hasher,
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let inner = match algorithm {
            HashAlgorithm::Blake3 => blake3::Hasher::new(),
        };
        Self { algorithm, inner }
    }

    /// Feed the next chunk.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Identifier of everything fed so far.
    pub fn finalize(&self) -> ContentId {
        ContentId::from_digest(self.algorithm, *self.inner.finalize().as_bytes())
    }
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHasher")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-describing content identifier.
///
/// A `ContentId` names blob content by its digest together with the hash
/// function that produced it. Equal bytes always yield equal identifiers
/// under the same algorithm. The canonical string form is the multibase
/// base16 encoding of the multihash (`f` + hex of `code || length || digest`),
/// which is stable and safe to use as a path segment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId {
    algorithm: HashAlgorithm,
    digest: [u8; DIGEST_LEN],
}

impl ContentId {
    /// Compute a `ContentId` for `data` with the given algorithm.
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(data),
        }
    }

    /// Compute a BLAKE3 `ContentId` for `data`.
    pub fn blake3(data: &[u8]) -> Self {
        Self::compute(HashAlgorithm::Blake3, data)
    }

    /// Create a `ContentId` from a pre-computed digest.
    pub fn from_digest(algorithm: HashAlgorithm, digest: [u8; DIGEST_LEN]) -> Self {
        Self { algorithm, digest }
    }

    /// The hash function this identifier was computed with.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest.
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Returns `true` if `data` hashes to this identifier.
    pub fn matches(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == self.digest
    }

    /// Multihash bytes: `code || length || digest`.
    pub fn to_multihash(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + DIGEST_LEN);
        // Every supported code and length is below 0x80, so each varint is one byte.
        out.push(self.algorithm.code() as u8);
        out.push(DIGEST_LEN as u8);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Short hex representation of the digest (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.digest[..4])
    }

    /// Parse from the canonical string form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let mut chars = s.chars();
        match chars.next() {
            Some(MULTIBASE_BASE16) => {}
            other => {
                return Err(TypeError::InvalidPrefix {
                    expected: MULTIBASE_BASE16,
                    actual: other,
                })
            }
        }
        let bytes = hex::decode(chars.as_str()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() < 2 {
            return Err(TypeError::InvalidLength {
                expected: 2 + DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0] & 0x80 != 0 {
            return Err(TypeError::UnsupportedAlgorithm(u64::from(bytes[0])));
        }
        let algorithm = HashAlgorithm::from_code(u64::from(bytes[0]))?;
        let declared = usize::from(bytes[1]);
        let digest_bytes = &bytes[2..];
        if declared != DIGEST_LEN || digest_bytes.len() != DIGEST_LEN {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_LEN,
                actual: digest_bytes.len(),
            });
        }
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(digest_bytes);
        Ok(Self { algorithm, digest })
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({}:{})", self.algorithm, self.short_hex())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MULTIBASE_BASE16}{}", hex::encode(self.to_multihash()))
    }
}

impl FromStr for ContentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

//! Domain-separated Blake3 hashing.
//!
//! Every digest that enters a commitment or a signed message is prefixed with
//! a purpose tag of the form `quorum:<purpose>:v1\0`. Two digests computed for
//! different purposes can therefore never collide, even over identical
//! payload bytes.

use subtle::ConstantTimeEq;

/// Size of a Blake3 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte hash.
pub type Hash = [u8; HASH_SIZE];

/// The all-zero hash.
pub const ZERO_HASH: Hash = [0u8; HASH_SIZE];

/// Purpose tags for domain-separated hashing.
///
/// The byte strings are part of the commitment format: changing any of them
/// invalidates every root and signature produced under the old tag.
pub mod domain {
    /// Registry leaf for a populated approver slot.
    pub const APPROVER_LEAF: &[u8] = b"quorum:approver_leaf:v1\0";
    /// Registry leaf for an unused approver slot.
    pub const EMPTY_APPROVER: &[u8] = b"quorum:empty_approver:v1\0";
    /// Internal registry tree node.
    pub const REGISTRY_NODE: &[u8] = b"quorum:registry_node:v1\0";
    /// Canonical action digest (the message approvers sign).
    pub const ACTION: &[u8] = b"quorum:action:v1\0";
    /// Authorization data bound into a permit.
    pub const AUTH_DATA: &[u8] = b"quorum:auth_data:v1\0";
    /// Message approvers sign for a permit.
    pub const PERMIT: &[u8] = b"quorum:permit:v1\0";
    /// Registry state version digest.
    pub const REGISTRY_VERSION: &[u8] = b"quorum:registry_version:v1\0";
}

/// Hashes `segments` under the given domain tag.
///
/// The digest is `blake3(domain || segments[0] || segments[1] || ...)`.
#[must_use]
pub fn hash_with_domain(domain: &[u8], segments: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    for segment in segments {
        hasher.update(segment);
    }
    *hasher.finalize().as_bytes()
}

/// Hashes raw content without a domain tag.
///
/// Only for fingerprints that never enter a commitment (log fields, file
/// digests).
#[must_use]
pub fn hash_content(content: &[u8]) -> Hash {
    *blake3::hash(content).as_bytes()
}

/// Constant-time hash equality.
#[must_use]
pub fn hashes_equal(a: &Hash, b: &Hash) -> bool {
    bool::from(a[..].ct_eq(&b[..]))
}

/// Short hex prefix of a hash for log fields.
#[must_use]
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}

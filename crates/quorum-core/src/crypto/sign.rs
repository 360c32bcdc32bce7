//! Ed25519 identities, signatures and verification.

use std::fmt;

use ed25519_dalek::Signer as _;
use serde::{Deserialize, Serialize};

use crate::encoding::{HexError, decode_fixed, hex32, hex64};

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Public identity of an approver or account: the raw Ed25519 public key.
///
/// The all-zero identity is the empty-approver sentinel. It is rejected as a
/// registry member and as an action subject, and it never verifies a
/// signature, so padding slots cannot be forged into real approvals.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(#[serde(with = "hex32")] [u8; PUBLIC_KEY_SIZE]);

impl Identity {
    /// The empty-approver sentinel.
    pub const EMPTY: Self = Self([0u8; PUBLIC_KEY_SIZE]);

    /// Wrap raw public key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Whether this is the empty-approver sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; PUBLIC_KEY_SIZE]
    }

    /// Parse from hex text.
    ///
    /// # Errors
    ///
    /// Returns [`HexError`] if the text is not 32 bytes of hex.
    pub fn from_hex(text: &str) -> Result<Self, HexError> {
        decode_fixed::<PUBLIC_KEY_SIZE>(text).map(Self)
    }

    /// Lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Detached Ed25519 signature bytes.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureBytes(#[serde(with = "hex64")] [u8; SIGNATURE_SIZE]);

impl SignatureBytes {
    /// The all-zero signature carried by padding entries.
    pub const EMPTY: Self = Self([0u8; SIGNATURE_SIZE]);

    /// Wrap raw signature bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw signature bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({}..)", hex::encode(&self.0[..8]))
    }
}

/// Signature verification primitive supplied to the authorization core.
///
/// Implementations must be deterministic: the same inputs always produce the
/// same answer.
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` is a valid signature by `identity` over `message`.
    fn verify(&self, identity: &Identity, message: &[u8], signature: &SignatureBytes) -> bool;
}

/// Strict Ed25519 verification.
///
/// Uses `verify_strict`, which rejects small-order public keys and
/// non-canonical signature encodings. The empty-approver sentinel never
/// verifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, identity: &Identity, message: &[u8], signature: &SignatureBytes) -> bool {
        if identity.is_empty() {
            return false;
        }
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(identity.as_bytes()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        key.verify_strict(message, &signature).is_ok()
    }
}

/// Ed25519 signing key wrapper used by approvers and tests.
///
/// Key management is the approver's concern; the core only needs this to
/// produce fixtures and for the CLI's offline signing helper.
pub struct Signer {
    signing_key: ed25519_dalek::SigningKey,
}

impl Signer {
    /// Generate a fresh key from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut rng),
        }
    }

    /// Deterministic key from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// The signer's public identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `message`.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

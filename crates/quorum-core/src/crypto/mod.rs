//! Cryptographic primitives for the authorization core.
//!
//! - **Blake3 hashing** with a purpose tag on every digest that enters a
//!   commitment or a signed message (see [`domain`]).
//! - **Ed25519 signatures**: approver identities are raw Ed25519 public keys
//!   and approvals are detached signatures over a 32-byte message digest.
//!
//! Signature verification is reached through the [`SignatureVerifier`]
//! trait so hosts can substitute their own primitive; [`Ed25519Verifier`]
//! is the default.
//!
//! # Example
//!
//! ```rust
//! use quorum_core::crypto::{Ed25519Verifier, SignatureVerifier, Signer, domain, hash_with_domain};
//!
//! let signer = Signer::from_seed(&[1u8; 32]);
//! let message = hash_with_domain(domain::ACTION, &[b"payload"]);
//! let signature = signer.sign(&message);
//! assert!(Ed25519Verifier.verify(&signer.identity(), &message, &signature));
//! ```

mod hash;
mod sign;

pub use hash::{
    HASH_SIZE, Hash, ZERO_HASH, domain, hash_content, hash_with_domain, hashes_equal, short_hex,
};
pub use sign::{
    Ed25519Verifier, Identity, PUBLIC_KEY_SIZE, SIGNATURE_SIZE, SignatureBytes, SignatureVerifier,
    Signer,
};

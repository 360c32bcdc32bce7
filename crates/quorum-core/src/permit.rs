//! Detachable weighted approvals bound to an authorization-data hash.
//!
//! A [`Permit`] does not know what it authorizes. Approvers sign
//! `blake3("quorum:permit:v1\0" + auth_data_hash)`; the consumer binds the
//! permit to a concrete payload by recomputing [`hash_auth_data`] over the
//! payload bytes. A permit bound to one payload never authorizes another.

use serde::{Deserialize, Serialize};

use crate::approval::{AuthEntry, WeightTally, tally_entries};
use crate::crypto::{Hash, SignatureVerifier, domain, hash_with_domain, hashes_equal};
use crate::encoding::hex32;
use crate::error::{AuthorizationError, AuthorizationResult};

/// Hash a payload into the value a permit is bound to.
#[must_use]
pub fn hash_auth_data(payload: &[u8]) -> Hash {
    hash_with_domain(domain::AUTH_DATA, &[payload])
}

/// Weighted approval over an opaque authorization-data hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
    #[serde(with = "hex32")]
    auth_data_hash: Hash,
    #[serde(default)]
    entries: Vec<AuthEntry>,
}

impl Permit {
    /// Permit over a precomputed auth-data hash.
    #[must_use]
    pub const fn new(auth_data_hash: Hash, entries: Vec<AuthEntry>) -> Self {
        Self {
            auth_data_hash,
            entries,
        }
    }

    /// Permit bound to `payload`.
    #[must_use]
    pub fn for_payload(payload: &[u8], entries: Vec<AuthEntry>) -> Self {
        Self::new(hash_auth_data(payload), entries)
    }

    /// The bound auth-data hash.
    #[must_use]
    pub const fn auth_data_hash(&self) -> &Hash {
        &self.auth_data_hash
    }

    /// Entries carried by the permit.
    #[must_use]
    pub fn entries(&self) -> &[AuthEntry] {
        &self.entries
    }

    /// Append an entry. Capacity is enforced at verification time.
    pub fn push_entry(&mut self, entry: AuthEntry) {
        self.entries.push(entry);
    }

    /// Message each approver signs for this permit.
    #[must_use]
    pub fn signing_message(&self) -> Hash {
        signing_message_for(&self.auth_data_hash)
    }

    /// Tally the permit's entries without interpreting any payload.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::CapacityExceeded`] when the permit has
    /// too many entries.
    pub fn verify(
        &self,
        root: &Hash,
        threshold: u32,
        verifier: &dyn SignatureVerifier,
    ) -> AuthorizationResult<WeightTally> {
        tally_entries(&self.signing_message(), &self.entries, root, threshold, verifier)
    }

    /// Whether the permit is bound to `payload`.
    #[must_use]
    pub fn is_bound_to(&self, payload: &[u8]) -> bool {
        hashes_equal(&self.auth_data_hash, &hash_auth_data(payload))
    }

    /// Bind the permit to `payload` and require the threshold.
    ///
    /// The permit is consumed so it cannot be presented twice through the
    /// same value.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::AuthDataMismatch`] if the permit is bound to a
    ///   different payload (checked before any signature).
    /// - [`AuthorizationError::CapacityExceeded`] for oversized permits.
    /// - [`AuthorizationError::ThresholdNotMet`] if the weight falls short.
    pub fn bind_and_consume(
        self,
        payload: &[u8],
        root: &Hash,
        threshold: u32,
        verifier: &dyn SignatureVerifier,
    ) -> AuthorizationResult<WeightTally> {
        if !self.is_bound_to(payload) {
            tracing::warn!("permit rejected: auth data mismatch");
            return Err(AuthorizationError::AuthDataMismatch);
        }
        self.verify(root, threshold, verifier)?.require_accepted()
    }
}

/// Approval message for an auth-data hash.
#[must_use]
pub fn signing_message_for(auth_data_hash: &Hash) -> Hash {
    hash_with_domain(domain::PERMIT, &[auth_data_hash])
}

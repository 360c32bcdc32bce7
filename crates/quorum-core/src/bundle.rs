//! Authorization bundles: an action plus the approver entries that sign it.
//!
//! A bundle holds at most [`MAX_BUNDLE_ENTRIES`] entries. Wire producers may
//! pad to exactly that many with [`AuthEntry::padding`]; padding contributes
//! nothing to the tally.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::approval::{AuthEntry, MAX_BUNDLE_ENTRIES, WeightTally, check_capacity, tally_entries};
use crate::crypto::{Hash, SignatureVerifier, Signer};
use crate::error::{AuthorizationError, AuthorizationResult};
use crate::registry::MembershipProof;

/// An action together with the approvals collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationBundle {
    /// Action being authorized.
    pub action: Action,
    /// Approver entries, at most [`MAX_BUNDLE_ENTRIES`].
    #[serde(default)]
    pub entries: Vec<AuthEntry>,
}

impl AuthorizationBundle {
    /// Empty bundle for `action`.
    #[must_use]
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            entries: Vec::new(),
        }
    }

    /// Bundle from pre-collected entries.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::CapacityExceeded`] when `entries` is
    /// longer than [`MAX_BUNDLE_ENTRIES`].
    pub fn with_entries(action: Action, entries: Vec<AuthEntry>) -> AuthorizationResult<Self> {
        check_capacity(entries.len())?;
        Ok(Self { action, entries })
    }

    /// Message every approver signs for this bundle.
    #[must_use]
    pub fn signing_message(&self) -> Hash {
        self.action.signing_message()
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::CapacityExceeded`] when the bundle is
    /// already full.
    pub fn push_entry(&mut self, entry: AuthEntry) -> AuthorizationResult<()> {
        if self.entries.len() >= MAX_BUNDLE_ENTRIES {
            return Err(AuthorizationError::CapacityExceeded {
                count: self.entries.len() + 1,
                capacity: MAX_BUNDLE_ENTRIES,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Sign the bundle's action with `signer` and append the entry.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationBundle::push_entry`].
    pub fn sign_and_push(
        &mut self,
        signer: &Signer,
        claimed_weight: u32,
        proof: MembershipProof,
    ) -> AuthorizationResult<()> {
        let entry = AuthEntry::sign(signer, claimed_weight, proof, &self.signing_message());
        self.push_entry(entry)
    }

    /// Fill the remaining slots with canonical padding entries.
    ///
    /// A bundle already at or over capacity is returned unchanged.
    #[must_use]
    pub fn padded(mut self) -> Self {
        if self.entries.len() < MAX_BUNDLE_ENTRIES {
            self.entries.resize(MAX_BUNDLE_ENTRIES, AuthEntry::padding());
        }
        self
    }

    /// Entries that are not padding.
    pub fn real_entries(&self) -> impl Iterator<Item = &AuthEntry> {
        self.entries.iter().filter(|entry| !entry.is_padding())
    }

    /// Tally the bundle's entries against `root` and `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::CapacityExceeded`] before any signature
    /// or proof is checked when the bundle is over capacity.
    pub fn compute_approved_weight(
        &self,
        root: &Hash,
        threshold: u32,
        verifier: &dyn SignatureVerifier,
    ) -> AuthorizationResult<WeightTally> {
        tally_entries(&self.signing_message(), &self.entries, root, threshold, verifier)
    }
}

//! Weighted-approval tally shared by bundles and permits.
//!
//! Given a message digest, a list of [`AuthEntry`] values, the committed
//! registry root and a threshold, [`tally_entries`] computes the approved
//! weight:
//!
//! 1. Entries beyond [`MAX_BUNDLE_ENTRIES`] reject the whole tally before any
//!    cryptographic work.
//! 2. Padding entries (empty-approver identity) are skipped.
//! 3. An entry whose signature does not verify is marked
//!    [`EntryStatus::BadSignature`].
//! 4. An entry whose `(approver, claimed_weight)` leaf is not proven under the
//!    root is marked [`EntryStatus::InvalidMembership`].
//! 5. Each identity contributes at most once; repeats are
//!    [`EntryStatus::Duplicate`].
//! 6. Contributions are summed over every entry; the tally is accepted iff
//!    the sum reaches the threshold (inclusive).
//!
//! Per-entry failures never abort the tally. The total and the decision are
//! functions of the entry multiset: reordering entries cannot change them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, Identity, SignatureBytes, SignatureVerifier, Signer};
use crate::error::{AuthorizationError, AuthorizationResult};
use crate::registry::{MembershipProof, approver_leaf_hash, check_membership};

/// Fixed number of entry slots in a bundle or permit.
///
/// Part of the wire contract: both sides of serialization must agree on it.
pub const MAX_BUNDLE_ENTRIES: usize = 32;

/// One approver's contribution: identity, claimed weight, registry proof and
/// signature over the approval message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    /// Approver identity.
    pub approver: Identity,
    /// Weight the approver claims in the registry.
    pub claimed_weight: u32,
    /// Inclusion proof for `(approver, claimed_weight)`.
    pub proof: MembershipProof,
    /// Signature by `approver` over the approval message.
    pub signature: SignatureBytes,
}

impl AuthEntry {
    /// Canonical padding entry. Contributes nothing and is ignored by
    /// distinct-approver checks.
    #[must_use]
    pub const fn padding() -> Self {
        Self {
            approver: Identity::EMPTY,
            claimed_weight: 0,
            proof: MembershipProof::empty(),
            signature: SignatureBytes::EMPTY,
        }
    }

    /// Build an entry by signing `message` with `signer`.
    #[must_use]
    pub fn sign(signer: &Signer, claimed_weight: u32, proof: MembershipProof, message: &Hash) -> Self {
        Self {
            approver: signer.identity(),
            claimed_weight,
            proof,
            signature: signer.sign(message),
        }
    }

    /// Whether this is a padding entry.
    #[must_use]
    pub fn is_padding(&self) -> bool {
        self.approver.is_empty()
    }
}

/// Outcome for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Signature and membership valid; weight counted.
    Counted,
    /// Canonical padding slot.
    Padding,
    /// Signature does not verify over the approval message.
    BadSignature,
    /// Signature valid, registry membership not proven.
    InvalidMembership,
    /// Identity already contributed through an earlier entry.
    Duplicate,
}

/// Accept/reject outcome of a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Approved weight reached the threshold.
    Accepted,
    /// Approved weight fell short.
    Rejected,
}

/// Result of tallying a set of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTally {
    total_weight: u32,
    threshold: u32,
    statuses: Vec<EntryStatus>,
}

impl WeightTally {
    /// Total approved weight (saturating at `u32::MAX`).
    #[must_use]
    pub const fn total_weight(&self) -> u32 {
        self.total_weight
    }

    /// Threshold the tally was compared against.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Per-entry outcomes, in entry order.
    #[must_use]
    pub fn statuses(&self) -> &[EntryStatus] {
        &self.statuses
    }

    /// Number of entries with `status`.
    #[must_use]
    pub fn count(&self, status: EntryStatus) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }

    /// Accept iff `total_weight >= threshold`.
    #[must_use]
    pub const fn decision(&self) -> Decision {
        if self.total_weight >= self.threshold {
            Decision::Accepted
        } else {
            Decision::Rejected
        }
    }

    /// Whether the tally is accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.decision(), Decision::Accepted)
    }

    /// Convert a rejected tally into [`AuthorizationError::ThresholdNotMet`].
    ///
    /// # Errors
    ///
    /// Returns `ThresholdNotMet` when the decision is [`Decision::Rejected`].
    pub fn require_accepted(self) -> AuthorizationResult<Self> {
        if self.is_accepted() {
            Ok(self)
        } else {
            Err(AuthorizationError::ThresholdNotMet {
                approved: self.total_weight,
                threshold: self.threshold,
            })
        }
    }
}

/// Reject entry lists larger than [`MAX_BUNDLE_ENTRIES`].
///
/// # Errors
///
/// Returns [`AuthorizationError::CapacityExceeded`].
pub const fn check_capacity(count: usize) -> AuthorizationResult<()> {
    if count > MAX_BUNDLE_ENTRIES {
        return Err(AuthorizationError::CapacityExceeded {
            count,
            capacity: MAX_BUNDLE_ENTRIES,
        });
    }
    Ok(())
}

/// Tally `entries` approving `message` against the registry `root`.
///
/// # Errors
///
/// Returns [`AuthorizationError::CapacityExceeded`] if there are more than
/// [`MAX_BUNDLE_ENTRIES`] entries. A tally below the threshold is not an
/// error here; inspect [`WeightTally::decision`].
pub fn tally_entries(
    message: &Hash,
    entries: &[AuthEntry],
    root: &Hash,
    threshold: u32,
    verifier: &dyn SignatureVerifier,
) -> AuthorizationResult<WeightTally> {
    check_capacity(entries.len())?;

    let mut statuses = Vec::with_capacity(entries.len());
    let mut contributions: BTreeMap<Identity, u32> = BTreeMap::new();

    for (index, entry) in entries.iter().enumerate() {
        if entry.is_padding() {
            statuses.push(EntryStatus::Padding);
            continue;
        }

        if !verifier.verify(&entry.approver, message, &entry.signature) {
            tracing::warn!(index, approver = %entry.approver, "approval entry: bad signature");
            statuses.push(EntryStatus::BadSignature);
            continue;
        }

        let leaf = approver_leaf_hash(&entry.approver, entry.claimed_weight);
        let Some(leaf_index) = entry.proof.leaf_index() else {
            tracing::warn!(
                index,
                approver = %entry.approver,
                steps = entry.proof.len(),
                "approval entry: malformed membership proof"
            );
            statuses.push(EntryStatus::InvalidMembership);
            continue;
        };
        if let Err(err) = check_membership(&leaf, leaf_index, &entry.proof, root) {
            tracing::warn!(index, approver = %entry.approver, %err, "approval entry: membership rejected");
            statuses.push(EntryStatus::InvalidMembership);
            continue;
        }

        match contributions.get_mut(&entry.approver) {
            Some(weight) => {
                *weight = (*weight).max(entry.claimed_weight);
                statuses.push(EntryStatus::Duplicate);
            },
            None => {
                contributions.insert(entry.approver, entry.claimed_weight);
                statuses.push(EntryStatus::Counted);
            },
        }
    }

    let total_weight = contributions
        .values()
        .fold(0u32, |acc, weight| acc.saturating_add(*weight));

    tracing::debug!(
        total_weight,
        threshold,
        counted = contributions.len(),
        entries = entries.len(),
        "approval tally computed"
    );

    Ok(WeightTally {
        total_weight,
        threshold,
        statuses,
    })
}

//! Actions: the canonical description of an operation approvers authorize.
//!
//! An [`Action`] names the subject account, the account sequence number it
//! is bound to, and one [`ActionKind`] payload. Its canonical hash is both
//! the replay-binding digest and the message every approver signs.
//!
//! # Canonical Bytes
//!
//! The layout is fixed and must stay stable across versions, otherwise
//! previously collected signatures stop verifying:
//!
//! ```text
//! kind_tag (1 byte)
//! + subject_account (32 bytes)
//! + sequence_number (4 bytes LE)
//! + payload
//!     Transfer:        amount (8 bytes LE) + recipient (32 bytes)
//!     ThresholdUpdate: new_threshold (4 bytes LE)
//! ```
//!
//! `canonical_hash = blake3("quorum:action:v1\0" + canonical_bytes)`

use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, Identity, domain, hash_with_domain};
use crate::error::{AuthorizationError, AuthorizationResult};
use crate::registry::{MAX_APPROVER_WEIGHT, REGISTRY_CAPACITY};

/// Largest threshold a full registry of maximum-weight approvers can reach.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_THRESHOLD: u32 = REGISTRY_CAPACITY as u32 * MAX_APPROVER_WEIGHT;

/// Operation payload, one shape per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Move `amount` from the subject account to `recipient`.
    Transfer {
        /// Amount in the ledger's smallest unit.
        amount: u64,
        /// Receiving account.
        recipient: Identity,
    },
    /// Replace the account's approval threshold.
    ThresholdUpdate {
        /// New threshold in weight units.
        new_threshold: u32,
    },
}

impl ActionKind {
    /// Tag byte used in the canonical encoding.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Transfer { .. } => 0x01,
            Self::ThresholdUpdate { .. } => 0x02,
        }
    }

    /// Human-readable kind name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::ThresholdUpdate { .. } => "threshold_update",
        }
    }

    fn validate(&self) -> AuthorizationResult<()> {
        match *self {
            Self::Transfer { amount, recipient } => {
                if amount == 0 {
                    return Err(AuthorizationError::invalid("transfer amount must be non-zero"));
                }
                if recipient.is_empty() {
                    return Err(AuthorizationError::invalid(
                        "transfer recipient must not be the empty identity",
                    ));
                }
            },
            Self::ThresholdUpdate { new_threshold } => {
                if new_threshold == 0 {
                    return Err(AuthorizationError::invalid("threshold must be non-zero"));
                }
                if new_threshold > MAX_THRESHOLD {
                    return Err(AuthorizationError::invalid(format!(
                        "threshold {new_threshold} exceeds registry capacity {MAX_THRESHOLD}"
                    )));
                }
            },
        }
        Ok(())
    }
}

/// An operation bound to a subject account and its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    subject_account: Identity,
    sequence_number: u32,
    #[serde(flatten)]
    kind: ActionKind,
}

impl Action {
    /// Create a validated action.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::InvalidParameter`] if:
    /// - the subject is the empty identity
    /// - a transfer has a zero amount or an empty recipient
    /// - a threshold update is zero or above [`MAX_THRESHOLD`]
    pub fn create(
        subject_account: Identity,
        sequence_number: u32,
        kind: ActionKind,
    ) -> AuthorizationResult<Self> {
        if subject_account.is_empty() {
            return Err(AuthorizationError::invalid(
                "subject account must not be the empty identity",
            ));
        }
        kind.validate()?;
        Ok(Self {
            subject_account,
            sequence_number,
            kind,
        })
    }

    /// Shorthand for a transfer action.
    ///
    /// # Errors
    ///
    /// See [`Action::create`].
    pub fn transfer(
        subject_account: Identity,
        sequence_number: u32,
        amount: u64,
        recipient: Identity,
    ) -> AuthorizationResult<Self> {
        Self::create(
            subject_account,
            sequence_number,
            ActionKind::Transfer { amount, recipient },
        )
    }

    /// Shorthand for a threshold update action.
    ///
    /// # Errors
    ///
    /// See [`Action::create`].
    pub fn threshold_update(
        subject_account: Identity,
        sequence_number: u32,
        new_threshold: u32,
    ) -> AuthorizationResult<Self> {
        Self::create(
            subject_account,
            sequence_number,
            ActionKind::ThresholdUpdate { new_threshold },
        )
    }

    /// Re-run construction checks, for actions obtained by deserialization.
    ///
    /// # Errors
    ///
    /// See [`Action::create`].
    pub fn validate(&self) -> AuthorizationResult<()> {
        Self::create(self.subject_account, self.sequence_number, self.kind).map(|_| ())
    }

    /// Subject account.
    #[must_use]
    pub const fn subject_account(&self) -> &Identity {
        &self.subject_account
    }

    /// Sequence number the action is bound to.
    #[must_use]
    pub const fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Operation payload.
    #[must_use]
    pub const fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Canonical byte encoding (see module docs).
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 32 + 4 + 8 + 32);
        out.push(self.kind.tag());
        out.extend_from_slice(self.subject_account.as_bytes());
        out.extend_from_slice(&self.sequence_number.to_le_bytes());
        match self.kind {
            ActionKind::Transfer { amount, recipient } => {
                out.extend_from_slice(&amount.to_le_bytes());
                out.extend_from_slice(recipient.as_bytes());
            },
            ActionKind::ThresholdUpdate { new_threshold } => {
                out.extend_from_slice(&new_threshold.to_le_bytes());
            },
        }
        out
    }

    /// Domain-separated digest of the canonical bytes.
    #[must_use]
    pub fn canonical_hash(&self) -> Hash {
        hash_with_domain(domain::ACTION, &[&self.canonical_bytes()])
    }

    /// The message each approver signs. Equal to [`Action::canonical_hash`].
    #[must_use]
    pub fn signing_message(&self) -> Hash {
        self.canonical_hash()
    }
}

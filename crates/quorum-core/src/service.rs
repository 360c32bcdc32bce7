//! Authorization orchestration.
//!
//! [`AuthorizationService`] ties replay binding, registry membership and the
//! weighted tally into a single accept/reject decision for one account. It
//! never mutates anything: an accepted authorization is a description of an
//! effect that the ledger applies (see [`crate::ledger`]).
//!
//! # Check Order
//!
//! Transfers: registry-state integrity, action kind, sequence, subject,
//! capacity, weight.
//!
//! Threshold updates: registry-state integrity, action kind, auth-data
//! binding, sequence, subject, capacity, weight.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind, MAX_THRESHOLD};
use crate::approval::{WeightTally, check_capacity};
use crate::bundle::AuthorizationBundle;
use crate::crypto::{
    Ed25519Verifier, Hash, Identity, SignatureVerifier, domain, hash_with_domain, hashes_equal,
    short_hex,
};
use crate::encoding::hex32;
use crate::error::{AuthorizationError, AuthorizationResult};
use crate::ledger::LedgerView;
use crate::permit::{Permit, hash_auth_data};

// ──────────────────────────────────────────────────────────────
// Registry state
// ──────────────────────────────────────────────────────────────

/// Committed registry root and threshold for one account.
///
/// `registry_version_hash` binds the two; a snapshot whose version hash does
/// not match its fields is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(with = "hex32")]
    root: Hash,
    threshold: u32,
    #[serde(with = "hex32")]
    registry_version_hash: Hash,
}

impl RegistryState {
    /// State for `root` and `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::InvalidParameter`] when `threshold` is
    /// zero or above [`MAX_THRESHOLD`].
    pub fn new(root: Hash, threshold: u32) -> AuthorizationResult<Self> {
        validate_threshold(threshold)?;
        Ok(Self {
            root,
            threshold,
            registry_version_hash: Self::compute_version_hash(&root, threshold),
        })
    }

    /// `blake3("quorum:registry_version:v1\0" + root + threshold_le32)`.
    #[must_use]
    pub fn compute_version_hash(root: &Hash, threshold: u32) -> Hash {
        hash_with_domain(domain::REGISTRY_VERSION, &[root, &threshold.to_le_bytes()])
    }

    /// Committed approver root.
    #[must_use]
    pub const fn root(&self) -> &Hash {
        &self.root
    }

    /// Approval threshold.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Version hash over root and threshold.
    #[must_use]
    pub const fn registry_version_hash(&self) -> &Hash {
        &self.registry_version_hash
    }

    /// Check that the version hash matches root and threshold, and that the
    /// threshold is in range.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::InvalidParameter`] for an inconsistent
    /// snapshot.
    pub fn verify_version(&self) -> AuthorizationResult<()> {
        validate_threshold(self.threshold)?;
        let expected = Self::compute_version_hash(&self.root, self.threshold);
        if !hashes_equal(&expected, &self.registry_version_hash) {
            return Err(AuthorizationError::invalid(
                "registry version hash does not match root and threshold",
            ));
        }
        Ok(())
    }

    /// Successor state with the same root and a new threshold.
    ///
    /// # Errors
    ///
    /// See [`RegistryState::new`].
    pub fn with_threshold(&self, threshold: u32) -> AuthorizationResult<Self> {
        Self::new(self.root, threshold)
    }

    /// Successor state with a new root and the same threshold.
    ///
    /// # Errors
    ///
    /// See [`RegistryState::new`].
    pub fn with_root(&self, root: Hash) -> AuthorizationResult<Self> {
        Self::new(root, self.threshold)
    }
}

fn validate_threshold(threshold: u32) -> AuthorizationResult<()> {
    if threshold == 0 {
        return Err(AuthorizationError::invalid("threshold must be non-zero"));
    }
    if threshold > MAX_THRESHOLD {
        return Err(AuthorizationError::invalid(format!(
            "threshold {threshold} exceeds registry capacity {MAX_THRESHOLD}"
        )));
    }
    Ok(())
}

// ──────────────────────────────────────────────────────────────
// Outcomes
// ──────────────────────────────────────────────────────────────

/// Asset movement the ledger executes after an accepted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEffect {
    /// Receiving account.
    pub recipient: Identity,
    /// Amount to move.
    pub amount: u64,
}

/// Accepted transfer.
///
/// Only [`AuthorizationService`] builds these; the ledger re-derives the
/// action from the effect and refuses any copy whose action hash no longer
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferAuthorization {
    pub(crate) account: Identity,
    pub(crate) effect: TransferEffect,
    #[serde(with = "hex32")]
    pub(crate) action_hash: Hash,
    pub(crate) next_sequence: u32,
    #[serde(with = "hex32")]
    pub(crate) registry_version_hash: Hash,
    pub(crate) tally: WeightTally,
}

impl TransferAuthorization {
    /// Account the transfer debits.
    #[must_use]
    pub const fn account(&self) -> &Identity {
        &self.account
    }

    /// Effect to execute.
    #[must_use]
    pub const fn effect(&self) -> TransferEffect {
        self.effect
    }

    /// Canonical hash of the authorized action.
    #[must_use]
    pub const fn action_hash(&self) -> &Hash {
        &self.action_hash
    }

    /// Sequence number the account moves to once the effect is applied.
    #[must_use]
    pub const fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Registry version the decision was made against.
    #[must_use]
    pub const fn registry_version_hash(&self) -> &Hash {
        &self.registry_version_hash
    }

    /// Tally that justified the decision.
    #[must_use]
    pub const fn tally(&self) -> &WeightTally {
        &self.tally
    }

    /// Whether `action_hash` is the hash of the transfer described by the
    /// other fields.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let Some(sequence) = self.next_sequence.checked_sub(1) else {
            return false;
        };
        Action::transfer(self.account, sequence, self.effect.amount, self.effect.recipient)
            .is_ok_and(|action| hashes_equal(&action.canonical_hash(), &self.action_hash))
    }
}

/// Accepted threshold update.
///
/// Only [`AuthorizationService`] builds these. The ledger derives the new
/// state from its own committed root and [`Self::new_threshold`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdAuthorization {
    pub(crate) account: Identity,
    pub(crate) new_threshold: u32,
    pub(crate) next_state: RegistryState,
    #[serde(with = "hex32")]
    pub(crate) action_hash: Hash,
    pub(crate) next_sequence: u32,
    #[serde(with = "hex32")]
    pub(crate) registry_version_hash: Hash,
    pub(crate) tally: WeightTally,
}

impl ThresholdAuthorization {
    /// Account whose threshold changes.
    #[must_use]
    pub const fn account(&self) -> &Identity {
        &self.account
    }

    /// New threshold.
    #[must_use]
    pub const fn new_threshold(&self) -> u32 {
        self.new_threshold
    }

    /// State the decision expects once the update is installed.
    #[must_use]
    pub const fn next_state(&self) -> &RegistryState {
        &self.next_state
    }

    /// Canonical hash of the authorized action.
    #[must_use]
    pub const fn action_hash(&self) -> &Hash {
        &self.action_hash
    }

    /// Sequence number the account moves to once the update is applied.
    #[must_use]
    pub const fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Registry version the decision was made against.
    #[must_use]
    pub const fn registry_version_hash(&self) -> &Hash {
        &self.registry_version_hash
    }

    /// Tally that justified the decision.
    #[must_use]
    pub const fn tally(&self) -> &WeightTally {
        &self.tally
    }

    /// Whether `action_hash` is the hash of the update described by the
    /// other fields.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let Some(sequence) = self.next_sequence.checked_sub(1) else {
            return false;
        };
        Action::threshold_update(self.account, sequence, self.new_threshold)
            .is_ok_and(|action| hashes_equal(&action.canonical_hash(), &self.action_hash))
    }
}

/// Approvals for one action, in the shape its kind requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Submission {
    /// Transfer approved by a bundle.
    Transfer {
        /// Bundle carrying the transfer action.
        bundle: AuthorizationBundle,
    },
    /// Threshold update approved by a permit.
    ThresholdUpdate {
        /// The update action.
        update: Action,
        /// Permit bound to the update's canonical bytes.
        permit: Permit,
    },
}

impl Submission {
    /// The action being authorized.
    #[must_use]
    pub const fn action(&self) -> &Action {
        match self {
            Self::Transfer { bundle } => &bundle.action,
            Self::ThresholdUpdate { update, .. } => update,
        }
    }
}

/// Accepted authorization of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authorization {
    /// Accepted transfer.
    Transfer(TransferAuthorization),
    /// Accepted threshold update.
    ThresholdUpdate(ThresholdAuthorization),
}

// ──────────────────────────────────────────────────────────────
// Service
// ──────────────────────────────────────────────────────────────

/// Accept/reject decisions for one account.
#[derive(Debug, Clone)]
pub struct AuthorizationService<V = Ed25519Verifier> {
    account: Identity,
    verifier: V,
}

impl AuthorizationService<Ed25519Verifier> {
    /// Service for `account` using Ed25519 verification.
    #[must_use]
    pub const fn ed25519(account: Identity) -> Self {
        Self::new(account, Ed25519Verifier)
    }
}

impl<V: SignatureVerifier> AuthorizationService<V> {
    /// Service for `account` with a custom verifier.
    #[must_use]
    pub const fn new(account: Identity, verifier: V) -> Self {
        Self { account, verifier }
    }

    /// Account this service authorizes for.
    #[must_use]
    pub const fn account(&self) -> &Identity {
        &self.account
    }

    /// Authorize a transfer bundle.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::InvalidParameter`] for an inconsistent
    ///   `state`, a non-transfer action or a malformed action.
    /// - [`AuthorizationError::SequenceMismatch`] if the action is not bound
    ///   to `current_sequence`.
    /// - [`AuthorizationError::IdentityMismatch`] if the action names another
    ///   account.
    /// - [`AuthorizationError::CapacityExceeded`] for oversized bundles.
    /// - [`AuthorizationError::ThresholdNotMet`] if approved weight is short.
    pub fn authorize_transfer(
        &self,
        bundle: &AuthorizationBundle,
        current_sequence: u32,
        state: &RegistryState,
    ) -> AuthorizationResult<TransferAuthorization> {
        let result = self.decide_transfer(bundle, current_sequence, state);
        log_outcome(&self.account, &bundle.action, &result);
        result
    }

    fn decide_transfer(
        &self,
        bundle: &AuthorizationBundle,
        current_sequence: u32,
        state: &RegistryState,
    ) -> AuthorizationResult<TransferAuthorization> {
        state.verify_version()?;
        let action = &bundle.action;
        let ActionKind::Transfer { amount, recipient } = *action.kind() else {
            return Err(AuthorizationError::invalid(format!(
                "expected a transfer action, got {}",
                action.kind().name()
            )));
        };
        action.validate()?;
        self.check_binding(action, current_sequence)?;
        check_capacity(bundle.entries.len())?;

        let tally = bundle
            .compute_approved_weight(state.root(), state.threshold(), &self.verifier)?
            .require_accepted()?;

        Ok(TransferAuthorization {
            account: self.account,
            effect: TransferEffect { recipient, amount },
            action_hash: action.canonical_hash(),
            next_sequence: next_sequence(current_sequence)?,
            registry_version_hash: *state.registry_version_hash(),
            tally,
        })
    }

    /// Authorize a threshold update carried by `permit`.
    ///
    /// The permit must be bound to `update.canonical_bytes()`.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::InvalidParameter`] for an inconsistent
    ///   `state` or an `update` that is not a threshold update.
    /// - [`AuthorizationError::AuthDataMismatch`] if the permit is bound to
    ///   other bytes, regardless of its weight.
    /// - [`AuthorizationError::SequenceMismatch`] /
    ///   [`AuthorizationError::IdentityMismatch`] for replay binding.
    /// - [`AuthorizationError::CapacityExceeded`] /
    ///   [`AuthorizationError::ThresholdNotMet`] from the tally.
    pub fn authorize_threshold_update(
        &self,
        permit: Permit,
        update: &Action,
        current_sequence: u32,
        state: &RegistryState,
    ) -> AuthorizationResult<ThresholdAuthorization> {
        let result = self.decide_threshold_update(permit, update, current_sequence, state);
        log_outcome(&self.account, update, &result);
        result
    }

    fn decide_threshold_update(
        &self,
        permit: Permit,
        update: &Action,
        current_sequence: u32,
        state: &RegistryState,
    ) -> AuthorizationResult<ThresholdAuthorization> {
        state.verify_version()?;
        let ActionKind::ThresholdUpdate { new_threshold } = *update.kind() else {
            return Err(AuthorizationError::invalid(format!(
                "expected a threshold update action, got {}",
                update.kind().name()
            )));
        };
        update.validate()?;

        let payload = update.canonical_bytes();
        if !hashes_equal(permit.auth_data_hash(), &hash_auth_data(&payload)) {
            return Err(AuthorizationError::AuthDataMismatch);
        }
        self.check_binding(update, current_sequence)?;
        check_capacity(permit.entries().len())?;

        let tally = permit.bind_and_consume(
            &payload,
            state.root(),
            state.threshold(),
            &self.verifier,
        )?;

        Ok(ThresholdAuthorization {
            account: self.account,
            new_threshold,
            next_state: state.with_threshold(new_threshold)?,
            action_hash: update.canonical_hash(),
            next_sequence: next_sequence(current_sequence)?,
            registry_version_hash: *state.registry_version_hash(),
            tally,
        })
    }

    /// Authorize a transfer, reading sequence and registry state from
    /// `ledger`.
    ///
    /// # Errors
    ///
    /// Ledger lookups fail with [`AuthorizationError::InvalidParameter`];
    /// otherwise see [`AuthorizationService::authorize_transfer`].
    pub fn authorize_transfer_with<L: LedgerView + ?Sized>(
        &self,
        bundle: &AuthorizationBundle,
        ledger: &L,
    ) -> AuthorizationResult<TransferAuthorization> {
        let current_sequence = ledger.current_sequence(&self.account)?;
        let state = ledger.registry_state(&self.account)?;
        self.authorize_transfer(bundle, current_sequence, &state)
    }

    /// Authorize a threshold update, reading sequence and registry state
    /// from `ledger`.
    ///
    /// # Errors
    ///
    /// Ledger lookups fail with [`AuthorizationError::InvalidParameter`];
    /// otherwise see [`AuthorizationService::authorize_threshold_update`].
    pub fn authorize_threshold_update_with<L: LedgerView + ?Sized>(
        &self,
        permit: Permit,
        update: &Action,
        ledger: &L,
    ) -> AuthorizationResult<ThresholdAuthorization> {
        let current_sequence = ledger.current_sequence(&self.account)?;
        let state = ledger.registry_state(&self.account)?;
        self.authorize_threshold_update(permit, update, current_sequence, &state)
    }

    /// Authorize any submission against `ledger`, dispatching on the action
    /// kind.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::InvalidParameter`] when the submission
    /// shape does not fit its action kind; otherwise the errors of the
    /// kind-specific method.
    pub fn authorize<L: LedgerView + ?Sized>(
        &self,
        submission: Submission,
        ledger: &L,
    ) -> AuthorizationResult<Authorization> {
        let kind = *submission.action().kind();
        match (kind, submission) {
            (ActionKind::Transfer { .. }, Submission::Transfer { bundle }) => self
                .authorize_transfer_with(&bundle, ledger)
                .map(Authorization::Transfer),
            (ActionKind::ThresholdUpdate { .. }, Submission::ThresholdUpdate { update, permit }) => {
                self.authorize_threshold_update_with(permit, &update, ledger)
                    .map(Authorization::ThresholdUpdate)
            },
            (kind, _) => Err(AuthorizationError::invalid(format!(
                "{} actions cannot be authorized by this submission type",
                kind.name()
            ))),
        }
    }

    fn check_binding(&self, action: &Action, current_sequence: u32) -> AuthorizationResult<()> {
        if action.sequence_number() != current_sequence {
            return Err(AuthorizationError::SequenceMismatch {
                expected: current_sequence,
                found: action.sequence_number(),
            });
        }
        if action.subject_account() != &self.account {
            return Err(AuthorizationError::IdentityMismatch);
        }
        Ok(())
    }
}

fn next_sequence(current: u32) -> AuthorizationResult<u32> {
    current
        .checked_add(1)
        .ok_or_else(|| AuthorizationError::invalid("account sequence number exhausted"))
}

fn log_outcome<T>(account: &Identity, action: &Action, result: &AuthorizationResult<T>) {
    let action_hash = short_hex(&action.canonical_hash());
    match result {
        Ok(_) => tracing::info!(
            %account,
            kind = action.kind().name(),
            sequence = action.sequence_number(),
            %action_hash,
            "authorization accepted"
        ),
        Err(err) => tracing::warn!(
            %account,
            kind = action.kind().name(),
            sequence = action.sequence_number(),
            %action_hash,
            code = err.code(),
            %err,
            "authorization rejected"
        ),
    }
}

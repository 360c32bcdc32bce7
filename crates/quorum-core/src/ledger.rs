//! Ledger interface and an in-memory reference ledger.
//!
//! The authorization core only reads from a ledger through [`LedgerView`].
//! [`InMemoryLedger`] is the reference collaborator: it holds per-account
//! sequence numbers, registry state and balances, and applies accepted
//! authorizations exactly once. Every mutation is appended to an event log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Hash, Identity, ZERO_HASH, hashes_equal};
use crate::encoding::hex32;
use crate::error::AuthorizationError;
use crate::registry::{ApproverRecord, RegistryError, build_commitment};
use crate::service::{RegistryState, ThresholdAuthorization, TransferAuthorization};

/// Read access the authorization service needs from a ledger.
pub trait LedgerView {
    /// Current sequence number of `account`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownAccount`] for accounts never deployed.
    fn current_sequence(&self, account: &Identity) -> Result<u32, LedgerError>;

    /// Committed registry state of `account`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownAccount`] for accounts never deployed.
    fn registry_state(&self, account: &Identity) -> Result<RegistryState, LedgerError>;
}

/// Errors raised by the reference ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Account was never deployed.
    #[error("unknown account {account}")]
    UnknownAccount {
        /// Account identity.
        account: Identity,
    },

    /// Account is already deployed.
    #[error("account {account} is already deployed")]
    AlreadyDeployed {
        /// Account identity.
        account: Identity,
    },

    /// The authorization was issued for a different sequence number.
    #[error("stale authorization: account expects next sequence {expected}, got {found}")]
    StaleAuthorization {
        /// Sequence number the account would move to.
        expected: u32,
        /// Sequence number the authorization carries.
        found: u32,
    },

    /// The registry changed since the authorization was issued.
    #[error("registry state changed since authorization")]
    RegistryChanged,

    /// The authorization's effect does not match the action it was issued
    /// for.
    #[error("authorization effect does not match its action hash")]
    EffectMismatch,

    /// Not enough balance for a transfer.
    #[error("insufficient balance: {balance} available, {amount} requested")]
    InsufficientBalance {
        /// Available balance.
        balance: u64,
        /// Requested amount.
        amount: u64,
    },

    /// Crediting the recipient would overflow its balance.
    #[error("balance overflow crediting {account}")]
    BalanceOverflow {
        /// Account being credited.
        account: Identity,
    },

    /// Invalid registry records or threshold.
    #[error("invalid registry: {reason}")]
    InvalidRegistry {
        /// Human-readable reason.
        reason: String,
    },
}

impl From<RegistryError> for LedgerError {
    fn from(err: RegistryError) -> Self {
        Self::InvalidRegistry {
            reason: err.to_string(),
        }
    }
}

impl From<AuthorizationError> for LedgerError {
    fn from(err: AuthorizationError) -> Self {
        Self::InvalidRegistry {
            reason: err.to_string(),
        }
    }
}

impl From<LedgerError> for AuthorizationError {
    fn from(err: LedgerError) -> Self {
        Self::invalid(err.to_string())
    }
}

/// Entry in the ledger's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Account created.
    Deployed {
        /// Account identity.
        account: Identity,
        /// Initial registry state.
        state: RegistryState,
    },
    /// Accepted transfer executed.
    Transferred {
        /// Debited account.
        account: Identity,
        /// Sequence number the action was bound to.
        sequence: u32,
        /// Credited account.
        recipient: Identity,
        /// Amount moved.
        amount: u64,
        /// Canonical action hash.
        #[serde(with = "hex32")]
        action_hash: Hash,
    },
    /// Accepted threshold update installed.
    ThresholdUpdated {
        /// Account identity.
        account: Identity,
        /// Sequence number the action was bound to.
        sequence: u32,
        /// New threshold.
        new_threshold: u32,
        /// Canonical action hash.
        #[serde(with = "hex32")]
        action_hash: Hash,
    },
    /// Approver set replaced.
    RegistryRebuilt {
        /// Account identity.
        account: Identity,
        /// State after the rebuild.
        state: RegistryState,
    },
}

#[derive(Debug, Clone)]
struct AccountRecord {
    sequence: u32,
    state: RegistryState,
    latest_action_hash: Hash,
}

/// Reference ledger keeping all state in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    accounts: BTreeMap<Identity, AccountRecord>,
    balances: BTreeMap<Identity, u64>,
    events: Vec<LedgerEvent>,
}

impl InMemoryLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `account` with the registry built from `records`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AlreadyDeployed`] if the account exists.
    /// - [`LedgerError::InvalidRegistry`] for invalid records or threshold.
    pub fn deploy(
        &mut self,
        account: Identity,
        records: &[ApproverRecord],
        threshold: u32,
    ) -> Result<RegistryState, LedgerError> {
        let state = RegistryState::new(build_commitment(records)?, threshold)?;
        self.deploy_state(account, state, 0)
    }

    /// Create `account` from an existing registry state and sequence number.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AlreadyDeployed`] if the account exists.
    /// - [`LedgerError::InvalidRegistry`] if `state` is inconsistent.
    pub fn deploy_state(
        &mut self,
        account: Identity,
        state: RegistryState,
        sequence: u32,
    ) -> Result<RegistryState, LedgerError> {
        if self.accounts.contains_key(&account) {
            return Err(LedgerError::AlreadyDeployed { account });
        }
        state.verify_version()?;
        self.accounts.insert(
            account,
            AccountRecord {
                sequence,
                state,
                latest_action_hash: ZERO_HASH,
            },
        );
        tracing::info!(%account, threshold = state.threshold(), sequence, "account deployed");
        self.events.push(LedgerEvent::Deployed { account, state });
        Ok(state)
    }

    /// Add `amount` to the balance of `account`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::BalanceOverflow`] if the balance would overflow.
    pub fn fund(&mut self, account: Identity, amount: u64) -> Result<u64, LedgerError> {
        credit(&mut self.balances, account, amount)
    }

    /// Balance of `account` (zero when never funded).
    #[must_use]
    pub fn balance(&self, account: &Identity) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Hash of the last action applied to `account`, all zeros before the
    /// first one.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownAccount`] for accounts never deployed.
    pub fn latest_action_hash(&self, account: &Identity) -> Result<Hash, LedgerError> {
        Ok(self.account(account)?.latest_action_hash)
    }

    /// Event log, oldest first.
    #[must_use]
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Execute an accepted transfer.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::StaleAuthorization`] if the account has moved past
    ///   the authorization's sequence (including a second application).
    /// - [`LedgerError::RegistryChanged`] if the registry changed since.
    /// - [`LedgerError::EffectMismatch`] if the effect is not the one the
    ///   action hash commits to.
    /// - [`LedgerError::InsufficientBalance`] / [`LedgerError::BalanceOverflow`]
    ///   if the balances do not allow the movement.
    pub fn apply_transfer(
        &mut self,
        authorization: &TransferAuthorization,
    ) -> Result<(), LedgerError> {
        let account = authorization.account;
        let record = self.account(&account)?;
        check_fresh(record, authorization.next_sequence, &authorization.registry_version_hash)?;
        if !authorization.is_consistent() {
            return Err(reject_effect(&account));
        }
        let sequence = record.sequence;

        let effect = authorization.effect;
        let balance = self.balance(&account);
        let remaining = balance
            .checked_sub(effect.amount)
            .ok_or(LedgerError::InsufficientBalance {
                balance,
                amount: effect.amount,
            })?;
        let mut balances = self.balances.clone();
        balances.insert(account, remaining);
        credit(&mut balances, effect.recipient, effect.amount)?;
        self.balances = balances;

        let record = self.account_mut(&account)?;
        record.sequence = authorization.next_sequence;
        record.latest_action_hash = authorization.action_hash;
        tracing::info!(
            %account,
            sequence,
            recipient = %effect.recipient,
            amount = effect.amount,
            "transfer applied"
        );
        self.events.push(LedgerEvent::Transferred {
            account,
            sequence,
            recipient: effect.recipient,
            amount: effect.amount,
            action_hash: authorization.action_hash,
        });
        Ok(())
    }

    /// Install an accepted threshold update.
    ///
    /// The new state keeps the committed root; only the threshold changes.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::StaleAuthorization`] if the account has moved past
    ///   the authorization's sequence.
    /// - [`LedgerError::RegistryChanged`] if the registry changed since.
    /// - [`LedgerError::EffectMismatch`] if the new threshold is not the one
    ///   the action hash commits to.
    pub fn apply_threshold_update(
        &mut self,
        authorization: &ThresholdAuthorization,
    ) -> Result<RegistryState, LedgerError> {
        let account = authorization.account;
        let record = self.account(&account)?;
        check_fresh(record, authorization.next_sequence, &authorization.registry_version_hash)?;
        if !authorization.is_consistent() {
            return Err(reject_effect(&account));
        }
        let next_state = record.state.with_threshold(authorization.new_threshold)?;

        let record = self.account_mut(&account)?;
        let sequence = record.sequence;
        record.sequence = authorization.next_sequence;
        record.state = next_state;
        record.latest_action_hash = authorization.action_hash;
        tracing::info!(
            %account,
            sequence,
            new_threshold = authorization.new_threshold,
            "threshold updated"
        );
        self.events.push(LedgerEvent::ThresholdUpdated {
            account,
            sequence,
            new_threshold: authorization.new_threshold,
            action_hash: authorization.action_hash,
        });
        Ok(next_state)
    }

    /// Replace the approver set of `account`, keeping its threshold.
    ///
    /// Authorizations issued against the previous registry no longer apply.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownAccount`] for accounts never deployed.
    /// - [`LedgerError::InvalidRegistry`] for invalid records.
    pub fn rebuild_registry(
        &mut self,
        account: &Identity,
        records: &[ApproverRecord],
    ) -> Result<RegistryState, LedgerError> {
        let root = build_commitment(records)?;
        let record = self.account_mut(account)?;
        record.state = record.state.with_root(root)?;
        let state = record.state;
        tracing::info!(%account, approvers = records.len(), "registry rebuilt");
        self.events.push(LedgerEvent::RegistryRebuilt {
            account: *account,
            state,
        });
        Ok(state)
    }

    fn account(&self, account: &Identity) -> Result<&AccountRecord, LedgerError> {
        self.accounts
            .get(account)
            .ok_or(LedgerError::UnknownAccount { account: *account })
    }

    fn account_mut(&mut self, account: &Identity) -> Result<&mut AccountRecord, LedgerError> {
        self.accounts
            .get_mut(account)
            .ok_or(LedgerError::UnknownAccount { account: *account })
    }
}

impl LedgerView for InMemoryLedger {
    fn current_sequence(&self, account: &Identity) -> Result<u32, LedgerError> {
        Ok(self.account(account)?.sequence)
    }

    fn registry_state(&self, account: &Identity) -> Result<RegistryState, LedgerError> {
        Ok(self.account(account)?.state)
    }
}

fn check_fresh(
    record: &AccountRecord,
    next_sequence: u32,
    registry_version_hash: &Hash,
) -> Result<(), LedgerError> {
    let expected = record.sequence.checked_add(1);
    if expected != Some(next_sequence) {
        tracing::warn!(
            current = record.sequence,
            found = next_sequence,
            "rejecting stale authorization"
        );
        return Err(LedgerError::StaleAuthorization {
            expected: expected.unwrap_or(u32::MAX),
            found: next_sequence,
        });
    }
    if !hashes_equal(record.state.registry_version_hash(), registry_version_hash) {
        return Err(LedgerError::RegistryChanged);
    }
    Ok(())
}

fn reject_effect(account: &Identity) -> LedgerError {
    tracing::warn!(%account, "rejecting authorization with altered effect");
    LedgerError::EffectMismatch
}

fn credit(
    balances: &mut BTreeMap<Identity, u64>,
    account: Identity,
    amount: u64,
) -> Result<u64, LedgerError> {
    let balance = balances.entry(account).or_insert(0);
    *balance = balance
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow { account })?;
    Ok(*balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::approval::AuthEntry;
    use crate::bundle::AuthorizationBundle;
    use crate::permit::Permit;
    use crate::crypto::Signer;
    use crate::registry::RegistryTree;
    use crate::service::AuthorizationService;

    const ACCOUNT: Identity = Identity::from_bytes([0xAA; 32]);
    const RECIPIENT: Identity = Identity::from_bytes([0xBB; 32]);

    fn setup() -> (Vec<Signer>, RegistryTree, InMemoryLedger) {
        let signers: Vec<Signer> = (1..=3u8).map(|i| Signer::from_seed(&[i; 32])).collect();
        let records: Vec<ApproverRecord> = signers
            .iter()
            .zip([10, 20, 30])
            .map(|(s, w)| ApproverRecord::new(s.identity(), w))
            .collect();
        let tree = RegistryTree::build(&records).unwrap();
        let mut ledger = InMemoryLedger::new();
        ledger.deploy(ACCOUNT, &records, 25).unwrap();
        ledger.fund(ACCOUNT, 1_000).unwrap();
        (signers, tree, ledger)
    }

    fn approve(
        ledger: &InMemoryLedger,
        signers: &[Signer],
        tree: &RegistryTree,
        amount: u64,
    ) -> TransferAuthorization {
        let sequence = ledger.current_sequence(&ACCOUNT).unwrap();
        let action = Action::transfer(ACCOUNT, sequence, amount, RECIPIENT).unwrap();
        let mut bundle = AuthorizationBundle::new(action);
        for signer in signers {
            let (record, proof) = tree.prove_identity(&signer.identity()).unwrap();
            bundle.sign_and_push(signer, record.weight, proof).unwrap();
        }
        AuthorizationService::ed25519(ACCOUNT)
            .authorize_transfer_with(&bundle, ledger)
            .unwrap()
    }

    #[test]
    fn transfer_applies_once() {
        let (signers, tree, mut ledger) = setup();
        let auth = approve(&ledger, &signers[1..], &tree, 300);

        ledger.apply_transfer(&auth).unwrap();
        assert_eq!(ledger.balance(&ACCOUNT), 700);
        assert_eq!(ledger.balance(&RECIPIENT), 300);
        assert_eq!(ledger.current_sequence(&ACCOUNT).unwrap(), 1);
        assert_eq!(ledger.latest_action_hash(&ACCOUNT).unwrap(), *auth.action_hash());

        assert_eq!(
            ledger.apply_transfer(&auth),
            Err(LedgerError::StaleAuthorization {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(ledger.balance(&ACCOUNT), 700);
    }

    #[test]
    fn insufficient_balance_leaves_state_untouched() {
        let (signers, tree, mut ledger) = setup();
        let auth = approve(&ledger, &signers, &tree, 5_000);
        assert_eq!(
            ledger.apply_transfer(&auth),
            Err(LedgerError::InsufficientBalance {
                balance: 1_000,
                amount: 5_000
            })
        );
        assert_eq!(ledger.current_sequence(&ACCOUNT).unwrap(), 0);
        assert_eq!(ledger.balance(&RECIPIENT), 0);
    }

    #[test]
    fn rebuild_invalidates_pending_authorizations() {
        let (signers, tree, mut ledger) = setup();
        let auth = approve(&ledger, &signers, &tree, 10);
        ledger
            .rebuild_registry(&ACCOUNT, &[ApproverRecord::new(signers[0].identity(), 50)])
            .unwrap();
        assert_eq!(ledger.apply_transfer(&auth), Err(LedgerError::RegistryChanged));
        assert_eq!(ledger.registry_state(&ACCOUNT).unwrap().threshold(), 25);
    }

    fn approve_threshold(
        ledger: &InMemoryLedger,
        signers: &[Signer],
        tree: &RegistryTree,
        new_threshold: u32,
    ) -> ThresholdAuthorization {
        let sequence = ledger.current_sequence(&ACCOUNT).unwrap();
        let update = Action::threshold_update(ACCOUNT, sequence, new_threshold).unwrap();
        let mut permit = Permit::for_payload(&update.canonical_bytes(), Vec::new());
        let message = permit.signing_message();
        for signer in signers {
            let (record, proof) = tree.prove_identity(&signer.identity()).unwrap();
            permit.push_entry(AuthEntry::sign(signer, record.weight, proof, &message));
        }
        AuthorizationService::ed25519(ACCOUNT)
            .authorize_threshold_update_with(permit, &update, ledger)
            .unwrap()
    }

    #[test]
    fn threshold_update_keeps_committed_root() {
        let (signers, tree, mut ledger) = setup();
        let mut auth = approve_threshold(&ledger, &signers[1..], &tree, 40);
        auth.next_state = RegistryState::new([0xEE; 32], 1).unwrap();

        let state = ledger.apply_threshold_update(&auth).unwrap();
        assert_eq!(state.root(), &tree.root());
        assert_eq!(state.threshold(), 40);
        assert_eq!(ledger.registry_state(&ACCOUNT).unwrap(), state);
    }

    #[test]
    fn altered_threshold_is_rejected() {
        let (signers, tree, mut ledger) = setup();
        let mut auth = approve_threshold(&ledger, &signers[1..], &tree, 40);
        auth.new_threshold = 1;

        assert_eq!(ledger.apply_threshold_update(&auth), Err(LedgerError::EffectMismatch));
        assert_eq!(ledger.registry_state(&ACCOUNT).unwrap().threshold(), 25);
        assert_eq!(ledger.current_sequence(&ACCOUNT).unwrap(), 0);
    }

    #[test]
    fn altered_transfer_effect_is_rejected() {
        let (signers, tree, mut ledger) = setup();
        let auth = approve(&ledger, &signers[1..], &tree, 1);

        let mut inflated = auth.clone();
        inflated.effect.amount = 1_000;
        assert_eq!(ledger.apply_transfer(&inflated), Err(LedgerError::EffectMismatch));

        let mut redirected = auth.clone();
        redirected.effect.recipient = Identity::from_bytes([0xCC; 32]);
        assert_eq!(ledger.apply_transfer(&redirected), Err(LedgerError::EffectMismatch));

        assert_eq!(ledger.balance(&RECIPIENT), 0);
        assert_eq!(ledger.balance(&ACCOUNT), 1_000);
        ledger.apply_transfer(&auth).unwrap();
        assert_eq!(ledger.balance(&RECIPIENT), 1);
    }

    #[test]
    fn unknown_account() {
        let ledger = InMemoryLedger::new();
        assert_eq!(
            ledger.current_sequence(&ACCOUNT),
            Err(LedgerError::UnknownAccount { account: ACCOUNT })
        );
        let err: AuthorizationError = ledger.registry_state(&ACCOUNT).unwrap_err().into();
        assert!(matches!(err, AuthorizationError::InvalidParameter { .. }));
    }

    #[test]
    fn deploy_twice_is_rejected() {
        let (_, _, mut ledger) = setup();
        assert!(matches!(
            ledger.deploy(ACCOUNT, &[], 1),
            Err(LedgerError::AlreadyDeployed { .. })
        ));
    }

    #[test]
    fn deploy_rejects_bad_threshold() {
        let mut ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.deploy(ACCOUNT, &[], 0),
            Err(LedgerError::InvalidRegistry { .. })
        ));
    }

    #[test]
    fn events_are_appended_in_order() {
        let (signers, tree, mut ledger) = setup();
        let auth = approve(&ledger, &signers, &tree, 1);
        ledger.apply_transfer(&auth).unwrap();
        let events = ledger.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LedgerEvent::Deployed { .. }));
        assert!(matches!(
            events[1],
            LedgerEvent::Transferred { sequence: 0, amount: 1, .. }
        ));
    }
}

//! End-to-end authorization tests.
//!
//! Exercises the full path from an approver registry to an applied ledger
//! effect:
//!
//! ```text
//! RegistryConfig / ApproverRecord list
//!     |
//!     v
//! RegistryTree (root + membership proofs)
//!     |
//!     v
//! AuthorizationBundle / Permit (signed entries)
//!     |
//!     v
//! AuthorizationService (accept / reject)
//!     |
//!     v
//! InMemoryLedger (effect applied exactly once)
//! ```

use quorum_core::{
    Action, ApproverEntry, ApproverRecord, AuthEntry, Authorization, AuthorizationBundle,
    AuthorizationError, AuthorizationService, EntryStatus, Identity, InMemoryLedger, LedgerError,
    LedgerView, MAX_BUNDLE_ENTRIES, Permit, RegistryConfig, RegistryState, RegistryTree, Signer,
    Submission, build_commitment,
};

const ACCOUNT: Identity = Identity::from_bytes([0xAA; 32]);
const RECIPIENT: Identity = Identity::from_bytes([0xBB; 32]);

struct Harness {
    signers: Vec<Signer>,
    tree: RegistryTree,
}

impl Harness {
    fn new(weights: &[u32]) -> Self {
        let signers: Vec<Signer> = (0..weights.len())
            .map(|i| Signer::from_seed(&[u8::try_from(i + 1).unwrap(); 32]))
            .collect();
        let records: Vec<ApproverRecord> = signers
            .iter()
            .zip(weights)
            .map(|(s, w)| ApproverRecord::new(s.identity(), *w))
            .collect();
        let tree = RegistryTree::build(&records).unwrap();
        Self { signers, tree }
    }

    fn records(&self) -> Vec<ApproverRecord> {
        self.tree.approvers().to_vec()
    }

    fn state(&self, threshold: u32) -> RegistryState {
        RegistryState::new(self.tree.root(), threshold).unwrap()
    }

    fn bundle(&self, action: Action, approvers: &[usize]) -> AuthorizationBundle {
        let mut bundle = AuthorizationBundle::new(action);
        for &i in approvers {
            let signer = &self.signers[i];
            let (record, proof) = self.tree.prove_identity(&signer.identity()).unwrap();
            bundle.sign_and_push(signer, record.weight, proof).unwrap();
        }
        bundle
    }

    fn permit(&self, update: &Action, approvers: &[usize]) -> Permit {
        let mut permit = Permit::for_payload(&update.canonical_bytes(), Vec::new());
        let message = permit.signing_message();
        for &i in approvers {
            let signer = &self.signers[i];
            let (record, proof) = self.tree.prove_identity(&signer.identity()).unwrap();
            permit.push_entry(AuthEntry::sign(signer, record.weight, proof, &message));
        }
        permit
    }
}

fn transfer(sequence: u32, amount: u64) -> Action {
    Action::transfer(ACCOUNT, sequence, amount, RECIPIENT).unwrap()
}

// ──────────────────────────────────────────────────────────────
// Weighted threshold
// ──────────────────────────────────────────────────────────────

#[test]
fn two_approvers_meet_threshold_of_25() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let bundle = h.bundle(transfer(0, 100), &[0, 1]);

    let auth = service.authorize_transfer(&bundle, 0, &h.state(25)).unwrap();
    assert_eq!(auth.tally().total_weight(), 30);
    assert_eq!(auth.effect().recipient, RECIPIENT);
    assert_eq!(auth.effect().amount, 100);
    assert_eq!(auth.next_sequence(), 1);
}

#[test]
fn single_light_approver_is_threshold_not_met() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let bundle = h.bundle(transfer(0, 100), &[0]);

    assert_eq!(
        service.authorize_transfer(&bundle, 0, &h.state(25)),
        Err(AuthorizationError::ThresholdNotMet {
            approved: 10,
            threshold: 25
        })
    );
}

#[test]
fn padded_bundle_authorizes_like_unpadded() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let bundle = h.bundle(transfer(0, 100), &[2]).padded();
    assert_eq!(bundle.entries.len(), MAX_BUNDLE_ENTRIES);

    let auth = service.authorize_transfer(&bundle, 0, &h.state(25)).unwrap();
    assert_eq!(auth.tally().total_weight(), 30);
    assert_eq!(auth.tally().count(EntryStatus::Padding), MAX_BUNDLE_ENTRIES - 1);
}

#[test]
fn duplicate_approver_cannot_reach_threshold_alone() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let bundle = h.bundle(transfer(0, 100), &[1, 1, 1]);

    assert_eq!(
        service.authorize_transfer(&bundle, 0, &h.state(25)),
        Err(AuthorizationError::ThresholdNotMet {
            approved: 20,
            threshold: 25
        })
    );
}

#[test]
fn tampered_proof_zeroes_only_that_entry() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let mut bundle = h.bundle(transfer(0, 100), &[0, 1, 2]);
    bundle.entries[2].proof.steps_mut()[0].sibling[5] ^= 0x01;

    let auth = service.authorize_transfer(&bundle, 0, &h.state(25)).unwrap();
    assert_eq!(auth.tally().total_weight(), 30);
    assert_eq!(auth.tally().statuses()[2], EntryStatus::InvalidMembership);
}

// ──────────────────────────────────────────────────────────────
// Replay binding
// ──────────────────────────────────────────────────────────────

#[test]
fn stale_sequence_is_rejected_regardless_of_signatures() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let bundle = h.bundle(transfer(5, 100), &[0, 1, 2]);

    assert_eq!(
        service.authorize_transfer(&bundle, 6, &h.state(25)),
        Err(AuthorizationError::SequenceMismatch {
            expected: 6,
            found: 5
        })
    );
}

#[test]
fn bundle_for_other_account_is_identity_mismatch() {
    let h = Harness::new(&[10, 20, 30]);
    let other = Identity::from_bytes([0xCC; 32]);
    let service = AuthorizationService::ed25519(other);
    let bundle = h.bundle(transfer(0, 100), &[0, 1, 2]);

    assert_eq!(
        service.authorize_transfer(&bundle, 0, &h.state(25)),
        Err(AuthorizationError::IdentityMismatch)
    );
}

#[test]
fn oversized_bundle_is_capacity_exceeded() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let mut bundle = h.bundle(transfer(0, 100), &[0, 1, 2]);
    let last = bundle.entries[2].clone();
    bundle.entries.resize(MAX_BUNDLE_ENTRIES + 1, last);

    assert_eq!(
        service.authorize_transfer(&bundle, 0, &h.state(25)),
        Err(AuthorizationError::CapacityExceeded {
            count: MAX_BUNDLE_ENTRIES + 1,
            capacity: MAX_BUNDLE_ENTRIES
        })
    );
}

// ──────────────────────────────────────────────────────────────
// Threshold updates
// ──────────────────────────────────────────────────────────────

#[test]
fn mismatched_permit_is_rejected_even_with_full_weight() {
    let h = Harness::new(&[10, 20, 30]);
    let service = AuthorizationService::ed25519(ACCOUNT);
    let update = Action::threshold_update(ACCOUNT, 0, 40).unwrap();
    let permit = Permit::for_payload(b"some other payload", Vec::new());
    // Full weight, but signed over the unrelated permit.
    let mut signed = permit.clone();
    let message = permit.signing_message();
    for signer in &h.signers {
        let (record, proof) = h.tree.prove_identity(&signer.identity()).unwrap();
        signed.push_entry(AuthEntry::sign(signer, record.weight, proof, &message));
    }

    assert_eq!(
        service.authorize_threshold_update(signed, &update, 0, &h.state(25)),
        Err(AuthorizationError::AuthDataMismatch)
    );
}

#[test]
fn accepted_update_changes_future_decisions() {
    let h = Harness::new(&[10, 20, 30]);
    let mut ledger = InMemoryLedger::new();
    ledger.deploy(ACCOUNT, &h.records(), 25).unwrap();
    ledger.fund(ACCOUNT, 1_000).unwrap();
    let service = AuthorizationService::ed25519(ACCOUNT);

    let update = Action::threshold_update(ACCOUNT, 0, 50).unwrap();
    let auth = service
        .authorize_threshold_update_with(h.permit(&update, &[1, 2]), &update, &ledger)
        .unwrap();
    ledger.apply_threshold_update(&auth).unwrap();
    assert_eq!(ledger.registry_state(&ACCOUNT).unwrap().threshold(), 50);
    assert_eq!(ledger.current_sequence(&ACCOUNT).unwrap(), 1);

    // 10 + 20 was enough before the update; it is not anymore.
    let bundle = h.bundle(transfer(1, 10), &[0, 1]);
    assert_eq!(
        service.authorize_transfer_with(&bundle, &ledger),
        Err(AuthorizationError::ThresholdNotMet {
            approved: 30,
            threshold: 50
        })
    );

    let bundle = h.bundle(transfer(1, 10), &[1, 2]);
    let auth = service.authorize_transfer_with(&bundle, &ledger).unwrap();
    ledger.apply_transfer(&auth).unwrap();
    assert_eq!(ledger.balance(&RECIPIENT), 10);
}

// ──────────────────────────────────────────────────────────────
// Ledger flow
// ──────────────────────────────────────────────────────────────

#[test]
fn ledger_flow_applies_each_authorization_once() {
    let h = Harness::new(&[10, 20, 30]);
    let mut ledger = InMemoryLedger::new();
    ledger.deploy(ACCOUNT, &h.records(), 25).unwrap();
    ledger.fund(ACCOUNT, 500).unwrap();
    let service = AuthorizationService::ed25519(ACCOUNT);

    let first = service
        .authorize(
            Submission::Transfer {
                bundle: h.bundle(transfer(0, 200), &[2]),
            },
            &ledger,
        )
        .unwrap();
    let Authorization::Transfer(first) = first else {
        panic!("expected a transfer authorization");
    };
    ledger.apply_transfer(&first).unwrap();

    // Replaying the same bundle is now a sequence mismatch.
    let replay = h.bundle(transfer(0, 200), &[2]);
    assert_eq!(
        service.authorize_transfer_with(&replay, &ledger),
        Err(AuthorizationError::SequenceMismatch {
            expected: 1,
            found: 0
        })
    );
    // Re-applying the accepted authorization is stale.
    assert!(matches!(
        ledger.apply_transfer(&first),
        Err(LedgerError::StaleAuthorization { .. })
    ));

    let second = service
        .authorize_transfer_with(&h.bundle(transfer(1, 300), &[0, 1]), &ledger)
        .unwrap();
    ledger.apply_transfer(&second).unwrap();

    assert_eq!(ledger.balance(&ACCOUNT), 0);
    assert_eq!(ledger.balance(&RECIPIENT), 500);
    assert_eq!(ledger.current_sequence(&ACCOUNT).unwrap(), 2);
    assert_eq!(ledger.latest_action_hash(&ACCOUNT).unwrap(), *second.action_hash());
    assert_eq!(ledger.events().len(), 3);
}

#[test]
fn submission_shape_must_match_action_kind() {
    let h = Harness::new(&[10, 20, 30]);
    let mut ledger = InMemoryLedger::new();
    ledger.deploy(ACCOUNT, &h.records(), 25).unwrap();
    let service = AuthorizationService::ed25519(ACCOUNT);

    let update = Action::threshold_update(ACCOUNT, 0, 40).unwrap();
    let result = service.authorize(
        Submission::Transfer {
            bundle: h.bundle(update, &[0, 1, 2]),
        },
        &ledger,
    );
    assert!(matches!(result, Err(AuthorizationError::InvalidParameter { .. })));
}

#[test]
fn unknown_account_is_invalid_parameter() {
    let h = Harness::new(&[10, 20, 30]);
    let ledger = InMemoryLedger::new();
    let service = AuthorizationService::ed25519(ACCOUNT);
    let bundle = h.bundle(transfer(0, 1), &[0, 1, 2]);
    assert!(matches!(
        service.authorize_transfer_with(&bundle, &ledger),
        Err(AuthorizationError::InvalidParameter { .. })
    ));
}

// ──────────────────────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────────────────────

#[test]
fn config_state_matches_ledger_deployment() {
    let h = Harness::new(&[10, 20, 30]);
    let config = RegistryConfig {
        account: ACCOUNT,
        threshold: 25,
        sequence: 0,
        approvers: h.records().into_iter().map(ApproverEntry::from).collect(),
    };
    let parsed = RegistryConfig::from_toml(&config.to_toml().unwrap()).unwrap();

    let mut ledger = InMemoryLedger::new();
    let deployed = ledger.deploy(ACCOUNT, &parsed.records(), parsed.threshold).unwrap();
    assert_eq!(deployed, parsed.registry_state().unwrap());
    assert_eq!(deployed.root(), &build_commitment(&h.records()).unwrap());
}

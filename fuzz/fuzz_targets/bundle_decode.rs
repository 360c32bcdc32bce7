//! Fuzz harness for bundle decoding and the weighted tally.
//!
//! Arbitrary bytes are decoded as a JSON `AuthorizationBundle`. Every bundle
//! that decodes is tallied against a fixed registry; the tally must never
//! panic, must reject oversized bundles before verification, and can never
//! report more weight than the registry holds.

#![no_main]
use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use quorum_core::{
    ApproverRecord, AuthorizationBundle, AuthorizationError, Ed25519Verifier, MAX_BUNDLE_ENTRIES,
    RegistryTree, Signer,
};

static TREE: LazyLock<RegistryTree> = LazyLock::new(|| {
    let records: Vec<ApproverRecord> = (1..=3u8)
        .zip([10, 20, 30])
        .map(|(seed, weight)| ApproverRecord::new(Signer::from_seed(&[seed; 32]).identity(), weight))
        .collect();
    RegistryTree::build(&records).expect("fixed registry is valid")
});

fuzz_target!(|data: &[u8]| {
    let Ok(bundle) = serde_json::from_slice::<AuthorizationBundle>(data) else {
        return;
    };
    // Malformed actions still decode; validation must classify them, and the
    // tally below does not depend on the action being valid.
    if let Err(err) = bundle.action.validate() {
        assert!(
            matches!(err, AuthorizationError::InvalidParameter { .. }),
            "unexpected validation error: {err}"
        );
    }

    match bundle.compute_approved_weight(&TREE.root(), 25, &Ed25519Verifier) {
        Ok(tally) => {
            assert!(bundle.entries.len() <= MAX_BUNDLE_ENTRIES);
            assert!(u64::from(tally.total_weight()) <= TREE.total_weight());
            assert_eq!(tally.statuses().len(), bundle.entries.len());
        },
        Err(AuthorizationError::CapacityExceeded { count, .. }) => {
            assert_eq!(count, bundle.entries.len());
            assert!(count > MAX_BUNDLE_ENTRIES);
        },
        Err(other) => panic!("unexpected tally error: {other}"),
    }
});

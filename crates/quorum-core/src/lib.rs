//! # quorum-core
//!
//! Weighted multi-signature authorization over a Merkle-committed approver
//! registry.
//!
//! An account commits to its approver set with a fixed-depth Merkle root.
//! Each approver has a weight. An operation on the account is authorized
//! when signatures from distinct registry members, each proven against the
//! root, add up to at least the account's threshold, and the operation is
//! bound to the account's current sequence number.
//!
//! ## Core Concepts
//!
//! - **Registry**: ordered [`ApproverRecord`] list committed by
//!   [`build_commitment`]; [`RegistryTree`] also produces membership proofs
//! - **Action**: canonical description of an operation, bound to a subject
//!   account and sequence number ([`Action`])
//! - **Bundle**: an action plus the approver entries signing it
//!   ([`AuthorizationBundle`])
//! - **Permit**: weighted approval over an opaque auth-data hash, bound to a
//!   payload when consumed ([`Permit`])
//! - **Service**: accept/reject decisions against a [`RegistryState`]
//!   ([`AuthorizationService`])
//!
//! ## Example
//!
//! ```rust
//! use quorum_core::{
//!     Action, ApproverRecord, AuthorizationBundle, AuthorizationService, Identity,
//!     RegistryState, RegistryTree, Signer,
//! };
//!
//! let approvers: Vec<Signer> = (1..=3u8).map(|i| Signer::from_seed(&[i; 32])).collect();
//! let records: Vec<ApproverRecord> = approvers
//!     .iter()
//!     .zip([10, 20, 30])
//!     .map(|(s, w)| ApproverRecord::new(s.identity(), w))
//!     .collect();
//! let tree = RegistryTree::build(&records)?;
//! let state = RegistryState::new(tree.root(), 25)?;
//!
//! let account = Identity::from_bytes([0xAA; 32]);
//! let recipient = Identity::from_bytes([0xBB; 32]);
//! let mut bundle = AuthorizationBundle::new(Action::transfer(account, 0, 100, recipient)?);
//! for signer in &approvers[..2] {
//!     let (record, proof) = tree.prove_identity(&signer.identity()).expect("registered");
//!     bundle.sign_and_push(signer, record.weight, proof)?;
//! }
//!
//! let authorization = AuthorizationService::ed25519(account).authorize_transfer(&bundle, 0, &state)?;
//! assert_eq!(authorization.tally().total_weight(), 30);
//! assert_eq!(authorization.next_sequence(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod approval;
pub mod bundle;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod ledger;
pub mod permit;
pub mod registry;
pub mod service;

pub use action::{Action, ActionKind, MAX_THRESHOLD};
pub use approval::{AuthEntry, Decision, EntryStatus, MAX_BUNDLE_ENTRIES, WeightTally, tally_entries};
pub use bundle::AuthorizationBundle;
pub use config::{ApproverEntry, ConfigError, RegistryConfig};
pub use crypto::{Ed25519Verifier, Hash, Identity, SignatureBytes, SignatureVerifier, Signer};
pub use error::{AuthorizationError, AuthorizationResult};
pub use ledger::{InMemoryLedger, LedgerError, LedgerEvent, LedgerView};
pub use permit::{Permit, hash_auth_data};
pub use registry::{
    ApproverRecord, MAX_APPROVER_WEIGHT, MembershipError, MembershipProof, ProofStep,
    REGISTRY_CAPACITY, REGISTRY_DEPTH, RegistryError, RegistryTree, approver_leaf_hash,
    build_commitment, verify_membership,
};
pub use service::{
    Authorization, AuthorizationService, RegistryState, Submission, ThresholdAuthorization,
    TransferAuthorization, TransferEffect,
};

//! Approver registry: a fixed-depth Merkle commitment over weighted approvers.
//!
//! The registry holds up to [`REGISTRY_CAPACITY`] approvers, each an
//! `(identity, weight)` pair. Record `i` occupies leaf `i`; unused leaves hold
//! the empty-approver leaf so the tree shape is always fully defined. Only the
//! root is committed on chain; approvers prove membership with a
//! [`MembershipProof`] of exactly [`REGISTRY_DEPTH`] steps.
//!
//! # Hashing
//!
//! ```text
//! leaf(identity, weight) = blake3("quorum:approver_leaf:v1\0" || identity || weight_le32)
//! empty_leaf             = blake3("quorum:empty_approver:v1\0")
//! node(left, right)      = blake3("quorum:registry_node:v1\0" || left || right)
//! ```
//!
//! # Construction
//!
//! [`build_commitment`] and [`RegistryTree::build`] are pure functions of an
//! immutable, ordered record slice. Neither consumes nor reorders the
//! caller's records, and neither depends on any earlier call.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Hash, Identity, domain, hash_with_domain, hashes_equal};
use crate::encoding::hex32;

/// Depth of the registry tree.
pub const REGISTRY_DEPTH: usize = 8;

/// Number of leaves in the registry tree (`2^REGISTRY_DEPTH`).
pub const REGISTRY_CAPACITY: usize = 1 << REGISTRY_DEPTH;

/// Largest weight a single approver may hold.
pub const MAX_APPROVER_WEIGHT: u32 = 1 << 16;

static EMPTY_APPROVER_LEAF: LazyLock<Hash> =
    LazyLock::new(|| hash_with_domain(domain::EMPTY_APPROVER, &[]));

/// Leaf hash stored in unused registry slots.
#[must_use]
pub fn empty_approver_leaf() -> Hash {
    *EMPTY_APPROVER_LEAF
}

/// Leaf hash for a populated registry slot.
#[must_use]
pub fn approver_leaf_hash(identity: &Identity, weight: u32) -> Hash {
    hash_with_domain(
        domain::APPROVER_LEAF,
        &[identity.as_bytes(), &weight.to_le_bytes()],
    )
}

fn node_hash(left: &Hash, right: &Hash) -> Hash {
    hash_with_domain(domain::REGISTRY_NODE, &[left, right])
}

// ──────────────────────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────────────────────

/// Errors produced while building a registry or generating proofs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// More records than leaves.
    #[error("registry has {count} records, capacity is {max}")]
    TooManyRecords {
        /// Records supplied.
        count: usize,
        /// Tree capacity.
        max: usize,
    },

    /// A record uses the empty-approver sentinel identity.
    #[error("record {index} uses the empty-approver identity")]
    EmptyIdentity {
        /// Position of the offending record.
        index: usize,
    },

    /// A record's weight exceeds [`MAX_APPROVER_WEIGHT`].
    #[error("record {index} has weight {weight}, maximum is {max}")]
    WeightOutOfRange {
        /// Position of the offending record.
        index: usize,
        /// Supplied weight.
        weight: u32,
        /// Maximum allowed weight.
        max: u32,
    },

    /// The same identity appears more than once.
    #[error("record {index} duplicates an earlier identity")]
    DuplicateIdentity {
        /// Position of the second occurrence.
        index: usize,
    },

    /// Leaf index beyond the tree capacity.
    #[error("leaf index {index} out of range (capacity {capacity})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Tree capacity.
        capacity: usize,
    },
}

/// Reasons a membership proof fails to verify.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MembershipError {
    /// Proof length differs from the tree depth.
    #[error("proof has {found} steps, tree depth is {expected}")]
    DepthMismatch {
        /// Tree depth.
        expected: usize,
        /// Steps in the proof.
        found: usize,
    },

    /// Claimed leaf index is beyond the tree capacity.
    #[error("leaf index {index} out of range")]
    IndexOutOfRange {
        /// Claimed index.
        index: u32,
    },

    /// A step's side flag disagrees with the claimed leaf index.
    #[error("proof step {level} is on the wrong side for the claimed index")]
    PathMismatch {
        /// Level (0 = leaf level) of the first disagreeing step.
        level: usize,
    },

    /// The recomputed root differs from the committed root.
    #[error("recomputed root does not match the committed root")]
    RootMismatch,
}

// ──────────────────────────────────────────────────────────────
// Records and proofs
// ──────────────────────────────────────────────────────────────

/// A registered approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApproverRecord {
    /// Approver public key.
    pub identity: Identity,
    /// Voting weight, fixed at registration.
    pub weight: u32,
}

impl ApproverRecord {
    /// Create a record.
    #[must_use]
    pub const fn new(identity: Identity, weight: u32) -> Self {
        Self { identity, weight }
    }

    /// The record's leaf hash.
    #[must_use]
    pub fn leaf_hash(&self) -> Hash {
        approver_leaf_hash(&self.identity, self.weight)
    }
}

/// One step of a membership proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofStep {
    /// Hash of the sibling node.
    #[serde(with = "hex32")]
    pub sibling: Hash,
    /// Whether the sibling is the left child.
    pub is_left: bool,
}

/// Inclusion path from a leaf to the registry root, leaf level first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipProof {
    steps: Vec<ProofStep>,
}

impl MembershipProof {
    /// Wrap proof steps (leaf level first).
    #[must_use]
    pub const fn new(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }

    /// The empty proof carried by padding entries. It never verifies.
    #[must_use]
    pub const fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Proof steps, leaf level first.
    #[must_use]
    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    /// Mutable access to the steps.
    pub fn steps_mut(&mut self) -> &mut [ProofStep] {
        &mut self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the proof has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Leaf index implied by the side flags, or `None` if the proof does not
    /// have exactly [`REGISTRY_DEPTH`] steps.
    #[must_use]
    pub fn leaf_index(&self) -> Option<u32> {
        if self.steps.len() != REGISTRY_DEPTH {
            return None;
        }
        Some(
            self.steps
                .iter()
                .enumerate()
                .filter(|(_, step)| step.is_left)
                .fold(0u32, |acc, (level, _)| acc | (1 << level)),
        )
    }

    /// Fold `leaf` up the path.
    #[must_use]
    pub fn compute_root(&self, leaf: &Hash) -> Hash {
        self.steps.iter().fold(*leaf, |current, step| {
            if step.is_left {
                node_hash(&step.sibling, &current)
            } else {
                node_hash(&current, &step.sibling)
            }
        })
    }
}

/// Check that `leaf_hash` sits at `index` under `root`.
///
/// # Errors
///
/// Returns the first reason the proof fails. There is no partial or
/// zero-weight success.
pub fn check_membership(
    leaf_hash: &Hash,
    index: u32,
    proof: &MembershipProof,
    root: &Hash,
) -> Result<(), MembershipError> {
    if index as usize >= REGISTRY_CAPACITY {
        return Err(MembershipError::IndexOutOfRange { index });
    }
    if proof.len() != REGISTRY_DEPTH {
        return Err(MembershipError::DepthMismatch {
            expected: REGISTRY_DEPTH,
            found: proof.len(),
        });
    }
    for (level, step) in proof.steps().iter().enumerate() {
        let is_right_child = (index >> level) & 1 == 1;
        if step.is_left != is_right_child {
            return Err(MembershipError::PathMismatch { level });
        }
    }
    if hashes_equal(&proof.compute_root(leaf_hash), root) {
        Ok(())
    } else {
        Err(MembershipError::RootMismatch)
    }
}

/// Whether `leaf_hash` sits at `index` under `root`.
#[must_use]
pub fn verify_membership(
    leaf_hash: &Hash,
    index: u32,
    proof: &MembershipProof,
    root: &Hash,
) -> bool {
    check_membership(leaf_hash, index, proof, root).is_ok()
}

// ──────────────────────────────────────────────────────────────
// Construction
// ──────────────────────────────────────────────────────────────

fn validate_records(records: &[ApproverRecord]) -> Result<(), RegistryError> {
    if records.len() > REGISTRY_CAPACITY {
        return Err(RegistryError::TooManyRecords {
            count: records.len(),
            max: REGISTRY_CAPACITY,
        });
    }
    let mut seen = BTreeSet::new();
    for (index, record) in records.iter().enumerate() {
        if record.identity.is_empty() {
            return Err(RegistryError::EmptyIdentity { index });
        }
        if record.weight > MAX_APPROVER_WEIGHT {
            return Err(RegistryError::WeightOutOfRange {
                index,
                weight: record.weight,
                max: MAX_APPROVER_WEIGHT,
            });
        }
        if !seen.insert(record.identity) {
            return Err(RegistryError::DuplicateIdentity { index });
        }
    }
    Ok(())
}

fn leaf_layer(records: &[ApproverRecord]) -> Vec<Hash> {
    let empty = empty_approver_leaf();
    (0..REGISTRY_CAPACITY)
        .map(|index| records.get(index).map_or(empty, ApproverRecord::leaf_hash))
        .collect()
}

fn parent_layer(layer: &[Hash]) -> Vec<Hash> {
    layer
        .chunks_exact(2)
        .map(|pair| node_hash(&pair[0], &pair[1]))
        .collect()
}

/// Compute the registry root for an ordered record list.
///
/// Record `i` is placed at leaf `i`; remaining leaves are padded with the
/// empty-approver leaf.
///
/// # Errors
///
/// Returns an error if there are more than [`REGISTRY_CAPACITY`] records, a
/// record uses the empty identity, a weight exceeds [`MAX_APPROVER_WEIGHT`],
/// or an identity repeats.
pub fn build_commitment(records: &[ApproverRecord]) -> Result<Hash, RegistryError> {
    validate_records(records)?;
    let mut layer = leaf_layer(records);
    for _ in 0..REGISTRY_DEPTH {
        layer = parent_layer(&layer);
    }
    Ok(layer[0])
}

/// Fully materialized registry tree, used off chain to produce proofs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTree {
    records: Vec<ApproverRecord>,
    /// `levels[0]` are the leaves, `levels[REGISTRY_DEPTH]` is `[root]`.
    levels: Vec<Vec<Hash>>,
}

impl RegistryTree {
    /// Build the tree for an ordered record list.
    ///
    /// # Errors
    ///
    /// Same conditions as [`build_commitment`].
    pub fn build(records: &[ApproverRecord]) -> Result<Self, RegistryError> {
        validate_records(records)?;
        let mut levels = Vec::with_capacity(REGISTRY_DEPTH + 1);
        levels.push(leaf_layer(records));
        for depth in 0..REGISTRY_DEPTH {
            let parent = parent_layer(&levels[depth]);
            levels.push(parent);
        }
        Ok(Self {
            records: records.to_vec(),
            levels,
        })
    }

    /// The registry root.
    #[must_use]
    pub fn root(&self) -> Hash {
        self.levels[REGISTRY_DEPTH][0]
    }

    /// Registered approvers in leaf order.
    #[must_use]
    pub fn approvers(&self) -> &[ApproverRecord] {
        &self.records
    }

    /// Number of registered approvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no approvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all registered weights.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.weight)).sum()
    }

    /// Record at `index`, if populated.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<&ApproverRecord> {
        self.records.get(index)
    }

    /// Leaf index of `identity`, if registered.
    #[must_use]
    pub fn position(&self, identity: &Identity) -> Option<u32> {
        self.records
            .iter()
            .position(|r| r.identity == *identity)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Inclusion proof for leaf `index` (populated or empty).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IndexOutOfRange`] beyond the capacity.
    pub fn prove(&self, index: usize) -> Result<MembershipProof, RegistryError> {
        if index >= REGISTRY_CAPACITY {
            return Err(RegistryError::IndexOutOfRange {
                index,
                capacity: REGISTRY_CAPACITY,
            });
        }
        let steps = (0..REGISTRY_DEPTH)
            .map(|level| {
                let position = index >> level;
                let sibling = self.levels[level][position ^ 1];
                ProofStep {
                    sibling,
                    is_left: position & 1 == 1,
                }
            })
            .collect();
        Ok(MembershipProof::new(steps))
    }

    /// Record and inclusion proof for a registered identity.
    #[must_use]
    pub fn prove_identity(&self, identity: &Identity) -> Option<(ApproverRecord, MembershipProof)> {
        let index = self.position(identity)? as usize;
        let proof = self.prove(index).ok()?;
        Some((self.records[index], proof))
    }
}

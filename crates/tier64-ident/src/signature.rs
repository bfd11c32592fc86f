//! Assembly of the five identifier lanes into a finished [`Id512`].
//!
//! Two entry points: [`compute_leaf_signature`] for payload-bearing
//! primitives (`Scalar`, `Blob`, `Chunk`) that carry raw bytes instead of
//! child ids, and [`compute_composite_signature`] for every other
//! operator — including `Symbol`, which owns a blob child rather than a raw
//! payload — whose identity is a function of its already-interned
//! children's ids.

use tier64_ontology::{traits, OpCode, OpTraits};

use crate::id::Id512;
use crate::spectral::{mix_commutative, mix_leaf, mix_noncommutative};

/// Build the identifier for a payload-bearing leaf node.
///
/// `val_hash` is the payload's deterministic 64-bit digest (see
/// [`crate::payload::ScalarValue::val_hash`]); `payload_bytes` is its
/// canonical byte encoding, fed into the entropy digest so that two
/// payloads with colliding `val_hash` but different content still diverge
/// in Entropy.
#[must_use]
pub fn compute_leaf_signature(op: OpCode, val_hash: u64, payload_bytes: &[u8]) -> Id512 {
    debug_assert!(op.is_primitive());

    // A leaf has no children to take a max over, so depth and mass both
    // bottom out at 1 rather than 0.
    let depth: u64 = 1;
    let mass: u64 = 1;
    let qec = mix_leaf(op, val_hash);

    let mut hasher = blake3::Hasher::new();
    hasher.update(b"tier64/leaf");
    hasher.update(&op.code().to_le_bytes());
    hasher.update(&depth.to_le_bytes());
    hasher.update(&mass.to_le_bytes());
    hasher.update(&qec.to_le_bytes());
    hasher.update(payload_bytes);
    let entropy: [u8; 32] = *hasher.finalize().as_bytes();

    Id512::assemble(op.code() as u64, depth, mass, qec, entropy)
}

/// Build the identifier for a composite node from its already-interned
/// children.
///
/// Depth is one past the deepest child. Mass is one plus the sum of
/// children's mass — every node, including
/// leaves, contributes exactly one unit of mass to its parents.
///
/// QEC mixing is order-insensitive for operators whose trait set includes
/// `COMMUTATIVE`, and order-sensitive otherwise — this is what makes
/// `Add(a, b)` and `Add(b, a)` collapse to the same id while `Pow(a, b)`
/// and `Pow(b, a)` do not.
#[must_use]
pub fn compute_composite_signature(op: OpCode, children: &[Id512]) -> Id512 {
    debug_assert!(!op.is_primitive());

    let depth = children
        .iter()
        .map(Id512::depth)
        .max()
        .unwrap_or(0)
        .saturating_add(1);
    let mass = children
        .iter()
        .map(Id512::mass)
        .fold(0u64, u64::saturating_add)
        .saturating_add(1);

    let child_qecs: Vec<u64> = children.iter().map(Id512::qec).collect();
    let op_traits = traits(op);
    let qec = if op_traits.contains(OpTraits::COMMUTATIVE) {
        mix_commutative(op, &child_qecs)
    } else {
        mix_noncommutative(op, &child_qecs)
    };

    let mut hasher = blake3::Hasher::new();
    hasher.update(b"tier64/composite");
    hasher.update(&op.code().to_le_bytes());
    hasher.update(&depth.to_le_bytes());
    hasher.update(&mass.to_le_bytes());
    hasher.update(&qec.to_le_bytes());
    for child in children {
        let bytes = child.to_minimal_le_bytes();
        hasher.update(&(bytes.len() as u32).to_le_bytes());
        hasher.update(&bytes);
    }
    let entropy: [u8; 32] = *hasher.finalize().as_bytes();

    Id512::assemble(op.code() as u64, depth, mass, qec, entropy)
}

//! The holographic projection: a deterministic fold of a 512-bit identifier
//! down to 64 bits, used exclusively for HAMT bucket routing.
//!
//! This is emphatically not a general-purpose hash of the id — it must
//! never be substituted for language-provided hashing (`Hash`/`Hasher`),
//! because HAMT structure depends on this exact fold being stable across
//! processes and across Rust versions, which `std::hash::Hash` does not
//! promise. Every one of the eight 64-bit lane words participates (spec
//! §4.6: "fold the id into 64 bits by XOR-accumulating each 64-bit lane"),
//! alternating between the two fixed odd primes, finished with xor-shift
//! (31, 27, 33).

use crate::id::Id512;

const PRIME_1: u64 = 0xFF51_AFD7_ED55_8CCD;
const PRIME_2: u64 = 0xC4CE_B9FE_1A85_EC53;

/// Project a 512-bit id down to a 64-bit bucket-routing hash.
#[must_use]
pub fn holographic_hash(id: &Id512) -> u64 {
    let mut h: u64 = 0;
    for (i, word) in id.raw_words().into_iter().enumerate() {
        let prime = if i % 2 == 0 { PRIME_1 } else { PRIME_2 };
        h = (h ^ word).wrapping_mul(prime);
    }
    avalanche(h)
}

fn avalanche(mut h: u64) -> u64 {
    h ^= h >> 31;
    h = h.wrapping_mul(PRIME_1);
    h ^= h >> 27;
    h = h.wrapping_mul(PRIME_2);
    h ^= h >> 33;
    h
}

/// Route a hash value into one of 32 buckets using a 5-bit slice at the
/// given trie depth, matching the bottom-up HAMT builder's partitioning.
#[must_use]
pub fn bucket_slice(hash: u64, depth: u32) -> usize {
    ((hash >> (depth * 5)) & 0x1F) as usize
}

/// A non-interned marker carrying a HAMT node's bitmap value in its QEC
/// lane, so that feeding it through the ordinary composite-signature
/// assembly alongside the node's real children naturally folds the bitmap
/// into both the entropy digest and the QEC basis — spec §4.2: "the HAMT
/// operator's payload is a 64-bit bitmap included in the digest *and*
/// XOR-mixed into the QEC basis; without this, sibling HAMT nodes that
/// differ only in bitmap would collide."
///
/// This id is never registered in the hash-cons table: `args[0]` of a
/// `Hamt` node is data, not an owned child, so the kernel never retains,
/// releases, or cascades into it (see the HAMT row of the retention rules).
#[must_use]
pub fn encode_bitmap(bitmap: u32) -> Id512 {
    Id512::assemble(0, 0, 0, u64::from(bitmap), [0u8; 32])
}

/// Inverse of [`encode_bitmap`].
#[must_use]
pub fn decode_bitmap(marker: &Id512) -> u32 {
    marker.qec() as u32
}

//! The 512-bit identifier: five lanes packed into eight 64-bit words.
//!
//! Layout (spec §3), word index `w[0]` is least significant:
//!
//! | word(s) | bit range | lane |
//! |---|---|---|
//! | `w[0]` | 0..63 | Meta (operator code in low 16 bits) |
//! | `w[1]` | 64..127 | Depth |
//! | `w[2]` | 128..191 | Mass |
//! | `w[3]` | 192..255 | QEC |
//! | `w[4..8]` | 256..511 | Entropy (256-bit digest, little-endian words) |

use std::cmp::Ordering;
use std::fmt;

use tier64_ontology::OpCode;

/// An opaque 512-bit content identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id512 {
    words: [u64; 8],
}

impl Id512 {
    /// Assemble an id from its five lanes. Internal to `tier64-ident` — the
    /// only legitimate caller is [`crate::signature::compute_signature`].
    pub(crate) fn assemble(meta: u64, depth: u64, mass: u64, qec: u64, entropy: [u8; 32]) -> Self {
        let mut words = [0u64; 8];
        words[0] = meta;
        words[1] = depth;
        words[2] = mass;
        words[3] = qec;
        for i in 0..4 {
            let chunk: [u8; 8] = entropy[i * 8..i * 8 + 8].try_into().unwrap();
            words[4 + i] = u64::from_le_bytes(chunk);
        }
        Self { words }
    }

    /// Raw 16-bit operator code stored in the low bits of the Meta lane.
    #[must_use]
    pub const fn op_code_raw(&self) -> u16 {
        (self.words[0] & 0xFFFF) as u16
    }

    /// Decode the operator code. Panics if the id was somehow assembled with
    /// a code outside the closed enumeration — that can only happen through
    /// memory corruption, never through this crate's own construction path.
    #[must_use]
    pub fn op_code(&self) -> OpCode {
        OpCode::from_code(self.op_code_raw()).expect("id carries a closed-enumeration op code")
    }

    #[must_use]
    pub const fn depth(&self) -> u64 {
        self.words[1]
    }

    #[must_use]
    pub const fn mass(&self) -> u64 {
        self.words[2]
    }

    #[must_use]
    pub const fn qec(&self) -> u64 {
        self.words[3]
    }

    /// The 256-bit entropy lane as big-endian-ordered display bytes (word
    /// `w[7]` — the most significant — first).
    #[must_use]
    pub fn entropy_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for i in 0..4 {
            out[i * 8..i * 8 + 8].copy_from_slice(&self.words[4 + i].to_le_bytes());
        }
        out
    }

    /// Minimal little-endian byte serialization of this id treated as a
    /// single unsigned 512-bit integer — used as the entropy-lane input when
    /// this id appears as a child of another node (spec §4.2 step 2).
    #[must_use]
    pub fn to_minimal_le_bytes(&self) -> Vec<u8> {
        let mut highest = 7usize;
        while highest > 0 && self.words[highest] == 0 {
            highest -= 1;
        }
        let top = self.words[highest];
        let top_bytes = if top == 0 { 1 } else { (8 - top.leading_zeros() / 8) as usize };
        let mut out = Vec::with_capacity(highest * 8 + top_bytes);
        for w in &self.words[..highest] {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out.extend_from_slice(&top.to_le_bytes()[..top_bytes]);
        out
    }

    /// The eight raw 64-bit lane words, least-significant word first. Used
    /// by the holographic projection, which must fold every lane — not a
    /// general-purpose accessor for lane semantics.
    #[must_use]
    pub(crate) const fn raw_words(&self) -> [u64; 8] {
        self.words
    }

    /// The full 64-byte little-endian encoding (word 0 first), for contexts
    /// that want a fixed-width representation (e.g. `Display`/hex).
    #[must_use]
    pub fn to_fixed_le_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        for (i, w) in self.words.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&w.to_le_bytes());
        }
        out
    }
}

impl PartialOrd for Id512 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id512 {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..8).rev() {
            match self.words[i].cmp(&other.words[i]) {
                Ordering::Equal => continue,
                other_ordering => return other_ordering,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Id512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for w in self.words.iter().rev() {
            write!(f, "{w:016x}")?;
        }
        Ok(())
    }
}

impl fmt::LowerHex for Id512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

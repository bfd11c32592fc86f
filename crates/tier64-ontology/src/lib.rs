//! Operator ontology: the closed set of operator codes and their algebraic
//! traits.
//!
//! This is a pure, stateless lookup table. No runtime registration — unlike
//! a dispatch registry, extending this enum is a versioned source change.

#![deny(unsafe_code)]

use bitflags::bitflags;

bitflags! {
    /// Algebraic properties that drive normalization and canonicalization.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpTraits: u8 {
        const COMMUTATIVE   = 1 << 0;
        const ASSOCIATIVE   = 1 << 1;
        const IDEMPOTENT    = 1 << 2;
        const IDENTITY_ZERO = 1 << 3;
        const IDENTITY_ONE  = 1 << 4;
        const INVOLUTIVE    = 1 << 5;
        const ANTISYMMETRIC = 1 << 6;
    }
}

/// The closed enumeration of operator kinds.
///
/// Grouped as spec describes: primitives, algebra, structures, navigation,
/// categorical. The discriminant is the 16-bit operator code stored in the
/// Meta lane's low bits.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpCode {
    // --- primitives ---
    Scalar = 0,
    Blob = 1,
    Chunk = 2,
    // --- algebra ---
    Symbol = 3,
    Add = 4,
    Mul = 5,
    Pow = 6,
    Exp = 7,
    // --- structures ---
    Cons = 8,
    Queue = 9,
    Hamt = 10,
    Kv = 11,
    Vector = 12,
    // --- navigation ---
    Zipper = 13,
    Lens = 14,
    // --- categorical ---
    Tensor = 15,
    Dual = 16,
    Contract = 17,
    Lambda = 18,
}

/// Total number of distinct operator codes. Used to size dense per-operator
/// tables (e.g. the spectral basis table, the sector table).
pub const NUM_OPCODES: usize = 19;

impl OpCode {
    /// All operator codes, in discriminant order.
    pub const ALL: [OpCode; NUM_OPCODES] = [
        OpCode::Scalar,
        OpCode::Blob,
        OpCode::Chunk,
        OpCode::Symbol,
        OpCode::Add,
        OpCode::Mul,
        OpCode::Pow,
        OpCode::Exp,
        OpCode::Cons,
        OpCode::Queue,
        OpCode::Hamt,
        OpCode::Kv,
        OpCode::Vector,
        OpCode::Zipper,
        OpCode::Lens,
        OpCode::Tensor,
        OpCode::Dual,
        OpCode::Contract,
        OpCode::Lambda,
    ];

    /// The raw 16-bit code, as stored in the Meta lane.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Dense array index for per-operator tables (identical to `code` while
    /// the enum stays contiguous from zero; kept as a separate name so
    /// callers don't assume that contiguity is load-bearing).
    #[must_use]
    pub const fn index(self) -> usize {
        self.code() as usize
    }

    /// Decode a raw operator code back into an `OpCode`.
    ///
    /// Returns `None` for codes outside the closed enumeration — callers
    /// must treat that as malformed-construction, not silently coerce it.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(OpCode::Scalar),
            1 => Some(OpCode::Blob),
            2 => Some(OpCode::Chunk),
            3 => Some(OpCode::Symbol),
            4 => Some(OpCode::Add),
            5 => Some(OpCode::Mul),
            6 => Some(OpCode::Pow),
            7 => Some(OpCode::Exp),
            8 => Some(OpCode::Cons),
            9 => Some(OpCode::Queue),
            10 => Some(OpCode::Hamt),
            11 => Some(OpCode::Kv),
            12 => Some(OpCode::Vector),
            13 => Some(OpCode::Zipper),
            14 => Some(OpCode::Lens),
            15 => Some(OpCode::Tensor),
            16 => Some(OpCode::Dual),
            17 => Some(OpCode::Contract),
            18 => Some(OpCode::Lambda),
            _ => None,
        }
    }

    /// Whether this operator's arguments are raw child ids (vs. a scalar
    /// payload, blob payload, or bitmap + child ids).
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        matches!(self, OpCode::Scalar | OpCode::Blob | OpCode::Chunk)
    }
}

/// Pure lookup of an operator's algebraic trait set.
///
/// Trait assignment by operator:
/// - `add`: commutative, associative, identity-zero
/// - `mul`: commutative, associative, identity-one
/// - `tensor`: associative (NOT commutative), identity-one
/// - `dual`: involutive
/// - `cons`, `hamt`, `kv`, `symbol`: no traits — order is semantically
///   significant
/// - `pow`, `exp`, `blob`, `scalar`: no algebraic traits
#[must_use]
pub const fn traits(op: OpCode) -> OpTraits {
    match op {
        OpCode::Add => OpTraits::COMMUTATIVE
            .union(OpTraits::ASSOCIATIVE)
            .union(OpTraits::IDENTITY_ZERO),
        OpCode::Mul => OpTraits::COMMUTATIVE
            .union(OpTraits::ASSOCIATIVE)
            .union(OpTraits::IDENTITY_ONE),
        OpCode::Tensor => OpTraits::ASSOCIATIVE.union(OpTraits::IDENTITY_ONE),
        OpCode::Dual => OpTraits::INVOLUTIVE,
        _ => OpTraits::empty(),
    }
}

/// Packs an operator code (high 16 bits) and a 56-bit physical slot index
/// (low bits) into a single 64-bit word, the representation
/// `tier64-arena`'s sectors use for cheap physical pointers.
///
/// A bijective packed-id scheme in the same spirit as a `Code32`, widened
/// from 32 to 64 bits because this kernel's sectors can outgrow a 24-bit
/// index.
///
/// # Panics
///
/// Panics if `slot` does not fit in 56 bits — this is a caller invariant
/// violation (an arena should never grow that large), not a recoverable
/// condition.
#[must_use]
pub const fn pack_physical_ptr(op: OpCode, slot: u64) -> u64 {
    assert!(slot <= 0x00FF_FFFF_FFFF_FFFF, "slot index exceeds 56 bits");
    ((op.code() as u64) << 56) | slot
}

/// Inverse of [`pack_physical_ptr`].
#[must_use]
pub const fn unpack_physical_ptr(word: u64) -> (u16, u64) {
    let op_code = (word >> 56) as u16;
    let slot = word & 0x00FF_FFFF_FFFF_FFFF;
    (op_code, slot)
}

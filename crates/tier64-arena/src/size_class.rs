//! Per-operator page size tuning.
//!
//! Each operator code gets its own growth increment ("page size") rather
//! than a single global one: leaf operators (`Scalar`, `Blob`) are allocated
//! far more often than structural ones (`Hamt`, `Zipper`), so sizing their
//! sectors' growth increments independently avoids both excess overallocation
//! for the rare operators and frequent reallocation for the common ones.

use tier64_ontology::{OpCode, NUM_OPCODES};

const DEFAULT_PAGE_SIZE: usize = 256;

const fn page_size_for(op: OpCode) -> usize {
    match op {
        OpCode::Scalar | OpCode::Symbol => 4096,
        OpCode::Add | OpCode::Mul => 2048,
        OpCode::Blob | OpCode::Chunk => 1024,
        OpCode::Cons | OpCode::Kv => 512,
        OpCode::Hamt | OpCode::Queue | OpCode::Vector => 256,
        _ => DEFAULT_PAGE_SIZE,
    }
}

const fn build_table() -> [usize; NUM_OPCODES] {
    let mut table = [0usize; NUM_OPCODES];
    let mut i = 0;
    while i < NUM_OPCODES {
        table[i] = page_size_for(OpCode::ALL[i]);
        i += 1;
    }
    table
}

/// Dense per-operator page size table, indexed by `OpCode::index`.
pub const PAGE_SIZES: [usize; NUM_OPCODES] = build_table();

#[must_use]
pub fn page_size(op: OpCode) -> usize {
    PAGE_SIZES[op.index()]
}

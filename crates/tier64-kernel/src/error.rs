//! Error kinds for the interning kernel, matching spec's three error
//! categories one-to-one: malformed construction, dead-id access, and
//! allocator corruption.

use thiserror::Error;

use tier64_ident::Id512;
use tier64_ontology::OpCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A caller-bug construction request: an operator invoked below its
    /// minimum arity (e.g. `Symbol` with no name blob, `Kv` with only a key).
    #[error("operator {op:?} requires at least {min} argument(s), got {got}")]
    Malformed { op: OpCode, min: usize, got: usize },

    /// `from_map` with no key-value pairs — the other shape "malformed
    /// construction" takes, called out separately since it carries no
    /// natural arity triple.
    #[error("hamt construction requires at least one key-value pair")]
    EmptyHamt,

    /// `get_args`/`retain`/`delete` against an id absent from `lookup`.
    /// Whether the id never existed or was already fully released down to
    /// zero references collapses to this one "not live" error — the two
    /// are indistinguishable to a caller and neither is recoverable.
    #[error("id {id} is not live")]
    DeadId { id: Id512 },

    /// An internal invariant violation: a sector's slot bookkeeping
    /// disagreed with the top-level lookup table. Not a recoverable
    /// condition in practice — the invariant that a released-to-zero slot's
    /// `lookup` entry is removed in the same call should make this
    /// unreachable; it exists as a documented abort path, not a reachable
    /// caller error, should that invariant ever be violated by a future
    /// change.
    #[error("sector for {sector:?} is corrupt: lookup entry survived a zero reference count")]
    AllocatorCorrupt { sector: OpCode },
}

pub type Result<T> = std::result::Result<T, Error>;

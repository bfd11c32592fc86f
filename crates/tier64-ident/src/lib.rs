//! Identifier algebra for the Tier-64 hash-consing kernel: the 512-bit
//! `Id512` type, arbitrary-precision scalar support, the spectral basis
//! table, and the holographic projection used for HAMT bucket routing.

#![deny(unsafe_code)]

mod bigint;
mod holographic;
mod id;
mod payload;
mod signature;
mod spectral;

pub use bigint::BigInt;
pub use holographic::{bucket_slice, decode_bitmap, encode_bitmap, holographic_hash};
pub use id::Id512;
pub use payload::{first8_le_padded, ScalarValue};
pub use signature::{compute_composite_signature, compute_leaf_signature};
pub use spectral::{basis_of, mix_commutative, mix_leaf, mix_noncommutative, SPECTRAL_BASIS};

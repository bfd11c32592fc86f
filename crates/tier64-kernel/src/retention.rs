//! Per-operator ownership rules: which argument ids a composite node holds
//! a strong reference to, and therefore which ids cascading deletion must
//! recurse into when the node itself is fully released.
//!
//! Most operators retain every argument. The exceptions:
//! - `Hamt` stores its bitmap scalar at `args[0]` as inline metadata, not as
//!   an owned child — it is never cascaded into.
//! - `Symbol` retains only its name blob (`args[0]`).
//! - `Kv` retains both its key and its value explicitly (this is also "all
//!   args" for a 2-ary node, but called out because it's easy to mistakenly
//!   special-case key-only retention).
//! - Primitives (`Scalar`, `Blob`, `Chunk`) hold no child ids at all.

use tier64_ident::Id512;
use tier64_ontology::OpCode;

#[must_use]
pub fn cascade_targets(op: OpCode, args: &[Id512]) -> Vec<Id512> {
    match op {
        OpCode::Scalar | OpCode::Blob | OpCode::Chunk => Vec::new(),
        OpCode::Symbol => args.first().copied().into_iter().collect(),
        OpCode::Hamt => args.iter().skip(1).copied().collect(),
        _ => args.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(n: u64) -> Id512 {
        tier64_ident::compute_leaf_signature(OpCode::Scalar, n, &n.to_le_bytes())
    }

    #[test]
    fn primitives_retain_nothing() {
        assert!(cascade_targets(OpCode::Scalar, &[dummy(1)]).is_empty());
    }

    #[test]
    fn symbol_retains_only_first_arg() {
        let blob = dummy(1);
        let targets = cascade_targets(OpCode::Symbol, &[blob]);
        assert_eq!(targets, vec![blob]);
    }

    #[test]
    fn hamt_skips_bitmap_at_args_zero() {
        let bitmap = dummy(1);
        let a = dummy(2);
        let b = dummy(3);
        let targets = cascade_targets(OpCode::Hamt, &[bitmap, a, b]);
        assert_eq!(targets, vec![a, b]);
    }

    #[test]
    fn kv_retains_both_key_and_value() {
        let k = dummy(1);
        let v = dummy(2);
        let targets = cascade_targets(OpCode::Kv, &[k, v]);
        assert_eq!(targets, vec![k, v]);
    }

    #[test]
    fn default_rule_retains_all_args() {
        let args: Vec<Id512> = (0..4).map(dummy).collect();
        assert_eq!(cascade_targets(OpCode::Add, &args), args);
    }
}

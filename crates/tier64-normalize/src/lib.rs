//! Confluent term-rewriting normalization.
//!
//! Runs before a node is ever interned: flattening, constant folding,
//! like-term grouping, involution cancellation, idempotence dedup, and a
//! handful of algebraic identities for `Pow`/`Exp`. The result is either a
//! fully-reduced reference to an existing node (when normalization collapses
//! the expression down to one of its own arguments or a folded scalar) or a
//! normalized `(op, args)` pair ready for canonicalization and interning.
//!
//! This crate knows nothing about interning or storage — it is generic over
//! a [`NormalizeCtx`] that the kernel implements, so the rewrite rules stay
//! decoupled from the arena and the lock-protected lookup tables.

#![deny(unsafe_code)]

use smallvec::SmallVec;

use tier64_ident::{BigInt, ScalarValue};
use tier64_ontology::{traits, OpCode, OpTraits};

/// Arguments rarely exceed a handful of entries (binary arithmetic, small
/// `Cons`/`Kv` pairs); inline capacity avoids heap allocation for the common
/// case while still growing for wide `Add`/`Mul` chains and `Hamt` batches.
pub type ArgList<R> = SmallVec<[R; 8]>;

/// What normalization needs to read from (and materialize into) the
/// surrounding interning context. The kernel implements this over its own
/// node storage; `Ref` is whatever cheap handle it uses internally (an
/// already-assigned `Id512`, typically).
pub trait NormalizeCtx {
    type Ref: Copy + PartialEq;

    fn op_of(&self, r: Self::Ref) -> OpCode;
    fn args_of(&self, r: Self::Ref) -> ArgList<Self::Ref>;
    fn scalar_value_of(&self, r: Self::Ref) -> Option<ScalarValue>;

    /// Materialize (intern) a scalar value, returning its reference.
    fn make_scalar(&mut self, value: ScalarValue) -> Self::Ref;

    /// Materialize (intern) an already-normalized composite node. Used by
    /// rewrite rules (like-term grouping) that need to build a new wrapper
    /// node — e.g. `Mul(term, count)` — as an intermediate step rather than
    /// as the pipeline's own final answer.
    fn make_composite(&mut self, op: OpCode, args: ArgList<Self::Ref>) -> Self::Ref;
}

/// Outcome of normalizing a candidate `(op, args)` pair.
pub enum Normalized<R> {
    /// The expression reduced to an already-existing node — no new node
    /// needs to be interned at all.
    Existing(R),
    /// A normalized, canonicalization-ready node to intern.
    Node(OpCode, ArgList<R>),
}

/// Run the full rewrite pipeline over a candidate node.
///
/// `op` and `args` are the *proposed* operator and argument list (the
/// caller's raw construction request, e.g. `Add(a, b)`); this never mutates
/// already-interned nodes, it only decides what the caller should actually
/// intern.
pub fn normalize<C: NormalizeCtx>(ctx: &mut C, op: OpCode, args: ArgList<C::Ref>) -> Normalized<C::Ref> {
    if op.is_primitive() || op == OpCode::Symbol {
        return Normalized::Node(op, args);
    }

    let op_traits = traits(op);
    let mut args = args;

    if op_traits.contains(OpTraits::ASSOCIATIVE) {
        args = flatten(ctx, op, args);
    }

    if op == OpCode::Add || op == OpCode::Mul {
        if let Some(folded) = fold_scalars(ctx, op, &args) {
            args = folded;
        }
    }

    if op_traits.contains(OpTraits::COMMUTATIVE) && op_traits.contains(OpTraits::ASSOCIATIVE) {
        args = group_like_terms(ctx, op, args);
    }

    if op_traits.contains(OpTraits::IDEMPOTENT) {
        args = dedup_preserving_order(args);
    }

    if op == OpCode::Dual {
        if let Some(inner) = involution_cancel(ctx, op, &args) {
            return Normalized::Existing(inner);
        }
        if let Some(distributed) = distribute_dual_over_tensor(ctx, &args) {
            return Normalized::Existing(distributed);
        }
    }

    if op == OpCode::Pow {
        if let Some(reduced) = reduce_pow(ctx, &args) {
            return reduced;
        }
    }

    if op == OpCode::Exp {
        if let Some(reduced) = reduce_exp(ctx, &args) {
            return reduced;
        }
    }

    finish_unary_or_node(ctx, op, args)
}

/// After flattening/folding/grouping, an associative op holding exactly one
/// argument degenerates into that argument directly (spec: unary
/// degeneration). An empty associative op degenerates into its identity
/// scalar, matching the "empty sum is zero, empty product is one" rule.
fn finish_unary_or_node<C: NormalizeCtx>(ctx: &mut C, op: OpCode, args: ArgList<C::Ref>) -> Normalized<C::Ref> {
    let op_traits = traits(op);
    if op_traits.contains(OpTraits::ASSOCIATIVE) {
        match args.len() {
            0 => {
                if op_traits.contains(OpTraits::IDENTITY_ZERO) {
                    return Normalized::Existing(ctx.make_scalar(ScalarValue::int(0)));
                }
                if op_traits.contains(OpTraits::IDENTITY_ONE) {
                    return Normalized::Existing(ctx.make_scalar(ScalarValue::int(1)));
                }
            }
            1 => return Normalized::Existing(args[0]),
            _ => {}
        }
    }
    Normalized::Node(op, args)
}

/// Pull up grandchildren that share this node's operator: `Add(Add(a, b), c)`
/// becomes `Add(a, b, c)` before anything else runs, so folding and grouping
/// see the fully-flattened argument list.
fn flatten<C: NormalizeCtx>(ctx: &C, op: OpCode, args: ArgList<C::Ref>) -> ArgList<C::Ref> {
    let mut out = ArgList::new();
    for a in args {
        if ctx.op_of(a) == op {
            out.extend(ctx.args_of(a));
        } else {
            out.push(a);
        }
    }
    out
}

/// Constant-fold every scalar-integer argument of an `Add`/`Mul` chain into
/// a single scalar, leaving non-scalar arguments untouched. A lone scalar
/// that folds away to the operator's identity element is dropped even with
/// no other scalar to combine with (e.g. `Mul(x, 1) -> x`); a lone
/// non-identity scalar is left as-is since there's nothing to fold it into.
/// Returns `None` when there's no scalar argument at all.
///
/// `Mul` short-circuits on a zero scalar: the whole expression collapses to
/// zero regardless of any non-scalar factors, since those factors are never
/// evaluated symbolically here (this kernel has no notion of "undefined").
fn fold_scalars<C: NormalizeCtx>(ctx: &mut C, op: OpCode, args: &ArgList<C::Ref>) -> Option<ArgList<C::Ref>> {
    let mut scalars = Vec::new();
    let mut rest = ArgList::new();
    for &a in args.iter() {
        match ctx.scalar_value_of(a) {
            Some(ScalarValue::Int(i)) => scalars.push(i),
            _ => rest.push(a),
        }
    }

    if op == OpCode::Mul && scalars.iter().any(BigInt::is_zero) {
        let mut out = ArgList::new();
        out.push(ctx.make_scalar(ScalarValue::Int(BigInt::zero())));
        return Some(out);
    }

    if scalars.is_empty() {
        return None;
    }

    let scalar_count = scalars.len();
    let identity = if op == OpCode::Add { BigInt::zero() } else { BigInt::one() };
    let folded = scalars.into_iter().fold(identity, |acc, v| {
        if op == OpCode::Add {
            acc.add(&v)
        } else {
            acc.mul(&v)
        }
    });

    let folded_is_identity = (op == OpCode::Add && folded.is_zero()) || (op == OpCode::Mul && folded.is_one());

    if folded_is_identity {
        if rest.is_empty() {
            let mut out = ArgList::new();
            out.push(ctx.make_scalar(ScalarValue::Int(folded)));
            return Some(out);
        }
        return Some(rest);
    }

    // A single non-identity scalar alongside non-scalar args is already in
    // normal form (there's nothing to combine it with) — leave it alone so
    // callers that didn't actually present a multi-scalar chain don't pay for
    // a no-op rebuild.
    if scalar_count == 1 && !rest.is_empty() {
        return None;
    }

    let mut out = ArgList::new();
    out.push(ctx.make_scalar(ScalarValue::Int(folded)));
    out.extend(rest);
    Some(out)
}

/// Collapse repeated identical non-scalar arguments of a commutative
/// associative op into a single `Mul(term, count)` (for `Add`) or
/// `Pow(term, count)` (for `Mul`) term, preserving the first occurrence's
/// position.
fn group_like_terms<C: NormalizeCtx>(ctx: &mut C, op: OpCode, args: ArgList<C::Ref>) -> ArgList<C::Ref> {
    let mut counts: Vec<(C::Ref, u64)> = Vec::new();
    for a in args {
        if let Some((_, n)) = counts.iter_mut().find(|(r, _)| *r == a) {
            *n += 1;
        } else {
            counts.push((a, 1));
        }
    }

    if counts.len() == counts.iter().filter(|(_, n)| *n == 1).count() {
        // Nothing repeated; return in original relative order unchanged.
        return counts.into_iter().map(|(r, _)| r).collect();
    }

    let wrap_op = if op == OpCode::Add { OpCode::Mul } else { OpCode::Pow };
    let mut out = ArgList::new();
    for (term, count) in counts {
        if count == 1 {
            out.push(term);
        } else {
            let count_scalar = ctx.make_scalar(ScalarValue::int(count as i64));
            let mut wrap_args = ArgList::new();
            wrap_args.push(term);
            wrap_args.push(count_scalar);
            out.push(ctx.make_composite(wrap_op, wrap_args));
        }
    }
    out
}

fn dedup_preserving_order<R: PartialEq + Copy>(args: ArgList<R>) -> ArgList<R> {
    let mut out = ArgList::new();
    for a in args {
        if !out.contains(&a) {
            out.push(a);
        }
    }
    out
}

/// `Dual` is involutive: `Dual(Dual(x))` is exactly `x`.
fn involution_cancel<C: NormalizeCtx>(ctx: &C, op: OpCode, args: &ArgList<C::Ref>) -> Option<C::Ref> {
    if args.len() != 1 {
        return None;
    }
    let inner = args[0];
    if ctx.op_of(inner) == op {
        let inner_args = ctx.args_of(inner);
        if inner_args.len() == 1 {
            return Some(inner_args[0]);
        }
    }
    None
}

fn reduce_pow<C: NormalizeCtx>(ctx: &mut C, args: &ArgList<C::Ref>) -> Option<Normalized<C::Ref>> {
    if args.len() != 2 {
        return None;
    }
    let (base, exp) = (args[0], args[1]);
    let exp_val = ctx.scalar_value_of(exp);
    let base_val = ctx.scalar_value_of(base);

    if let Some(ScalarValue::Int(e)) = &exp_val {
        if e.is_zero() {
            return Some(Normalized::Existing(ctx.make_scalar(ScalarValue::int(1))));
        }
        if e.is_one() {
            return Some(Normalized::Existing(base));
        }
    }
    if let Some(ScalarValue::Int(b)) = &base_val {
        if b.is_zero() && matches!(&exp_val, Some(ScalarValue::Int(e)) if !e.negative() && !e.is_zero()) {
            return Some(Normalized::Existing(ctx.make_scalar(ScalarValue::int(0))));
        }
    }

    // pow(pow(x, a), b) -> pow(x, mul(a, b)): a nested power tower collapses
    // to one Pow node with its exponents multiplied together.
    if ctx.op_of(base) == OpCode::Pow {
        let base_args = ctx.args_of(base);
        if base_args.len() == 2 {
            let (inner_base, inner_exp) = (base_args[0], base_args[1]);
            let mut mul_args = ArgList::new();
            mul_args.push(inner_exp);
            mul_args.push(exp);
            let merged_exp = ctx.make_composite(OpCode::Mul, mul_args);
            let mut new_args = ArgList::new();
            new_args.push(inner_base);
            new_args.push(merged_exp);
            if let Some(again) = reduce_pow(ctx, &new_args) {
                return Some(again);
            }
            return Some(Normalized::Node(OpCode::Pow, new_args));
        }
    }
    None
}

/// `Dual` distributes over `Tensor`: `Dual(Tensor(a, b, ...))` becomes
/// `Tensor(Dual(a), Dual(b), ...)`, for any arity.
fn distribute_dual_over_tensor<C: NormalizeCtx>(ctx: &mut C, args: &ArgList<C::Ref>) -> Option<C::Ref> {
    if args.len() != 1 {
        return None;
    }
    let inner = args[0];
    if ctx.op_of(inner) != OpCode::Tensor {
        return None;
    }
    let inner_args = ctx.args_of(inner);
    let mut duals = ArgList::new();
    for child in inner_args {
        let mut one = ArgList::new();
        one.push(child);
        duals.push(ctx.make_composite(OpCode::Dual, one));
    }
    Some(ctx.make_composite(OpCode::Tensor, duals))
}

fn reduce_exp<C: NormalizeCtx>(ctx: &mut C, args: &ArgList<C::Ref>) -> Option<Normalized<C::Ref>> {
    if args.len() != 1 {
        return None;
    }
    if let Some(ScalarValue::Int(v)) = ctx.scalar_value_of(args[0]) {
        if v.is_zero() {
            return Some(Normalized::Existing(ctx.make_scalar(ScalarValue::int(1))));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Ref(usize);

    #[derive(Clone)]
    enum StoredNode {
        Scalar(ScalarValue),
        Composite(OpCode, ArgList<Ref>),
    }

    struct Ctx {
        nodes: RefCell<Vec<StoredNode>>,
    }

    impl Ctx {
        fn new() -> Self {
            Self { nodes: RefCell::new(Vec::new()) }
        }

        fn push(&self, node: StoredNode) -> Ref {
            let mut nodes = self.nodes.borrow_mut();
            nodes.push(node);
            Ref(nodes.len() - 1)
        }

        fn scalar(&self, v: i64) -> Ref {
            self.push(StoredNode::Scalar(ScalarValue::int(v)))
        }

        fn composite(&self, op: OpCode, args: ArgList<Ref>) -> Ref {
            self.push(StoredNode::Composite(op, args))
        }
    }

    impl NormalizeCtx for Ctx {
        type Ref = Ref;

        fn op_of(&self, r: Ref) -> OpCode {
            match &self.nodes.borrow()[r.0] {
                StoredNode::Scalar(_) => OpCode::Scalar,
                StoredNode::Composite(op, _) => *op,
            }
        }

        fn args_of(&self, r: Ref) -> ArgList<Ref> {
            match &self.nodes.borrow()[r.0] {
                StoredNode::Scalar(_) => ArgList::new(),
                StoredNode::Composite(_, args) => args.clone(),
            }
        }

        fn scalar_value_of(&self, r: Ref) -> Option<ScalarValue> {
            match &self.nodes.borrow()[r.0] {
                StoredNode::Scalar(v) => Some(v.clone()),
                StoredNode::Composite(..) => None,
            }
        }

        fn make_scalar(&mut self, value: ScalarValue) -> Ref {
            self.push(StoredNode::Scalar(value))
        }

        fn make_composite(&mut self, op: OpCode, args: ArgList<Ref>) -> Ref {
            self.push(StoredNode::Composite(op, args))
        }
    }

    #[test]
    fn folds_two_scalar_adds() {
        let ctx = Ctx::new();
        let mut ctx = ctx;
        let a = ctx.scalar(3);
        let b = ctx.scalar(4);
        let mut args = ArgList::new();
        args.push(a);
        args.push(b);
        match normalize(&mut ctx, OpCode::Add, args) {
            Normalized::Existing(r) => {
                assert_eq!(ctx.scalar_value_of(r), Some(ScalarValue::int(7)));
            }
            Normalized::Node(..) => panic!("expected folded scalar"),
        }
    }

    #[test]
    fn mul_by_one_identity_drops_lone_scalar() {
        let mut ctx = Ctx::new();
        let one = ctx.scalar(1);
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut args = ArgList::new();
        args.push(sym);
        args.push(one);
        match normalize(&mut ctx, OpCode::Mul, args) {
            Normalized::Existing(r) => assert_eq!(r, sym),
            Normalized::Node(..) => panic!("expected identity scalar to be dropped"),
        }
    }

    #[test]
    fn add_of_lone_nonzero_scalar_is_left_alone() {
        let mut ctx = Ctx::new();
        let five = ctx.scalar(5);
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut args = ArgList::new();
        args.push(sym);
        args.push(five);
        match normalize(&mut ctx, OpCode::Add, args) {
            Normalized::Node(op, args) => {
                assert_eq!(op, OpCode::Add);
                assert_eq!(args.len(), 2);
            }
            Normalized::Existing(_) => panic!("nothing to fold a lone non-identity scalar into"),
        }
    }

    #[test]
    fn mul_by_zero_short_circuits() {
        let mut ctx = Ctx::new();
        let zero = ctx.scalar(0);
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut args = ArgList::new();
        args.push(zero);
        args.push(sym);
        match normalize(&mut ctx, OpCode::Mul, args) {
            Normalized::Existing(r) => assert_eq!(ctx.scalar_value_of(r), Some(ScalarValue::int(0))),
            Normalized::Node(..) => panic!("expected zero"),
        }
    }

    #[test]
    fn single_argument_add_degenerates() {
        let mut ctx = Ctx::new();
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut args = ArgList::new();
        args.push(sym);
        match normalize(&mut ctx, OpCode::Add, args) {
            Normalized::Existing(r) => assert_eq!(r, sym),
            Normalized::Node(..) => panic!("expected passthrough"),
        }
    }

    #[test]
    fn empty_add_is_zero_identity() {
        let mut ctx = Ctx::new();
        match normalize(&mut ctx, OpCode::Add, ArgList::new()) {
            Normalized::Existing(r) => assert_eq!(ctx.scalar_value_of(r), Some(ScalarValue::int(0))),
            Normalized::Node(..) => panic!("expected identity scalar"),
        }
    }

    #[test]
    fn flatten_merges_nested_add() {
        let mut ctx = Ctx::new();
        let sym_a = ctx.composite(OpCode::Symbol, ArgList::new());
        let sym_b = ctx.composite(OpCode::Symbol, ArgList::new());
        let sym_c = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut inner_args = ArgList::new();
        inner_args.push(sym_a);
        inner_args.push(sym_b);
        let inner = ctx.composite(OpCode::Add, inner_args);
        let mut outer_args = ArgList::new();
        outer_args.push(inner);
        outer_args.push(sym_c);
        match normalize(&mut ctx, OpCode::Add, outer_args) {
            Normalized::Node(op, args) => {
                assert_eq!(op, OpCode::Add);
                assert_eq!(args.len(), 3);
            }
            Normalized::Existing(_) => panic!("expected a 3-argument node"),
        }
    }

    #[test]
    fn pow_zero_exponent_is_one() {
        let mut ctx = Ctx::new();
        let base = ctx.composite(OpCode::Symbol, ArgList::new());
        let zero = ctx.scalar(0);
        let mut args = ArgList::new();
        args.push(base);
        args.push(zero);
        match normalize(&mut ctx, OpCode::Pow, args) {
            Normalized::Existing(r) => assert_eq!(ctx.scalar_value_of(r), Some(ScalarValue::int(1))),
            Normalized::Node(..) => panic!("expected one"),
        }
    }

    #[test]
    fn repeated_term_groups_into_mul_by_count() {
        let mut ctx = Ctx::new();
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut args = ArgList::new();
        args.push(sym);
        args.push(sym);
        args.push(sym);
        match normalize(&mut ctx, OpCode::Add, args) {
            Normalized::Existing(r) => {
                assert_eq!(ctx.op_of(r), OpCode::Mul);
                let wrapped = ctx.args_of(r);
                assert_eq!(wrapped[0], sym);
                assert_eq!(ctx.scalar_value_of(wrapped[1]), Some(ScalarValue::int(3)));
            }
            Normalized::Node(..) => panic!("three identical terms should degenerate to one grouped node"),
        }
    }

    #[test]
    fn pow_of_pow_multiplies_exponents() {
        let mut ctx = Ctx::new();
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let two = ctx.scalar(2);
        let mut inner_args = ArgList::new();
        inner_args.push(sym);
        inner_args.push(two);
        let inner = ctx.composite(OpCode::Pow, inner_args);
        let three = ctx.scalar(3);
        let mut outer_args = ArgList::new();
        outer_args.push(inner);
        outer_args.push(three);
        match normalize(&mut ctx, OpCode::Pow, outer_args) {
            Normalized::Node(op, args) => {
                assert_eq!(op, OpCode::Pow);
                assert_eq!(args[0], sym);
                assert_eq!(ctx.scalar_value_of(args[1]), Some(ScalarValue::int(6)));
            }
            Normalized::Existing(_) => panic!("expected a merged Pow node"),
        }
    }

    #[test]
    fn dual_distributes_over_tensor() {
        let mut ctx = Ctx::new();
        let a = ctx.composite(OpCode::Symbol, ArgList::new());
        let b = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut tensor_args = ArgList::new();
        tensor_args.push(a);
        tensor_args.push(b);
        let tensor = ctx.composite(OpCode::Tensor, tensor_args);
        let mut outer_args = ArgList::new();
        outer_args.push(tensor);
        match normalize(&mut ctx, OpCode::Dual, outer_args) {
            Normalized::Existing(r) => {
                assert_eq!(ctx.op_of(r), OpCode::Tensor);
                let children = ctx.args_of(r);
                assert_eq!(children.len(), 2);
                assert_eq!(ctx.op_of(children[0]), OpCode::Dual);
                assert_eq!(ctx.args_of(children[0])[0], a);
                assert_eq!(ctx.op_of(children[1]), OpCode::Dual);
                assert_eq!(ctx.args_of(children[1])[0], b);
            }
            Normalized::Node(..) => panic!("expected distributed tensor"),
        }
    }

    #[test]
    fn folding_an_identity_scalar_still_lets_remaining_terms_group() {
        // add(x, x, 0) must drop the 0 *and* still group the two remaining
        // x's into mul(2, x) — constant-folding must not short-circuit past
        // the like-term grouping step that follows it.
        let mut ctx = Ctx::new();
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let zero = ctx.scalar(0);
        let mut args = ArgList::new();
        args.push(sym);
        args.push(sym);
        args.push(zero);
        match normalize(&mut ctx, OpCode::Add, args) {
            Normalized::Existing(r) => {
                assert_eq!(ctx.op_of(r), OpCode::Mul);
                let wrapped = ctx.args_of(r);
                assert_eq!(wrapped[0], sym);
                assert_eq!(ctx.scalar_value_of(wrapped[1]), Some(ScalarValue::int(2)));
            }
            Normalized::Node(..) => panic!("expected the two x's to group into mul(2, x)"),
        }
    }

    #[test]
    fn dual_of_dual_cancels() {
        let mut ctx = Ctx::new();
        let sym = ctx.composite(OpCode::Symbol, ArgList::new());
        let mut inner_args = ArgList::new();
        inner_args.push(sym);
        let inner = ctx.composite(OpCode::Dual, inner_args);
        let mut outer_args = ArgList::new();
        outer_args.push(inner);
        match normalize(&mut ctx, OpCode::Dual, outer_args) {
            Normalized::Existing(r) => assert_eq!(r, sym),
            Normalized::Node(..) => panic!("expected cancellation"),
        }
    }
}

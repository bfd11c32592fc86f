//! The Interning Universe: the concurrent facade that binds the ontology,
//! identifier algebra, normalization, and sector arenas into one hash-cons
//! table.

#![deny(unsafe_code)]

mod error;
mod lifecycle;
mod retention;
mod state;

pub use error::{Error, Result};
pub use lifecycle::LifecycleEvent;
pub use tier64_ident::ScalarValue;
pub use tier64_ontology::OpCode;

use parking_lot::Mutex;

use tier64_ident::{bucket_slice, decode_bitmap, holographic_hash, Id512};

use state::UniverseState;

/// What [`Universe::get_args`] returns for a live id: a composite node's
/// ordered children, or a primitive's raw payload. One call instead of
/// asking the caller to guess which accessor applies to which operator.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeArgs {
    Composite(Vec<Id512>),
    Scalar(ScalarValue),
    Blob(Vec<u8>),
}

impl NodeArgs {
    /// The composite children, or an empty slice for a payload-bearing leaf
    /// — convenient for callers (like `hamt_get`) that only ever care about
    /// composite nodes and treat anything else as "not what I expected".
    #[must_use]
    pub fn as_composite(&self) -> &[Id512] {
        match self {
            NodeArgs::Composite(args) => args,
            _ => &[],
        }
    }
}

/// Per-operator sector tuning. Present for API symmetry with
/// `Universe::with_config` — `tier64-arena`'s page sizing is a fixed
/// per-opcode table (see `tier64_arena::page_size`), so there is presently
/// nothing for this struct to override; it exists as the seam a future
/// per-instance tuning knob would hang off, not as a currently-effectual
/// parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectorConfig {
    _private: (),
}

/// The concurrent hash-cons table. An explicit, caller-owned context — not
/// a process-global singleton — so a test (or an embedding process) can
/// construct as many independent instances as it needs.
///
/// All mutation funnels through one `parking_lot::Mutex`. Deletion cascades
/// by recursing directly inside the already-locked `UniverseState` rather
/// than re-entering the lock, which is the "restructure deletion to
/// collect-then-release" alternative spec's Concurrency design notes
/// explicitly sanction in place of a reentrant mutex: the recursion never
/// leaves the one critical section a public method opens, so nothing here
/// ever needs to re-acquire a lock it already holds.
pub struct Universe {
    state: Mutex<UniverseState>,
}

impl Universe {
    #[must_use]
    pub fn new() -> Self {
        Self::with_logging(false)
    }

    /// Construct a `Universe` that also records a bounded ring buffer of
    /// lifecycle events (see [`LifecycleEvent`]) for inspection by tests or
    /// an embedding caller — an in-process log, rather than an external
    /// tracing subscriber.
    #[must_use]
    pub fn with_logging(record_lifecycle: bool) -> Self {
        Self { state: Mutex::new(UniverseState::new(record_lifecycle)) }
    }

    #[must_use]
    pub fn with_config(_config: SectorConfig) -> Self {
        Self::new()
    }

    /// The most recent lifecycle events, oldest first. Always empty unless
    /// this `Universe` was built with [`Universe::with_logging`].
    #[must_use]
    pub fn recent_lifecycle_events(&self) -> Vec<LifecycleEvent> {
        self.state.lock().log.recent().iter().cloned().collect()
    }

    /// The number of occupied slots across every sector — the kernel's own
    /// total live-node count, used by tests asserting GC closure (spec's
    /// Testable Property 6 / Scenario S6: `lookup` returns to its pre-build
    /// size after deleting everything that was built).
    #[must_use]
    pub fn live_node_count(&self) -> usize {
        self.state.lock().total_live()
    }

    pub fn intern(&self, op: OpCode, args: Vec<Id512>) -> Result<Id512> {
        self.state.lock().intern(op, args)
    }

    /// Intern many constructions of the same operator under a single lock
    /// acquisition, amortizing contention the way spec's batch contract
    /// intends.
    pub fn intern_batch(&self, op: OpCode, args_list: Vec<Vec<Id512>>) -> Result<Vec<Id512>> {
        self.state.lock().intern_batch(op, args_list)
    }

    pub fn intern_val(&self, value: ScalarValue) -> Id512 {
        self.state.lock().intern_scalar(value)
    }

    pub fn intern_blob(&self, bytes: Vec<u8>) -> Id512 {
        self.state.lock().intern_blob(bytes)
    }

    /// Build a canonical HAMT from an arbitrary key/value id mapping.
    ///
    /// Bottom-up construction, exactly per spec's §4.5 recipe: every pair is
    /// interned as a `Kv` leaf, paired with its key's holographic hash, then
    /// stable-sorted by that hash and recursively partitioned into 32
    /// buckets by successive 5-bit slices. A single surviving pair at the
    /// top level is wrapped in one `Hamt` node rather than returned bare, so
    /// `get_op(from_map(...))` is always `Hamt` regardless of map size.
    pub fn from_map(&self, pairs: impl IntoIterator<Item = (Id512, Id512)>) -> Result<Id512> {
        let pairs: Vec<(Id512, Id512)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Err(Error::EmptyHamt);
        }

        let mut state = self.state.lock();
        let mut items: Vec<(u64, Id512)> = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let kv = state.intern(OpCode::Kv, vec![k, v])?;
            items.push((holographic_hash(&k), kv));
        }
        items.sort_by_key(|&(h, _)| h);

        build_hamt_level(&mut state, &items, 0)
    }

    /// Read-only HAMT lookup: the last value interned for `key_id` under
    /// `map_id`, or `None` if `key_id` was never inserted. Implemented
    /// purely in terms of `get_op`/`get_args`/the holographic projection —
    /// the same three primitives any external HAMT collaborator is limited
    /// to — so this is not a privileged internal shortcut.
    #[must_use]
    pub fn hamt_get(&self, map_id: Id512, key_id: Id512) -> Option<Id512> {
        let state = self.state.lock();
        let hash = holographic_hash(&key_id);
        let mut node = map_id;
        let mut shift = 0u32;

        loop {
            if state.op_of(node)? != OpCode::Hamt {
                return None;
            }
            let args = state.args_of(node);
            let bitmap = decode_bitmap(args.first()?);
            let bit = bucket_slice(hash, shift) as u32;
            if bitmap & (1 << bit) == 0 {
                return None;
            }
            let popcount_below = (bitmap & ((1u32 << bit) - 1)).count_ones() as usize;
            let child = *args.get(1 + popcount_below)?;

            match state.op_of(child)? {
                OpCode::Kv => {
                    let kv_args = state.args_of(child);
                    return if kv_args.first() == Some(&key_id) { kv_args.get(1).copied() } else { None };
                }
                OpCode::Hamt => {
                    node = child;
                    shift += 1;
                }
                _ => return None,
            }
        }
    }

    #[must_use]
    pub fn get_op(&self, id: Id512) -> OpCode {
        id.op_code()
    }

    #[must_use]
    pub fn get_depth(&self, id: Id512) -> u64 {
        id.depth()
    }

    #[must_use]
    pub fn get_mass(&self, id: Id512) -> u64 {
        id.mass()
    }

    #[must_use]
    pub fn get_qec(&self, id: Id512) -> u64 {
        id.qec()
    }

    pub fn get_args(&self, id: Id512) -> Result<NodeArgs> {
        self.state.lock().node_args(id)
    }

    pub fn retain(&self, id: Id512) -> Result<()> {
        self.state.lock().retain(id)
    }

    pub fn delete(&self, id: Id512) -> Result<()> {
        self.state.lock().delete(id)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively partition `items` (already sorted by hash) into 32 buckets
/// keyed by the 5-bit slice at `shift`, materializing one `Hamt` node per
/// non-empty partition. A bucket holding exactly one item is used directly
/// as that slot's child rather than wrapped in another single-child `Hamt`
/// — the recursion bottoms out naturally once a bucket can't be split any
/// further apart.
fn build_hamt_level(state: &mut UniverseState, items: &[(u64, Id512)], shift: u32) -> Result<Id512> {
    const BUCKET_COUNT: usize = 32;

    if items.len() == 1 {
        let (hash, kv) = items[0];
        let bit = bucket_slice(hash, shift) as u32;
        return state.make_hamt_node(1 << bit, vec![kv]);
    }

    let mut buckets: Vec<Vec<(u64, Id512)>> = vec![Vec::new(); BUCKET_COUNT];
    for &(hash, id) in items {
        buckets[bucket_slice(hash, shift)].push((hash, id));
    }

    let mut bitmap: u32 = 0;
    let mut children = Vec::new();
    for (bucket_idx, bucket) in buckets.into_iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }
        bitmap |= 1 << bucket_idx;
        let child = if bucket.len() == 1 { bucket[0].1 } else { build_hamt_level(state, &bucket, shift + 1)? };
        children.push(child);
    }
    state.make_hamt_node(bitmap, children)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(u: &Universe, name: &str) -> Id512 {
        let blob = u.intern_blob(name.as_bytes().to_vec());
        u.intern(OpCode::Symbol, vec![blob]).unwrap()
    }

    #[test]
    fn determinism_same_call_twice_same_id() {
        let u = Universe::new();
        let a = u.intern_val(ScalarValue::int(5));
        let b = u.intern_val(ScalarValue::int(5));
        assert_eq!(a, b);
    }

    #[test]
    fn scenario_s1_commutative_flattening_and_permutation() {
        let u = Universe::new();
        let a = sym(&u, "a");
        let b = sym(&u, "b");
        let c = sym(&u, "c");

        let ab = u.intern(OpCode::Add, vec![a, b]).unwrap();
        let left = u.intern(OpCode::Add, vec![ab, c]).unwrap();
        let right = u.intern(OpCode::Add, vec![b, c, a]).unwrap();
        assert_eq!(left, right);

        let args = u.get_args(left).unwrap();
        match args {
            NodeArgs::Composite(children) => {
                assert_eq!(children.len(), 3);
                let mut sorted = children.clone();
                sorted.sort();
                assert_eq!(children, sorted);
            }
            _ => panic!("expected a composite Add node"),
        }
    }

    #[test]
    fn scenario_s2_mul_by_zero_collapses() {
        let u = Universe::new();
        let zero = u.intern_val(ScalarValue::int(0));
        let x = sym(&u, "x");
        let y = sym(&u, "y");
        let product = u.intern(OpCode::Mul, vec![zero, x, y]).unwrap();
        assert_eq!(u.get_args(product).unwrap(), NodeArgs::Scalar(ScalarValue::int(0)));
    }

    #[test]
    fn scenario_s3_repeated_symbol_groups_by_count() {
        let u = Universe::new();
        let x = sym(&u, "x");
        let y = sym(&u, "y");
        let sum = u.intern(OpCode::Add, vec![x, x, x, y]).unwrap();

        let three_x = u.intern_val(ScalarValue::int(3));
        let grouped = u.intern(OpCode::Mul, vec![x, three_x]).unwrap();
        let expected = u.intern(OpCode::Add, vec![grouped, y]).unwrap();
        assert_eq!(sum, expected);
    }

    #[test]
    fn scenario_s4_power_tower_collapses() {
        let u = Universe::new();
        let x = sym(&u, "x");
        let two = u.intern_val(ScalarValue::int(2));
        let three = u.intern_val(ScalarValue::int(3));
        let inner = u.intern(OpCode::Pow, vec![x, two]).unwrap();
        let outer = u.intern(OpCode::Pow, vec![inner, three]).unwrap();

        let six = u.intern_val(ScalarValue::int(6));
        let expected = u.intern(OpCode::Pow, vec![x, six]).unwrap();
        assert_eq!(outer, expected);
    }

    #[test]
    fn scenario_s5_dual_distributes_over_tensor() {
        let u = Universe::new();
        let a = sym(&u, "a");
        let b = sym(&u, "b");
        let dual_a = u.intern(OpCode::Dual, vec![a]).unwrap();
        let tensor = u.intern(OpCode::Tensor, vec![dual_a, b]).unwrap();
        let result = u.intern(OpCode::Dual, vec![tensor]).unwrap();

        let dual_b = u.intern(OpCode::Dual, vec![b]).unwrap();
        let expected = u.intern(OpCode::Tensor, vec![a, dual_b]).unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn scenario_s6_hamt_round_trip_and_gc_closure() {
        let u = Universe::new();
        let baseline = u.live_node_count();

        let pairs: Vec<(Id512, Id512)> =
            (0..1000i64).map(|i| (u.intern_val(ScalarValue::int(i)), u.intern_val(ScalarValue::int(i * 2)))).collect();
        let map = u.from_map(pairs.clone()).unwrap();
        assert_eq!(u.get_op(map), OpCode::Hamt);

        for (k, v) in &pairs {
            assert_eq!(u.hamt_get(map, *k), Some(*v));
        }
        let never_inserted = u.intern_val(ScalarValue::int(-1));
        assert_eq!(u.hamt_get(map, never_inserted), None);

        u.delete(map).unwrap();
        for (k, v) in &pairs {
            u.delete(*k).unwrap();
            u.delete(*v).unwrap();
        }
        u.delete(never_inserted).unwrap();
        assert_eq!(u.live_node_count(), baseline);
    }

    #[test]
    fn testable_property_8_injectivity_under_stress() {
        let u = Universe::new();
        let ids: std::collections::HashSet<Id512> = (0..5000i64).map(|i| u.intern_val(ScalarValue::int(i))).collect();
        assert_eq!(ids.len(), 5000);
    }

    #[test]
    fn testable_property_7_hash_avalanche_on_adjacent_scalars() {
        let u = Universe::new();
        let a = u.intern_val(ScalarValue::int(123_456_789));
        let b = u.intern_val(ScalarValue::int(123_456_790));
        let ha = holographic_hash(&a);
        let hb = holographic_hash(&b);
        assert!((ha ^ hb).count_ones() > 15);
    }

    #[test]
    fn testable_property_9_holographic_purity_matches_hamt_routing() {
        let u = Universe::new();
        let k = u.intern_val(ScalarValue::int(42));
        let v = u.intern_val(ScalarValue::int(84));
        let map = u.from_map(vec![(k, v)]).unwrap();
        assert_eq!(u.hamt_get(map, k), Some(v));
        // the same fold used internally for bucket routing is the only
        // externally callable projection function
        let expected_bucket = bucket_slice(holographic_hash(&k), 0);
        let args = u.get_args(map).unwrap();
        let bitmap = decode_bitmap(&args.as_composite()[0]);
        assert_eq!(bitmap, 1 << expected_bucket);
    }

    #[test]
    fn malformed_symbol_arity_is_rejected() {
        let u = Universe::new();
        assert!(matches!(u.intern(OpCode::Symbol, vec![]), Err(Error::Malformed { .. })));
    }

    #[test]
    fn empty_from_map_is_rejected() {
        let u = Universe::new();
        assert!(matches!(u.from_map(vec![]), Err(Error::EmptyHamt)));
    }

    #[test]
    fn dead_id_access_surfaces_as_error() {
        let u = Universe::new();
        let phantom = tier64_ident::compute_leaf_signature(OpCode::Scalar, 999, &999u64.to_le_bytes());
        assert!(matches!(u.get_args(phantom), Err(Error::DeadId { .. })));
        assert!(matches!(u.delete(phantom), Err(Error::DeadId { .. })));
    }

    #[test]
    fn intern_batch_matches_sequential_intern() {
        let u = Universe::new();
        let a = sym(&u, "a");
        let b = sym(&u, "b");
        let batched = u.intern_batch(OpCode::Cons, vec![vec![a, b], vec![b, a]]).unwrap();
        let sequential = vec![u.intern(OpCode::Cons, vec![a, b]).unwrap(), u.intern(OpCode::Cons, vec![b, a]).unwrap()];
        assert_eq!(batched, sequential);
    }

    #[test]
    fn structural_sharing_cons_tail_matches_original_list() {
        let u = Universe::new();
        let x = sym(&u, "x");
        let tail = u.intern_val(ScalarValue::Null);
        let list = u.intern(OpCode::Cons, vec![x, tail]).unwrap();
        let args = u.get_args(list).unwrap();
        assert_eq!(args.as_composite()[1], tail);
    }

    #[test]
    fn lifecycle_log_records_when_enabled() {
        let u = Universe::with_logging(true);
        let _ = u.intern_val(ScalarValue::int(1));
        assert!(!u.recent_lifecycle_events().is_empty());
    }

    #[test]
    fn lifecycle_log_stays_empty_when_disabled() {
        let u = Universe::new();
        let _ = u.intern_val(ScalarValue::int(1));
        assert!(u.recent_lifecycle_events().is_empty());
    }
}

//! `Expr`: an ergonomic, operator-overloaded facade over
//! [`tier64_kernel::Universe`].
//!
//! This adds no new semantics over the kernel's `intern*`/`get_*` surface —
//! it is sugar, grounded in the symbolic algebra facade this kernel's
//! predecessor exposed to its own callers (a handle type wrapping a content
//! id, with `+`/`*`/`**` building new interned nodes rather than mutating
//! anything). Every method here is a thin wrapper; the algebra itself lives
//! entirely in `tier64-kernel` and `tier64-normalize`.

#![deny(unsafe_code)]

use std::fmt;
use std::ops::{Add, Mul, Neg, Not, Sub};

use tier64_ident::{Id512, ScalarValue};
use tier64_kernel::{NodeArgs, Result, Universe};
use tier64_ontology::OpCode;

/// A handle to an interned node, paired with the [`Universe`] it lives in.
///
/// `Copy`, like the `Id512` it wraps — an `Expr` is a cheap reference to
/// already-interned, immutable content, never an owner of anything that
/// needs dropping.
#[derive(Clone, Copy)]
pub struct Expr<'u> {
    universe: &'u Universe,
    id: Id512,
}

impl<'u> Expr<'u> {
    /// Wrap an already-interned id. Public so collaborators that hold a raw
    /// `Id512` from `Universe`'s own interface (e.g. a `hamt_get` result)
    /// can re-enter the ergonomic facade without re-interning anything.
    #[must_use]
    pub fn from_id(universe: &'u Universe, id: Id512) -> Self {
        Self { universe, id }
    }

    #[must_use]
    pub fn id(&self) -> Id512 {
        self.id
    }

    #[must_use]
    pub fn universe(&self) -> &'u Universe {
        self.universe
    }

    /// Intern a named symbol: `Expr::symbol(u, "x")`.
    #[must_use]
    pub fn symbol(universe: &'u Universe, name: &str) -> Self {
        let name_id = universe.intern_blob(name.as_bytes().to_vec());
        let id = universe
            .intern(OpCode::Symbol, vec![name_id])
            .expect("a freshly-interned blob id always satisfies Symbol's arity");
        Self { universe, id }
    }

    /// Intern an integer scalar.
    #[must_use]
    pub fn val(universe: &'u Universe, value: i64) -> Self {
        Self { universe, id: universe.intern_val(ScalarValue::int(value)) }
    }

    /// Intern an arbitrary scalar payload.
    #[must_use]
    pub fn scalar(universe: &'u Universe, value: ScalarValue) -> Self {
        Self { universe, id: universe.intern_val(value) }
    }

    /// Intern raw bytes as a `Blob` node.
    #[must_use]
    pub fn blob(universe: &'u Universe, bytes: Vec<u8>) -> Self {
        Self { universe, id: universe.intern_blob(bytes) }
    }

    /// Build a canonical HAMT ("persistent map") from key/value pairs.
    pub fn dict(universe: &'u Universe, pairs: impl IntoIterator<Item = (Expr<'u>, Expr<'u>)>) -> Result<Self> {
        let pairs: Vec<(Id512, Id512)> = pairs.into_iter().map(|(k, v)| (k.id, v.id)).collect();
        let id = universe.from_map(pairs)?;
        Ok(Self { universe, id })
    }

    /// `self ** exp`: no Rust operator maps to Python's `__pow__`, so this
    /// stays an explicit method rather than an overload.
    #[must_use]
    pub fn pow(self, exp: Expr<'u>) -> Self {
        let id = self.universe.intern(OpCode::Pow, vec![self.id, exp.id]).expect("Pow always takes exactly two args");
        Self { universe: self.universe, id }
    }

    /// `A @ B -> Tensor(A, B)` in the facade this mirrors; Rust has no
    /// overloadable infix for it, so it is a named method.
    #[must_use]
    pub fn tensor(self, other: Expr<'u>) -> Self {
        let id =
            self.universe.intern(OpCode::Tensor, vec![self.id, other.id]).expect("Tensor always takes exactly two args");
        Self { universe: self.universe, id }
    }

    /// Persistent-map lookup: `map.get(key)`. `None` if `self` is not a
    /// `Hamt` node or the key was never inserted — mirrors the source
    /// facade's `__getitem__`, but returns `Option` rather than raising,
    /// since panicking on a missing map key is not how idiomatic Rust reads.
    #[must_use]
    pub fn get(&self, key: Expr<'u>) -> Option<Self> {
        if self.op() != OpCode::Hamt {
            return None;
        }
        self.universe.hamt_get(self.id, key.id).map(|id| Self { universe: self.universe, id })
    }

    #[must_use]
    pub fn op(&self) -> OpCode {
        self.universe.get_op(self.id)
    }

    pub fn args(&self) -> Result<NodeArgs> {
        self.universe.get_args(self.id)
    }

    #[must_use]
    pub fn mass(&self) -> u64 {
        self.universe.get_mass(self.id)
    }

    #[must_use]
    pub fn depth(&self) -> u64 {
        self.universe.get_depth(self.id)
    }

    #[must_use]
    pub fn qec(&self) -> u64 {
        self.universe.get_qec(self.id)
    }

    pub fn retain(&self) -> Result<()> {
        self.universe.retain(self.id)
    }

    pub fn delete(&self) -> Result<()> {
        self.universe.delete(self.id)
    }

    /// Approximate structural similarity via Hamming distance between QEC
    /// fingerprints: `1.0` for identical topology, `0.5` for an unrelated
    /// pair, `0.0` for a fully anti-correlated pair. A supplemental feature
    /// this kernel's predecessor exposed on its own node facade — useful for
    /// approximate isomorphism checks without a full structural walk.
    #[must_use]
    pub fn similarity(&self, other: &Expr<'u>) -> f64 {
        let diff = self.qec() ^ other.qec();
        1.0 - (diff.count_ones() as f64 / 64.0)
    }

    #[must_use]
    pub fn is_isomorphic(&self, other: &Expr<'u>, threshold: f64) -> bool {
        self.similarity(other) >= threshold
    }
}

impl<'u> PartialEq for Expr<'u> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<'u> Eq for Expr<'u> {}

impl<'u> Add for Expr<'u> {
    type Output = Expr<'u>;
    fn add(self, rhs: Expr<'u>) -> Expr<'u> {
        let id = self.universe.intern(OpCode::Add, vec![self.id, rhs.id]).expect("Add always takes exactly two args");
        Expr { universe: self.universe, id }
    }
}

impl<'u> Mul for Expr<'u> {
    type Output = Expr<'u>;
    fn mul(self, rhs: Expr<'u>) -> Expr<'u> {
        let id = self.universe.intern(OpCode::Mul, vec![self.id, rhs.id]).expect("Mul always takes exactly two args");
        Expr { universe: self.universe, id }
    }
}

impl<'u> Neg for Expr<'u> {
    type Output = Expr<'u>;
    fn neg(self) -> Expr<'u> {
        self * Expr::val(self.universe, -1)
    }
}

impl<'u> Sub for Expr<'u> {
    type Output = Expr<'u>;
    fn sub(self, rhs: Expr<'u>) -> Expr<'u> {
        self + (-rhs)
    }
}

/// `!dual_candidate -> Dual(dual_candidate)`: `Dual` is a unary involutive
/// operator, so Rust's unary `Not` (`!`) is the natural overload — unlike
/// the source facade's `__invert__` (Python's `~`), which this mirrors in
/// spirit rather than by literal operator choice.
impl<'u> Not for Expr<'u> {
    type Output = Expr<'u>;
    fn not(self) -> Expr<'u> {
        let id = self.universe.intern(OpCode::Dual, vec![self.id]).expect("Dual always takes exactly one arg");
        Expr { universe: self.universe, id }
    }
}

impl<'u> fmt::Display for Expr<'u> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            OpCode::Scalar => match self.args() {
                Ok(NodeArgs::Scalar(v)) => write!(f, "{v:?}"),
                _ => write!(f, "<DeadNode:{:#x}>", self.id),
            },
            OpCode::Symbol => match self.args() {
                Ok(NodeArgs::Composite(args)) if !args.is_empty() => {
                    let name_id = args[0];
                    match self.universe.get_args(name_id) {
                        Ok(NodeArgs::Blob(bytes)) => match String::from_utf8(bytes) {
                            Ok(name) => write!(f, "{name}"),
                            Err(_) => write!(f, "<Symbol:{:#x}>", self.id),
                        },
                        _ => write!(f, "<DeadNode:{:#x}>", self.id),
                    }
                }
                _ => write!(f, "<DeadNode:{:#x}>", self.id),
            },
            OpCode::Hamt => write!(f, "<Map:{:#x}>", self.mass()),
            op => write!(f, "<{op:?}:{:#x}>", self.mass()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_add_is_commutative() {
        let u = Universe::new();
        let a = Expr::symbol(&u, "a");
        let b = Expr::symbol(&u, "b");
        assert_eq!(a + b, b + a);
    }

    #[test]
    fn sub_and_neg_compose_as_expected() {
        let u = Universe::new();
        let a = Expr::symbol(&u, "a");
        let b = Expr::symbol(&u, "b");
        assert_eq!(a - b, a + (-b));
    }

    #[test]
    fn dual_of_dual_cancels_through_not_operator() {
        let u = Universe::new();
        let a = Expr::symbol(&u, "a");
        assert_eq!(!!a, a);
    }

    #[test]
    fn pow_tower_collapses() {
        let u = Universe::new();
        let x = Expr::symbol(&u, "x");
        let two = Expr::val(&u, 2);
        let three = Expr::val(&u, 3);
        let six = Expr::val(&u, 6);
        assert_eq!(x.pow(two).pow(three), x.pow(six));
    }

    #[test]
    fn dict_round_trips_through_get() {
        let u = Universe::new();
        let k = Expr::val(&u, 1);
        let v = Expr::val(&u, 2);
        let map = Expr::dict(&u, vec![(k, v)]).unwrap();
        assert_eq!(map.get(k), Some(v));
        assert_eq!(map.get(Expr::val(&u, 99)), None);
    }

    #[test]
    fn similarity_is_one_for_identical_structure() {
        let u = Universe::new();
        let a = Expr::symbol(&u, "a");
        let b = Expr::symbol(&u, "a");
        assert_eq!(a, b);
        assert!((a.similarity(&b) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn display_renders_symbol_name_and_scalar_value() {
        let u = Universe::new();
        let x = Expr::symbol(&u, "x");
        assert_eq!(format!("{x}"), "x");
        let five = Expr::val(&u, 5);
        assert_eq!(format!("{five}"), "Int(5)");
    }
}

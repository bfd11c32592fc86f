//! Interior storage and rewrite-pipeline wiring. Everything here runs under
//! a single exclusive borrow (see `universe.rs`); no locking happens at this
//! layer.

use tier64_arena::SectorTable;
use tier64_ident::{compute_composite_signature, compute_leaf_signature, Id512, ScalarValue};
use tier64_normalize::{normalize, ArgList, NormalizeCtx, Normalized};
use tier64_ontology::{traits, OpCode, OpTraits};

use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleEvent, LifecycleLog};
use crate::retention::cascade_targets;

pub(crate) enum NodeData {
    Leaf(ScalarValue),
    Blob(Vec<u8>),
    Composite(Vec<Id512>),
}

pub(crate) struct UniverseState {
    storage: SectorTable<NodeData>,
    /// Maps an id to a packed `(op_code, slot_index)` physical pointer.
    lookup: std::collections::HashMap<Id512, u64>,
    /// Maps raw blob content to its id, so identical byte strings interned
    /// through separate calls are recognized as duplicates without
    /// recomputing their signature first.
    blob_lookup: std::collections::HashMap<Vec<u8>, Id512>,
    pub(crate) log: LifecycleLog,
}

impl UniverseState {
    pub(crate) fn new(log_enabled: bool) -> Self {
        Self {
            storage: SectorTable::new(),
            lookup: std::collections::HashMap::new(),
            blob_lookup: std::collections::HashMap::new(),
            log: LifecycleLog::new(log_enabled),
        }
    }

    fn slot_of(&self, id: Id512) -> Result<(OpCode, u64)> {
        let packed = *self.lookup.get(&id).ok_or(Error::DeadId { id })?;
        let (raw_op, slot) = tier64_ontology::unpack_physical_ptr(packed);
        let op = OpCode::from_code(raw_op).expect("lookup table never stores a malformed op code");
        Ok((op, slot))
    }

    pub(crate) fn op_of(&self, id: Id512) -> Option<OpCode> {
        self.slot_of(id).ok().map(|(op, _)| op)
    }

    pub(crate) fn args_of(&self, id: Id512) -> Vec<Id512> {
        match self.slot_of(id) {
            Ok((op, slot)) => match self.storage.sector(op).get(slot as usize) {
                Some(NodeData::Composite(args)) => args.clone(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        }
    }

    pub(crate) fn scalar_value_of(&self, id: Id512) -> Option<ScalarValue> {
        let (op, slot) = self.slot_of(id).ok()?;
        if op != OpCode::Scalar {
            return None;
        }
        match self.storage.sector(op).get(slot as usize) {
            Some(NodeData::Leaf(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub(crate) fn blob_bytes_of(&self, id: Id512) -> Option<Vec<u8>> {
        let (op, slot) = self.slot_of(id).ok()?;
        if op != OpCode::Blob {
            return None;
        }
        match self.storage.sector(op).get(slot as usize) {
            Some(NodeData::Blob(b)) => Some(b.clone()),
            _ => None,
        }
    }

    pub(crate) fn ref_count_of(&self, id: Id512) -> Option<u32> {
        let (op, slot) = self.slot_of(id).ok()?;
        self.storage.sector(op).ref_count(slot as usize)
    }

    pub(crate) fn total_live(&self) -> usize {
        self.storage.total_len()
    }

    /// `get_args` as the external interface describes it: a composite
    /// node's children, or a primitive's raw payload — one call instead of
    /// making the caller guess which of `args_of`/`scalar_value_of`/
    /// `blob_bytes_of` applies. Fails (rather than returning empty) on a
    /// dead id, unlike the infallible `args_of` the normalization context
    /// uses internally.
    pub(crate) fn node_args(&self, id: Id512) -> Result<crate::NodeArgs> {
        let (op, slot) = self.slot_of(id)?;
        match self.storage.sector(op).get(slot as usize) {
            Some(NodeData::Composite(args)) => Ok(crate::NodeArgs::Composite(args.clone())),
            Some(NodeData::Leaf(v)) => Ok(crate::NodeArgs::Scalar(v.clone())),
            Some(NodeData::Blob(b)) => Ok(crate::NodeArgs::Blob(b.clone())),
            None => Err(Error::DeadId { id }),
        }
    }

    pub(crate) fn intern_scalar(&mut self, value: ScalarValue) -> Id512 {
        let val_hash = value.val_hash();
        let payload_bytes = value.to_bytes();
        let id = compute_leaf_signature(OpCode::Scalar, val_hash, &payload_bytes);
        self.materialize_leaf(id, OpCode::Scalar, NodeData::Leaf(value))
    }

    pub(crate) fn intern_blob(&mut self, bytes: Vec<u8>) -> Id512 {
        if let Some(&id) = self.blob_lookup.get(&bytes) {
            return id;
        }
        let val_hash = tier64_ident::first8_le_padded(&bytes);
        let id = compute_leaf_signature(OpCode::Blob, val_hash, &bytes);
        let id = self.materialize_leaf(id, OpCode::Blob, NodeData::Blob(bytes.clone()));
        self.blob_lookup.insert(bytes, id);
        id
    }

    fn materialize_leaf(&mut self, id: Id512, op: OpCode, data: NodeData) -> Id512 {
        if let Ok((existing_op, _)) = self.slot_of(id) {
            debug_assert_eq!(existing_op, op);
            return id;
        }
        let slot = self.storage.sector_mut(op).alloc(data) as u64;
        self.lookup.insert(id, tier64_ontology::pack_physical_ptr(op, slot));
        self.log.record(LifecycleEvent::Interned { id, op, ref_count: 1 });
        id
    }

    pub(crate) fn intern(&mut self, op: OpCode, args: Vec<Id512>) -> Result<Id512> {
        if !op.is_primitive() {
            let min = match op {
                OpCode::Symbol => 1,
                OpCode::Kv => 2,
                _ => 0,
            };
            if args.len() < min {
                return Err(Error::Malformed { op, min, got: args.len() });
            }
        }

        let arg_list: ArgList<Id512> = args.into_iter().collect();
        match normalize(self, op, arg_list) {
            Normalized::Existing(id) => Ok(id),
            Normalized::Node(final_op, mut final_args) => {
                if traits(final_op).contains(OpTraits::COMMUTATIVE) {
                    final_args.sort();
                }
                let args_vec: Vec<Id512> = final_args.into_iter().collect();
                self.materialize_composite(final_op, args_vec)
            }
        }
    }

    /// Intern a whole batch of constructions for one operator under a
    /// single lock acquisition. Normalizes every candidate first, then
    /// reserves this operator's sector capacity for the batch's genuinely
    /// new nodes in one call before materializing any of them — the same
    /// all-or-nothing reservation discipline `alloc_batch` gives a single
    /// call, extended across the whole batch.
    pub(crate) fn intern_batch(&mut self, op: OpCode, args_list: Vec<Vec<Id512>>) -> Result<Vec<Id512>> {
        enum Pending {
            Existing(Id512),
            New(OpCode, Vec<Id512>, Id512),
        }

        let mut pending = Vec::with_capacity(args_list.len());
        for args in args_list {
            if !op.is_primitive() {
                let min = match op {
                    OpCode::Symbol => 1,
                    OpCode::Kv => 2,
                    _ => 0,
                };
                if args.len() < min {
                    return Err(Error::Malformed { op, min, got: args.len() });
                }
            }

            let arg_list: ArgList<Id512> = args.into_iter().collect();
            match normalize(self, op, arg_list) {
                Normalized::Existing(id) => pending.push(Pending::Existing(id)),
                Normalized::Node(final_op, mut final_args) => {
                    if traits(final_op).contains(OpTraits::COMMUTATIVE) {
                        final_args.sort();
                    }
                    let args_vec: Vec<Id512> = final_args.into_iter().collect();
                    let id = compute_composite_signature(final_op, &args_vec);
                    pending.push(Pending::New(final_op, args_vec, id));
                }
            }
        }

        let new_in_this_sector = pending
            .iter()
            .filter(|p| matches!(p, Pending::New(final_op, _, id) if *final_op == op && self.slot_of(*id).is_err()))
            .count();
        if new_in_this_sector > 0 {
            self.storage.sector_mut(op).reserve(new_in_this_sector);
        }

        let mut out = Vec::with_capacity(pending.len());
        for item in pending {
            out.push(match item {
                Pending::Existing(id) => id,
                Pending::New(final_op, args_vec, _precomputed_id) => self.materialize_composite(final_op, args_vec)?,
            });
        }
        Ok(out)
    }

    /// Intern an already-normalized, already-canonicalized composite node.
    /// Shared by [`Self::intern`] (after running the rewrite pipeline) and
    /// [`Self::make_hamt_node`] (which builds its args directly, bypassing
    /// normalization — a `Hamt` node carries no algebraic traits for
    /// `normalize` to act on).
    fn materialize_composite(&mut self, op: OpCode, args_vec: Vec<Id512>) -> Result<Id512> {
        let id = compute_composite_signature(op, &args_vec);

        if self.slot_of(id).is_ok() {
            return Ok(id);
        }

        for &child in cascade_targets(op, &args_vec).iter() {
            self.retain(child)?;
        }
        let slot = self.storage.sector_mut(op).alloc(NodeData::Composite(args_vec)) as u64;
        self.lookup.insert(id, tier64_ontology::pack_physical_ptr(op, slot));
        self.log.record(LifecycleEvent::Interned { id, op, ref_count: 1 });
        Ok(id)
    }

    /// Build (or find) a `Hamt` node from an explicit bitmap and an already
    /// ordered list of non-empty-bucket children. `args[0]` is a synthetic,
    /// never-registered marker id (see [`tier64_ident::encode_bitmap`]) —
    /// the retention rules in `cascade_targets` already know to skip it.
    pub(crate) fn make_hamt_node(&mut self, bitmap: u32, children: Vec<Id512>) -> Result<Id512> {
        let mut args = Vec::with_capacity(children.len() + 1);
        args.push(tier64_ident::encode_bitmap(bitmap));
        args.extend(children);
        self.materialize_composite(OpCode::Hamt, args)
    }

    pub(crate) fn retain(&mut self, id: Id512) -> Result<()> {
        let (op, slot) = self.slot_of(id)?;
        self.storage.sector_mut(op).retain(slot as usize).map_err(|_| Error::DeadId { id })?;
        let rc = self.storage.sector(op).ref_count(slot as usize).unwrap_or(0);
        self.log.record(LifecycleEvent::Retained { id, ref_count: rc });
        Ok(())
    }

    pub(crate) fn delete(&mut self, id: Id512) -> Result<()> {
        let (op, slot) = self.slot_of(id)?;
        // `lookup` removes an id's entry in the same call that releases its
        // slot to zero references (see the `Some(data)` arm below), so a
        // live lookup entry whose slot already reads zero indicates the two
        // have gone out of sync, not a legitimate caller double-delete.
        let rc_before = self.storage.sector(op).ref_count(slot as usize).unwrap_or(0);
        if rc_before == 0 {
            return Err(Error::AllocatorCorrupt { sector: op });
        }
        let freed = self.storage.sector_mut(op).release(slot as usize).map_err(|_| Error::DeadId { id })?;
        match freed {
            None => {
                let rc = self.storage.sector(op).ref_count(slot as usize).unwrap_or(0);
                self.log.record(LifecycleEvent::Released { id, ref_count: rc });
                Ok(())
            }
            Some(data) => {
                self.lookup.remove(&id);
                self.log.record(LifecycleEvent::Deleted { id });
                match data {
                    NodeData::Blob(bytes) => {
                        self.blob_lookup.remove(&bytes);
                    }
                    NodeData::Composite(args) => {
                        for child in cascade_targets(op, &args) {
                            self.delete(child)?;
                        }
                    }
                    NodeData::Leaf(_) => {}
                }
                Ok(())
            }
        }
    }
}

impl NormalizeCtx for UniverseState {
    type Ref = Id512;

    fn op_of(&self, r: Id512) -> OpCode {
        UniverseState::op_of(self, r).unwrap_or_else(|| r.op_code())
    }

    fn args_of(&self, r: Id512) -> ArgList<Id512> {
        UniverseState::args_of(self, r).into_iter().collect()
    }

    fn scalar_value_of(&self, r: Id512) -> Option<ScalarValue> {
        UniverseState::scalar_value_of(self, r)
    }

    fn make_scalar(&mut self, value: ScalarValue) -> Id512 {
        self.intern_scalar(value)
    }

    fn make_composite(&mut self, op: OpCode, args: ArgList<Id512>) -> Id512 {
        self.intern(op, args.into_iter().collect())
            .expect("grouping only ever builds well-formed binary Mul/Pow wrapper nodes")
    }
}

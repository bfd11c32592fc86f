//! The full set of per-operator sectors, keyed densely by operator code.

use tier64_ontology::{OpCode, NUM_OPCODES};

use crate::sector::Sector;
use crate::size_class::page_size;

/// One [`Sector`] per operator code.
pub struct SectorTable<T> {
    sectors: Vec<Sector<T>>,
}

impl<T> SectorTable<T> {
    #[must_use]
    pub fn new() -> Self {
        let sectors = OpCode::ALL.iter().map(|&op| Sector::new(page_size(op))).collect();
        Self { sectors }
    }

    #[must_use]
    pub fn sector(&self, op: OpCode) -> &Sector<T> {
        &self.sectors[op.index()]
    }

    #[must_use]
    pub fn sector_mut(&mut self, op: OpCode) -> &mut Sector<T> {
        &mut self.sectors[op.index()]
    }

    #[must_use]
    pub fn total_len(&self) -> usize {
        self.sectors.iter().map(Sector::len).sum()
    }
}

impl<T> Default for SectorTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

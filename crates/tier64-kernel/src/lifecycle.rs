//! Bounded in-memory lifecycle logging.
//!
//! An in-process `AllocatorLogRecord`/`AllocatorLogLevel`-style ring buffer
//! rather than an external tracing subscriber: a
//! kernel instance is typically embedded inside a larger process that wants
//! to inspect or export its own recent history on demand (e.g. a test
//! harness asserting "no node leaked a reference"), not stream every intern
//! call through a global logger.

use std::collections::VecDeque;

use tier64_ident::Id512;
use tier64_ontology::OpCode;

const DEFAULT_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Interned { id: Id512, op: OpCode, ref_count: u32 },
    Retained { id: Id512, ref_count: u32 },
    Released { id: Id512, ref_count: u32 },
    Deleted { id: Id512 },
}

/// A ring buffer of the most recent lifecycle events. Bounded so a
/// long-running kernel never grows this unboundedly; oldest events are
/// dropped first.
pub struct LifecycleLog {
    events: VecDeque<LifecycleEvent>,
    capacity: usize,
    enabled: bool,
}

impl LifecycleLog {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { events: VecDeque::with_capacity(if enabled { DEFAULT_CAPACITY } else { 0 }), capacity: DEFAULT_CAPACITY, enabled }
    }

    pub fn record(&mut self, event: LifecycleEvent) {
        if !self.enabled {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    #[must_use]
    pub fn recent(&self) -> &VecDeque<LifecycleEvent> {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

//! The slot allocator: a priority pool of registers plus a stack spill area.
//!
//! A slot is a storage location handed to an SSA value for its lifetime.
//! Free slots sit in a min-heap keyed by priority, so registers (negative
//! priorities) are always preferred over spill words (positive priorities,
//! shallower offsets first). The allocator outlives any one function; value
//! keys carry their function index so a slot still held when a function ends
//! is reclaimed by the first liveness sweep of the next one.

use super::abi::Register;
use super::instruction::{Line, MemBase, Operand};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// A storage slot: its pool priority and the operand addressing it.
pub type Slot = (i64, Operand);

/// Identity of an SSA value across the whole module:
/// (function index, value index).
pub type ValueKey = (usize, u32);

type SlotState = (BinaryHeap<Reverse<Slot>>, BTreeMap<ValueKey, Slot>);

pub struct SlotAllocator {
    free: BinaryHeap<Reverse<Slot>>,
    used: BTreeMap<ValueKey, Slot>,
    /// Lowest-addressed used byte relative to %rbp. Always a multiple of 8;
    /// only ever decreases within a function.
    top_of_stack: i64,
    /// Slot states captured at conditional branches, keyed by the successor
    /// block's label and consumed when that block is entered.
    backups: HashMap<String, SlotState>,
}

impl SlotAllocator {
    pub fn new() -> Self {
        let mut free = BinaryHeap::new();
        for (reg, priority) in Register::PRIORITIES {
            free.push(Reverse((priority, Operand::Reg(reg))));
        }
        Self {
            free,
            used: BTreeMap::new(),
            top_of_stack: Self::frame_base(),
            backups: HashMap::new(),
        }
    }

    /// Offset of the lowest callee-save word relative to %rbp. The spill
    /// area grows downward from here.
    pub fn frame_base() -> i64 {
        -8 * Register::CALLEE_SAVED.len() as i64
    }

    /// Reset the spill watermark at a function prologue.
    pub fn reset_stack(&mut self) {
        self.top_of_stack = Self::frame_base();
    }

    /// Hand the best free slot to `value`, growing the spill area when the
    /// pool is empty (which appends a `sub $8, %rsp` to `out`). Acquiring a
    /// value that already holds a slot returns that slot unchanged.
    pub fn acquire(&mut self, value: ValueKey, out: &mut Vec<Line>) -> Operand {
        if let Some(&(_, operand)) = self.used.get(&value) {
            return operand;
        }
        let slot = match self.free.pop() {
            Some(Reverse(slot)) => slot,
            None => {
                self.top_of_stack -= 8;
                out.push(Line::SrcDst(
                    "sub",
                    Operand::Imm(8),
                    Operand::Reg(Register::Rsp),
                ));
                (
                    -self.top_of_stack,
                    Operand::Mem {
                        base: MemBase::Reg(Register::Rbp),
                        offset: self.top_of_stack,
                    },
                )
            }
        };
        self.used.insert(value, slot);
        slot.1
    }

    /// The slot currently assigned to `value`, assigning one if absent.
    ///
    /// A value can be read before its defining instruction has been lowered
    /// (a φ incoming along a back edge); assigning eagerly here means the
    /// later definition finds the same slot through `acquire`.
    pub fn query(&mut self, value: ValueKey, out: &mut Vec<Line>) -> Operand {
        self.acquire(value, out)
    }

    /// Return `value`'s slot to the free pool at its original priority.
    pub fn release(&mut self, value: ValueKey) {
        if let Some(slot) = self.used.remove(&value) {
            self.free.push(Reverse(slot));
        }
    }

    /// Values currently holding slots, in key order.
    pub fn used_keys(&self) -> Vec<ValueKey> {
        self.used.keys().copied().collect()
    }

    /// Capture a deep copy of the current slot state under `label`.
    pub fn snapshot(&mut self, label: &str) {
        self.backups
            .insert(label.to_string(), (self.free.clone(), self.used.clone()));
    }

    /// Replace the slot state with the snapshot stored under `label`,
    /// consuming it. Returns whether a snapshot existed.
    pub fn restore(&mut self, label: &str) -> bool {
        match self.backups.remove(label) {
            Some((free, used)) => {
                self.free = free;
                self.used = used;
                true
            }
            None => false,
        }
    }
}

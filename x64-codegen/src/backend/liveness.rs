//! Reachable-use analysis for slot reclamation.
//!
//! After each lowered instruction the generator asks, for every value still
//! holding a slot, whether any instruction that can still execute reads it.
//! The check scans the rest of the current block, then walks successor
//! blocks through the CFG. The starting block is deliberately not marked
//! visited up front: a loop back edge may re-enter it, in which case every
//! use in the block counts, including ones behind the current position.

use crate::ir::{Function, ValueId};
use std::collections::HashSet;

/// Whether `value` has any use reachable strictly after the instruction at
/// `(block, index)`.
pub fn has_reachable_uses(func: &Function, block: usize, index: usize, value: ValueId) -> bool {
    let blk = &func.blocks[block];
    for instr in &blk.instrs[index + 1..] {
        if instr.uses(value) {
            return true;
        }
    }

    let Some(terminator) = blk.instrs.last() else {
        return false;
    };
    let mut seen: HashSet<usize> = HashSet::new();
    for succ in terminator.successors() {
        if seen.insert(succ.0) && block_reaches_use(func, succ.0, value, &mut seen) {
            return true;
        }
    }
    false
}

fn block_reaches_use(
    func: &Function,
    block: usize,
    value: ValueId,
    seen: &mut HashSet<usize>,
) -> bool {
    let blk = &func.blocks[block];
    if blk.uses_value(value) {
        return true;
    }
    let Some(terminator) = blk.instrs.last() else {
        return false;
    };
    for succ in terminator.successors() {
        if seen.insert(succ.0) && block_reaches_use(func, succ.0, value, seen) {
            return true;
        }
    }
    false
}

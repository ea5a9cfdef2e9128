//! Deterministic label naming for basic blocks and φ edges.
//!
//! Built once per module, before any emission. The entry block of each
//! function is labelled with the function's own symbol; every other block
//! gets `__<function>_block_<name>`. Edges that feed a φ-node additionally
//! get a landing-pad label `__PHI_FROM_<pred>_TO_<succ>`, where the
//! predecessor side always uses the `_block_` rendering, entry blocks
//! included.

use crate::ir::{Block, BlockRef, Instr, Module};
use std::collections::HashMap;

/// Identity of a basic block across the whole module:
/// (function index, block index).
pub type BlockKey = (usize, usize);

pub struct LabelRegistry {
    block_labels: HashMap<BlockKey, String>,
    phi_edge_labels: HashMap<(BlockKey, BlockKey), String>,
}

impl LabelRegistry {
    pub fn build(module: &Module) -> Self {
        let mut block_labels = HashMap::new();
        let mut phi_edge_labels = HashMap::new();

        for (fi, func) in module.functions.iter().enumerate() {
            for (bi, block) in func.blocks.iter().enumerate() {
                let label = if bi == 0 {
                    func.name.clone()
                } else {
                    format!("__{}_block_{}", func.name, block.name)
                };
                block_labels.insert((fi, bi), label);
            }
            for (bi, block) in func.blocks.iter().enumerate() {
                for pred in leading_phi_preds(block) {
                    let pred_name =
                        format!("__{}_block_{}", func.name, func.blocks[pred.0].name);
                    let edge = format!(
                        "__PHI_FROM_{}_TO_{}",
                        pred_name,
                        block_labels[&(fi, bi)]
                    );
                    phi_edge_labels.insert(((fi, pred.0), (fi, bi)), edge);
                }
            }
        }

        Self {
            block_labels,
            phi_edge_labels,
        }
    }

    pub fn block_label(&self, key: BlockKey) -> &str {
        self.block_labels
            .get(&key)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The landing-pad label for the edge `pred → succ`, if that edge feeds
    /// a φ-node in `succ`.
    pub fn phi_edge_label(&self, pred: BlockKey, succ: BlockKey) -> Option<&str> {
        self.phi_edge_labels
            .get(&(pred, succ))
            .map(String::as_str)
    }
}

/// Distinct predecessors feeding a block's leading φ-nodes, in first
/// appearance order.
pub(crate) fn leading_phi_preds(block: &Block) -> Vec<BlockRef> {
    let mut preds: Vec<BlockRef> = Vec::new();
    for instr in &block.instrs {
        let Instr::Phi { incomings, .. } = instr else {
            break;
        };
        for (_, pred) in incomings {
            if !preds.contains(pred) {
                preds.push(*pred);
            }
        }
    }
    preds
}

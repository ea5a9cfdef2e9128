//! Code generation driver: walks a module and emits x86-64 assembly lines.
//!
//! Emission is a single pass in iteration order: functions, then blocks,
//! then instructions. Each block gets its label (and, for entry blocks, the
//! frame prologue; for φ-target blocks, the per-edge copy batch) before its
//! instructions are dispatched, and the liveness sweep runs after every
//! instruction to reclaim dead slots.

use super::abi::Register;
use super::instruction::{Line, MemBase, Operand};
use super::labels::{self, LabelRegistry};
use super::liveness;
use super::slots::{SlotAllocator, ValueKey};
use crate::ir::{BinOp, BlockRef, Function, Instr, Module, Predicate, Value, ValueId};

/// The program under construction: the emitted lines, the label registry,
/// and the slot allocator.
pub struct Program<'m> {
    module: &'m Module,
    lines: Vec<Line>,
    labels: LabelRegistry,
    slots: SlotAllocator,
}

impl<'m> Program<'m> {
    /// Build the label registry and emit the fixed program header.
    pub fn new(module: &'m Module) -> Self {
        let labels = LabelRegistry::build(module);
        let mut program = Self {
            module,
            lines: Vec::new(),
            labels,
            slots: SlotAllocator::new(),
        };
        program.emit_header();
        program
    }

    /// Flatten the accumulated lines to assembly text.
    pub fn finish(self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    pub fn emit_module(&mut self) {
        let module = self.module;
        for (fi, func) in module.functions.iter().enumerate() {
            for bi in 0..func.blocks.len() {
                self.emit_block(fi, func, bi);
            }
        }
    }

    // ── Emission helpers ────────────────────────────────────────────────

    fn push(&mut self, line: Line) {
        self.lines.push(line);
    }

    /// Acquire a slot for `key`, draining any spill-growth instruction the
    /// allocator emits into the output buffer first.
    fn acquire(&mut self, key: ValueKey) -> Operand {
        let mut out = Vec::new();
        let slot = self.slots.acquire(key, &mut out);
        self.lines.extend(out);
        slot
    }

    fn query(&mut self, key: ValueKey) -> Operand {
        let mut out = Vec::new();
        let slot = self.slots.query(key, &mut out);
        self.lines.extend(out);
        slot
    }

    /// Materialize an operand: an immediate for constants, the value's slot
    /// otherwise.
    fn resolve(&mut self, fi: usize, value: Value) -> Operand {
        match value {
            Value::Const(n) => Operand::Imm(n),
            Value::Ref(id) => self.query((fi, id.0)),
        }
    }

    // ── Program header ──────────────────────────────────────────────────

    fn emit_header(&mut self) {
        let main_label = match self.module.function_index("main") {
            Some(fi) => self.labels.block_label((fi, 0)).to_string(),
            None => {
                log::error!("there's no main function");
                "main".to_string()
            }
        };
        self.push(Line::Comment(
            "this assembly generated by the cs257 code generator".into(),
        ));
        self.push(Line::Directive(".globl _start"));
        self.push(Line::Label("_start".into()));
        self.push(Line::LabelRef("callq", main_label));
        self.push(Line::Comment(
            "taking main's return value and putting it in %rbx to act as program exit code"
                .into(),
        ));
        self.push(Line::SrcDst(
            "movq",
            Operand::Reg(Register::Rax),
            Operand::Reg(Register::Rbx),
        ));
        self.push(Line::Comment("1 is the linux interrupt code for exit".into()));
        self.push(Line::SrcDst(
            "movq",
            Operand::Imm(1),
            Operand::Reg(Register::Rax),
        ));
        self.push(Line::Comment("passing control to the kernel".into()));
        self.push(Line::Imm("int", 0x80));
    }

    // ── Block walking ───────────────────────────────────────────────────

    fn emit_block(&mut self, fi: usize, func: &'m Function, bi: usize) {
        self.emit_block_begin(fi, func, bi);
        for (ii, instr) in func.blocks[bi].instrs.iter().enumerate() {
            log::trace!("got an instruction: {}", func.format_instr(instr));
            match instr {
                Instr::Binary {
                    result,
                    op,
                    lhs,
                    rhs,
                } => self.emit_binop(fi, func, *result, *op, *lhs, *rhs),
                Instr::Icmp { lhs, rhs, .. } => self.emit_icmp(fi, *lhs, *rhs),
                Instr::Call {
                    result,
                    callee,
                    arg,
                } => self.emit_call(fi, func, *result, callee, *arg),
                Instr::Ret { value } => self.emit_ret(*value, fi),
                Instr::Br { .. } | Instr::CondBr { .. } => self.emit_br(fi, func, bi, instr),
                // φ-nodes are lowered as a batch by emit_block_begin.
                Instr::Phi { .. } => {}
            }
            self.release_dead_slots(fi, func, bi, ii);
        }
    }

    /// Emit the block's label, restore any pending slot snapshot, then the
    /// function prologue for entry blocks and the φ copy batch for φ-target
    /// blocks.
    fn emit_block_begin(&mut self, fi: usize, func: &'m Function, bi: usize) {
        let block_label = self.labels.block_label((fi, bi)).to_string();
        self.push(Line::Label(block_label.clone()));

        if self.slots.restore(&block_label) {
            log::debug!("restoring the slots at {}", block_label);
        }

        if bi == 0 {
            self.slots.reset_stack();

            self.push(Line::Comment(format!("function prologue for {}", block_label)));
            self.push(Line::Src("pushq", Operand::Reg(Register::Rbp)));
            self.push(Line::SrcDst(
                "movq",
                Operand::Reg(Register::Rsp),
                Operand::Reg(Register::Rbp),
            ));

            self.push(Line::Comment(format!(
                "pushing callee-saved registers for start of {}",
                block_label
            )));
            for reg in Register::CALLEE_SAVED {
                self.push(Line::Src("pushq", Operand::Reg(reg)));
            }

            // All functions have at most one argument.
            if let Some(param) = func.param {
                if func.has_uses(param) {
                    self.push(Line::Comment(format!(
                        "saving the argument to {}",
                        block_label
                    )));
                    log::debug!("acquiring slot for %{}", func.value_name(param));
                    let slot = self.acquire((fi, param.0));
                    self.push(Line::SrcDst("movq", Operand::Reg(Register::Rdi), slot));
                }
            }
        }

        let block = &func.blocks[bi];
        if block.starts_with_phi() {
            // Acquire result slots for the whole φ batch up front, and
            // collect the union of incoming predecessors in first
            // appearance order.
            let mut phis = Vec::new();
            for instr in &block.instrs {
                let Instr::Phi { result, incomings } = instr else {
                    break;
                };
                phis.push((*result, incomings));
                if func.has_uses(*result) {
                    log::debug!("acquiring slot for %{}", func.value_name(*result));
                    self.acquire((fi, result.0));
                }
            }
            let preds = labels::leading_phi_preds(block);

            let phi_done = format!("__PHI_DONE_{}", block_label);
            for pred in preds {
                let edge = self
                    .labels
                    .phi_edge_label((fi, pred.0), (fi, bi))
                    .map(str::to_string);
                let Some(edge_label) = edge else { continue };

                self.push(Line::Label(edge_label));
                for (result, incomings) in &phis {
                    if !func.has_uses(*result) {
                        continue;
                    }
                    let Some((value, _)) = incomings.iter().find(|(_, b)| *b == pred) else {
                        continue;
                    };
                    let src = self.resolve(fi, *value);
                    let dst = self.query((fi, result.0));
                    self.push(Line::SrcDst("movq", src, dst));
                }
                self.push(Line::LabelRef("jmp", phi_done.clone()));
            }
            self.push(Line::Label(phi_done));
        }
    }

    // ── Per-instruction lowering ────────────────────────────────────────

    fn emit_binop(
        &mut self,
        fi: usize,
        func: &Function,
        result: ValueId,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    ) {
        self.push(Line::Comment("Processing a binary operation".into()));

        let lhs = self.resolve(fi, lhs);
        self.push(Line::SrcDst("movq", lhs, Operand::Reg(Register::Rax)));

        let rhs = self.resolve(fi, rhs);
        match op {
            BinOp::Add | BinOp::Sub => {
                self.push(Line::SrcDst(binop_opcode(op), rhs, Operand::Reg(Register::Rax)));
            }
            // mul and div implicitly read and write the accumulator.
            BinOp::Mul | BinOp::Div => {
                self.push(Line::Src(binop_opcode(op), rhs));
            }
        }

        // Only save the accumulator if the result has future uses.
        if func.has_uses(result) {
            log::debug!("acquiring slot for %{}", func.value_name(result));
            let slot = self.acquire((fi, result.0));
            self.push(Line::SrcDst("movq", Operand::Reg(Register::Rax), slot));
        }
        self.push(Line::Comment("Finished processing binary operation".into()));
    }

    /// The compare's result occupies no slot; it lives in the flags until
    /// the next conditional branch consumes it.
    fn emit_icmp(&mut self, fi: usize, lhs: Value, rhs: Value) {
        self.push(Line::Comment("Processing a comparison instruction".into()));

        let lhs = self.resolve(fi, lhs);
        self.push(Line::SrcDst("movq", lhs, Operand::Reg(Register::Rax)));

        let rhs = self.resolve(fi, rhs);
        self.push(Line::SrcDst("cmp", rhs, Operand::Reg(Register::Rax)));

        self.push(Line::Comment(
            "Finished processing a comparison instruction".into(),
        ));
    }

    fn emit_call(
        &mut self,
        fi: usize,
        func: &Function,
        result: ValueId,
        callee: &str,
        arg: Option<Value>,
    ) {
        let target = match self.module.function_index(callee) {
            Some(ci) => self.labels.block_label((ci, 0)).to_string(),
            None => {
                log::error!("call to undefined function @{}", callee);
                callee.to_string()
            }
        };

        self.push(Line::Comment(format!(
            "pushing caller-saved registers before call to {}",
            target
        )));
        for reg in Register::CALLER_SAVED {
            self.push(Line::Src("pushq", Operand::Reg(reg)));
        }

        if let Some(arg) = arg {
            self.push(Line::Comment(format!(
                "passing argument to {} in %rdi",
                target
            )));
            let src = self.resolve(fi, arg);
            self.push(Line::SrcDst("movq", src, Operand::Reg(Register::Rdi)));
        }

        self.push(Line::Comment(format!("calling {}", target)));
        self.push(Line::LabelRef("callq", target.clone()));

        self.push(Line::Comment(format!(
            "popping caller-saved registers after call to {}",
            target
        )));
        for reg in Register::CALLER_SAVED.iter().rev() {
            self.push(Line::Dst("popq", Operand::Reg(*reg)));
        }

        // The returned value is in %rax; save it only if something reads it.
        if func.has_uses(result) {
            self.push(Line::Comment(format!(
                "saving the value returned from {}",
                target
            )));
            log::debug!("acquiring slot for %{}", func.value_name(result));
            let slot = self.acquire((fi, result.0));
            self.push(Line::SrcDst("movq", Operand::Reg(Register::Rax), slot));
        }
    }

    fn emit_ret(&mut self, value: Option<Value>, fi: usize) {
        if let Some(v) = value {
            self.push(Line::Comment("sticking return value into %rax".into()));
            let src = self.resolve(fi, v);
            self.push(Line::SrcDst("movq", src, Operand::Reg(Register::Rax)));
        }

        // Callee saves live at fixed offsets below %rbp; read them back in
        // reverse push order.
        self.push(Line::Comment("popping callee-saved registers".into()));
        let mut offset = SlotAllocator::frame_base();
        for reg in Register::CALLEE_SAVED.iter().rev() {
            self.push(Line::SrcDst(
                "movq",
                Operand::Mem {
                    base: MemBase::Reg(Register::Rbp),
                    offset,
                },
                Operand::Reg(*reg),
            ));
            offset += 8;
        }

        self.push(Line::Comment("tearing down the stack and returning".into()));
        self.push(Line::NoArg("leaveq"));
        self.push(Line::NoArg("retq"));
    }

    fn emit_br(&mut self, fi: usize, func: &'m Function, bi: usize, instr: &Instr) {
        match instr {
            Instr::Br { dest } => {
                let target = self.branch_target(fi, func, bi, *dest);
                self.push(Line::LabelRef("jmp", target));
            }
            Instr::CondBr {
                cond,
                then_dest,
                else_dest,
            } => {
                // The condition must be the result of a compare; its
                // predicate picks the jump pair.
                let pred = match cond {
                    Value::Ref(id) => match func.def_of(*id) {
                        Some(Instr::Icmp { pred, .. }) => Some(*pred),
                        _ => None,
                    },
                    Value::Const(_) => None,
                };
                let Some(pred) = pred else {
                    log::error!("invalid type of branch condition");
                    return;
                };

                // One jump on the positive predicate, one on its complement:
                // a failed x86 jump falls through, whereas the IR branch
                // always transfers control.
                let (positive, complement) = jump_opcodes(pred);
                let target_1 = self.branch_target(fi, func, bi, *then_dest);
                let target_2 = self.branch_target(fi, func, bi, *else_dest);
                self.push(Line::LabelRef(positive, target_1));
                self.push(Line::LabelRef(complement, target_2));

                // Whichever side is lowered first must start from this same
                // allocator state.
                let label_1 = self.labels.block_label((fi, then_dest.0)).to_string();
                let label_2 = self.labels.block_label((fi, else_dest.0)).to_string();
                log::debug!("backing up the slots for {} and {}", label_1, label_2);
                self.slots.snapshot(&label_1);
                self.slots.snapshot(&label_2);
            }
            _ => {}
        }
    }

    /// The effective target of a jump: the φ-edge landing pad when the
    /// successor starts with a φ-node, the block's own label otherwise.
    fn branch_target(&mut self, fi: usize, func: &Function, bi: usize, dest: BlockRef) -> String {
        if func.blocks[dest.0].starts_with_phi() {
            if let Some(label) = self.labels.phi_edge_label((fi, bi), (fi, dest.0)) {
                return label.to_string();
            }
        }
        self.labels.block_label((fi, dest.0)).to_string()
    }

    // ── Liveness sweep ──────────────────────────────────────────────────

    /// Release every slot whose value has no use reachable from just after
    /// the instruction at `(bi, ii)`. Values belonging to other functions
    /// have no reachable uses by definition.
    fn release_dead_slots(&mut self, fi: usize, func: &Function, bi: usize, ii: usize) {
        let module = self.module;
        for key in self.slots.used_keys() {
            let live = key.0 == fi && liveness::has_reachable_uses(func, bi, ii, ValueId(key.1));
            if !live {
                let owner = &module.functions[key.0];
                log::debug!(
                    "releasing the slot for %{}",
                    owner.value_name(ValueId(key.1))
                );
                self.slots.release(key);
            }
        }
    }
}

fn binop_opcode(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
    }
}

/// The positive and complementary jump mnemonics for a predicate.
fn jump_opcodes(pred: Predicate) -> (&'static str, &'static str) {
    match pred {
        Predicate::Eq => ("je", "jne"),
        Predicate::Ne => ("jne", "je"),
        Predicate::Sgt => ("jg", "jle"),
        Predicate::Sge => ("jge", "jl"),
        Predicate::Slt => ("jl", "jge"),
        Predicate::Sle => ("jle", "jg"),
        Predicate::Ugt | Predicate::Uge | Predicate::Ult | Predicate::Ule => {
            log::error!("invalid comparison predicate '{}'", pred);
            ("INVALID JUMP", "INVALID JUMP")
        }
    }
}

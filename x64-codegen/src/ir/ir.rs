// A small SSA IR: functions of basic blocks holding integer instructions.
use std::fmt;

/// `Module` is the unit of translation: an ordered list of functions.
#[derive(Debug, Clone)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    /// Index of the function with the given symbol name, if defined.
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }
}

/// Identity of an SSA value within its function.
///
/// Covers the function parameter (if present) and every instruction result,
/// in definition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub u32);

/// Index of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef(pub usize);

/// An operand: a constant integer or a reference to an SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Const(i64),
    Ref(ValueId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn ir_name(&self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "sdiv",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ir_name())
    }
}

/// Integer comparison predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
    Ugt,
    Uge,
    Ult,
    Ule,
}

impl Predicate {
    pub fn from_ir_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Predicate::Eq),
            "ne" => Some(Predicate::Ne),
            "sgt" => Some(Predicate::Sgt),
            "sge" => Some(Predicate::Sge),
            "slt" => Some(Predicate::Slt),
            "sle" => Some(Predicate::Sle),
            "ugt" => Some(Predicate::Ugt),
            "uge" => Some(Predicate::Uge),
            "ult" => Some(Predicate::Ult),
            "ule" => Some(Predicate::Ule),
            _ => None,
        }
    }

    pub fn ir_name(&self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Sgt => "sgt",
            Predicate::Sge => "sge",
            Predicate::Slt => "slt",
            Predicate::Sle => "sle",
            Predicate::Ugt => "ugt",
            Predicate::Uge => "uge",
            Predicate::Ult => "ult",
            Predicate::Ule => "ule",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ir_name())
    }
}

#[derive(Debug, Clone)]
pub enum Instr {
    Binary {
        result: ValueId,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Icmp {
        result: ValueId,
        pred: Predicate,
        lhs: Value,
        rhs: Value,
    },
    Phi {
        result: ValueId,
        incomings: Vec<(Value, BlockRef)>,
    },
    Call {
        result: ValueId,
        callee: String,
        arg: Option<Value>,
    },
    Br {
        dest: BlockRef,
    },
    CondBr {
        cond: Value,
        then_dest: BlockRef,
        else_dest: BlockRef,
    },
    Ret {
        value: Option<Value>,
    },
}

impl Instr {
    /// The SSA value this instruction defines, if any.
    pub fn result(&self) -> Option<ValueId> {
        match self {
            Instr::Binary { result, .. }
            | Instr::Icmp { result, .. }
            | Instr::Phi { result, .. }
            | Instr::Call { result, .. } => Some(*result),
            Instr::Br { .. } | Instr::CondBr { .. } | Instr::Ret { .. } => None,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Instr::Phi { .. })
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Br { .. } | Instr::CondBr { .. } | Instr::Ret { .. }
        )
    }

    /// Visit every operand this instruction reads.
    ///
    /// Block references are not operands; φ incoming values are.
    pub fn for_each_operand<F: FnMut(&Value)>(&self, mut f: F) {
        match self {
            Instr::Binary { lhs, rhs, .. } | Instr::Icmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Instr::Phi { incomings, .. } => {
                for (v, _) in incomings {
                    f(v);
                }
            }
            Instr::Call { arg, .. } => {
                if let Some(a) = arg {
                    f(a);
                }
            }
            Instr::CondBr { cond, .. } => f(cond),
            Instr::Ret { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            Instr::Br { .. } => {}
        }
    }

    /// Whether this instruction reads `v` as an operand.
    pub fn uses(&self, v: ValueId) -> bool {
        let mut found = false;
        self.for_each_operand(|val| {
            if let Value::Ref(id) = val {
                if *id == v {
                    found = true;
                }
            }
        });
        found
    }

    /// Control-flow successors, for terminators.
    pub fn successors(&self) -> Vec<BlockRef> {
        match self {
            Instr::Br { dest } => vec![*dest],
            Instr::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    /// Source label of the block ("entry" for an unlabelled entry block).
    pub name: String,
    pub instrs: Vec<Instr>,
}

impl Block {
    pub fn starts_with_phi(&self) -> bool {
        self.instrs.first().map_or(false, |i| i.is_phi())
    }

    /// Whether any instruction in this block reads `v`.
    pub fn uses_value(&self, v: ValueId) -> bool {
        self.instrs.iter().any(|i| i.uses(v))
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// The at-most-one i64 parameter.
    pub param: Option<ValueId>,
    pub blocks: Vec<Block>,
    /// Source names of values, indexed by `ValueId`.
    value_names: Vec<String>,
    /// Number of operand references to each value.
    use_counts: Vec<u32>,
    /// Position `(block, instruction)` of each value's defining instruction.
    /// The parameter has no defining instruction.
    defs: Vec<Option<(usize, usize)>>,
}

impl Function {
    pub fn new(
        name: String,
        param: Option<ValueId>,
        blocks: Vec<Block>,
        value_names: Vec<String>,
    ) -> Self {
        let mut func = Self {
            name,
            param,
            blocks,
            value_names,
            use_counts: Vec::new(),
            defs: Vec::new(),
        };
        func.recompute_metadata();
        func
    }

    fn recompute_metadata(&mut self) {
        let n = self.value_names.len();
        let mut use_counts = vec![0u32; n];
        let mut defs = vec![None; n];
        for (bi, block) in self.blocks.iter().enumerate() {
            for (ii, instr) in block.instrs.iter().enumerate() {
                instr.for_each_operand(|v| {
                    if let Value::Ref(id) = v {
                        use_counts[id.0 as usize] += 1;
                    }
                });
                if let Some(r) = instr.result() {
                    defs[r.0 as usize] = Some((bi, ii));
                }
            }
        }
        self.use_counts = use_counts;
        self.defs = defs;
    }

    pub fn value_count(&self) -> usize {
        self.value_names.len()
    }

    pub fn value_name(&self, v: ValueId) -> &str {
        self.value_names
            .get(v.0 as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }

    /// Whether any instruction references `v` as an operand.
    pub fn has_uses(&self, v: ValueId) -> bool {
        self.use_counts.get(v.0 as usize).copied().unwrap_or(0) > 0
    }

    /// The instruction that defines `v`, if `v` is an instruction result.
    pub fn def_of(&self, v: ValueId) -> Option<&Instr> {
        let (bi, ii) = (*self.defs.get(v.0 as usize)?)?;
        self.blocks.get(bi)?.instrs.get(ii)
    }

    pub fn format_value(&self, v: Value) -> String {
        match v {
            Value::Const(n) => n.to_string(),
            Value::Ref(id) => format!("%{}", self.value_name(id)),
        }
    }

    /// Render an instruction in source syntax, for diagnostics.
    pub fn format_instr(&self, instr: &Instr) -> String {
        match instr {
            Instr::Binary {
                result,
                op,
                lhs,
                rhs,
            } => format!(
                "%{} = {} i64 {}, {}",
                self.value_name(*result),
                op,
                self.format_value(*lhs),
                self.format_value(*rhs)
            ),
            Instr::Icmp {
                result,
                pred,
                lhs,
                rhs,
            } => format!(
                "%{} = icmp {} i64 {}, {}",
                self.value_name(*result),
                pred,
                self.format_value(*lhs),
                self.format_value(*rhs)
            ),
            Instr::Phi { result, incomings } => {
                let parts: Vec<String> = incomings
                    .iter()
                    .map(|(v, b)| {
                        format!("[ {}, %{} ]", self.format_value(*v), self.blocks[b.0].name)
                    })
                    .collect();
                format!(
                    "%{} = phi i64 {}",
                    self.value_name(*result),
                    parts.join(", ")
                )
            }
            Instr::Call {
                result,
                callee,
                arg,
            } => {
                let arg_text = match arg {
                    Some(a) => format!("i64 {}", self.format_value(*a)),
                    None => String::new(),
                };
                format!(
                    "%{} = call i64 @{}({})",
                    self.value_name(*result),
                    callee,
                    arg_text
                )
            }
            Instr::Br { dest } => format!("br label %{}", self.blocks[dest.0].name),
            Instr::CondBr {
                cond,
                then_dest,
                else_dest,
            } => format!(
                "br i1 {}, label %{}, label %{}",
                self.format_value(*cond),
                self.blocks[then_dest.0].name,
                self.blocks[else_dest.0].name
            ),
            Instr::Ret { value } => match value {
                Some(v) => format!("ret i64 {}", self.format_value(*v)),
                None => "ret void".to_string(),
            },
        }
    }
}

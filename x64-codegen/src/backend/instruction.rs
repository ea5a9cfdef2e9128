//! x86-64 operand and assembly-line types.
//!
//! Operands are small `Copy` values stored directly inside each line, and a
//! memory operand's base is restricted by construction to a register or an
//! immediate, so nested memory addressing is unrepresentable.

use super::abi::Register;
use std::fmt;

// ============================================================================
// Operands
// ============================================================================

/// Base of a memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemBase {
    Reg(Register),
    Imm(i64),
}

/// An instruction operand in GAS syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operand {
    /// `$v`
    Imm(i64),
    /// `%name`
    Reg(Register),
    /// `offset(%base)`, or a bare absolute address for an immediate base.
    Mem { base: MemBase, offset: i64 },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "${}", v),
            Operand::Reg(r) => write!(f, "%{}", r),
            Operand::Mem { base, offset } => match base {
                MemBase::Reg(r) => write!(f, "{}(%{})", offset, r),
                // An immediate address form carries no displacement.
                MemBase::Imm(v) => write!(f, "{}", v),
            },
        }
    }
}

// ============================================================================
// Assembly lines
// ============================================================================

/// One line of assembly output.
///
/// Labels, directives, and comments are not instructions, but letting them
/// sit alongside real instructions in one ordered buffer keeps emission
/// simple. Instruction variants are grouped by arity.
#[derive(Debug, Clone)]
pub enum Line {
    /// `name:`
    Label(String),
    /// Raw assembler directive, like `.globl`.
    Directive(&'static str),
    /// `# text`
    Comment(String),
    /// `leaveq`, `retq`
    NoArg(&'static str),
    /// One source operand, like `pushq`.
    Src(&'static str, Operand),
    /// One destination operand, like `popq`.
    Dst(&'static str, Operand),
    /// One immediate operand, rendered in hexadecimal (`int $0x80`).
    Imm(&'static str, i64),
    /// One label operand, like `callq` or `jmp`.
    LabelRef(&'static str, String),
    /// Source and destination, like `movq` or `add`.
    SrcDst(&'static str, Operand, Operand),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Label(name) => write!(f, "{}:", name),
            Line::Directive(text) => write!(f, "{}", text),
            Line::Comment(text) => write!(f, "    # {}", text),
            Line::NoArg(opcode) => write!(f, "    {}", opcode),
            Line::Src(opcode, src) => write!(f, "    {} {}", opcode, src),
            Line::Dst(opcode, dst) => write!(f, "    {} {}", opcode, dst),
            Line::Imm(opcode, v) => write!(f, "    {} ${:#x}", opcode, v),
            Line::LabelRef(opcode, label) => write!(f, "    {} {}", opcode, label),
            Line::SrcDst(opcode, src, dst) => write!(f, "    {} {}, {}", opcode, src, dst),
        }
    }
}

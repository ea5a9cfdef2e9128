use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    Rax, Rbx, Rcx, Rdx, Rsi, Rdi, Rbp, Rsp,
    R8, R9, R10, R11, R12, R13, R14, R15,
}

impl Register {
    /// Callee-saved registers, in prologue push order.
    ///
    /// %rbp and %rsp are callee-saved too, but the prologue, `leaveq`, and
    /// `retq` take care of those.
    pub const CALLEE_SAVED: [Register; 5] = [
        Register::Rbx, Register::R12, Register::R13, Register::R14, Register::R15,
    ];

    /// Caller-saved registers, in call-site push order.
    ///
    /// %rdi is caller-saved too, but it carries the argument so it is not
    /// preserved here.
    pub const CALLER_SAVED: [Register; 7] = [
        Register::Rcx, Register::Rdx, Register::Rsi, Register::R8,
        Register::R9, Register::R10, Register::R11,
    ];

    /// Allocatable registers with their pool priorities. More negative is
    /// handed out first, keeping the whole register band ahead of any spill
    /// slot (spill priorities are positive).
    ///
    /// Omitted: %rax (return values), %rdi (the argument), %rbp (frame
    /// pointer), %rsp (stack pointer).
    pub const PRIORITIES: [(Register, i64); 12] = [
        (Register::Rbx, -12),
        (Register::Rcx, -11),
        (Register::Rdx, -10),
        (Register::Rsi, -9),
        (Register::R8, -8),
        (Register::R9, -7),
        (Register::R10, -6),
        (Register::R11, -5),
        (Register::R12, -4),
        (Register::R13, -3),
        (Register::R14, -2),
        (Register::R15, -1),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rbx => "rbx",
            Register::Rcx => "rcx",
            Register::Rdx => "rdx",
            Register::Rsi => "rsi",
            Register::Rdi => "rdi",
            Register::Rbp => "rbp",
            Register::Rsp => "rsp",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::R10 => "r10",
            Register::R11 => "r11",
            Register::R12 => "r12",
            Register::R13 => "r13",
            Register::R14 => "r14",
            Register::R15 => "r15",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

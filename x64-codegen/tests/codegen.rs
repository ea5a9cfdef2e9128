use x64_codegen::backend::abi::Register;
use x64_codegen::backend::instruction::{Line, MemBase, Operand};
use x64_codegen::compile_to_x64;

// ── Fixed program header ─────────────────────────────────────────────────

const HEADER: &str = "    # this assembly generated by the cs257 code generator
.globl _start
_start:
    callq main
    # taking main's return value and putting it in %rbx to act as program exit code
    movq %rax, %rbx
    # 1 is the linux interrupt code for exit
    movq $1, %rax
    # passing control to the kernel
    int $0x80
";

#[test]
fn emits_fixed_header_first() {
    let asm = compile_to_x64("define i64 @main() {\n  ret i64 0\n}\n").expect("should compile");
    assert!(
        asm.starts_with(HEADER),
        "output should open with the fixed header, got:\n{}",
        asm
    );
}

// ── Whole-program goldens ────────────────────────────────────────────────

#[test]
fn ret_constant_exact_output() {
    let source = "define i64 @main() {\n  ret i64 0\n}\n";
    let asm = compile_to_x64(source).expect("should compile");

    let expected = format!(
        "{}{}",
        HEADER,
        "main:
    # function prologue for main
    pushq %rbp
    movq %rsp, %rbp
    # pushing callee-saved registers for start of main
    pushq %rbx
    pushq %r12
    pushq %r13
    pushq %r14
    pushq %r15
    # sticking return value into %rax
    movq $0, %rax
    # popping callee-saved registers
    movq -40(%rbp), %r15
    movq -32(%rbp), %r14
    movq -24(%rbp), %r13
    movq -16(%rbp), %r12
    movq -8(%rbp), %rbx
    # tearing down the stack and returning
    leaveq
    retq
"
    );
    assert_eq!(asm, expected);
}

#[test]
fn add_then_ret_exact_output() {
    let source = "define i64 @main() {\n  %1 = add i64 2, 3\n  ret i64 %1\n}\n";
    let asm = compile_to_x64(source).expect("should compile");

    let expected = format!(
        "{}{}",
        HEADER,
        "main:
    # function prologue for main
    pushq %rbp
    movq %rsp, %rbp
    # pushing callee-saved registers for start of main
    pushq %rbx
    pushq %r12
    pushq %r13
    pushq %r14
    pushq %r15
    # Processing a binary operation
    movq $2, %rax
    add $3, %rax
    movq %rax, %rbx
    # Finished processing binary operation
    # sticking return value into %rax
    movq %rbx, %rax
    # popping callee-saved registers
    movq -40(%rbp), %r15
    movq -32(%rbp), %r14
    movq -24(%rbp), %r13
    movq -16(%rbp), %r12
    movq -8(%rbp), %rbx
    # tearing down the stack and returning
    leaveq
    retq
"
    );
    assert_eq!(asm, expected);
}

// ── Structural invariants ────────────────────────────────────────────────

const DIAMOND: &str = r#"
define i64 @neg(i64 %x) {
  %1 = sub i64 0, %x
  ret i64 %1
}
define i64 @main() {
entry:
  %1 = icmp slt i64 1, 2
  br i1 %1, label %A, label %B
A:
  br label %C
B:
  br label %C
C:
  %p = phi i64 [ 1, %A ], [ 2, %B ]
  %r = call i64 @neg(i64 %p)
  ret i64 %r
}
"#;

#[test]
fn every_label_defined_exactly_once() {
    let asm = compile_to_x64(DIAMOND).expect("should compile");
    let definitions = label_definitions(&asm);
    let mut sorted = definitions.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(
        sorted.len(),
        definitions.len(),
        "some label is defined more than once:\n{}",
        asm
    );
}

#[test]
fn every_jump_and_call_target_is_defined() {
    let asm = compile_to_x64(DIAMOND).expect("should compile");
    let definitions = label_definitions(&asm);
    for target in branch_targets(&asm) {
        assert!(
            definitions.contains(&target),
            "target '{}' has no label definition:\n{}",
            target,
            asm
        );
    }
}

#[test]
fn output_is_deterministic() {
    let first = compile_to_x64(DIAMOND).expect("should compile");
    let second = compile_to_x64(DIAMOND).expect("should compile");
    assert_eq!(first, second);
}

#[test]
fn mul_and_div_use_unary_form() {
    let source = "define i64 @main() {
  %1 = mul i64 6, 7
  %2 = sdiv i64 %1, 2
  ret i64 %2
}
";
    let asm = compile_to_x64(source).expect("should compile");
    assert!(asm.contains("    mul $7\n"), "mul takes one operand:\n{}", asm);
    assert!(asm.contains("    div $2\n"), "div takes one operand:\n{}", asm);
}

// ── Operand and line rendering ───────────────────────────────────────────

#[test]
fn operand_rendering() {
    assert_eq!(Operand::Imm(5).to_string(), "$5");
    assert_eq!(Operand::Imm(-5).to_string(), "$-5");
    assert_eq!(Operand::Reg(Register::Rax).to_string(), "%rax");
    assert_eq!(
        Operand::Mem {
            base: MemBase::Reg(Register::Rbp),
            offset: -8
        }
        .to_string(),
        "-8(%rbp)"
    );
    // An immediate base prints as a bare absolute address.
    assert_eq!(
        Operand::Mem {
            base: MemBase::Imm(1000),
            offset: 4
        }
        .to_string(),
        "1000"
    );
}

#[test]
fn line_rendering() {
    assert_eq!(Line::Label("main".into()).to_string(), "main:");
    assert_eq!(Line::Directive(".globl _start").to_string(), ".globl _start");
    assert_eq!(Line::Comment("hello".into()).to_string(), "    # hello");
    assert_eq!(Line::NoArg("retq").to_string(), "    retq");
    assert_eq!(Line::Imm("int", 0x80).to_string(), "    int $0x80");
    assert_eq!(
        Line::SrcDst(
            "movq",
            Operand::Imm(1),
            Operand::Reg(Register::Rax)
        )
        .to_string(),
        "    movq $1, %rax"
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Labels defined in the listing (unindented lines ending with ':').
fn label_definitions(asm: &str) -> Vec<String> {
    asm.lines()
        .filter(|l| !l.starts_with(' ') && l.ends_with(':'))
        .map(|l| l.trim_end_matches(':').to_string())
        .collect()
}

/// Targets of every jump and call instruction in the listing.
fn branch_targets(asm: &str) -> Vec<String> {
    const OPCODES: [&str; 9] = [
        "jmp ", "callq ", "je ", "jne ", "jg ", "jge ", "jl ", "jle ", "INVALID JUMP ",
    ];
    asm.lines()
        .filter_map(|l| {
            let l = l.strip_prefix("    ")?;
            OPCODES
                .iter()
                .find_map(|op| l.strip_prefix(op))
                .map(|target| target.to_string())
        })
        .collect()
}

use x64_codegen::{compile_to_x64, parse_module, CompileError};

// ── Lexical and parse failures ───────────────────────────────────────────

#[test]
fn rejects_unknown_characters() {
    let result = parse_module("define i64 @main() { ret i64 0 } !");
    assert!(
        matches!(result, Err(CompileError::Lexical { .. })),
        "got: {:?}",
        result
    );
}

#[test]
fn rejects_missing_define() {
    assert_parse_error(parse_module("function main() { ret i64 0 }"));
}

#[test]
fn rejects_undefined_value() {
    assert_parse_error(parse_module("define i64 @main() {\n  ret i64 %nope\n}\n"));
}

#[test]
fn rejects_undefined_block_target() {
    assert_parse_error(parse_module("define i64 @main() {\n  br label %nowhere\n}\n"));
}

#[test]
fn rejects_block_without_terminator() {
    assert_parse_error(parse_module(
        "define i64 @main() {\n  %1 = add i64 1, 1\n}\n",
    ));
}

#[test]
fn rejects_instructions_after_terminator() {
    assert_parse_error(parse_module(
        "define i64 @main() {\n  ret i64 0\n  ret i64 1\n}\n",
    ));
}

#[test]
fn rejects_duplicate_value_definition() {
    assert_parse_error(parse_module(
        "define i64 @main() {\n  %1 = add i64 1, 1\n  %1 = add i64 2, 2\n  ret i64 %1\n}\n",
    ));
}

#[test]
fn rejects_duplicate_block_label() {
    assert_parse_error(parse_module(
        "define i64 @main() {\nA:\n  br label %A\nA:\n  ret i64 0\n}\n",
    ));
}

#[test]
fn rejects_phi_after_non_phi() {
    let source = r#"
define i64 @main() {
entry:
  br label %B
B:
  %1 = add i64 1, 1
  %p = phi i64 [ 0, %entry ]
  ret i64 %p
}
"#;
    assert_parse_error(parse_module(source));
}

#[test]
fn rejects_empty_function() {
    assert_parse_error(parse_module("define i64 @main() {}\n"));
}

#[test]
fn rejects_unknown_predicate_word() {
    assert_parse_error(parse_module(
        "define i64 @main() {\n  %1 = icmp frob i64 1, 2\n  ret i64 0\n}\n",
    ));
}

#[test]
fn parse_errors_carry_a_location() {
    let source = "define i64 @main() {\n  ret i64 %nope\n}\n";
    match parse_module(source) {
        Err(CompileError::Parse { location, .. }) => {
            assert_eq!(&source[location..location + 5], "%nope");
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

// ── Structural anomalies: reported, but emission continues ───────────────

#[test]
fn missing_main_still_emits_header() {
    let asm = compile_to_x64("define i64 @f() {\n  ret i64 1\n}\n").expect("should compile");
    assert!(asm.contains("    callq main\n"), "{}", asm);
    assert!(asm.contains("f:\n"), "{}", asm);
}

#[test]
fn unsigned_predicate_emits_invalid_jumps() {
    let source = r#"
define i64 @main() {
entry:
  %1 = icmp ult i64 1, 2
  br i1 %1, label %T, label %F
T:
  ret i64 1
F:
  ret i64 0
}
"#;
    let asm = compile_to_x64(source).expect("should compile");
    assert!(asm.contains("    INVALID JUMP __main_block_T\n"), "{}", asm);
    assert!(asm.contains("    INVALID JUMP __main_block_F\n"), "{}", asm);
}

#[test]
fn non_compare_branch_condition_emits_no_jumps() {
    let source = r#"
define i64 @main() {
entry:
  %1 = add i64 0, 1
  br i1 %1, label %T, label %F
T:
  ret i64 0
F:
  ret i64 1
}
"#;
    let asm = compile_to_x64(source).expect("should compile");
    let jumps = asm
        .lines()
        .filter_map(|l| l.strip_prefix("    "))
        .filter(|l| {
            ["jmp ", "je ", "jne ", "jg ", "jge ", "jl ", "jle ", "INVALID JUMP "]
                .iter()
                .any(|op| l.starts_with(op))
        })
        .count();
    assert_eq!(jumps, 0, "no jumps should be emitted:\n{}", asm);
    assert!(asm.contains("__main_block_T:\n"), "{}", asm);
}

// ── Helper ───────────────────────────────────────────────────────────────

fn assert_parse_error(result: Result<x64_codegen::ir::Module, CompileError>) {
    match result {
        Ok(_) => panic!("expected a parse error, but parsing succeeded"),
        Err(CompileError::Parse { .. }) => {}
        Err(other) => panic!("expected a parse error, got: {:?}", other),
    }
}

use x64_codegen::ir::{Instr, Value};
use x64_codegen::parse_module;

// ── Acceptance ───────────────────────────────────────────────────────────

#[test]
fn parses_minimal_function() {
    let module = parse_module("define i64 @main() {\n  ret i64 0\n}\n").expect("should parse");
    assert_eq!(module.functions.len(), 1);
    let f = &module.functions[0];
    assert_eq!(f.name, "main");
    assert!(f.param.is_none());
    assert_eq!(f.blocks.len(), 1);
    assert!(matches!(
        f.blocks[0].instrs[0],
        Instr::Ret {
            value: Some(Value::Const(0))
        }
    ));
}

#[test]
fn parses_parameter_and_counts_its_uses() {
    let module =
        parse_module("define i64 @f(i64 %x) {\n  ret i64 %x\n}\n").expect("should parse");
    let f = &module.functions[0];
    let param = f.param.expect("parameter should be recorded");
    assert_eq!(f.value_name(param), "x");
    assert!(f.has_uses(param));
}

#[test]
fn unused_parameter_has_no_uses() {
    let module =
        parse_module("define i64 @f(i64 %x) {\n  ret i64 0\n}\n").expect("should parse");
    let f = &module.functions[0];
    let param = f.param.expect("parameter should be recorded");
    assert!(!f.has_uses(param));
}

#[test]
fn parses_phi_with_forward_reference() {
    let source = r#"
; a one-block loop: the phi reads %next before its definition
define i64 @main() {
entry:
  br label %H
H:
  %i = phi i64 [ 0, %entry ], [ %next, %H ]
  %next = add i64 %i, 1
  %c = icmp slt i64 %next, 10
  br i1 %c, label %H, label %X
X:
  ret i64 %i
}
"#;
    let module = parse_module(source).expect("should parse");
    let f = &module.functions[0];
    assert_eq!(f.blocks.len(), 3);
    assert_eq!(f.blocks[1].name, "H");
    assert!(f.blocks[1].starts_with_phi());
    match &f.blocks[1].instrs[0] {
        Instr::Phi { incomings, .. } => {
            assert_eq!(incomings.len(), 2);
            assert!(matches!(incomings[0].0, Value::Const(0)));
            assert!(matches!(incomings[1].0, Value::Ref(_)));
            assert_eq!(incomings[0].1 .0, 0);
            assert_eq!(incomings[1].1 .0, 1);
        }
        other => panic!("expected a phi, got {:?}", other),
    }
}

#[test]
fn parses_negative_constants() {
    let module = parse_module("define i64 @main() {\n  ret i64 -7\n}\n").expect("should parse");
    assert!(matches!(
        module.functions[0].blocks[0].instrs[0],
        Instr::Ret {
            value: Some(Value::Const(-7))
        }
    ));
}

#[test]
fn parses_unbound_call_result() {
    let source = r#"
define i64 @f() {
  ret i64 1
}
define i64 @main() {
  call i64 @f()
  ret i64 0
}
"#;
    let module = parse_module(source).expect("should parse");
    let main = &module.functions[1];
    match &main.blocks[0].instrs[0] {
        Instr::Call {
            result,
            callee,
            arg,
        } => {
            assert_eq!(callee, "f");
            assert!(arg.is_none());
            assert!(!main.has_uses(*result));
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn skips_comments_and_finds_functions_by_name() {
    let source = r#"
; the helper
define i64 @double(i64 %x) {
  %1 = add i64 %x, %x  ; doubled
  ret i64 %1
}
; the entry point
define i64 @main() {
  %r = call i64 @double(i64 21)
  ret i64 %r
}
"#;
    let module = parse_module(source).expect("should parse");
    assert_eq!(module.functions.len(), 2);
    assert_eq!(module.function_index("double"), Some(0));
    assert_eq!(module.function_index("main"), Some(1));
    assert_eq!(module.function_index("absent"), None);
}

#[test]
fn entry_block_may_carry_a_label() {
    let module =
        parse_module("define i64 @main() {\nstart:\n  ret i64 0\n}\n").expect("should parse");
    assert_eq!(module.functions[0].blocks[0].name, "start");
}

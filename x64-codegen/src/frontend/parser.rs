//! Recursive-descent parser for the textual IR subset.
//!
//! Produces a resolved [`Module`]: every `%name` operand is resolved to a
//! [`ValueId`] and every branch or φ incoming label to a block index, with
//! forward references allowed (a φ may read a value defined further down its
//! own block). Structural rules are enforced here so the backend can assume a
//! well-formed module: every block ends in exactly one terminator, φ-nodes
//! appear only as a leading run, and all names resolve.

use super::lexer::{self, Token};
use crate::ir::{BinOp, Block, BlockRef, Function, Instr, Module, Predicate, Value, ValueId};
use crate::CompileError;
use std::collections::HashMap;
use std::ops::Range;

pub fn parse(source: &str) -> Result<Module, CompileError> {
    let tokens = lexer::tokenize(source)?;
    Parser {
        tokens,
        pos: 0,
        eof: source.len(),
        defs: Vec::new(),
    }
    .parse_module()
}

fn err_at(location: usize, message: impl Into<String>) -> CompileError {
    CompileError::Parse {
        location,
        message: message.into(),
    }
}

// ── Unresolved instruction forms ────────────────────────────────────────

/// An operand before name resolution.
enum RawValue {
    Const(i64),
    /// `%name` with the byte offset of the reference.
    Name(String, usize),
}

/// A block label reference with the byte offset of the reference.
type RawTarget = (String, usize);

enum RawInstr {
    Binary {
        op: BinOp,
        lhs: RawValue,
        rhs: RawValue,
    },
    Icmp {
        pred: Predicate,
        lhs: RawValue,
        rhs: RawValue,
    },
    Phi {
        incomings: Vec<(RawValue, RawTarget)>,
    },
    Call {
        callee: String,
        arg: Option<RawValue>,
    },
    Br {
        dest: RawTarget,
    },
    CondBr {
        cond: RawValue,
        then_dest: RawTarget,
        else_dest: RawTarget,
    },
    Ret {
        value: Option<RawValue>,
    },
}

impl RawInstr {
    fn is_terminator(&self) -> bool {
        matches!(
            self,
            RawInstr::Br { .. } | RawInstr::CondBr { .. } | RawInstr::Ret { .. }
        )
    }
}

struct RawBlock {
    name: Option<String>,
    offset: usize,
    instrs: Vec<RawInstr>,
}

// ── Parser ──────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    eof: usize,
    /// Result definitions of the current function, in program order:
    /// the name (`None` for an unbound call result) and its byte offset.
    defs: Vec<(Option<String>, usize)>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.0)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.1.start).unwrap_or(self.eof)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        err_at(self.offset(), message)
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), CompileError> {
        match self.peek() {
            Some(t) if t == expected => {
                self.advance();
                Ok(())
            }
            Some(t) => Err(self.error(format!("expected {}, found {}", what, t))),
            None => Err(self.error(format!("expected {}, found end of input", what))),
        }
    }

    fn expect_local(&mut self, what: &str) -> Result<(String, usize), CompileError> {
        match self.peek() {
            Some(Token::LocalIdent(name)) => {
                let result = (name.clone(), self.offset());
                self.advance();
                Ok(result)
            }
            _ => Err(self.error(format!("expected {}", what))),
        }
    }

    fn expect_global(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek() {
            Some(Token::GlobalIdent(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(format!("expected {}", what))),
        }
    }

    fn parse_value(&mut self) -> Result<RawValue, CompileError> {
        match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.advance();
                Ok(RawValue::Const(n))
            }
            Some(Token::LocalIdent(name)) => {
                let value = RawValue::Name(name.clone(), self.offset());
                self.advance();
                Ok(value)
            }
            _ => Err(self.error("expected a constant or %value operand")),
        }
    }

    // ── Module / function structure ─────────────────────────────────────

    fn parse_module(&mut self) -> Result<Module, CompileError> {
        let mut functions = Vec::new();
        while self.peek().is_some() {
            functions.push(self.parse_function()?);
        }
        Ok(Module { functions })
    }

    fn parse_function(&mut self) -> Result<Function, CompileError> {
        let fn_offset = self.offset();
        self.expect(&Token::Define, "'define'")?;
        self.expect(&Token::I64, "'i64'")?;
        let name = self.expect_global("a function name")?;
        self.expect(&Token::LParen, "'('")?;
        let param = match self.peek() {
            Some(Token::I64) => {
                self.advance();
                Some(self.expect_local("a parameter name")?)
            }
            _ => None,
        };
        self.expect(&Token::RParen, "')'")?;
        self.expect(&Token::LBrace, "'{'")?;

        self.defs.clear();
        let mut blocks: Vec<RawBlock> = Vec::new();
        let mut current = RawBlock {
            name: None,
            offset: self.offset(),
            instrs: Vec::new(),
        };
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(format!(
                        "unexpected end of input in the body of @{}",
                        name
                    )))
                }
                Some(Token::RBrace) => {
                    self.advance();
                    break;
                }
                Some(Token::LabelDef(label)) => {
                    let label = label.clone();
                    let offset = self.offset();
                    self.advance();
                    if current.name.is_none() && current.instrs.is_empty() && blocks.is_empty() {
                        // The entry block may carry a label.
                        current.name = Some(label);
                        current.offset = offset;
                    } else {
                        blocks.push(std::mem::replace(
                            &mut current,
                            RawBlock {
                                name: Some(label),
                                offset,
                                instrs: Vec::new(),
                            },
                        ));
                    }
                }
                _ => {
                    let instr = self.parse_instr()?;
                    current.instrs.push(instr);
                }
            }
        }
        blocks.push(current);

        let defs = std::mem::take(&mut self.defs);
        resolve_function(name, fn_offset, param, blocks, defs)
    }

    // ── Instructions ────────────────────────────────────────────────────

    fn parse_instr(&mut self) -> Result<RawInstr, CompileError> {
        match self.peek() {
            Some(Token::LocalIdent(_)) => {
                let (result, result_offset) = self.expect_local("a result name")?;
                self.expect(&Token::Assign, "'='")?;
                let op = match self.peek() {
                    Some(Token::Add) => Some(BinOp::Add),
                    Some(Token::Sub) => Some(BinOp::Sub),
                    Some(Token::Mul) => Some(BinOp::Mul),
                    Some(Token::Sdiv) => Some(BinOp::Div),
                    _ => None,
                };
                if let Some(op) = op {
                    self.advance();
                    self.expect(&Token::I64, "'i64'")?;
                    let lhs = self.parse_value()?;
                    self.expect(&Token::Comma, "','")?;
                    let rhs = self.parse_value()?;
                    self.defs.push((Some(result), result_offset));
                    return Ok(RawInstr::Binary { op, lhs, rhs });
                }
                match self.peek() {
                    Some(Token::Icmp) => {
                        self.advance();
                        let pred = self.parse_predicate()?;
                        self.expect(&Token::I64, "'i64'")?;
                        let lhs = self.parse_value()?;
                        self.expect(&Token::Comma, "','")?;
                        let rhs = self.parse_value()?;
                        self.defs.push((Some(result), result_offset));
                        Ok(RawInstr::Icmp { pred, lhs, rhs })
                    }
                    Some(Token::Phi) => {
                        self.advance();
                        self.expect(&Token::I64, "'i64'")?;
                        let mut incomings = Vec::new();
                        loop {
                            self.expect(&Token::LBracket, "'['")?;
                            let value = self.parse_value()?;
                            self.expect(&Token::Comma, "','")?;
                            let pred_block = self.expect_local("a predecessor block label")?;
                            self.expect(&Token::RBracket, "']'")?;
                            incomings.push((value, pred_block));
                            match self.peek() {
                                Some(Token::Comma) => self.advance(),
                                _ => break,
                            }
                        }
                        self.defs.push((Some(result), result_offset));
                        Ok(RawInstr::Phi { incomings })
                    }
                    Some(Token::Call) => {
                        let (callee, arg) = self.parse_call_tail()?;
                        self.defs.push((Some(result), result_offset));
                        Ok(RawInstr::Call { callee, arg })
                    }
                    _ => Err(self.error("expected an instruction opcode after '='")),
                }
            }
            Some(Token::Call) => {
                let offset = self.offset();
                let (callee, arg) = self.parse_call_tail()?;
                self.defs.push((None, offset));
                Ok(RawInstr::Call { callee, arg })
            }
            Some(Token::Br) => {
                self.advance();
                match self.peek() {
                    Some(Token::Label) => {
                        self.advance();
                        let dest = self.expect_local("a target block label")?;
                        Ok(RawInstr::Br { dest })
                    }
                    Some(Token::I1) => {
                        self.advance();
                        let cond = self.parse_value()?;
                        self.expect(&Token::Comma, "','")?;
                        self.expect(&Token::Label, "'label'")?;
                        let then_dest = self.expect_local("a target block label")?;
                        self.expect(&Token::Comma, "','")?;
                        self.expect(&Token::Label, "'label'")?;
                        let else_dest = self.expect_local("a target block label")?;
                        Ok(RawInstr::CondBr {
                            cond,
                            then_dest,
                            else_dest,
                        })
                    }
                    _ => Err(self.error("expected 'label' or 'i1' after 'br'")),
                }
            }
            Some(Token::Ret) => {
                self.advance();
                match self.peek() {
                    Some(Token::Void) => {
                        self.advance();
                        Ok(RawInstr::Ret { value: None })
                    }
                    Some(Token::I64) => {
                        self.advance();
                        let value = self.parse_value()?;
                        Ok(RawInstr::Ret { value: Some(value) })
                    }
                    _ => Err(self.error("expected 'i64' or 'void' after 'ret'")),
                }
            }
            Some(t) => Err(self.error(format!("expected an instruction, found {}", t))),
            None => Err(self.error("expected an instruction, found end of input")),
        }
    }

    fn parse_predicate(&mut self) -> Result<Predicate, CompileError> {
        let pred = match self.peek() {
            Some(Token::Ident(word)) => Predicate::from_ir_name(word)
                .ok_or_else(|| self.error(format!("unknown comparison predicate '{}'", word)))?,
            _ => return Err(self.error("expected a comparison predicate")),
        };
        self.advance();
        Ok(pred)
    }

    /// Parse `call i64 @f(...)`, with the `call` token still unconsumed.
    fn parse_call_tail(&mut self) -> Result<(String, Option<RawValue>), CompileError> {
        self.expect(&Token::Call, "'call'")?;
        self.expect(&Token::I64, "'i64'")?;
        let callee = self.expect_global("a function name")?;
        self.expect(&Token::LParen, "'('")?;
        let arg = match self.peek() {
            Some(Token::I64) => {
                self.advance();
                Some(self.parse_value()?)
            }
            _ => None,
        };
        self.expect(&Token::RParen, "')'")?;
        Ok((callee, arg))
    }
}

// ── Resolution ──────────────────────────────────────────────────────────

fn resolve_function(
    name: String,
    fn_offset: usize,
    param: Option<(String, usize)>,
    raw_blocks: Vec<RawBlock>,
    defs: Vec<(Option<String>, usize)>,
) -> Result<Function, CompileError> {
    if raw_blocks.len() == 1 && raw_blocks[0].name.is_none() && raw_blocks[0].instrs.is_empty() {
        return Err(err_at(
            fn_offset,
            format!("function @{} has no basic blocks", name),
        ));
    }

    // Block names. Only the first block may be unlabelled.
    let mut block_index: HashMap<String, usize> = HashMap::new();
    for (i, b) in raw_blocks.iter().enumerate() {
        let block_name = b.name.clone().unwrap_or_else(|| "entry".to_string());
        if block_index.insert(block_name.clone(), i).is_some() {
            return Err(err_at(
                b.offset,
                format!("duplicate block label '{}'", block_name),
            ));
        }
    }

    // Define all values up front so operands can reference forward.
    let mut value_names: Vec<String> = Vec::new();
    let mut value_index: HashMap<String, ValueId> = HashMap::new();
    let mut param_id = None;
    if let Some((p, offset)) = &param {
        param_id = Some(define_value(
            &mut value_names,
            &mut value_index,
            Some(p),
            *offset,
        )?);
    }
    let mut def_ids = Vec::with_capacity(defs.len());
    for (def_name, offset) in &defs {
        def_ids.push(define_value(
            &mut value_names,
            &mut value_index,
            def_name.as_deref(),
            *offset,
        )?);
    }

    let resolve_value = |rv: &RawValue| -> Result<Value, CompileError> {
        match rv {
            RawValue::Const(n) => Ok(Value::Const(*n)),
            RawValue::Name(n, offset) => value_index
                .get(n)
                .map(|id| Value::Ref(*id))
                .ok_or_else(|| err_at(*offset, format!("use of undefined value %{}", n))),
        }
    };
    let resolve_block = |(n, offset): &RawTarget| -> Result<BlockRef, CompileError> {
        block_index
            .get(n.as_str())
            .map(|i| BlockRef(*i))
            .ok_or_else(|| err_at(*offset, format!("reference to undefined block %{}", n)))
    };

    // Structural checks and conversion.
    let mut blocks = Vec::with_capacity(raw_blocks.len());
    let mut next_def = 0;
    for b in &raw_blocks {
        let block_name = b.name.clone().unwrap_or_else(|| "entry".to_string());
        match b.instrs.last() {
            Some(last) if last.is_terminator() => {}
            _ => {
                return Err(err_at(
                    b.offset,
                    format!("block '{}' does not end with a terminator", block_name),
                ))
            }
        }

        let mut instrs = Vec::with_capacity(b.instrs.len());
        let mut in_leading_phis = true;
        for (ii, ri) in b.instrs.iter().enumerate() {
            if ri.is_terminator() && ii + 1 != b.instrs.len() {
                return Err(err_at(
                    b.offset,
                    format!("block '{}' has instructions after its terminator", block_name),
                ));
            }
            if !matches!(ri, RawInstr::Phi { .. }) {
                in_leading_phis = false;
            }
            let instr = match ri {
                RawInstr::Binary { op, lhs, rhs } => {
                    let result = def_ids[next_def];
                    next_def += 1;
                    Instr::Binary {
                        result,
                        op: *op,
                        lhs: resolve_value(lhs)?,
                        rhs: resolve_value(rhs)?,
                    }
                }
                RawInstr::Icmp { pred, lhs, rhs } => {
                    let result = def_ids[next_def];
                    next_def += 1;
                    Instr::Icmp {
                        result,
                        pred: *pred,
                        lhs: resolve_value(lhs)?,
                        rhs: resolve_value(rhs)?,
                    }
                }
                RawInstr::Phi { incomings } => {
                    if !in_leading_phis {
                        return Err(err_at(
                            b.offset,
                            format!(
                                "phi after a non-phi instruction in block '{}'",
                                block_name
                            ),
                        ));
                    }
                    let result = def_ids[next_def];
                    next_def += 1;
                    let mut resolved = Vec::with_capacity(incomings.len());
                    for (v, target) in incomings {
                        resolved.push((resolve_value(v)?, resolve_block(target)?));
                    }
                    Instr::Phi {
                        result,
                        incomings: resolved,
                    }
                }
                RawInstr::Call { callee, arg } => {
                    let result = def_ids[next_def];
                    next_def += 1;
                    Instr::Call {
                        result,
                        callee: callee.clone(),
                        arg: arg.as_ref().map(|a| resolve_value(a)).transpose()?,
                    }
                }
                RawInstr::Br { dest } => Instr::Br {
                    dest: resolve_block(dest)?,
                },
                RawInstr::CondBr {
                    cond,
                    then_dest,
                    else_dest,
                } => Instr::CondBr {
                    cond: resolve_value(cond)?,
                    then_dest: resolve_block(then_dest)?,
                    else_dest: resolve_block(else_dest)?,
                },
                RawInstr::Ret { value } => Instr::Ret {
                    value: value.as_ref().map(|v| resolve_value(v)).transpose()?,
                },
            };
            instrs.push(instr);
        }
        blocks.push(Block {
            name: block_name,
            instrs,
        });
    }

    Ok(Function::new(name, param_id, blocks, value_names))
}

fn define_value(
    value_names: &mut Vec<String>,
    value_index: &mut HashMap<String, ValueId>,
    name: Option<&str>,
    offset: usize,
) -> Result<ValueId, CompileError> {
    let id = ValueId(value_names.len() as u32);
    match name {
        Some(n) => {
            if value_index.contains_key(n) {
                return Err(err_at(offset, format!("multiple definitions of %{}", n)));
            }
            value_index.insert(n.to_string(), id);
            value_names.push(n.to_string());
        }
        // An unbound call result is not referenceable; give it a
        // positional name for diagnostics only.
        None => value_names.push(format!("{}", id.0)),
    }
    Ok(id)
}

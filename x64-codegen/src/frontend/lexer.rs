use crate::CompileError;
use logos::Logos;
use std::fmt;
use std::ops::Range;

#[derive(Logos, Debug, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n]+")] // Whitespace
#[logos(skip r";[^\n]*")] // Line comments starting with ';'
pub enum Token {
    // --- Keywords ---
    #[token("define")]
    Define,
    #[token("i64")]
    I64,
    #[token("i1")]
    I1,
    #[token("void")]
    Void,
    #[token("label")]
    Label,

    // opcodes
    #[token("add")]
    Add,
    #[token("sub")]
    Sub,
    #[token("mul")]
    Mul,
    #[token("sdiv")]
    Sdiv,
    #[token("icmp")]
    Icmp,
    #[token("phi")]
    Phi,
    #[token("call")]
    Call,
    #[token("br")]
    Br,
    #[token("ret")]
    Ret,

    // --- Identifiers and Numbers ---
    #[regex(r"@[-a-zA-Z$._][-a-zA-Z$._0-9]*", |lex| lex.slice()[1..].to_string())]
    GlobalIdent(String),

    #[regex(r"%[-a-zA-Z$._0-9]+", |lex| lex.slice()[1..].to_string())]
    LocalIdent(String),

    #[regex(r"[-a-zA-Z$._0-9]+:", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].to_string()
    })]
    LabelDef(String),

    /// Bare words, used for comparison predicates.
    #[regex(r"[a-zA-Z$._][-a-zA-Z$._0-9]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse().ok())]
    Number(i64),

    // --- Punctuation ---
    #[token("=")]
    Assign,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Define => write!(f, "define"),
            Token::I64 => write!(f, "i64"),
            Token::I1 => write!(f, "i1"),
            Token::Void => write!(f, "void"),
            Token::Label => write!(f, "label"),
            Token::Add => write!(f, "add"),
            Token::Sub => write!(f, "sub"),
            Token::Mul => write!(f, "mul"),
            Token::Sdiv => write!(f, "sdiv"),
            Token::Icmp => write!(f, "icmp"),
            Token::Phi => write!(f, "phi"),
            Token::Call => write!(f, "call"),
            Token::Br => write!(f, "br"),
            Token::Ret => write!(f, "ret"),
            Token::GlobalIdent(s) => write!(f, "@{}", s),
            Token::LocalIdent(s) => write!(f, "%{}", s),
            Token::LabelDef(s) => write!(f, "{}:", s),
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Assign => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
        }
    }
}

/// Tokenize a whole source file, keeping byte spans for error reporting.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, CompileError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(CompileError::Lexical {
                    location: lexer.span().start,
                })
            }
        }
    }
    Ok(tokens)
}

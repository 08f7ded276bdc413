// src/frontend/token.rs

use crate::diag::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    // Keywords
    Module,
    Where,
    Import,
    Data,
    Type,
    Class,
    Instance,
    Deriving,
    Let,
    In,
    If,
    Then,
    Else,
    // Names and literals
    LowerId,
    UpperId,
    IntLit,
    StrLit,
    BoolLit,
    // Punctuation
    DblColon,
    Arrow,
    Backslash,
    Equals,
    Bar,
    Comma,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Concat,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokKind,
    pub text: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokKind, text: impl Into<String>, pos: Position) -> Token {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }
}

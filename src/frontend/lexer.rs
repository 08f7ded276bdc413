// src/frontend/lexer.rs
//! Tokenizer for Fern source text.
//!
//! The pass entry point reads the file named by `options.source` ("-" reads
//! stdin) and leaves the token stream on the compiler state.

use std::fs;
use std::io::Read;

use crate::diag::Position;
use crate::global::Global;

use super::token::{TokKind, Token};

/// The `lexer` pass.
pub fn run(global: &mut Global) -> (&'static str, usize) {
    let source = global.options.source.clone();
    let text = if source == "-" {
        let mut buf = String::new();
        match std::io::stdin().read_to_string(&mut buf) {
            Ok(_) => buf,
            Err(err) => {
                global.error(None, format!("could not read stdin: {err}"));
                return ("tokens", 0);
            }
        }
    } else {
        match fs::read_to_string(&source) {
            Ok(text) => text,
            Err(err) => {
                global.error(None, format!("could not read '{source}': {err}"));
                return ("tokens", 0);
            }
        }
    };

    let (tokens, errors) = tokenize(&text);
    for (pos, text) in errors {
        global.error(Some(pos), text);
    }
    let count = tokens.len();
    global.sub.tokens = tokens;
    ("tokens", count)
}

/// Tokenize `text`, collecting lexical errors instead of failing fast.
pub fn tokenize(text: &str) -> (Vec<Token>, Vec<(Position, String)>) {
    Lexer::new(text).finish()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
    errors: Vec<(Position, String)>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer {
            chars: text.chars().peekable(),
            line: 1,
            col: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn finish(mut self) -> (Vec<Token>, Vec<(Position, String)>) {
        while let Some(&c) = self.chars.peek() {
            let pos = Position::new(self.line, self.col);
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                '-' => {
                    self.bump();
                    match self.chars.peek() {
                        Some('-') => self.skip_line_comment(),
                        Some('>') => {
                            self.bump();
                            self.push(TokKind::Arrow, "->", pos);
                        }
                        _ => self.push(TokKind::Minus, "-", pos),
                    }
                }
                '"' => self.lex_string(pos),
                c if c.is_ascii_digit() => self.lex_number(pos),
                c if c.is_ascii_alphabetic() || c == '_' => self.lex_word(pos),
                _ => self.lex_operator(pos),
            }
        }
        (self.tokens, self.errors)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.col = 1;
            }
            Some(_) => self.col += 1,
            None => {}
        }
        c
    }

    fn push(&mut self, kind: TokKind, text: impl Into<String>, pos: Position) {
        self.tokens.push(Token::new(kind, text, pos));
    }

    fn skip_line_comment(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_string(&mut self, pos: Position) {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    self.errors.push((pos, "unterminated string literal".to_string()));
                    return;
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(other) => {
                        self.errors
                            .push((pos, format!("unknown escape '\\{other}' in string literal")));
                    }
                    None => {
                        self.errors.push((pos, "unterminated string literal".to_string()));
                        return;
                    }
                },
                Some(c) => value.push(c),
            }
        }
        self.push(TokKind::StrLit, value, pos);
    }

    fn lex_number(&mut self, pos: Position) {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokKind::IntLit, text, pos);
    }

    fn lex_word(&mut self, pos: Position) {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '\'' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = match text.as_str() {
            "module" => TokKind::Module,
            "where" => TokKind::Where,
            "import" => TokKind::Import,
            "data" => TokKind::Data,
            "type" => TokKind::Type,
            "class" => TokKind::Class,
            "instance" => TokKind::Instance,
            "deriving" => TokKind::Deriving,
            "let" => TokKind::Let,
            "in" => TokKind::In,
            "if" => TokKind::If,
            "then" => TokKind::Then,
            "else" => TokKind::Else,
            "true" | "false" => TokKind::BoolLit,
            _ if text.starts_with(|c: char| c.is_ascii_uppercase()) => TokKind::UpperId,
            _ => TokKind::LowerId,
        };
        self.push(kind, text, pos);
    }

    fn lex_operator(&mut self, pos: Position) {
        let c = self.bump().expect("caller peeked a char");
        let two = |lexer: &mut Lexer<'a>, next: char, yes: TokKind, yes_text: &str, no: TokKind, no_text: &str| {
            if lexer.chars.peek() == Some(&next) {
                lexer.bump();
                lexer.push(yes, yes_text, pos);
            } else {
                lexer.push(no, no_text, pos);
            }
        };
        match c {
            ':' => {
                if self.chars.peek() == Some(&':') {
                    self.bump();
                    self.push(TokKind::DblColon, "::", pos);
                } else {
                    self.errors.push((pos, "unexpected character ':'".to_string()));
                }
            }
            '=' => two(self, '=', TokKind::EqEq, "==", TokKind::Equals, "="),
            '<' => two(self, '=', TokKind::Le, "<=", TokKind::Lt, "<"),
            '>' => two(self, '=', TokKind::Ge, ">=", TokKind::Gt, ">"),
            '+' => two(self, '+', TokKind::Concat, "++", TokKind::Plus, "+"),
            '/' => two(self, '=', TokKind::NotEq, "/=", TokKind::Slash, "/"),
            '*' => self.push(TokKind::Star, "*", pos),
            '\\' => self.push(TokKind::Backslash, "\\", pos),
            '|' => two(self, '|', TokKind::OrOr, "||", TokKind::Bar, "|"),
            '&' => {
                if self.chars.peek() == Some(&'&') {
                    self.bump();
                    self.push(TokKind::AndAnd, "&&", pos);
                } else {
                    self.errors.push((pos, "unexpected character '&'".to_string()));
                }
            }
            ',' => self.push(TokKind::Comma, ",", pos),
            '.' => self.push(TokKind::Dot, ".", pos),
            '(' => self.push(TokKind::LParen, "(", pos),
            ')' => self.push(TokKind::RParen, ")", pos),
            '{' => self.push(TokKind::LBrace, "{", pos),
            '}' => self.push(TokKind::RBrace, "}", pos),
            other => self
                .errors
                .push((pos, format!("unexpected character '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokKind> {
        let (tokens, errors) = tokenize(text);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_module_header() {
        assert_eq!(
            kinds("module demo.Hello where"),
            vec![
                TokKind::Module,
                TokKind::LowerId,
                TokKind::Dot,
                TokKind::UpperId,
                TokKind::Where
            ]
        );
    }

    #[test]
    fn lexes_operators_and_literals() {
        assert_eq!(
            kinds("x = 1 + 2 * 3 ++ \"hi\""),
            vec![
                TokKind::LowerId,
                TokKind::Equals,
                TokKind::IntLit,
                TokKind::Plus,
                TokKind::IntLit,
                TokKind::Star,
                TokKind::IntLit,
                TokKind::Concat,
                TokKind::StrLit
            ]
        );
    }

    #[test]
    fn distinguishes_arrow_from_minus() {
        assert_eq!(
            kinds("a -> b - c"),
            vec![
                TokKind::LowerId,
                TokKind::Arrow,
                TokKind::LowerId,
                TokKind::Minus,
                TokKind::LowerId
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("a -- the rest is ignored\nb"),
            vec![TokKind::LowerId, TokKind::LowerId]
        );
    }

    #[test]
    fn positions_are_one_indexed() {
        let (tokens, _) = tokenize("ab\n  cd");
        assert_eq!(tokens[0].pos, Position::new(1, 1));
        assert_eq!(tokens[1].pos, Position::new(2, 3));
    }

    #[test]
    fn string_escapes() {
        let (tokens, errors) = tokenize(r#""a\nb\"c""#);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].text, "a\nb\"c");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_, errors) = tokenize("\"oops\nx = 1");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("unterminated"));
    }

    #[test]
    fn keywords_and_bools() {
        assert_eq!(
            kinds("if true then 1 else 0"),
            vec![
                TokKind::If,
                TokKind::BoolLit,
                TokKind::Then,
                TokKind::IntLit,
                TokKind::Else,
                TokKind::IntLit
            ]
        );
    }
}

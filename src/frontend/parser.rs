// src/frontend/parser.rs
//! Recursive-descent parser for Fern modules.
//!
//! Layout handling is deliberately simple: a top-level definition starts at
//! column 1 and owns every following token with a larger column; `class` and
//! `instance` bodies are split the same way at the column of their first
//! member token.

use crate::diag::Position;
use crate::global::Global;
use crate::pack::PackName;

use super::ast::*;
use super::token::{TokKind, Token};

/// The `parser` pass. Consumes the token stream on the state and leaves the
/// module identity, imports, and definitions behind.
pub fn run(global: &mut Global) -> (&'static str, usize) {
    let tokens = std::mem::take(&mut global.sub.tokens);
    let mut parser = Parser::new(&tokens);
    let parsed = parser.parse_module();
    let errors = std::mem::take(&mut parser.errors);
    for (pos, text) in errors {
        global.error(Some(pos), text);
    }
    if let Some(module) = parsed {
        global.sub.this_pack = Some(module.pack);
        global.sub.imports = module.imports;
        global.sub.defs = module.defs;
    }
    global.sub.tokens = tokens;
    ("definitions", global.sub.defs.len())
}

pub struct ParsedModule {
    pub pack: PackName,
    pub imports: Vec<Import>,
    pub defs: Vec<Def>,
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    at: usize,
    pub errors: Vec<(Position, String)>,
}

type PResult<T> = Result<T, ()>;

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            at: 0,
            errors: Vec::new(),
        }
    }

    // ---- module structure ------------------------------------------------

    pub fn parse_module(&mut self) -> Option<ParsedModule> {
        if self.tokens.is_empty() {
            self.errors
                .push((Position::new(1, 1), "empty input, expected a module header".to_string()));
            return None;
        }
        let pack = match self.parse_header() {
            Ok(pack) => pack,
            Err(()) => return None,
        };

        let mut imports = Vec::new();
        let mut defs = Vec::new();
        for chunk in split_chunks(&self.tokens[self.at..], 1) {
            let mut sub = Parser::new(chunk);
            if chunk[0].kind == TokKind::Import {
                match sub.parse_import() {
                    Ok(import) => imports.push(import),
                    Err(()) => {}
                }
            } else {
                match sub.parse_def() {
                    Ok(def) => defs.push(def),
                    Err(()) => {}
                }
            }
            self.errors.append(&mut sub.errors);
        }
        Some(ParsedModule {
            pack,
            imports,
            defs,
        })
    }

    fn parse_header(&mut self) -> PResult<PackName> {
        self.expect(TokKind::Module, "module")?;
        let segments = self.parse_dotted()?;
        self.expect(TokKind::Where, "where")?;
        Ok(PackName::from_segments(&segments))
    }

    fn parse_import(&mut self) -> PResult<Import> {
        let pos = self.peek_pos();
        self.expect(TokKind::Import, "import")?;
        let segments = self.parse_dotted()?;
        self.expect_end();
        Ok(Import {
            pack: PackName::from_segments(&segments),
            pos,
        })
    }

    /// A dotted name: identifier segments separated by `.`.
    fn parse_dotted(&mut self) -> PResult<Vec<String>> {
        let mut segments = vec![self.expect_ident()?];
        while self.eat(TokKind::Dot) {
            segments.push(self.expect_ident()?);
        }
        Ok(segments)
    }

    // ---- definitions -----------------------------------------------------

    fn parse_def(&mut self) -> PResult<Def> {
        match self.peek_kind() {
            Some(TokKind::Data) => self.parse_data().map(Def::Data),
            Some(TokKind::Type) => self.parse_alias().map(Def::Alias),
            Some(TokKind::Class) => self.parse_class().map(Def::Class),
            Some(TokKind::Instance) => self.parse_instance().map(Def::Instance),
            Some(TokKind::LowerId) => {
                if self.peek_kind_at(1) == Some(TokKind::DblColon) {
                    self.parse_sig().map(Def::Sig)
                } else {
                    self.parse_fun().map(Def::Fun)
                }
            }
            _ => {
                let pos = self.peek_pos();
                self.error(pos, "expected a definition");
                Err(())
            }
        }
    }

    fn parse_data(&mut self) -> PResult<DataDef> {
        let pos = self.peek_pos();
        self.expect(TokKind::Data, "data")?;
        let name = self.expect_upper()?;
        self.expect(TokKind::Equals, "=")?;
        let mut ctors = vec![self.parse_ctor()?];
        while self.eat(TokKind::Bar) {
            ctors.push(self.parse_ctor()?);
        }
        let mut deriving = Vec::new();
        if self.eat(TokKind::Deriving) {
            self.expect(TokKind::LParen, "(")?;
            loop {
                let cpos = self.peek_pos();
                deriving.push((self.expect_upper()?, cpos));
                if !self.eat(TokKind::Comma) {
                    break;
                }
            }
            self.expect(TokKind::RParen, ")")?;
        }
        self.expect_end();
        Ok(DataDef {
            name,
            pos,
            ctors,
            deriving,
        })
    }

    fn parse_ctor(&mut self) -> PResult<CtorDef> {
        let pos = self.peek_pos();
        let name = self.expect_upper()?;
        let mut fields = Vec::new();
        if self.eat(TokKind::LBrace) {
            loop {
                let fpos = self.peek_pos();
                let fname = self.expect_lower()?;
                self.expect(TokKind::DblColon, "::")?;
                let ty = self.parse_type_atom()?;
                fields.push(FieldDef {
                    name: Some(fname),
                    pos: fpos,
                    ty,
                });
                if !self.eat(TokKind::Comma) {
                    break;
                }
            }
            self.expect(TokKind::RBrace, "}")?;
        } else {
            while matches!(
                self.peek_kind(),
                Some(TokKind::UpperId) | Some(TokKind::LowerId) | Some(TokKind::LParen)
            ) {
                let fpos = self.peek_pos();
                let ty = self.parse_type_atom()?;
                fields.push(FieldDef {
                    name: None,
                    pos: fpos,
                    ty,
                });
            }
        }
        Ok(CtorDef { name, pos, fields })
    }

    fn parse_alias(&mut self) -> PResult<AliasDef> {
        let pos = self.peek_pos();
        self.expect(TokKind::Type, "type")?;
        let name = self.expect_upper()?;
        self.expect(TokKind::Equals, "=")?;
        let ty = self.parse_type()?;
        self.expect_end();
        Ok(AliasDef { name, pos, ty })
    }

    fn parse_class(&mut self) -> PResult<ClassDef> {
        let pos = self.peek_pos();
        self.expect(TokKind::Class, "class")?;
        let name = self.expect_upper()?;
        let var = self.expect_lower()?;
        self.expect(TokKind::Where, "where")?;
        let mut methods = Vec::new();
        for chunk in self.body_chunks() {
            let mut sub = Parser::new(chunk);
            if let Ok(sig) = sub.parse_sig() {
                methods.push(sig);
            }
            self.errors.append(&mut sub.errors);
        }
        self.at = self.tokens.len();
        Ok(ClassDef {
            name,
            pos,
            var,
            methods,
        })
    }

    fn parse_instance(&mut self) -> PResult<InstanceDef> {
        let pos = self.peek_pos();
        self.expect(TokKind::Instance, "instance")?;
        let class = self.expect_upper()?;
        let ty = self.expect_upper()?;
        self.expect(TokKind::Where, "where")?;
        let mut methods = Vec::new();
        for chunk in self.body_chunks() {
            let mut sub = Parser::new(chunk);
            if let Ok(fun) = sub.parse_fun() {
                methods.push(fun);
            }
            self.errors.append(&mut sub.errors);
        }
        self.at = self.tokens.len();
        Ok(InstanceDef {
            class,
            pos,
            ty,
            methods,
        })
    }

    fn parse_sig(&mut self) -> PResult<SigDef> {
        let pos = self.peek_pos();
        let name = self.expect_lower()?;
        self.expect(TokKind::DblColon, "::")?;
        let ty = self.parse_type()?;
        self.expect_end();
        Ok(SigDef { name, pos, ty })
    }

    fn parse_fun(&mut self) -> PResult<FunDef> {
        let pos = self.peek_pos();
        let name = self.expect_lower()?;
        let mut params = Vec::new();
        while self.peek_kind() == Some(TokKind::LowerId) {
            params.push(self.expect_lower()?);
        }
        self.expect(TokKind::Equals, "=")?;
        let body = self.parse_expr()?;
        self.expect_end();
        Ok(FunDef {
            name,
            pos,
            params,
            body,
            sig: None,
        })
    }

    /// Member chunks of a `where` body: the remaining tokens split at the
    /// column of the first member token.
    fn body_chunks(&self) -> Vec<&'a [Token]> {
        let rest = &self.tokens[self.at..];
        match rest.first() {
            Some(first) => split_chunks(rest, first.pos.col),
            None => Vec::new(),
        }
    }

    // ---- types -----------------------------------------------------------

    fn parse_type(&mut self) -> PResult<TypeRef> {
        let lhs = self.parse_type_atom()?;
        if self.eat(TokKind::Arrow) {
            let rhs = self.parse_type()?;
            Ok(TypeRef::Fun(Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn parse_type_atom(&mut self) -> PResult<TypeRef> {
        let pos = self.peek_pos();
        match self.peek_kind() {
            Some(TokKind::UpperId) => {
                let name = self.expect_upper()?;
                Ok(TypeRef::Named { name, pos })
            }
            Some(TokKind::LowerId) => {
                let name = self.expect_lower()?;
                Ok(TypeRef::Var { name, pos })
            }
            Some(TokKind::LParen) => {
                self.eat(TokKind::LParen);
                let ty = self.parse_type()?;
                self.expect(TokKind::RParen, ")")?;
                Ok(ty)
            }
            _ => {
                self.error(pos, "expected a type");
                Err(())
            }
        }
    }

    // ---- expressions -----------------------------------------------------

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.peek_kind() == Some(TokKind::OrOr) {
            let pos = self.peek_pos();
            self.at += 1;
            let rhs = self.parse_and()?;
            lhs = bin(BinOp::Or, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_cmp()?;
        while self.peek_kind() == Some(TokKind::AndAnd) {
            let pos = self.peek_pos();
            self.at += 1;
            let rhs = self.parse_cmp()?;
            lhs = bin(BinOp::And, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> PResult<Expr> {
        let lhs = self.parse_concat()?;
        let op = match self.peek_kind() {
            Some(TokKind::EqEq) => BinOp::Eq,
            Some(TokKind::NotEq) => BinOp::Ne,
            Some(TokKind::Lt) => BinOp::Lt,
            Some(TokKind::Le) => BinOp::Le,
            Some(TokKind::Gt) => BinOp::Gt,
            Some(TokKind::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        let pos = self.peek_pos();
        self.at += 1;
        let rhs = self.parse_concat()?;
        Ok(bin(op, lhs, rhs, pos))
    }

    fn parse_concat(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_add()?;
        while self.peek_kind() == Some(TokKind::Concat) {
            let pos = self.peek_pos();
            self.at += 1;
            let rhs = self.parse_add()?;
            lhs = bin(BinOp::Concat, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokKind::Plus) => BinOp::Add,
                Some(TokKind::Minus) => BinOp::Sub,
                _ => break,
            };
            let pos = self.peek_pos();
            self.at += 1;
            let rhs = self.parse_mul()?;
            lhs = bin(op, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_app()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokKind::Star) => BinOp::Mul,
                Some(TokKind::Slash) => BinOp::Div,
                _ => break,
            };
            let pos = self.peek_pos();
            self.at += 1;
            let rhs = self.parse_app()?;
            lhs = bin(op, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_app(&mut self) -> PResult<Expr> {
        let f = self.parse_atom()?;
        let mut args = Vec::new();
        while self.at_atom_start() {
            args.push(self.parse_atom()?);
        }
        if args.is_empty() {
            Ok(f)
        } else {
            Ok(Expr::App {
                f: Box::new(f),
                args,
            })
        }
    }

    fn at_atom_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokKind::IntLit
                    | TokKind::StrLit
                    | TokKind::BoolLit
                    | TokKind::LowerId
                    | TokKind::UpperId
                    | TokKind::LParen
            )
        )
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let pos = self.peek_pos();
        match self.peek_kind() {
            Some(TokKind::IntLit) => {
                let Some(tok) = self.bump() else { return Err(()) };
                match tok.text.parse::<i64>() {
                    Ok(value) => Ok(Expr::Int(value, pos)),
                    Err(_) => {
                        let text = tok.text.clone();
                        self.error(pos, format!("integer literal '{text}' out of range"));
                        Err(())
                    }
                }
            }
            Some(TokKind::StrLit) => {
                let Some(tok) = self.bump() else { return Err(()) };
                Ok(Expr::Str(tok.text.clone(), pos))
            }
            Some(TokKind::BoolLit) => {
                let Some(tok) = self.bump() else { return Err(()) };
                Ok(Expr::Bool(tok.text == "true", pos))
            }
            Some(TokKind::Minus) => {
                // Negative literal in atom position.
                self.at += 1;
                let tok_pos = self.peek_pos();
                match self.peek_kind() {
                    Some(TokKind::IntLit) => {
                        let Some(tok) = self.bump() else { return Err(()) };
                        match tok.text.parse::<i64>() {
                            Ok(value) => Ok(Expr::Int(-value, pos)),
                            Err(_) => {
                                self.error(tok_pos, "integer literal out of range");
                                Err(())
                            }
                        }
                    }
                    _ => {
                        self.error(pos, "expected an integer after unary '-'");
                        Err(())
                    }
                }
            }
            Some(TokKind::LowerId) | Some(TokKind::UpperId) => self.parse_name(pos),
            Some(TokKind::LParen) => {
                self.at += 1;
                let expr = self.parse_expr()?;
                self.expect(TokKind::RParen, ")")?;
                Ok(expr)
            }
            Some(TokKind::If) => {
                self.at += 1;
                let cond = self.parse_expr()?;
                self.expect(TokKind::Then, "then")?;
                let then = self.parse_expr()?;
                self.expect(TokKind::Else, "else")?;
                let els = self.parse_expr()?;
                Ok(Expr::If {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    els: Box::new(els),
                    pos,
                })
            }
            Some(TokKind::Let) => {
                self.at += 1;
                let name = self.expect_lower()?;
                self.expect(TokKind::Equals, "=")?;
                let value = self.parse_expr()?;
                self.expect(TokKind::In, "in")?;
                let body = self.parse_expr()?;
                Ok(Expr::Let {
                    name,
                    value: Box::new(value),
                    body: Box::new(body),
                    pos,
                })
            }
            Some(TokKind::Backslash) => {
                self.at += 1;
                let mut params = vec![self.expect_lower()?];
                while self.peek_kind() == Some(TokKind::LowerId) {
                    params.push(self.expect_lower()?);
                }
                self.expect(TokKind::Arrow, "->")?;
                let body = self.parse_expr()?;
                Ok(Expr::Lam {
                    params,
                    body: Box::new(body),
                    pos,
                })
            }
            _ => {
                self.error(pos, "expected an expression");
                Err(())
            }
        }
    }

    /// A possibly-qualified name: `x`, `Point`, `Util.helper`,
    /// `demo.util.Strings.repeat`.
    fn parse_name(&mut self, pos: Position) -> PResult<Expr> {
        let mut segments = vec![self.expect_ident()?];
        while self.peek_kind() == Some(TokKind::Dot)
            && matches!(
                self.peek_kind_at(1),
                Some(TokKind::LowerId) | Some(TokKind::UpperId)
            )
        {
            self.at += 1;
            segments.push(self.expect_ident()?);
        }
        let Some(name) = segments.pop() else { return Err(()) };
        let qual = if segments.is_empty() {
            None
        } else {
            Some(segments.join("."))
        };
        Ok(Expr::Var { name, qual, pos })
    }

    // ---- token helpers ---------------------------------------------------

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.at)
    }

    fn peek_kind(&self) -> Option<TokKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokKind> {
        self.tokens.get(self.at + offset).map(|t| t.kind)
    }

    fn peek_pos(&self) -> Position {
        match self.peek() {
            Some(tok) => tok.pos,
            None => self
                .tokens
                .last()
                .map(|t| t.pos)
                .unwrap_or(Position::new(1, 1)),
        }
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.at);
        if tok.is_some() {
            self.at += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.at += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokKind, what: &str) -> PResult<&'a Token> {
        let pos = self.peek_pos();
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.at += 1;
                Ok(tok)
            }
            Some(tok) => {
                let found = tok.text.clone();
                self.error(pos, format!("expected '{what}', found '{found}'"));
                Err(())
            }
            None => {
                self.error(pos, format!("expected '{what}', found end of input"));
                Err(())
            }
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        let pos = self.peek_pos();
        match self.peek() {
            Some(tok) if matches!(tok.kind, TokKind::LowerId | TokKind::UpperId) => {
                self.at += 1;
                Ok(tok.text.clone())
            }
            _ => {
                self.error(pos, "expected an identifier");
                Err(())
            }
        }
    }

    fn expect_lower(&mut self) -> PResult<String> {
        let pos = self.peek_pos();
        match self.peek() {
            Some(tok) if tok.kind == TokKind::LowerId => {
                self.at += 1;
                Ok(tok.text.clone())
            }
            _ => {
                self.error(pos, "expected a lowercase identifier");
                Err(())
            }
        }
    }

    fn expect_upper(&mut self) -> PResult<String> {
        let pos = self.peek_pos();
        match self.peek() {
            Some(tok) if tok.kind == TokKind::UpperId => {
                self.at += 1;
                Ok(tok.text.clone())
            }
            _ => {
                self.error(pos, "expected an uppercase identifier");
                Err(())
            }
        }
    }

    /// A chunk must be fully consumed; anything left over is a parse error.
    fn expect_end(&mut self) {
        if let Some(tok) = self.peek() {
            let text = tok.text.clone();
            let pos = tok.pos;
            self.error(pos, format!("unexpected '{text}'"));
            self.at = self.tokens.len();
        }
    }

    fn error(&mut self, pos: Position, text: impl Into<String>) {
        self.errors.push((pos, text.into()));
    }
}

fn bin(op: BinOp, lhs: Expr, rhs: Expr, pos: Position) -> Expr {
    Expr::Bin {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos,
    }
}

/// Split `tokens` into chunks, each starting at a token in `start_col` and
/// owning every following token with a larger column.
fn split_chunks(tokens: &[Token], start_col: u32) -> Vec<&[Token]> {
    let mut chunks = Vec::new();
    let mut begin = None;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.pos.col <= start_col {
            if let Some(b) = begin {
                chunks.push(&tokens[b..i]);
            }
            begin = Some(i);
        }
    }
    if let Some(b) = begin {
        chunks.push(&tokens[b..]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;

    fn parse(text: &str) -> (Option<ParsedModule>, Vec<(Position, String)>) {
        let (tokens, lex_errors) = tokenize(text);
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        let mut parser = Parser::new(&tokens);
        let module = parser.parse_module();
        (module, parser.errors)
    }

    fn parse_ok(text: &str) -> ParsedModule {
        let (module, errors) = parse(text);
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        module.expect("module should parse")
    }

    #[test]
    fn parses_header_and_imports() {
        let m = parse_ok(
            "module demo.Hello where\n\
             import demo.Util\n\
             import base.Strings\n",
        );
        assert_eq!(m.pack.as_str(), "demo.Hello");
        assert_eq!(m.imports.len(), 2);
        assert_eq!(m.imports[0].pack.as_str(), "demo.Util");
    }

    #[test]
    fn parses_function_with_signature() {
        let m = parse_ok(
            "module T where\n\
             add :: Int -> Int -> Int\n\
             add a b = a + b\n",
        );
        assert_eq!(m.defs.len(), 2);
        match &m.defs[1] {
            Def::Fun(f) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.params, vec!["a", "b"]);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_multiline_body() {
        let m = parse_ok(
            "module T where\n\
             big x =\n\
               if x > 10\n\
                 then \"big\"\n\
                 else \"small\"\n",
        );
        assert_eq!(m.defs.len(), 1);
    }

    #[test]
    fn parses_data_with_fields_and_deriving() {
        let m = parse_ok(
            "module T where\n\
             data Point = Point { x :: Int, y :: Int } deriving (Eq, Show)\n",
        );
        match &m.defs[0] {
            Def::Data(d) => {
                assert_eq!(d.name, "Point");
                assert_eq!(d.ctors[0].fields.len(), 2);
                assert_eq!(d.deriving.len(), 2);
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn parses_plain_constructors() {
        let m = parse_ok("module T where\ndata Color = Red | Green | Blue\n");
        match &m.defs[0] {
            Def::Data(d) => assert_eq!(d.ctors.len(), 3),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn parses_class_and_instance() {
        let m = parse_ok(
            "module T where\n\
             data Point = Point { x :: Int, y :: Int }\n\
             class Sized a where\n\
               size :: a -> Int\n\
             instance Sized Point where\n\
               size p = 2\n",
        );
        assert_eq!(m.defs.len(), 3);
        match &m.defs[1] {
            Def::Class(c) => {
                assert_eq!(c.name, "Sized");
                assert_eq!(c.var, "a");
                assert_eq!(c.methods.len(), 1);
            }
            other => panic!("expected class, got {other:?}"),
        }
        match &m.defs[2] {
            Def::Instance(i) => {
                assert_eq!(i.class, "Sized");
                assert_eq!(i.ty, "Point");
                assert_eq!(i.methods.len(), 1);
            }
            other => panic!("expected instance, got {other:?}"),
        }
    }

    #[test]
    fn parses_qualified_names() {
        let m = parse_ok("module T where\nmain = demo.Util.twice 21\n");
        match &m.defs[0] {
            Def::Fun(f) => match &f.body {
                Expr::App { f, .. } => match f.as_ref() {
                    Expr::Var { name, qual, .. } => {
                        assert_eq!(name, "twice");
                        assert_eq!(qual.as_deref(), Some("demo.Util"));
                    }
                    other => panic!("expected var, got {other:?}"),
                },
                other => panic!("expected application, got {other:?}"),
            },
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_let_and_lambda() {
        let m = parse_ok("module T where\nmain = let f = \\x -> x * 2 in f 21\n");
        match &m.defs[0] {
            Def::Fun(f) => assert!(matches!(f.body, Expr::Let { .. })),
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn operator_precedence() {
        let m = parse_ok("module T where\nv = 1 + 2 * 3\n");
        match &m.defs[0] {
            Def::Fun(f) => match &f.body {
                Expr::Bin { op: BinOp::Add, rhs, .. } => {
                    assert!(matches!(rhs.as_ref(), Expr::Bin { op: BinOp::Mul, .. }));
                }
                other => panic!("expected addition at the top, got {other:?}"),
            },
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn missing_header_is_an_error() {
        let (module, errors) = parse("x = 1\n");
        assert!(module.is_none());
        assert!(!errors.is_empty());
    }

    #[test]
    fn error_carries_position() {
        let (_, errors) = parse("module T where\nx = )\n");
        assert!(!errors.is_empty());
        assert_eq!(errors[0].0.line, 2);
    }

    #[test]
    fn module_identity_matches_canonical_name() {
        // The identity from a parsed file equals the canonicalized
        // dotted spelling.
        let m = parse_ok("module a.b.C where\nx = 1\n");
        assert_eq!(Some(m.pack), PackName::parse("a.b.C"));
    }
}

// src/gen/java.rs
//! Java source emission.
//!
//! Every module becomes one `public final class` named after the last
//! segment of the module name, in the package named by the leading
//! segments. Data types become nested static classes (one flat class when
//! the single constructor shares the data type's name, otherwise an
//! abstract base with one subclass per constructor), functions become
//! static methods, and a `main(String[])` trampoline is added when the
//! module defines a nullary `main`.

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::frontend::ast::{BinOp, DataDef, Def, Expr, FunDef};
use crate::global::Global;
use crate::pack::PackName;
use crate::passes::imports::ExportKind;
use crate::passes::typecheck::{expr_type, resolve_type_quick};
use crate::symtab::{FunTy, SymKind, Ty};

/// The `gen-host-code` pass.
pub fn run(global: &mut Global) -> (&'static str, usize) {
    let Some(pack) = global.sub.this_pack.clone() else {
        return ("bytes", 0);
    };
    let text = match render(global, &pack) {
        Ok(text) => text,
        Err(msg) => {
            global.error(None, msg);
            return ("bytes", 0);
        }
    };
    let bytes = text.len();
    if let Err(err) = global.gen.printer.write_all(text.as_bytes()) {
        global.error(None, format!("write error: {err}"));
        return ("bytes", 0);
    }
    ("bytes", bytes)
}

fn render(global: &Global, pack: &PackName) -> Result<String, String> {
    let mut gen = Gen {
        global,
        out: String::new(),
    };
    gen.module(pack)?;
    Ok(gen.out)
}

struct Gen<'a> {
    global: &'a Global,
    out: String,
}

impl Gen<'_> {
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn module(&mut self, pack: &PackName) -> Result<(), String> {
        if let Some(prefix) = pack.prefix() {
            self.line(0, &format!("package {prefix};"));
            self.push("\n");
        }
        self.line(0, &format!("public final class {} {{", pack.base()));

        let defs = self.global.sub.defs.clone();
        for def in &defs {
            if let Def::Data(data) = def {
                self.data_class(data)?;
            }
        }
        let mut has_nullary_main = false;
        for def in &defs {
            if let Def::Fun(fun) = def {
                self.function(fun)?;
                if fun.name == "main" && fun.params.is_empty() {
                    has_nullary_main = true;
                }
            }
        }
        if has_nullary_main {
            self.trampoline()?;
        }

        self.line(0, "}");
        Ok(())
    }

    // ---- data types ------------------------------------------------------

    fn data_class(&mut self, data: &DataDef) -> Result<(), String> {
        let flat = data.ctors.len() == 1 && data.ctors[0].name == data.name;
        if flat {
            self.ctor_class(data, 0, None)?;
            return Ok(());
        }
        self.push("\n");
        self.line(1, &format!("public static abstract class {} {{", data.name));
        self.line(1, "}");
        let base = data.name.clone();
        for index in 0..data.ctors.len() {
            self.ctor_class(data, index, Some(&base))?;
        }
        Ok(())
    }

    fn ctor_class(
        &mut self,
        data: &DataDef,
        index: usize,
        base: Option<&str>,
    ) -> Result<(), String> {
        let ctor = &data.ctors[index];
        let extends = base
            .map(|b| format!(" extends {b}"))
            .unwrap_or_default();
        self.push("\n");
        self.line(
            1,
            &format!("public static final class {}{extends} {{", ctor.name),
        );

        let mut field_decls: Vec<(String, Ty)> = Vec::new();
        for (i, field) in ctor.fields.iter().enumerate() {
            let ty = resolve_type_quick(
                &self.global.sub.symtab,
                &self.global.sub.exports,
                &field.ty,
            )
            .ok_or_else(|| {
                format!("internal: unresolved field type in constructor '{}'", ctor.name)
            })?;
            let name = field
                .name
                .clone()
                .unwrap_or_else(|| format!("m{i}"));
            field_decls.push((jname(&name), ty));
        }

        for (name, ty) in &field_decls {
            self.line(2, &format!("public final {} {name};", self.java_ty(ty)));
        }

        // Constructor.
        let params: Vec<String> = field_decls
            .iter()
            .map(|(name, ty)| format!("{} {name}", self.java_ty(ty)))
            .collect();
        self.line(
            2,
            &format!("public {}({}) {{", ctor.name, params.join(", ")),
        );
        for (name, _) in &field_decls {
            self.line(3, &format!("this.{name} = {name};"));
        }
        self.line(2, "}");

        let derives = |class: &str| data.deriving.iter().any(|(c, _)| c == class);
        if derives("Eq") {
            self.derived_equals(&ctor.name, &field_decls);
        }
        if derives("Show") {
            self.derived_to_string(&ctor.name, &field_decls);
        }

        self.line(1, "}");
        Ok(())
    }

    fn derived_equals(&mut self, ctor: &str, fields: &[(String, Ty)]) {
        self.line(2, "@Override");
        self.line(2, "public boolean equals(Object other) {");
        self.line(
            3,
            &format!("if (!(other instanceof {ctor})) return false;"),
        );
        if fields.is_empty() {
            self.line(3, "return true;");
        } else {
            self.line(3, &format!("{ctor} that = ({ctor}) other;"));
            let cmp: Vec<String> = fields
                .iter()
                .map(|(name, ty)| match ty {
                    Ty::Int | Ty::Bool => format!("this.{name} == that.{name}"),
                    Ty::Str | Ty::Data(_) => format!("this.{name}.equals(that.{name})"),
                })
                .collect();
            self.line(3, &format!("return {};", cmp.join(" && ")));
        }
        self.line(2, "}");
        self.line(2, "@Override");
        self.line(2, "public int hashCode() {");
        if fields.is_empty() {
            self.line(3, "return getClass().hashCode();");
        } else {
            let names: Vec<String> = fields.iter().map(|(n, _)| n.clone()).collect();
            self.line(
                3,
                &format!("return java.util.Objects.hash({});", names.join(", ")),
            );
        }
        self.line(2, "}");
    }

    fn derived_to_string(&mut self, ctor: &str, fields: &[(String, Ty)]) {
        self.line(2, "@Override");
        self.line(2, "public String toString() {");
        if fields.is_empty() {
            self.line(3, &format!("return \"{ctor}\";"));
        } else {
            let parts: Vec<String> = fields.iter().map(|(n, _)| format!("\" \" + {n}")).collect();
            self.line(3, &format!("return \"{ctor}\" + {};", parts.join(" + ")));
        }
        self.line(2, "}");
    }

    // ---- functions -------------------------------------------------------

    fn function(&mut self, fun: &FunDef) -> Result<(), String> {
        let funty = self.fun_ty(&fun.name)?;
        let params: Vec<String> = fun
            .params
            .iter()
            .zip(funty.params.iter())
            .map(|(name, ty)| format!("{} {}", self.java_ty(ty), jname(name)))
            .collect();
        self.push("\n");
        self.line(
            1,
            &format!(
                "public static {} {}({}) {{",
                self.java_ty(&funty.ret),
                jname(&fun.name),
                params.join(", ")
            ),
        );
        let mut env: FxHashMap<String, Ty> = FxHashMap::default();
        for (name, ty) in fun.params.iter().zip(funty.params.iter()) {
            env.insert(name.clone(), ty.clone());
        }
        self.body(2, &mut env, &fun.body, &fun.name)?;
        self.line(1, "}");
        Ok(())
    }

    fn trampoline(&mut self) -> Result<(), String> {
        self.push("\n");
        self.line(1, "public static void main(String[] args) {");
        self.line(2, "System.out.println(main());");
        self.line(1, "}");
        Ok(())
    }

    /// A let chain becomes local declarations, the core a return statement.
    fn body(
        &mut self,
        indent: usize,
        env: &mut FxHashMap<String, Ty>,
        expr: &Expr,
        fun: &str,
    ) -> Result<(), String> {
        match expr {
            Expr::Let {
                name, value, body, ..
            } => {
                let ty = self.type_of(env, value, fun)?;
                let rendered = self.expr(env, value, fun)?;
                self.line(
                    indent,
                    &format!("final {} {} = {rendered};", self.java_ty(&ty), jname(name)),
                );
                env.insert(name.clone(), ty);
                self.body(indent, env, body, fun)
            }
            other => {
                let rendered = self.expr(env, other, fun)?;
                self.line(indent, &format!("return {rendered};"));
                Ok(())
            }
        }
    }

    fn expr(
        &mut self,
        env: &FxHashMap<String, Ty>,
        expr: &Expr,
        fun: &str,
    ) -> Result<String, String> {
        match expr {
            Expr::Int(value, _) => Ok(format!("{value}L")),
            Expr::Str(value, _) => Ok(java_string(value)),
            Expr::Bool(value, _) => Ok(value.to_string()),
            Expr::Var { name, qual, .. } => {
                if qual.is_none() && env.contains_key(name.as_str()) {
                    return Ok(jname(name));
                }
                self.call(env, name, qual.as_deref(), &[], &[], fun)
            }
            Expr::App { f, args } => match f.as_ref() {
                Expr::Var { name, qual, .. } => {
                    let rendered: Result<Vec<String>, String> =
                        args.iter().map(|a| self.expr(env, a, fun)).collect();
                    let rendered = rendered?;
                    self.call(env, name, qual.as_deref(), args, &rendered, fun)
                }
                _ => Err(format!("internal: residual non-static call in '{fun}'")),
            },
            Expr::Bin { op, lhs, rhs, .. } => {
                let left = self.expr(env, lhs, fun)?;
                let right = self.expr(env, rhs, fun)?;
                let operand_ty = self.type_of(env, lhs, fun)?;
                Ok(bin_expr(*op, &left, &right, &operand_ty))
            }
            Expr::If {
                cond, then, els, ..
            } => {
                let c = self.expr(env, cond, fun)?;
                let t = self.expr(env, then, fun)?;
                let e = self.expr(env, els, fun)?;
                Ok(format!("({c} ? {t} : {e})"))
            }
            Expr::Let { .. } => Err(format!(
                "internal: let in expression position survived simplification in '{fun}'"
            )),
            Expr::Lam { .. } => Err(format!(
                "internal: lambda survived globalization in '{fun}'"
            )),
        }
    }

    /// A saturated call (or nullary reference) of a top-level symbol.
    fn call(
        &mut self,
        env: &FxHashMap<String, Ty>,
        name: &str,
        qual: Option<&str>,
        arg_exprs: &[Expr],
        args: &[String],
        fun: &str,
    ) -> Result<String, String> {
        match qual {
            None => {
                if env.contains_key(name) {
                    // A local can only be a plain value reference.
                    if args.is_empty() {
                        return Ok(jname(name));
                    }
                    return Err(format!("internal: call of local '{name}' in '{fun}'"));
                }
                let kind = self
                    .global
                    .sub
                    .symtab
                    .value(name)
                    .map(|s| s.kind.clone())
                    .ok_or_else(|| format!("internal: unresolved '{name}' in '{fun}'"))?;
                match kind {
                    SymKind::Fun { .. } => Ok(format!("{}({})", jname(name), args.join(", "))),
                    SymKind::Ctor { .. } => Ok(format!("new {}({})", name, args.join(", "))),
                    SymKind::Field { data, ctor, .. } => {
                        let target = args
                            .first()
                            .ok_or_else(|| format!("internal: bare field '{name}' in '{fun}'"))?;
                        if ctor == data {
                            Ok(format!("{target}.{}", jname(name)))
                        } else {
                            Ok(format!("(({ctor}) {target}).{}", jname(name)))
                        }
                    }
                    SymKind::Method { class, .. } => {
                        let receiver = arg_exprs
                            .first()
                            .ok_or_else(|| format!("internal: bare method '{name}' in '{fun}'"))?;
                        let recv_ty = self.type_of(env, receiver, fun)?;
                        let ty_name = recv_ty.to_string();
                        let impl_fun = self
                            .global
                            .sub
                            .symtab
                            .instance_for(&class, &ty_name)
                            .and_then(|inst| inst.methods.get(name).cloned())
                            .ok_or_else(|| {
                                format!("internal: no instance {class} {ty_name} in '{fun}'")
                            })?;
                        Ok(format!("{}({})", jname(&impl_fun), args.join(", ")))
                    }
                    _ => Err(format!("internal: '{name}' is not a value in '{fun}'")),
                }
            }
            Some(q) => {
                let pack = PackName::parse(q)
                    .ok_or_else(|| format!("internal: bad qualifier '{q}' in '{fun}'"))?;
                let table = self
                    .global
                    .sub
                    .exports
                    .get(&pack)
                    .ok_or_else(|| format!("internal: no exports for '{q}' in '{fun}'"))?;
                let sym = table
                    .symbols
                    .get(name)
                    .ok_or_else(|| format!("internal: '{q}.{name}' not exported"))?;
                match &sym.kind {
                    ExportKind::Fun => Ok(format!("{q}.{}({})", jname(name), args.join(", "))),
                    ExportKind::Ctor { .. } => {
                        Ok(format!("new {q}.{}({})", name, args.join(", ")))
                    }
                    ExportKind::Field { data, ctor, .. } => {
                        let target = args
                            .first()
                            .ok_or_else(|| format!("internal: bare field '{name}' in '{fun}'"))?;
                        if ctor == data {
                            Ok(format!("{target}.{}", jname(name)))
                        } else {
                            Ok(format!("(({q}.{ctor}) {target}).{}", jname(name)))
                        }
                    }
                    ExportKind::Data { .. } => {
                        Err(format!("internal: '{q}.{name}' names a type"))
                    }
                }
            }
        }
    }

    fn type_of(
        &self,
        env: &FxHashMap<String, Ty>,
        expr: &Expr,
        fun: &str,
    ) -> Result<Ty, String> {
        expr_type(&self.global.sub.symtab, &self.global.sub.exports, env, expr)
            .ok_or_else(|| format!("internal: untyped expression in '{fun}'"))
    }

    fn fun_ty(&self, name: &str) -> Result<FunTy, String> {
        match self.global.sub.symtab.value(name).map(|s| &s.kind) {
            Some(SymKind::Fun {
                checked: Some(funty),
                ..
            }) => Ok(funty.clone()),
            _ => Err(format!("internal: '{name}' was not type checked")),
        }
    }

    /// Java spelling of a semantic type.
    fn java_ty(&self, ty: &Ty) -> String {
        match ty {
            Ty::Int => "long".to_string(),
            Ty::Bool => "boolean".to_string(),
            Ty::Str => "String".to_string(),
            Ty::Data(name) => {
                if self.global.sub.symtab.contains_type(name) {
                    name.clone()
                } else {
                    // An imported type lives as a nested class of the module
                    // that declared it.
                    for (pack, table) in self.global.sub.exports.iter() {
                        if table.types.contains_key(name) {
                            return format!("{pack}.{name}");
                        }
                    }
                    name.clone()
                }
            }
        }
    }
}

fn bin_expr(op: BinOp, left: &str, right: &str, operand_ty: &Ty) -> String {
    let by_value = matches!(operand_ty, Ty::Int | Ty::Bool);
    match op {
        BinOp::Add => format!("({left} + {right})"),
        BinOp::Sub => format!("({left} - {right})"),
        BinOp::Mul => format!("({left} * {right})"),
        BinOp::Div => format!("({left} / {right})"),
        BinOp::Concat => format!("({left} + {right})"),
        BinOp::Lt => format!("({left} < {right})"),
        BinOp::Le => format!("({left} <= {right})"),
        BinOp::Gt => format!("({left} > {right})"),
        BinOp::Ge => format!("({left} >= {right})"),
        BinOp::And => format!("({left} && {right})"),
        BinOp::Or => format!("({left} || {right})"),
        BinOp::Eq => {
            if by_value {
                format!("({left} == {right})")
            } else {
                format!("{left}.equals({right})")
            }
        }
        BinOp::Ne => {
            if by_value {
                format!("({left} != {right})")
            } else {
                format!("!{left}.equals({right})")
            }
        }
    }
}

/// Java identifier for a Fern name: primes become `$q`, reserved words get
/// a trailing `$`.
fn jname(name: &str) -> String {
    let mut result = name.replace('\'', "$q");
    const RESERVED: &[&str] = &[
        "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
        "const", "continue", "default", "do", "double", "else", "enum", "extends", "final",
        "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
        "interface", "long", "native", "new", "package", "private", "protected", "public",
        "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this",
        "throw", "throws", "transient", "try", "void", "volatile", "while",
    ];
    if RESERVED.contains(&result.as_str()) {
        result.push('$');
    }
    result
}

fn java_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testutil::analyzed_upto;

    fn java_of(source: &str) -> String {
        let g = analyzed_upto(source, "strictness analysis");
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        let pack = g.sub.this_pack.clone().unwrap();
        render(&g, &pack).expect("render")
    }

    #[test]
    fn emits_package_and_class() {
        let java = java_of("module demo.Hello where\ngreeting :: String\ngreeting = \"hi\"\n");
        assert!(java.contains("package demo;"));
        assert!(java.contains("public final class Hello {"));
        assert!(java.contains("public static String greeting() {"));
        assert!(java.contains("return \"hi\";"));
    }

    #[test]
    fn single_segment_module_has_no_package() {
        let java = java_of("module H where\nv :: Int\nv = 1\n");
        assert!(!java.contains("package"));
        assert!(java.contains("public final class H {"));
    }

    #[test]
    fn functions_map_types() {
        let java = java_of(
            "module T where\n\
             add :: Int -> Int -> Int\n\
             add a b = a + b\n",
        );
        assert!(java.contains("public static long add(long a, long b) {"));
        assert!(java.contains("return (a + b);"));
    }

    #[test]
    fn flat_data_class_with_fields() {
        let java = java_of(
            "module T where\n\
             data Point = Point { x :: Int, y :: Int } deriving (Eq, Show)\n",
        );
        assert!(java.contains("public static final class Point {"));
        assert!(java.contains("public final long x;"));
        assert!(java.contains("public Point(long x, long y) {"));
        assert!(java.contains("public boolean equals(Object other) {"));
        assert!(java.contains("public String toString() {"));
    }

    #[test]
    fn multi_ctor_data_extends_base() {
        let java = java_of("module T where\ndata Color = Red | Green | Blue\n");
        assert!(java.contains("public static abstract class Color {"));
        assert!(java.contains("public static final class Red extends Color {"));
    }

    #[test]
    fn constructors_and_fields_emit() {
        let java = java_of(
            "module T where\n\
             data Point = Point { x :: Int, y :: Int }\n\
             norm :: Point -> Int\n\
             norm p = x p + y p\n\
             origin :: Point\n\
             origin = Point 1 2\n",
        );
        assert!(java.contains("return (p.x + p.y);"));
        assert!(java.contains("return new Point(1L, 2L);"));
    }

    #[test]
    fn lets_become_locals() {
        let java = java_of("module T where\nmain = let a = 6 in a * 7\n");
        assert!(java.contains("final long a = 6L;"));
        assert!(java.contains("return (a * 7L);"));
    }

    #[test]
    fn string_equality_uses_equals() {
        let java = java_of(
            "module T where\n\
             same :: String -> String -> Bool\n\
             same a b = a == b\n",
        );
        assert!(java.contains("return a.equals(b);"));
    }

    #[test]
    fn method_calls_dispatch_to_instance_functions() {
        let java = java_of(
            "module T where\n\
             data Point = Point { x :: Int, y :: Int }\n\
             class Sized a where\n\
               size :: a -> Int\n\
             instance Sized Point where\n\
               size p = 2\n\
             main = size (Point 1 2)\n",
        );
        assert!(java.contains("public static long size$Point(Point p) {"));
        assert!(java.contains("return size$Point(new Point(1L, 2L));"));
    }

    #[test]
    fn nullary_main_gets_a_trampoline() {
        let java = java_of("module T where\nmain = 42\n");
        assert!(java.contains("public static void main(String[] args) {"));
        assert!(java.contains("System.out.println(main());"));
    }

    #[test]
    fn reserved_words_are_mangled() {
        let java = java_of("module T where\nnew :: Int\nnew = 1\n");
        assert!(java.contains("public static long new$() {"));
    }
}

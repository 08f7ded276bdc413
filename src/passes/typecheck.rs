// src/passes/typecheck.rs
//! Monomorphic type checking for the first-order core language.
//!
//! Signatures are trusted and checked against bodies; functions without a
//! signature get their parameter types from a one-pass constraint walk over
//! the body and their return type from the body itself. Recursive functions
//! therefore need a signature. Class-method uses are pinned to the instance
//! selected by the first argument's type.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diag::Position;
use crate::frontend::ast::{BinOp, Def, Expr, FunDef, TypeRef};
use crate::global::Global;
use crate::pack::PackName;
use crate::passes::definitions::substitute_var;
use crate::passes::imports::{ExportKind, ExportTable};
use crate::symtab::{FunTy, SymKind, SymTab, Ty};

/// The `type-check` pass.
pub fn type_check(global: &mut Global) -> (&'static str, usize) {
    let funs: Vec<FunDef> = global
        .sub
        .defs
        .iter()
        .filter_map(|def| match def {
            Def::Fun(fun) => Some(fun.clone()),
            _ => None,
        })
        .collect();
    let count = funs.len();
    let fun_map: FxHashMap<String, FunDef> =
        funs.iter().map(|f| (f.name.clone(), f.clone())).collect();

    let mut checker = Checker::new(&global.sub.symtab, &global.sub.exports, &fun_map);
    for fun in &funs {
        checker.ensure_checked(&fun.name);
    }
    let Checker {
        checked, errors, ..
    } = checker;

    for (pos, text) in errors {
        global.error(Some(pos), text);
    }
    for (name, funty) in checked {
        if let Some(sym) = global.sub.symtab.value_mut(&name) {
            if let SymKind::Fun { checked, .. } = &mut sym.kind {
                *checked = Some(funty);
            }
        }
    }
    ("definitions", count)
}

/// Check a function introduced after the type-check pass ran (a lifted
/// lambda): the rest of the symbol table is already checked.
pub fn check_new_function(global: &mut Global, fun: &FunDef) -> Option<FunTy> {
    let mut fun_map = FxHashMap::default();
    fun_map.insert(fun.name.clone(), fun.clone());
    let mut checker = Checker::new(&global.sub.symtab, &global.sub.exports, &fun_map);
    let result = checker.ensure_checked(&fun.name);
    let errors = checker.errors;
    for (pos, text) in errors {
        global.error(Some(pos), text);
    }
    result
}

/// What a name in scope stands for during checking.
#[derive(Debug, Clone)]
enum Binding {
    Val(Ty),
    /// A let-bound lambda, callable like a function.
    Fun(FunTy),
}

struct Checker<'a> {
    symtab: &'a SymTab,
    exports: &'a FxHashMap<PackName, ExportTable>,
    funs: &'a FxHashMap<String, FunDef>,
    checked: FxHashMap<String, FunTy>,
    visiting: FxHashSet<String>,
    errors: Vec<(Position, String)>,
}

impl<'a> Checker<'a> {
    fn new(
        symtab: &'a SymTab,
        exports: &'a FxHashMap<PackName, ExportTable>,
        funs: &'a FxHashMap<String, FunDef>,
    ) -> Self {
        Checker {
            symtab,
            exports,
            funs,
            checked: FxHashMap::default(),
            visiting: FxHashSet::default(),
            errors: Vec::new(),
        }
    }

    fn error(&mut self, pos: Position, text: impl Into<String>) {
        self.errors.push((pos, text.into()));
    }

    fn ensure_checked(&mut self, name: &str) -> Option<FunTy> {
        if let Some(ty) = self.checked.get(name) {
            return Some(ty.clone());
        }
        if let Some(sym) = self.symtab.value(name) {
            if let SymKind::Fun {
                checked: Some(ty), ..
            } = &sym.kind
            {
                let ty = ty.clone();
                self.checked.insert(name.to_string(), ty.clone());
                return Some(ty);
            }
        }
        let fun = self.funs.get(name)?.clone();
        if self.visiting.contains(name) {
            self.error(
                fun.pos,
                format!("recursive function '{name}' needs a type signature"),
            );
            return None;
        }
        self.visiting.insert(name.to_string());
        let result = self.check_fun(&fun);
        self.visiting.remove(name);
        if let Some(ty) = &result {
            self.checked.insert(name.to_string(), ty.clone());
        }
        result
    }

    fn check_fun(&mut self, fun: &FunDef) -> Option<FunTy> {
        let funty = match &fun.sig {
            Some(sig) => {
                let funty = self.resolve_sig(&fun.name, sig, fun.params.len(), fun.pos)?;
                // Provisional entry so recursive calls see the signature.
                self.checked.insert(fun.name.clone(), funty.clone());
                funty
            }
            None => {
                let params = self.infer_params(&fun.params, &fun.body, fun.pos)?;
                FunTy {
                    params,
                    // Placeholder until the body is inferred below.
                    ret: Ty::Int,
                }
            }
        };

        let mut env: FxHashMap<String, Binding> = FxHashMap::default();
        for (param, ty) in fun.params.iter().zip(funty.params.iter()) {
            env.insert(param.clone(), Binding::Val(ty.clone()));
        }
        let body_ty = self.infer(&mut env, &fun.body)?;

        match &fun.sig {
            Some(_) => {
                if body_ty != funty.ret {
                    self.error(
                        fun.body.pos(),
                        format!(
                            "type mismatch in '{}': body has type {body_ty}, signature says {}",
                            fun.name, funty.ret
                        ),
                    );
                    return None;
                }
                Some(funty)
            }
            None => Some(FunTy {
                params: funty.params,
                ret: body_ty,
            }),
        }
    }

    // ---- signatures and type references ----------------------------------

    fn resolve_sig(
        &mut self,
        name: &str,
        sig: &TypeRef,
        arity: usize,
        pos: Position,
    ) -> Option<FunTy> {
        let (params, ret) = sig.uncurry();
        if params.len() != arity {
            self.error(
                pos,
                format!(
                    "signature of '{name}' has {} parameters but the equation has {arity}",
                    params.len()
                ),
            );
            return None;
        }
        let mut resolved = Vec::with_capacity(params.len());
        for param in params {
            resolved.push(self.resolve_ty(param)?);
        }
        let ret = self.resolve_ty(ret)?;
        Some(FunTy {
            params: resolved,
            ret,
        })
    }

    fn resolve_ty(&mut self, ty: &TypeRef) -> Option<Ty> {
        match ty {
            TypeRef::Named { name, pos } => match name.as_str() {
                "Int" => Some(Ty::Int),
                "Bool" => Some(Ty::Bool),
                "String" => Some(Ty::Str),
                _ => match self.symtab.type_sym(name).map(|s| s.kind.clone()) {
                    Some(SymKind::Data { .. }) => Some(Ty::Data(name.clone())),
                    Some(SymKind::Alias { ty }) => self.resolve_ty(&ty),
                    _ => {
                        if self
                            .exports
                            .values()
                            .any(|table| table.types.contains_key(name))
                        {
                            Some(Ty::Data(name.clone()))
                        } else {
                            self.error(*pos, format!("unknown type '{name}'"));
                            None
                        }
                    }
                },
            },
            TypeRef::Var { name, pos } => {
                self.error(*pos, format!("type variable '{name}' not allowed here"));
                None
            }
            TypeRef::Fun(arg, _) => {
                self.error(
                    arg.pos(),
                    "higher-order parameter types are not supported",
                );
                None
            }
        }
    }

    // ---- expression inference --------------------------------------------

    fn infer(&mut self, env: &mut FxHashMap<String, Binding>, expr: &Expr) -> Option<Ty> {
        match expr {
            Expr::Int(..) => Some(Ty::Int),
            Expr::Str(..) => Some(Ty::Str),
            Expr::Bool(..) => Some(Ty::Bool),
            Expr::Var { name, qual, pos } => self.infer_var(env, name, qual.as_deref(), *pos),
            Expr::App { f, args } => self.infer_app(env, f, args),
            Expr::Bin { op, lhs, rhs, pos } => self.infer_bin(env, *op, lhs, rhs, *pos),
            Expr::If {
                cond, then, els, pos,
            } => {
                let cond_ty = self.infer(env, cond)?;
                if cond_ty != Ty::Bool {
                    self.error(
                        cond.pos(),
                        format!("condition must be Bool, found {cond_ty}"),
                    );
                }
                let then_ty = self.infer(env, then)?;
                let else_ty = self.infer(env, els)?;
                if then_ty != else_ty {
                    self.error(
                        *pos,
                        format!("branches of 'if' differ: {then_ty} versus {else_ty}"),
                    );
                    return None;
                }
                Some(then_ty)
            }
            Expr::Let {
                name, value, body, ..
            } => {
                let binding = match value.as_ref() {
                    Expr::Lam {
                        params,
                        body: lam_body,
                        pos,
                    } => {
                        let param_tys = self.infer_lam(env, params, lam_body, *pos)?;
                        Binding::Fun(param_tys)
                    }
                    other => Binding::Val(self.infer(env, other)?),
                };
                let saved = env.insert(name.clone(), binding);
                let result = self.infer(env, body);
                restore(env, name, saved);
                result
            }
            Expr::Lam { pos, .. } => {
                self.error(
                    *pos,
                    "a lambda must be bound by 'let' or applied directly",
                );
                None
            }
        }
    }

    /// Type of a let-bound or directly-applied lambda.
    fn infer_lam(
        &mut self,
        env: &mut FxHashMap<String, Binding>,
        params: &[String],
        body: &Expr,
        pos: Position,
    ) -> Option<FunTy> {
        let param_tys = self.infer_params(params, body, pos)?;
        let mut saved = Vec::new();
        for (param, ty) in params.iter().zip(param_tys.iter()) {
            saved.push((param.clone(), env.insert(param.clone(), Binding::Val(ty.clone()))));
        }
        let ret = self.infer(env, body);
        for (param, old) in saved.into_iter().rev() {
            restore(env, &param, old);
        }
        Some(FunTy {
            params: param_tys,
            ret: ret?,
        })
    }

    fn infer_var(
        &mut self,
        env: &FxHashMap<String, Binding>,
        name: &str,
        qual: Option<&str>,
        pos: Position,
    ) -> Option<Ty> {
        if qual.is_none() {
            match env.get(name) {
                Some(Binding::Val(ty)) => return Some(ty.clone()),
                Some(Binding::Fun(_)) => {
                    self.error(pos, format!("'{name}' must be applied to its arguments"));
                    return None;
                }
                None => {}
            }
        }
        match self.lookup(name, qual, pos)? {
            Callable::Fun { arity: 0, funty } => match funty {
                Some(funty) => Some(funty.ret),
                None => {
                    self.error(pos, format!("no type information for '{name}'"));
                    None
                }
            },
            Callable::Ctor { arity: 0, data, .. } => Some(Ty::Data(data)),
            Callable::Fun { .. } | Callable::Ctor { .. } => {
                self.error(pos, format!("'{name}' must be applied to its arguments"));
                None
            }
            Callable::Field { .. } | Callable::Method { .. } => {
                self.error(pos, format!("'{name}' must be applied to its arguments"));
                None
            }
        }
    }

    fn infer_app(
        &mut self,
        env: &mut FxHashMap<String, Binding>,
        f: &Expr,
        args: &[Expr],
    ) -> Option<Ty> {
        match f {
            Expr::Lam { params, body, pos } => {
                // Directly applied lambda: parameter types come from the
                // arguments.
                if params.len() != args.len() {
                    self.error(
                        *pos,
                        format!(
                            "lambda takes {} arguments, got {}",
                            params.len(),
                            args.len()
                        ),
                    );
                    return None;
                }
                let mut saved = Vec::new();
                for (param, arg) in params.iter().zip(args.iter()) {
                    let ty = self.infer(env, arg)?;
                    saved.push((param.clone(), env.insert(param.clone(), Binding::Val(ty))));
                }
                let result = self.infer(env, body);
                for (param, old) in saved.into_iter().rev() {
                    restore(env, &param, old);
                }
                result
            }
            Expr::Var { name, qual, pos } => {
                if qual.is_none() {
                    if let Some(Binding::Fun(funty)) = env.get(name).cloned() {
                        return self.check_call(env, name, &funty, args, *pos);
                    }
                    if let Some(Binding::Val(_)) = env.get(name) {
                        self.error(*pos, format!("'{name}' is not a function"));
                        return None;
                    }
                }
                let callable = self.lookup(name, qual.as_deref(), *pos)?;
                match callable {
                    Callable::Fun { arity, funty } => {
                        if args.len() != arity {
                            self.error(
                                *pos,
                                format!("'{name}' expects {arity} arguments, got {}", args.len()),
                            );
                            return None;
                        }
                        let Some(funty) = funty else {
                            self.error(*pos, format!("no type information for '{name}'"));
                            return None;
                        };
                        self.check_call(env, name, &funty, args, *pos)
                    }
                    Callable::Ctor { arity, data, funty } => {
                        if args.len() != arity {
                            self.error(
                                *pos,
                                format!(
                                    "constructor '{name}' expects {arity} arguments, got {}",
                                    args.len()
                                ),
                            );
                            return None;
                        }
                        match funty {
                            Some(funty) => self.check_call(env, name, &funty, args, *pos),
                            None => Some(Ty::Data(data)),
                        }
                    }
                    Callable::Field { data, ty } => {
                        if args.len() != 1 {
                            self.error(
                                *pos,
                                format!("field '{name}' takes exactly one argument"),
                            );
                            return None;
                        }
                        let arg_ty = self.infer(env, &args[0])?;
                        if arg_ty != Ty::Data(data.clone()) {
                            self.error(
                                args[0].pos(),
                                format!("field '{name}' belongs to {data}, not {arg_ty}"),
                            );
                            return None;
                        }
                        Some(ty)
                    }
                    Callable::Method { class, sig } => {
                        self.infer_method(env, name, &class, &sig, args, *pos)
                    }
                }
            }
            other => {
                self.error(other.pos(), "expression is not callable");
                None
            }
        }
    }

    fn infer_method(
        &mut self,
        env: &mut FxHashMap<String, Binding>,
        name: &str,
        class: &str,
        sig: &TypeRef,
        args: &[Expr],
        pos: Position,
    ) -> Option<Ty> {
        let arity = sig.arity();
        if args.len() != arity {
            self.error(
                pos,
                format!("'{name}' expects {arity} arguments, got {}", args.len()),
            );
            return None;
        }
        let recv_ty = self.infer(env, &args[0])?;
        let ty_name = recv_ty.to_string();
        if self.symtab.instance_for(class, &ty_name).is_none() {
            self.error(pos, format!("no instance {class} {ty_name} for '{name}'"));
            return None;
        }
        let var = match self.symtab.type_sym(class).map(|s| &s.kind) {
            Some(SymKind::Class { var, .. }) => var.clone(),
            _ => return None,
        };
        let concrete = substitute_var(sig, &var, &ty_name);
        let funty = self.resolve_sig(name, &concrete, arity, pos)?;
        self.check_call(env, name, &funty, args, pos)
    }

    fn check_call(
        &mut self,
        env: &mut FxHashMap<String, Binding>,
        name: &str,
        funty: &FunTy,
        args: &[Expr],
        pos: Position,
    ) -> Option<Ty> {
        if args.len() != funty.params.len() {
            self.error(
                pos,
                format!(
                    "'{name}' expects {} arguments, got {}",
                    funty.params.len(),
                    args.len()
                ),
            );
            return None;
        }
        let mut ok = true;
        for (i, (arg, want)) in args.iter().zip(funty.params.iter()).enumerate() {
            if let Some(got) = self.infer(env, arg) {
                if &got != want {
                    self.error(
                        arg.pos(),
                        format!(
                            "argument {} of '{name}' must be {want}, found {got}",
                            i + 1
                        ),
                    );
                    ok = false;
                }
            } else {
                ok = false;
            }
        }
        if ok {
            Some(funty.ret.clone())
        } else {
            None
        }
    }

    fn infer_bin(
        &mut self,
        env: &mut FxHashMap<String, Binding>,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        pos: Position,
    ) -> Option<Ty> {
        let lt = self.infer(env, lhs)?;
        let rt = self.infer(env, rhs)?;
        let mismatch = |chk: &mut Self, want: &Ty| {
            chk.errors.push((
                pos,
                format!(
                    "operator '{}' needs {want} operands, found {lt} and {rt}",
                    op.symbol()
                ),
            ));
        };
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if lt == Ty::Int && rt == Ty::Int {
                    Some(Ty::Int)
                } else {
                    mismatch(self, &Ty::Int);
                    None
                }
            }
            BinOp::Concat => {
                if lt == Ty::Str && rt == Ty::Str {
                    Some(Ty::Str)
                } else {
                    mismatch(self, &Ty::Str);
                    None
                }
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if lt == Ty::Int && rt == Ty::Int {
                    Some(Ty::Bool)
                } else {
                    mismatch(self, &Ty::Int);
                    None
                }
            }
            BinOp::And | BinOp::Or => {
                if lt == Ty::Bool && rt == Ty::Bool {
                    Some(Ty::Bool)
                } else {
                    mismatch(self, &Ty::Bool);
                    None
                }
            }
            BinOp::Eq | BinOp::Ne => {
                if lt != rt {
                    self.error(
                        pos,
                        format!("cannot compare {lt} with {rt}"),
                    );
                    return None;
                }
                if let Ty::Data(name) = &lt {
                    // Comparing data values needs a derived or declared Eq.
                    if self.symtab.instance_for("Eq", name).is_none() {
                        self.error(
                            pos,
                            format!("type {name} has no Eq instance; add 'deriving (Eq)'"),
                        );
                        return None;
                    }
                }
                Some(Ty::Bool)
            }
        }
    }

    // ---- parameter inference for unsigned functions ----------------------

    fn infer_params(
        &mut self,
        params: &[String],
        body: &Expr,
        pos: Position,
    ) -> Option<Vec<Ty>> {
        let mut found: FxHashMap<String, Ty> = FxHashMap::default();
        let wanted: FxHashSet<&str> = params.iter().map(|s| s.as_str()).collect();
        self.constrain(body, &wanted, &mut found);
        let mut result = Vec::with_capacity(params.len());
        for param in params {
            match found.get(param) {
                Some(ty) => result.push(ty.clone()),
                None => {
                    self.error(
                        pos,
                        format!(
                            "cannot infer the type of parameter '{param}'; add a type signature"
                        ),
                    );
                    return None;
                }
            }
        }
        Some(result)
    }

    /// One conservative walk collecting the first evident type of each
    /// wanted parameter. Conflicts are left for the checking pass proper.
    fn constrain(
        &mut self,
        expr: &Expr,
        wanted: &FxHashSet<&str>,
        found: &mut FxHashMap<String, Ty>,
    ) {
        match expr {
            Expr::Int(..) | Expr::Str(..) | Expr::Bool(..) | Expr::Var { .. } => {}
            Expr::Bin { op, lhs, rhs, .. } => {
                let operand = match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => Some(Ty::Int),
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Some(Ty::Int),
                    BinOp::Concat => Some(Ty::Str),
                    BinOp::And | BinOp::Or => Some(Ty::Bool),
                    BinOp::Eq | BinOp::Ne => None,
                };
                match operand {
                    Some(ty) => {
                        note_param(lhs, wanted, found, &ty);
                        note_param(rhs, wanted, found, &ty);
                    }
                    None => {
                        // For ==//= the other side may pin the type.
                        if let Some(ty) = literal_ty(lhs) {
                            note_param(rhs, wanted, found, &ty);
                        }
                        if let Some(ty) = literal_ty(rhs) {
                            note_param(lhs, wanted, found, &ty);
                        }
                    }
                }
                self.constrain(lhs, wanted, found);
                self.constrain(rhs, wanted, found);
            }
            Expr::If {
                cond, then, els, ..
            } => {
                note_param(cond, wanted, found, &Ty::Bool);
                self.constrain(cond, wanted, found);
                self.constrain(then, wanted, found);
                self.constrain(els, wanted, found);
            }
            Expr::App { f, args } => {
                if let Expr::Var { name, qual, .. } = f.as_ref() {
                    if let Some(param_tys) = self.callee_params(name, qual.as_deref()) {
                        for (arg, want) in args.iter().zip(param_tys.iter()) {
                            note_param(arg, wanted, found, want);
                        }
                    }
                }
                for arg in args {
                    self.constrain(arg, wanted, found);
                }
            }
            Expr::Let {
                name, value, body, ..
            } => {
                self.constrain(value, wanted, found);
                let mut inner = wanted.clone();
                inner.remove(name.as_str());
                self.constrain(body, &inner, found);
            }
            Expr::Lam { params, body, .. } => {
                let mut inner = wanted.clone();
                for param in params {
                    inner.remove(param.as_str());
                }
                self.constrain(body, &inner, found);
            }
        }
    }

    /// Parameter types of a named callee, when they can be had without
    /// risking a cycle.
    fn callee_params(&mut self, name: &str, qual: Option<&str>) -> Option<Vec<Ty>> {
        if self.visiting.contains(name) {
            return None;
        }
        match self.lookup_quiet(name, qual)? {
            Callable::Fun { funty, .. } => funty.map(|f| f.params),
            Callable::Ctor { funty, .. } => funty.map(|f| f.params),
            Callable::Field { data, .. } => Some(vec![Ty::Data(data)]),
            Callable::Method { .. } => None,
        }
    }

    // ---- symbol lookup ---------------------------------------------------

    fn lookup(&mut self, name: &str, qual: Option<&str>, pos: Position) -> Option<Callable> {
        let result = self.lookup_quiet(name, qual);
        if result.is_none() {
            self.error(pos, format!("can't resolve '{name}'"));
        }
        result
    }

    fn lookup_quiet(&mut self, name: &str, qual: Option<&str>) -> Option<Callable> {
        match qual {
            None => {
                let kind = self.symtab.value(name).map(|s| s.kind.clone())?;
                match kind {
                    SymKind::Fun { arity, .. } => {
                        let funty = self.ensure_checked(name);
                        Some(Callable::Fun { arity, funty })
                    }
                    SymKind::Ctor {
                        data,
                        arity,
                        field_types,
                        ..
                    } => {
                        let mut params = Vec::with_capacity(field_types.len());
                        let mut complete = true;
                        for ty in &field_types {
                            match self.resolve_ty(ty) {
                                Some(t) => params.push(t),
                                None => complete = false,
                            }
                        }
                        Some(Callable::Ctor {
                            arity,
                            data: data.clone(),
                            funty: complete.then(|| FunTy {
                                params,
                                ret: Ty::Data(data),
                            }),
                        })
                    }
                    SymKind::Field { data, ty, .. } => {
                        let ty = self.resolve_ty(&ty)?;
                        Some(Callable::Field { data, ty })
                    }
                    SymKind::Method { class, sig } => Some(Callable::Method { class, sig }),
                    _ => None,
                }
            }
            Some(q) => {
                let pack = PackName::parse(q)?;
                let table = self.exports.get(&pack)?;
                let sym = table.symbols.get(name)?;
                match &sym.kind {
                    ExportKind::Fun => Some(Callable::Fun {
                        arity: sym.arity,
                        funty: sym.ty.clone(),
                    }),
                    ExportKind::Ctor { data } => Some(Callable::Ctor {
                        arity: sym.arity,
                        data: data.clone(),
                        funty: sym.ty.clone(),
                    }),
                    ExportKind::Field { data, .. } => {
                        let ret = sym.ty.as_ref().map(|t| t.ret.clone())?;
                        Some(Callable::Field {
                            data: data.clone(),
                            ty: ret,
                        })
                    }
                    ExportKind::Data { .. } => None,
                }
            }
        }
    }
}

enum Callable {
    Fun {
        arity: usize,
        funty: Option<FunTy>,
    },
    Ctor {
        arity: usize,
        data: String,
        funty: Option<FunTy>,
    },
    Field {
        data: String,
        ty: Ty,
    },
    Method {
        class: String,
        sig: TypeRef,
    },
}

fn restore(env: &mut FxHashMap<String, Binding>, name: &str, old: Option<Binding>) {
    match old {
        Some(binding) => {
            env.insert(name.to_string(), binding);
        }
        None => {
            env.remove(name);
        }
    }
}

fn note_param(
    expr: &Expr,
    wanted: &FxHashSet<&str>,
    found: &mut FxHashMap<String, Ty>,
    ty: &Ty,
) {
    if let Expr::Var {
        name, qual: None, ..
    } = expr
    {
        if wanted.contains(name.as_str()) && !found.contains_key(name) {
            found.insert(name.clone(), ty.clone());
        }
    }
}

fn literal_ty(expr: &Expr) -> Option<Ty> {
    match expr {
        Expr::Int(..) => Some(Ty::Int),
        Expr::Str(..) => Some(Ty::Str),
        Expr::Bool(..) => Some(Ty::Bool),
        _ => None,
    }
}

// ---- post-check type queries (used by code generation) --------------------

/// Type of an expression once checking has succeeded: every function carries
/// its resolved type, so this never has to guess.
pub fn expr_type(
    symtab: &SymTab,
    exports: &FxHashMap<PackName, ExportTable>,
    env: &FxHashMap<String, Ty>,
    expr: &Expr,
) -> Option<Ty> {
    match expr {
        Expr::Int(..) => Some(Ty::Int),
        Expr::Str(..) => Some(Ty::Str),
        Expr::Bool(..) => Some(Ty::Bool),
        Expr::Var { name, qual, .. } => match qual {
            None => {
                if let Some(ty) = env.get(name) {
                    return Some(ty.clone());
                }
                match symtab.value(name).map(|s| &s.kind) {
                    Some(SymKind::Fun {
                        checked: Some(funty),
                        ..
                    }) => Some(funty.ret.clone()),
                    Some(SymKind::Ctor { data, .. }) => Some(Ty::Data(data.clone())),
                    _ => None,
                }
            }
            Some(q) => {
                let pack = PackName::parse(q)?;
                let sym = exports.get(&pack)?.symbols.get(name)?;
                match &sym.kind {
                    ExportKind::Ctor { data } if sym.arity == 0 => Some(Ty::Data(data.clone())),
                    _ => sym.ty.as_ref().map(|t| t.ret.clone()),
                }
            }
        },
        Expr::App { f, args } => match f.as_ref() {
            Expr::Var { name, qual, .. } => match qual {
                None => match symtab.value(name).map(|s| &s.kind) {
                    Some(SymKind::Fun {
                        checked: Some(funty),
                        ..
                    }) => Some(funty.ret.clone()),
                    Some(SymKind::Ctor { data, .. }) => Some(Ty::Data(data.clone())),
                    Some(SymKind::Field { ty, .. }) => resolve_type_quick(symtab, exports, ty),
                    Some(SymKind::Method { class, sig }) => {
                        let recv = expr_type(symtab, exports, env, args.first()?)?;
                        let ty_name = recv.to_string();
                        symtab.instance_for(class, &ty_name)?;
                        let var = match symtab.type_sym(class).map(|s| &s.kind) {
                            Some(SymKind::Class { var, .. }) => var.clone(),
                            _ => return None,
                        };
                        let concrete = substitute_var(sig, &var, &ty_name);
                        let (_, ret) = concrete.uncurry();
                        resolve_type_quick(symtab, exports, ret)
                    }
                    _ => None,
                },
                Some(q) => {
                    let pack = PackName::parse(q)?;
                    let sym = exports.get(&pack)?.symbols.get(name)?;
                    match &sym.kind {
                        ExportKind::Ctor { data } => Some(Ty::Data(data.clone())),
                        _ => sym.ty.as_ref().map(|t| t.ret.clone()),
                    }
                }
            },
            _ => None,
        },
        Expr::Bin { op, .. } => match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => Some(Ty::Int),
            BinOp::Concat => Some(Ty::Str),
            _ => Some(Ty::Bool),
        },
        Expr::If { then, .. } => expr_type(symtab, exports, env, then),
        Expr::Let {
            name, value, body, ..
        } => {
            let value_ty = expr_type(symtab, exports, env, value)?;
            let mut inner = env.clone();
            inner.insert(name.clone(), value_ty);
            expr_type(symtab, exports, &inner, body)
        }
        Expr::Lam { .. } => None,
    }
}

/// Resolve a source type reference against a checked symbol table.
pub fn resolve_type_quick(
    symtab: &SymTab,
    exports: &FxHashMap<PackName, ExportTable>,
    ty: &TypeRef,
) -> Option<Ty> {
    match ty {
        TypeRef::Named { name, .. } => match name.as_str() {
            "Int" => Some(Ty::Int),
            "Bool" => Some(Ty::Bool),
            "String" => Some(Ty::Str),
            _ => match symtab.type_sym(name).map(|s| &s.kind) {
                Some(SymKind::Data { .. }) => Some(Ty::Data(name.clone())),
                Some(SymKind::Alias { ty }) => resolve_type_quick(symtab, exports, &ty.clone()),
                _ => {
                    if exports.values().any(|t| t.types.contains_key(name)) {
                        Some(Ty::Data(name.clone()))
                    } else {
                        None
                    }
                }
            },
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testutil::analyzed_upto;

    fn checked_ret(g: &crate::global::Global, name: &str) -> Option<Ty> {
        match g.sub.symtab.value(name).map(|s| &s.kind) {
            Some(SymKind::Fun {
                checked: Some(funty),
                ..
            }) => Some(funty.ret.clone()),
            _ => None,
        }
    }

    #[test]
    fn signed_function_checks() {
        let g = analyzed_upto(
            "module T where\n\
             add :: Int -> Int -> Int\n\
             add a b = a + b\n",
            "type check",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        assert_eq!(checked_ret(&g, "add"), Some(Ty::Int));
    }

    #[test]
    fn unsigned_params_are_inferred() {
        let g = analyzed_upto(
            "module T where\n\
             shout s = s ++ \"!\"\n\
             double x = x + x\n",
            "type check",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        assert_eq!(checked_ret(&g, "shout"), Some(Ty::Str));
        assert_eq!(checked_ret(&g, "double"), Some(Ty::Int));
    }

    #[test]
    fn body_must_match_signature() {
        let g = analyzed_upto(
            "module T where\n\
             answer :: Int\n\
             answer = \"forty-two\"\n",
            "type check",
        );
        assert!(g.has_errors());
    }

    #[test]
    fn condition_must_be_bool() {
        let g = analyzed_upto("module T where\nmain = if 1 then 2 else 3\n", "type check");
        assert!(g.has_errors());
    }

    #[test]
    fn branches_must_agree() {
        let g = analyzed_upto(
            "module T where\nmain = if true then 1 else \"two\"\n",
            "type check",
        );
        assert!(g.has_errors());
    }

    #[test]
    fn arity_is_enforced() {
        let g = analyzed_upto(
            "module T where\n\
             add :: Int -> Int -> Int\n\
             add a b = a + b\n\
             main = add 1\n",
            "type check",
        );
        assert!(g.has_errors());
    }

    #[test]
    fn recursion_needs_a_signature() {
        let g = analyzed_upto("module T where\nloop x = loop x\n", "type check");
        assert!(g.has_errors());
    }

    #[test]
    fn recursion_with_signature_checks() {
        let g = analyzed_upto(
            "module T where\n\
             fact :: Int -> Int\n\
             fact n = if n == 0 then 1 else n * fact (n - 1)\n",
            "type check",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
    }

    #[test]
    fn constructors_and_fields_check() {
        let g = analyzed_upto(
            "module T where\n\
             data Point = Point { x :: Int, y :: Int }\n\
             origin :: Point\n\
             origin = Point 0 0\n\
             norm :: Point -> Int\n\
             norm p = x p + y p\n",
            "type check",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
    }

    #[test]
    fn method_dispatch_uses_receiver_type() {
        let g = analyzed_upto(
            "module T where\n\
             data Point = Point { x :: Int, y :: Int }\n\
             class Sized a where\n\
               size :: a -> Int\n\
             instance Sized Point where\n\
               size p = 2\n\
             main = size (Point 1 2)\n",
            "type check",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
    }

    #[test]
    fn missing_instance_is_an_error() {
        let g = analyzed_upto(
            "module T where\n\
             class Sized a where\n\
               size :: a -> Int\n\
             main = size 1\n",
            "type check",
        );
        assert!(g.has_errors());
    }

    #[test]
    fn let_bound_lambda_is_callable() {
        let g = analyzed_upto(
            "module T where\nmain = let f = \\x -> x * 2 in f 21\n",
            "type check",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        assert_eq!(checked_ret(&g, "main"), Some(Ty::Int));
    }

    #[test]
    fn comparing_data_needs_eq() {
        let g = analyzed_upto(
            "module T where\n\
             data P = P\n\
             v :: P\n\
             v = P\n\
             main = v == v\n",
            "type check",
        );
        assert!(g.has_errors());
    }

    #[test]
    fn derived_eq_allows_comparison() {
        let g = analyzed_upto(
            "module T where\n\
             data P = P deriving (Eq)\n\
             v :: P\n\
             v = P\n\
             main = v == v\n",
            "type check",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
    }
}

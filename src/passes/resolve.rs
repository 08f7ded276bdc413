// src/passes/resolve.rs
//! Name resolution and class/instance verification.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diag::Position;
use crate::frontend::ast::{Def, Expr, TypeRef};
use crate::global::Global;
use crate::pack::PackName;
use crate::passes::imports::ExportTable;
use crate::symtab::{SymKind, SymTab};

/// The `resolve-names` pass: every identifier in every body must denote a
/// local, a symbol of this module, or an export of exactly one import.
/// Imported references are rewritten to carry the full dotted module name,
/// so later passes never re-run the search.
pub fn resolve_names(global: &mut Global) -> (&'static str, usize) {
    let mut defs = std::mem::take(&mut global.sub.defs);
    let this_pack = global.sub.this_pack.clone();
    let mut resolver = Resolver {
        symtab: &global.sub.symtab,
        exports: &global.sub.exports,
        this_pack: this_pack.as_ref().map(|p| p.as_str().to_string()),
        scope: Vec::new(),
        errors: Vec::new(),
        count: 0,
    };
    for def in &mut defs {
        if let Def::Fun(fun) = def {
            resolver.scope.extend(fun.params.iter().cloned());
            resolver.walk(&mut fun.body);
            resolver.scope.clear();
        }
    }
    let count = resolver.count;
    let errors = resolver.errors;
    for (pos, text) in errors {
        global.error(Some(pos), text);
    }
    global.sub.defs = defs;
    ("names", count)
}

struct Resolver<'a> {
    symtab: &'a SymTab,
    exports: &'a FxHashMap<PackName, ExportTable>,
    this_pack: Option<String>,
    scope: Vec<String>,
    errors: Vec<(Position, String)>,
    count: usize,
}

impl Resolver<'_> {
    fn walk(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Int(..) | Expr::Str(..) | Expr::Bool(..) => {}
            Expr::Var { name, qual, pos } => {
                self.count += 1;
                self.resolve(name, qual, *pos);
            }
            Expr::App { f, args } => {
                self.walk(f);
                for arg in args {
                    self.walk(arg);
                }
            }
            Expr::Bin { lhs, rhs, .. } => {
                self.walk(lhs);
                self.walk(rhs);
            }
            Expr::If { cond, then, els, .. } => {
                self.walk(cond);
                self.walk(then);
                self.walk(els);
            }
            Expr::Let {
                name, value, body, ..
            } => {
                self.walk(value);
                self.scope.push(name.clone());
                self.walk(body);
                self.scope.pop();
            }
            Expr::Lam { params, body, .. } => {
                let depth = self.scope.len();
                self.scope.extend(params.iter().cloned());
                self.walk(body);
                self.scope.truncate(depth);
            }
        }
    }

    fn resolve(&mut self, name: &str, qual: &mut Option<String>, pos: Position) {
        match qual.take() {
            None => {
                if self.scope.iter().any(|s| s == name) || self.symtab.contains_value(name) {
                    return;
                }
                // Unqualified imports: the name must be exported by exactly
                // one imported module.
                let mut owners: Vec<&PackName> = Vec::new();
                for (pack, table) in self.exports.iter() {
                    if table.symbols.contains_key(name) {
                        owners.push(pack);
                    }
                }
                match owners.len() {
                    0 => self
                        .errors
                        .push((pos, format!("can't resolve '{name}'"))),
                    1 => *qual = Some(owners[0].as_str().to_string()),
                    _ => {
                        let mut names: Vec<String> =
                            owners.iter().map(|p| p.as_str().to_string()).collect();
                        names.sort();
                        self.errors.push((
                            pos,
                            format!(
                                "'{name}' is ambiguous; it is exported by {}",
                                names.join(" and ")
                            ),
                        ));
                    }
                }
            }
            Some(q) => {
                if Some(&q) == self.this_pack.as_ref() {
                    // Fully qualified reference to this very module.
                    if !self.symtab.contains_value(name) {
                        self.errors
                            .push((pos, format!("can't resolve '{q}.{name}'")));
                    }
                    return;
                }
                let mut matches: Vec<&PackName> = Vec::new();
                for pack in self.exports.keys() {
                    if pack.as_str() == q || pack.base() == q {
                        matches.push(pack);
                    }
                }
                match matches.len() {
                    0 => {
                        self.errors
                            .push((pos, format!("no imported module matches '{q}'")));
                    }
                    1 => {
                        let pack = matches[0];
                        if self.exports[pack].symbols.contains_key(name) {
                            *qual = Some(pack.as_str().to_string());
                        } else {
                            self.errors.push((
                                pos,
                                format!("module '{pack}' has no definition '{name}'"),
                            ));
                        }
                    }
                    _ => {
                        self.errors.push((
                            pos,
                            format!("'{q}' matches more than one imported module"),
                        ));
                    }
                }
            }
        }
    }
}

/// The `verify-class-defs` pass: each class method signature must mention
/// the class variable, otherwise no instance could ever be selected for it.
pub fn verify_class_defs(global: &mut Global) -> (&'static str, usize) {
    let classes: Vec<(String, String, Vec<String>)> = global
        .sub
        .symtab
        .types()
        .filter_map(|sym| match &sym.kind {
            SymKind::Class { var, methods } => {
                Some((sym.name.clone(), var.clone(), methods.clone()))
            }
            _ => None,
        })
        .collect();
    let count = classes.len();

    for (_class, var, methods) in &classes {
        for method in methods {
            let Some(sym) = global.sub.symtab.value(method) else {
                continue;
            };
            let SymKind::Method { sig, .. } = &sym.kind else {
                continue;
            };
            if !mentions_var(sig, var) {
                let pos = sym.pos;
                let method = method.clone();
                let var = var.clone();
                global.error(
                    Some(pos),
                    format!("signature of method '{method}' does not mention the class variable '{var}'"),
                );
            }
        }
    }
    ("classes", count)
}

fn mentions_var(ty: &TypeRef, var: &str) -> bool {
    match ty {
        TypeRef::Var { name, .. } => name == var,
        TypeRef::Named { .. } => false,
        TypeRef::Fun(arg, rest) => mentions_var(arg, var) || mentions_var(rest, var),
    }
}

/// The `verify-own-instances` pass: every instance declared (or derived) in
/// this module names a known class and type, implements exactly the class's
/// methods, and is the only instance for its (class, type) pair.
pub fn verify_own_instances(global: &mut Global) -> (&'static str, usize) {
    let instances = global.sub.symtab.instances.clone();
    let count = instances.len();
    let mut seen: FxHashSet<(String, String)> = FxHashSet::default();

    for inst in &instances {
        let key = (inst.class.clone(), inst.ty.clone());
        if !seen.insert(key) {
            global.error(
                Some(inst.pos),
                format!("duplicate instance {} {}", inst.class, inst.ty),
            );
            continue;
        }

        if !known_type(global, &inst.ty) {
            global.error(
                Some(inst.pos),
                format!("instance for unknown type '{}'", inst.ty),
            );
        }

        if inst.derived {
            // Eq/Show are built-in derivable classes; their implementation
            // is synthesized during code generation.
            continue;
        }

        let class_methods = match global.sub.symtab.type_sym(&inst.class).map(|s| &s.kind) {
            Some(SymKind::Class { methods, .. }) => methods.clone(),
            _ => {
                global.error(
                    Some(inst.pos),
                    format!("unknown class '{}'", inst.class),
                );
                continue;
            }
        };

        for method in &class_methods {
            if !inst.methods.contains_key(method) {
                global.error(
                    Some(inst.pos),
                    format!(
                        "instance {} {} does not implement method '{method}'",
                        inst.class, inst.ty
                    ),
                );
            }
        }
        for method in inst.methods.keys() {
            if !class_methods.contains(method) {
                global.error(
                    Some(inst.pos),
                    format!("'{method}' is not a method of class '{}'", inst.class),
                );
            }
        }
    }
    ("instances", count)
}

fn known_type(global: &Global, name: &str) -> bool {
    matches!(name, "Int" | "Bool" | "String")
        || matches!(
            global.sub.symtab.type_sym(name).map(|s| &s.kind),
            Some(SymKind::Data { .. })
        )
}

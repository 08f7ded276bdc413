// src/passes/definitions.rs
//! Definition-level passes: joining signatures to equations, populating the
//! symbol table, field accessors, alias checking, and derived instances.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::frontend::ast::{Def, FunDef, TypeRef};
use crate::global::Global;
use crate::symtab::{Instance, SymKind, Symbol};

/// The `join-definitions` pass: attach standalone type signatures to the
/// function equation of the same name and drop them from the definition
/// list. A signature without an equation, or two equations for one name,
/// is an error.
pub fn join_definitions(global: &mut Global) -> (&'static str, usize) {
    let defs = std::mem::take(&mut global.sub.defs);
    let mut sigs: FxHashMap<String, (TypeRef, crate::diag::Position)> = FxHashMap::default();
    let mut joined: Vec<Def> = Vec::new();
    let mut seen_funs: FxHashMap<String, crate::diag::Position> = FxHashMap::default();

    for def in defs {
        match def {
            Def::Sig(sig) => {
                if let Some((_, prev)) = sigs.insert(sig.name.clone(), (sig.ty, sig.pos)) {
                    global.error(
                        Some(sig.pos),
                        format!(
                            "duplicate type signature for '{}' (previous one at line {})",
                            sig.name, prev.line
                        ),
                    );
                }
            }
            Def::Fun(mut fun) => {
                if let Some(prev) = seen_funs.insert(fun.name.clone(), fun.pos) {
                    global.error(
                        Some(fun.pos),
                        format!(
                            "redefinition of '{}' (previous equation at line {})",
                            fun.name, prev.line
                        ),
                    );
                    continue;
                }
                if let Some((ty, _)) = sigs.remove(&fun.name) {
                    fun.sig = Some(ty);
                }
                joined.push(Def::Fun(fun));
            }
            other => joined.push(other),
        }
    }

    // Signatures can precede or follow their equation within the module, so
    // try the leftovers against equations already joined.
    for (name, (ty, pos)) in sigs {
        let mut used = false;
        for def in joined.iter_mut() {
            if let Def::Fun(fun) = def {
                if fun.name == name && fun.sig.is_none() {
                    fun.sig = Some(ty.clone());
                    used = true;
                    break;
                }
            }
        }
        if !used {
            global.error(
                Some(pos),
                format!("type signature for '{name}' lacks an accompanying equation"),
            );
        }
    }

    let count = joined.len();
    global.sub.defs = joined;
    ("definitions", count)
}

/// The `enter-definitions` pass: populate the symbol table with functions,
/// data types, constructors, classes, methods, and aliases. Instance
/// methods are hoisted to mangled top-level functions (`size$Point`) so the
/// later passes treat them like any other definition.
pub fn enter_definitions(global: &mut Global) -> (&'static str, usize) {
    let mut defs = std::mem::take(&mut global.sub.defs);
    let mut count = 0usize;
    let mut hoisted: Vec<Def> = Vec::new();

    for def in &defs {
        match def {
            Def::Data(data) => {
                count += enter_type(
                    global,
                    Symbol {
                        name: data.name.clone(),
                        pos: data.pos,
                        kind: SymKind::Data {
                            ctors: data.ctors.iter().map(|c| c.name.clone()).collect(),
                        },
                    },
                );
                for ctor in &data.ctors {
                    count += enter_value(
                        global,
                        Symbol {
                            name: ctor.name.clone(),
                            pos: ctor.pos,
                            kind: SymKind::Ctor {
                                data: data.name.clone(),
                                arity: ctor.fields.len(),
                                fields: ctor.fields.iter().map(|f| f.name.clone()).collect(),
                                field_types: ctor.fields.iter().map(|f| f.ty.clone()).collect(),
                            },
                        },
                    );
                }
            }
            Def::Alias(alias) => {
                count += enter_type(
                    global,
                    Symbol {
                        name: alias.name.clone(),
                        pos: alias.pos,
                        kind: SymKind::Alias {
                            ty: alias.ty.clone(),
                        },
                    },
                );
            }
            Def::Class(class) => {
                count += enter_type(
                    global,
                    Symbol {
                        name: class.name.clone(),
                        pos: class.pos,
                        kind: SymKind::Class {
                            var: class.var.clone(),
                            methods: class.methods.iter().map(|m| m.name.clone()).collect(),
                        },
                    },
                );
                for method in &class.methods {
                    count += enter_value(
                        global,
                        Symbol {
                            name: method.name.clone(),
                            pos: method.pos,
                            kind: SymKind::Method {
                                class: class.name.clone(),
                                sig: method.ty.clone(),
                            },
                        },
                    );
                }
            }
            Def::Fun(fun) => {
                count += enter_value(
                    global,
                    Symbol {
                        name: fun.name.clone(),
                        pos: fun.pos,
                        kind: SymKind::Fun {
                            arity: fun.params.len(),
                            sig: fun.sig.clone(),
                            checked: None,
                            strict: Vec::new(),
                        },
                    },
                );
            }
            Def::Instance(_) | Def::Sig(_) => {}
        }
    }

    // Hoist instance methods now that classes and their method signatures
    // are entered.
    for def in &mut defs {
        let Def::Instance(inst) = def else { continue };
        let mut methods: FxHashMap<String, String> = FxHashMap::default();
        for fun in std::mem::take(&mut inst.methods) {
            let mangled = format!("{}${}", fun.name, inst.ty);
            let sig = method_sig_for(global, &fun.name, &inst.ty);
            methods.insert(fun.name.clone(), mangled.clone());
            count += enter_value(
                global,
                Symbol {
                    name: mangled.clone(),
                    pos: fun.pos,
                    kind: SymKind::Fun {
                        arity: fun.params.len(),
                        sig: sig.clone(),
                        checked: None,
                        strict: Vec::new(),
                    },
                },
            );
            hoisted.push(Def::Fun(FunDef {
                name: mangled,
                pos: fun.pos,
                params: fun.params,
                body: fun.body,
                sig,
            }));
        }
        global.sub.symtab.instances.push(Instance {
            class: inst.class.clone(),
            ty: inst.ty.clone(),
            pos: inst.pos,
            methods,
            derived: false,
        });
    }

    defs.append(&mut hoisted);
    global.sub.defs = defs;
    ("symbols", count)
}

/// The instance method's signature: the class method signature with the
/// class variable replaced by the instantiated type.
fn method_sig_for(global: &Global, method: &str, ty: &str) -> Option<TypeRef> {
    let symbol = global.sub.symtab.value(method)?;
    let SymKind::Method { class, sig } = &symbol.kind else {
        return None;
    };
    let class_sym = global.sub.symtab.type_sym(class)?;
    let SymKind::Class { var, .. } = &class_sym.kind else {
        return None;
    };
    Some(substitute_var(sig, var, ty))
}

pub(crate) fn substitute_var(sig: &TypeRef, var: &str, ty: &str) -> TypeRef {
    match sig {
        TypeRef::Var { name, pos } if name == var => TypeRef::Named {
            name: ty.to_string(),
            pos: *pos,
        },
        TypeRef::Fun(arg, rest) => TypeRef::Fun(
            Box::new(substitute_var(arg, var, ty)),
            Box::new(substitute_var(rest, var, ty)),
        ),
        other => other.clone(),
    }
}

fn enter_value(global: &mut Global, symbol: Symbol) -> usize {
    let pos = symbol.pos;
    let name = symbol.name.clone();
    match global.sub.symtab.enter_value(symbol) {
        None => 1,
        Some(prev) => {
            global.error(
                Some(pos),
                format!(
                    "redefinition of '{}' (previously defined at line {})",
                    name, prev.pos.line
                ),
            );
            0
        }
    }
}

fn enter_type(global: &mut Global, symbol: Symbol) -> usize {
    let pos = symbol.pos;
    let name = symbol.name.clone();
    match global.sub.symtab.enter_type(symbol) {
        None => 1,
        Some(prev) => {
            global.error(
                Some(pos),
                format!(
                    "redefinition of type '{}' (previously defined at line {})",
                    name, prev.pos.line
                ),
            );
            0
        }
    }
}

/// The `field-definitions` pass: enter an accessor symbol for every named
/// constructor field. A field name may appear in only one constructor.
pub fn field_definitions(global: &mut Global) -> (&'static str, usize) {
    let defs = global.sub.defs.clone();
    let mut count = 0usize;
    for def in &defs {
        let Def::Data(data) = def else { continue };
        for ctor in &data.ctors {
            for (index, field) in ctor.fields.iter().enumerate() {
                let Some(name) = &field.name else { continue };
                count += enter_value(
                    global,
                    Symbol {
                        name: name.clone(),
                        pos: field.pos,
                        kind: SymKind::Field {
                            data: data.name.clone(),
                            ctor: ctor.name.clone(),
                            index,
                            ty: field.ty.clone(),
                        },
                    },
                );
            }
        }
    }
    ("fields", count)
}

/// The `type-aliases` pass: every alias must expand to a known type without
/// running into itself.
pub fn type_aliases(global: &mut Global) -> (&'static str, usize) {
    let aliases: Vec<(String, TypeRef, crate::diag::Position)> = global
        .sub
        .symtab
        .types()
        .filter_map(|sym| match &sym.kind {
            SymKind::Alias { ty } => Some((sym.name.clone(), ty.clone(), sym.pos)),
            _ => None,
        })
        .collect();
    let count = aliases.len();

    for (name, ty, pos) in &aliases {
        let mut visiting = FxHashSet::default();
        visiting.insert(name.clone());
        if let Err(text) = check_alias_body(global, ty, &mut visiting) {
            global.error(Some(*pos), format!("type alias '{name}': {text}"));
        }
    }
    ("aliases", count)
}

fn check_alias_body(
    global: &Global,
    ty: &TypeRef,
    visiting: &mut FxHashSet<String>,
) -> Result<(), String> {
    match ty {
        TypeRef::Named { name, .. } => {
            if matches!(name.as_str(), "Int" | "Bool" | "String") {
                return Ok(());
            }
            match global.sub.symtab.type_sym(name).map(|s| &s.kind) {
                Some(SymKind::Data { .. }) => Ok(()),
                Some(SymKind::Alias { ty: inner }) => {
                    if !visiting.insert(name.clone()) {
                        return Err(format!("recursive reference through '{name}'"));
                    }
                    let result = check_alias_body(global, &inner.clone(), visiting);
                    visiting.remove(name);
                    result
                }
                _ => Err(format!("unknown type '{name}'")),
            }
        }
        TypeRef::Var { name, .. } => Err(format!("type variable '{name}' not allowed here")),
        TypeRef::Fun(arg, rest) => {
            check_alias_body(global, arg, visiting)?;
            check_alias_body(global, rest, visiting)
        }
    }
}

/// The `derive-instances` pass: register an instance per derivable class
/// named in a `deriving` clause. The method bodies are synthesized during
/// code generation; only `Eq` and `Show` can be derived.
pub fn derive_instances(global: &mut Global) -> (&'static str, usize) {
    let defs = global.sub.defs.clone();
    let mut count = 0usize;
    for def in &defs {
        let Def::Data(data) = def else { continue };
        for (class, pos) in &data.deriving {
            match class.as_str() {
                "Eq" | "Show" => {
                    global.sub.symtab.instances.push(Instance {
                        class: class.clone(),
                        ty: data.name.clone(),
                        pos: *pos,
                        methods: FxHashMap::default(),
                        derived: true,
                    });
                    count += 1;
                }
                other => {
                    global.error(
                        Some(*pos),
                        format!("cannot derive '{other}' for '{}'", data.name),
                    );
                }
            }
        }
    }
    ("instances", count)
}

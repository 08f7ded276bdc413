// src/symtab.rs
//! Per-module symbol table, populated by the enter/resolve passes and
//! consumed by type checking and code generation.
//!
//! Types and values live in separate namespaces, so `data Point = Point`
//! enters both a type and a constructor without clashing.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::diag::Position;
use crate::frontend::ast::TypeRef;

/// A resolved (alias-free) semantic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Int,
    Bool,
    Str,
    /// A data type declared in this or an imported module.
    Data(String),
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => f.write_str("Int"),
            Ty::Bool => f.write_str("Bool"),
            Ty::Str => f.write_str("String"),
            Ty::Data(name) => f.write_str(name),
        }
    }
}

impl Ty {
    pub fn parse(text: &str) -> Option<Ty> {
        match text {
            "" => None,
            "Int" => Some(Ty::Int),
            "Bool" => Some(Ty::Bool),
            "String" => Some(Ty::Str),
            name => Some(Ty::Data(name.to_string())),
        }
    }
}

/// Checked type of a top-level function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunTy {
    pub params: Vec<Ty>,
    pub ret: Ty,
}

impl fmt::Display for FunTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")->{}", self.ret)
    }
}

impl FunTy {
    /// Parse the `Display` form back, e.g. `(Int,Int)->Int`. Used when
    /// reading module metadata from generated code.
    pub fn parse(text: &str) -> Option<FunTy> {
        let rest = text.strip_prefix('(')?;
        let close = rest.find(')')?;
        let (params_text, ret_text) = rest.split_at(close);
        let ret_text = ret_text.strip_prefix(')')?.strip_prefix("->")?;
        let mut params = Vec::new();
        if !params_text.is_empty() {
            for p in params_text.split(',') {
                params.push(Ty::parse(p)?);
            }
        }
        Some(FunTy {
            params,
            ret: Ty::parse(ret_text)?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum SymKind {
    /// A top-level function or constant.
    Fun {
        arity: usize,
        sig: Option<TypeRef>,
        /// Resolved type, filled by the type checker.
        checked: Option<FunTy>,
        /// Per-parameter strictness, filled by strictness-analysis.
        strict: Vec<bool>,
    },
    /// A data type with its constructor names.
    Data { ctors: Vec<String> },
    /// A data constructor.
    Ctor {
        data: String,
        arity: usize,
        fields: Vec<Option<String>>,
        field_types: Vec<TypeRef>,
    },
    /// A record field accessor.
    Field {
        data: String,
        ctor: String,
        index: usize,
        ty: TypeRef,
    },
    /// A type alias.
    Alias { ty: TypeRef },
    /// A type class.
    Class { var: String, methods: Vec<String> },
    /// A class method; resolves to an instance at use sites.
    Method { class: String, sig: TypeRef },
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub pos: Position,
    pub kind: SymKind,
}

/// One class instance known to this module.
#[derive(Debug, Clone)]
pub struct Instance {
    pub class: String,
    pub ty: String,
    pub pos: Position,
    /// Method name -> mangled top-level function implementing it.
    pub methods: FxHashMap<String, String>,
    /// Derived instances get their implementation synthesized in codegen.
    pub derived: bool,
}

#[derive(Debug, Default)]
pub struct SymTab {
    values: FxHashMap<String, Symbol>,
    value_order: Vec<String>,
    types: FxHashMap<String, Symbol>,
    type_order: Vec<String>,
    pub instances: Vec<Instance>,
}

impl SymTab {
    /// Enter a value-namespace symbol (function, constructor, field,
    /// method). Returns the previous symbol of the same name, if any, so
    /// the caller can report the duplicate.
    pub fn enter_value(&mut self, symbol: Symbol) -> Option<Symbol> {
        let name = symbol.name.clone();
        let prev = self.values.insert(name.clone(), symbol);
        if prev.is_none() {
            self.value_order.push(name);
        }
        prev
    }

    /// Enter a type-namespace symbol (data type, alias, class).
    pub fn enter_type(&mut self, symbol: Symbol) -> Option<Symbol> {
        let name = symbol.name.clone();
        let prev = self.types.insert(name.clone(), symbol);
        if prev.is_none() {
            self.type_order.push(name);
        }
        prev
    }

    pub fn value(&self, name: &str) -> Option<&Symbol> {
        self.values.get(name)
    }

    pub fn value_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.values.get_mut(name)
    }

    pub fn type_sym(&self, name: &str) -> Option<&Symbol> {
        self.types.get(name)
    }

    pub fn contains_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Value symbols in the order they were entered.
    pub fn values(&self) -> impl Iterator<Item = &Symbol> {
        self.value_order.iter().filter_map(|n| self.values.get(n))
    }

    /// Type symbols in the order they were entered.
    pub fn types(&self) -> impl Iterator<Item = &Symbol> {
        self.type_order.iter().filter_map(|n| self.types.get(n))
    }

    pub fn len(&self) -> usize {
        self.value_order.len() + self.type_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The unique instance of `class` in this module, if exactly one exists.
    pub fn unique_instance_of(&self, class: &str) -> Option<&Instance> {
        let mut found = None;
        for inst in &self.instances {
            if inst.class == class {
                if found.is_some() {
                    return None;
                }
                found = Some(inst);
            }
        }
        found
    }

    pub fn instance_for(&self, class: &str, ty: &str) -> Option<&Instance> {
        self.instances
            .iter()
            .find(|inst| inst.class == class && inst.ty == ty)
    }

    /// Drop everything; returns how many symbols were forgotten.
    pub fn clear(&mut self) -> usize {
        let count = self.len();
        self.values.clear();
        self.value_order.clear();
        self.types.clear();
        self.type_order.clear();
        self.instances.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fun(name: &str, arity: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            pos: Position::new(1, 1),
            kind: SymKind::Fun {
                arity,
                sig: None,
                checked: None,
                strict: Vec::new(),
            },
        }
    }

    fn data(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            pos: Position::new(1, 1),
            kind: SymKind::Data { ctors: vec![] },
        }
    }

    fn instance(class: &str, ty: &str) -> Instance {
        Instance {
            class: class.to_string(),
            ty: ty.to_string(),
            pos: Position::new(1, 1),
            methods: FxHashMap::default(),
            derived: false,
        }
    }

    #[test]
    fn enter_reports_duplicates() {
        let mut tab = SymTab::default();
        assert!(tab.enter_value(fun("f", 1)).is_none());
        assert!(tab.enter_value(fun("f", 2)).is_some());
    }

    #[test]
    fn type_and_value_namespaces_are_disjoint() {
        let mut tab = SymTab::default();
        assert!(tab.enter_type(data("Point")).is_none());
        assert!(tab.enter_value(fun("Point", 2)).is_none());
        assert!(tab.contains_type("Point"));
        assert!(tab.contains_value("Point"));
    }

    #[test]
    fn iteration_preserves_entry_order() {
        let mut tab = SymTab::default();
        tab.enter_value(fun("b", 0));
        tab.enter_value(fun("a", 0));
        let names: Vec<_> = tab.values().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn unique_instance_lookup() {
        let mut tab = SymTab::default();
        tab.instances.push(instance("Sized", "Point"));
        assert!(tab.unique_instance_of("Sized").is_some());
        tab.instances.push(instance("Sized", "Rect"));
        assert!(tab.unique_instance_of("Sized").is_none());
        assert!(tab.instance_for("Sized", "Rect").is_some());
    }

    #[test]
    fn clear_counts_symbols() {
        let mut tab = SymTab::default();
        tab.enter_value(fun("a", 0));
        tab.enter_type(data("T"));
        assert_eq!(tab.clear(), 2);
        assert!(tab.is_empty());
    }

    #[test]
    fn fun_ty_round_trips_through_display() {
        let ty = FunTy {
            params: vec![Ty::Int, Ty::Str],
            ret: Ty::Data("Point".to_string()),
        };
        assert_eq!(ty.to_string(), "(Int,String)->Point");
        assert_eq!(FunTy::parse(&ty.to_string()), Some(ty));
        let constant = FunTy {
            params: vec![],
            ret: Ty::Bool,
        };
        assert_eq!(FunTy::parse(&constant.to_string()), Some(constant));
    }
}

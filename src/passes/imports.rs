// src/passes/imports.rs
//! Import resolution: building export tables for imported modules and
//! verifying that imported instances do not clash.
//!
//! An import is satisfied from the first match of: the dependency's source
//! located on the source path (its header and signed definitions are
//! parsed), or a generated file on the class path / output directory whose
//! metadata block is read back. Only definitions with type signatures, data
//! types, and their constructors and fields are exported.

use rustc_hash::FxHashMap;

use crate::cli::inputs::find_on_source_path;
use crate::cli::Options;
use crate::frontend::ast::{Def, TypeRef};
use crate::frontend::{lexer, parser};
use crate::gen::metadata;
use crate::global::Global;
use crate::pack::PackName;
use crate::symtab::{FunTy, Ty};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    Fun,
    Data { ctors: Vec<String> },
    Ctor { data: String },
    Field { data: String, ctor: String, index: usize },
}

#[derive(Debug, Clone)]
pub struct ExportSym {
    pub kind: ExportKind,
    pub arity: usize,
    pub ty: Option<FunTy>,
    pub strict: Vec<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    /// Value namespace: functions, constructors, field accessors.
    pub symbols: FxHashMap<String, ExportSym>,
    /// Type namespace: data types.
    pub types: FxHashMap<String, ExportSym>,
    /// (class, type) pairs of instances the module defines or derives.
    pub instances: Vec<(String, String)>,
}

/// The `import-packages` pass.
pub fn import_packages(global: &mut Global) -> (&'static str, usize) {
    let imports = global.sub.imports.clone();
    let count = imports.len();
    for import in imports {
        if Some(&import.pack) == global.sub.this_pack.as_ref() {
            global.error(Some(import.pos), "a module cannot import itself");
            continue;
        }
        if global.sub.exports.contains_key(&import.pack) {
            global.hint(
                Some(import.pos),
                format!("duplicate import of '{}'", import.pack),
            );
            continue;
        }
        match load_exports(&global.options, &import.pack) {
            Ok(table) => {
                global.sub.exports.insert(import.pack.clone(), table);
            }
            Err(text) => global.error(Some(import.pos), text),
        }
    }
    ("imports", count)
}

/// The `verify-imported-instances` pass: the same (class, type) instance
/// arriving from two different imports is rejected here, before it can make
/// method resolution ambiguous.
pub fn verify_imported_instances(global: &mut Global) -> (&'static str, usize) {
    let mut seen: FxHashMap<(String, String), PackName> = FxHashMap::default();
    let mut count = 0usize;
    let imports = global.sub.imports.clone();
    for import in &imports {
        let Some(table) = global.sub.exports.get(&import.pack) else {
            continue;
        };
        let instances = table.instances.clone();
        for (class, ty) in instances {
            count += 1;
            let key = (class.clone(), ty.clone());
            match seen.get(&key) {
                Some(prev) if *prev != import.pack => {
                    global.error(
                        Some(import.pos),
                        format!(
                            "instance {class} {ty} imported from both '{prev}' and '{}'",
                            import.pack
                        ),
                    );
                }
                Some(_) => {}
                None => {
                    seen.insert(key, import.pack.clone());
                }
            }
        }
    }
    ("instances", count)
}

/// Load the export table of `pack`, preferring source over generated code.
pub fn load_exports(options: &Options, pack: &PackName) -> Result<ExportTable, String> {
    if let Some(path) = find_on_source_path(&options.source_path, pack) {
        return exports_from_source(&path, pack);
    }
    let rel = pack.as_path("java");
    for dir in options.class_path.iter().chain(std::iter::once(&options.dest)) {
        let candidate = dir.join(&rel);
        if candidate.is_file() {
            let text = std::fs::read_to_string(&candidate)
                .map_err(|err| format!("could not read '{}': {err}", candidate.display()))?;
            return match metadata::parse(&text) {
                Some(meta) => Ok(meta.into_exports()),
                None => Err(format!(
                    "'{}' carries no module metadata",
                    candidate.display()
                )),
            };
        }
    }
    Err(format!(
        "could not import '{pack}': not found on source or class path"
    ))
}

fn exports_from_source(path: &std::path::Path, pack: &PackName) -> Result<ExportTable, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("could not read '{}': {err}", path.display()))?;
    let (tokens, lex_errors) = lexer::tokenize(&text);
    if !lex_errors.is_empty() {
        return Err(format!("imported module '{pack}' has lexical errors"));
    }
    let mut p = parser::Parser::new(&tokens);
    let Some(module) = p.parse_module() else {
        return Err(format!("imported module '{pack}' has syntax errors"));
    };
    if !p.errors.is_empty() {
        return Err(format!("imported module '{pack}' has syntax errors"));
    }
    if &module.pack != pack {
        return Err(format!(
            "'{}' defines module '{}', expected '{pack}'",
            path.display(),
            module.pack
        ));
    }
    Ok(exports_from_defs(&module.defs))
}

fn exports_from_defs(defs: &[Def]) -> ExportTable {
    let mut table = ExportTable::default();
    // Signatures may precede their equations; collect them first.
    let mut sigs: FxHashMap<&str, &TypeRef> = FxHashMap::default();
    for def in defs {
        if let Def::Sig(sig) = def {
            sigs.insert(&sig.name, &sig.ty);
        }
    }
    for def in defs {
        match def {
            Def::Fun(fun) => {
                let sig = fun.sig.as_ref().or_else(|| sigs.get(fun.name.as_str()).copied());
                // Only functions with signatures are visible to importers.
                let Some(sig) = sig else { continue };
                let Some(ty) = naive_fun_ty(sig, fun.params.len()) else {
                    continue;
                };
                table.symbols.insert(
                    fun.name.clone(),
                    ExportSym {
                        kind: ExportKind::Fun,
                        arity: fun.params.len(),
                        ty: Some(ty),
                        strict: Vec::new(),
                    },
                );
            }
            Def::Data(data) => {
                table.types.insert(
                    data.name.clone(),
                    ExportSym {
                        kind: ExportKind::Data {
                            ctors: data.ctors.iter().map(|c| c.name.clone()).collect(),
                        },
                        arity: 0,
                        ty: None,
                        strict: Vec::new(),
                    },
                );
                for ctor in &data.ctors {
                    let params: Option<Vec<Ty>> =
                        ctor.fields.iter().map(|f| naive_ty(&f.ty)).collect();
                    table.symbols.insert(
                        ctor.name.clone(),
                        ExportSym {
                            kind: ExportKind::Ctor {
                                data: data.name.clone(),
                            },
                            arity: ctor.fields.len(),
                            ty: params.map(|params| FunTy {
                                params,
                                ret: Ty::Data(data.name.clone()),
                            }),
                            strict: Vec::new(),
                        },
                    );
                    for (index, field) in ctor.fields.iter().enumerate() {
                        let Some(name) = &field.name else { continue };
                        table.symbols.insert(
                            name.clone(),
                            ExportSym {
                                kind: ExportKind::Field {
                                    data: data.name.clone(),
                                    ctor: ctor.name.clone(),
                                    index,
                                },
                                arity: 1,
                                ty: naive_ty(&field.ty).map(|ret| FunTy {
                                    params: vec![Ty::Data(data.name.clone())],
                                    ret,
                                }),
                                strict: Vec::new(),
                            },
                        );
                    }
                }
                for (class, _) in &data.deriving {
                    table.instances.push((class.clone(), data.name.clone()));
                }
            }
            Def::Instance(inst) => {
                table.instances.push((inst.class.clone(), inst.ty.clone()));
            }
            _ => {}
        }
    }
    table
}

/// Map a source signature to a semantic function type without access to the
/// defining module's alias table; good enough for cross-module checking.
fn naive_fun_ty(sig: &TypeRef, arity: usize) -> Option<FunTy> {
    let (params, ret) = sig.uncurry();
    if params.len() < arity {
        return None;
    }
    let params: Option<Vec<Ty>> = params.iter().take(arity).map(|t| naive_ty(t)).collect();
    // Over-application is rejected at the call site, so fold the remaining
    // arrows away only when the signature matches the equation exactly.
    if params.as_ref().map(|p| p.len()) != Some(arity) || sig.arity() != arity {
        return None;
    }
    Some(FunTy {
        params: params?,
        ret: naive_ty(ret)?,
    })
}

fn naive_ty(ty: &TypeRef) -> Option<Ty> {
    match ty {
        TypeRef::Named { name, .. } => Ty::parse(name),
        _ => None,
    }
}

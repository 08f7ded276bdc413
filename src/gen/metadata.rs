// src/gen/metadata.rs
//! The machine-readable metadata block at the top of every generated file.
//!
//! A later compilation that finds only the generated Java source of a
//! dependency reads this block back instead of the `.fern` source, so the
//! writer and parser here must stay in lock step. The format is one record
//! per comment line:
//!
//! ```text
//! /* @FernModule
//!  * name demo.Util
//!  * version 0.1.0
//!  * import demo.Base
//!  * fun twice/1 (Int)->Int s
//!  * data Point Point
//!  * ctor Point/2 Point (Int,Int)->Point x y
//!  * field x Point Point 0 (Point)->Int
//!  * instance Sized Point
//!  * end
//!  */
//! ```

use std::io::Write;

use crate::global::Global;
use crate::pack::PackName;
use crate::passes::imports::{ExportKind, ExportSym, ExportTable};
use crate::passes::typecheck::resolve_type_quick;
use crate::symtab::{FunTy, SymKind, Ty};

pub const MARKER: &str = "@FernModule";

/// The `gen-metadata` pass.
pub fn run(global: &mut Global) -> (&'static str, usize) {
    let Some(pack) = global.sub.this_pack.clone() else {
        return ("bytes", 0);
    };
    let text = render(global, &pack);
    let bytes = text.len();
    if let Err(err) = global.gen.printer.write_all(text.as_bytes()) {
        global.error(None, format!("write error: {err}"));
        return ("bytes", 0);
    }
    ("bytes", bytes)
}

fn render(global: &Global, pack: &PackName) -> String {
    let mut out = String::new();
    out.push_str(&format!("/* {MARKER}\n"));
    out.push_str(&format!(" * name {pack}\n"));
    out.push_str(&format!(" * version {}\n", env!("CARGO_PKG_VERSION")));
    for import in &global.sub.imports {
        out.push_str(&format!(" * import {}\n", import.pack));
    }

    let symtab = &global.sub.symtab;
    for sym in symtab.types() {
        if let SymKind::Data { ctors } = &sym.kind {
            out.push_str(&format!(" * data {} {}\n", sym.name, ctors.join(" ")));
        }
    }
    for sym in symtab.values() {
        match &sym.kind {
            SymKind::Fun {
                arity,
                checked,
                strict,
                ..
            } => {
                let ty = checked
                    .as_ref()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                out.push_str(&format!(
                    " * fun {}/{arity} {ty} {}\n",
                    sym.name,
                    strict_string(strict)
                ));
            }
            SymKind::Ctor {
                data,
                arity,
                fields,
                field_types,
            } => {
                let params: Option<Vec<Ty>> = field_types
                    .iter()
                    .map(|t| resolve_type_quick(symtab, &global.sub.exports, t))
                    .collect();
                let ty = params
                    .map(|params| {
                        FunTy {
                            params,
                            ret: Ty::Data(data.clone()),
                        }
                        .to_string()
                    })
                    .unwrap_or_else(|| "-".to_string());
                let names: Vec<String> = fields
                    .iter()
                    .map(|f| f.clone().unwrap_or_else(|| "_".to_string()))
                    .collect();
                out.push_str(&format!(
                    " * ctor {}/{arity} {data} {ty} {}\n",
                    sym.name,
                    names.join(" ")
                ));
            }
            SymKind::Field {
                data,
                ctor,
                index,
                ty,
            } => {
                let ret = resolve_type_quick(symtab, &global.sub.exports, ty);
                let funty = ret
                    .map(|ret| {
                        FunTy {
                            params: vec![Ty::Data(data.clone())],
                            ret,
                        }
                        .to_string()
                    })
                    .unwrap_or_else(|| "-".to_string());
                out.push_str(&format!(
                    " * field {} {data} {ctor} {index} {funty}\n",
                    sym.name
                ));
            }
            _ => {}
        }
    }
    for inst in &symtab.instances {
        out.push_str(&format!(" * instance {} {}\n", inst.class, inst.ty));
    }
    out.push_str(" * end\n */\n\n");
    out
}

fn strict_string(strict: &[bool]) -> String {
    if strict.is_empty() {
        "-".to_string()
    } else {
        strict.iter().map(|s| if *s { 's' } else { 'l' }).collect()
    }
}

/// Metadata read back from a generated file.
#[derive(Debug)]
pub struct ModuleMeta {
    pub name: PackName,
    pub imports: Vec<PackName>,
    pub exports: ExportTable,
}

impl ModuleMeta {
    pub fn into_exports(self) -> ExportTable {
        self.exports
    }
}

/// Parse the metadata block out of generated Java source.
pub fn parse(text: &str) -> Option<ModuleMeta> {
    let mut lines = text.lines();
    lines.find(|line| line.contains(MARKER))?;

    let mut name: Option<PackName> = None;
    let mut imports = Vec::new();
    let mut exports = ExportTable::default();

    for line in lines {
        let line = line.trim_start().trim_start_matches('*').trim();
        if line == "end" || line.starts_with("*/") {
            break;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("name") => {
                name = PackName::parse(words.next()?);
            }
            Some("version") => {}
            Some("import") => {
                imports.push(PackName::parse(words.next()?)?);
            }
            Some("fun") => {
                let (fun_name, arity) = name_arity(words.next()?)?;
                let ty = parse_ty(words.next()?);
                let strict = parse_strict(words.next().unwrap_or("-"));
                exports.symbols.insert(
                    fun_name,
                    ExportSym {
                        kind: ExportKind::Fun,
                        arity,
                        ty,
                        strict,
                    },
                );
            }
            Some("data") => {
                let data_name = words.next()?.to_string();
                let ctors: Vec<String> = words.map(|w| w.to_string()).collect();
                exports.types.insert(
                    data_name,
                    ExportSym {
                        kind: ExportKind::Data { ctors },
                        arity: 0,
                        ty: None,
                        strict: Vec::new(),
                    },
                );
            }
            Some("ctor") => {
                let (ctor_name, arity) = name_arity(words.next()?)?;
                let data = words.next()?.to_string();
                let ty = parse_ty(words.next()?);
                exports.symbols.insert(
                    ctor_name,
                    ExportSym {
                        kind: ExportKind::Ctor { data },
                        arity,
                        ty,
                        strict: Vec::new(),
                    },
                );
            }
            Some("field") => {
                let field_name = words.next()?.to_string();
                let data = words.next()?.to_string();
                let ctor = words.next()?.to_string();
                let index: usize = words.next()?.parse().ok()?;
                let ty = parse_ty(words.next()?);
                exports.symbols.insert(
                    field_name,
                    ExportSym {
                        kind: ExportKind::Field { data, ctor, index },
                        arity: 1,
                        ty,
                        strict: Vec::new(),
                    },
                );
            }
            Some("instance") => {
                let class = words.next()?.to_string();
                let ty = words.next()?.to_string();
                exports.instances.push((class, ty));
            }
            _ => {}
        }
    }

    Some(ModuleMeta {
        name: name?,
        imports,
        exports,
    })
}

fn name_arity(word: &str) -> Option<(String, usize)> {
    let (name, arity) = word.rsplit_once('/')?;
    Some((name.to_string(), arity.parse().ok()?))
}

fn parse_ty(word: &str) -> Option<FunTy> {
    if word == "-" {
        None
    } else {
        FunTy::parse(word)
    }
}

fn parse_strict(word: &str) -> Vec<bool> {
    if word == "-" {
        Vec::new()
    } else {
        word.chars().map(|c| c == 's').collect()
    }
}

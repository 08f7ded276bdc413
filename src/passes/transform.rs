// src/passes/transform.rs
//! Body transformations: let floating, constant folding, lambda lifting,
//! and strictness analysis.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diag::Position;
use crate::frontend::ast::{BinOp, Def, Expr, FunDef};
use crate::global::Global;
use crate::passes::typecheck::check_new_function;
use crate::symtab::{SymKind, Symbol};

// ---- simplify-lets --------------------------------------------------------

/// The `simplify-lets` pass: float every `let` binding to the front of the
/// enclosing function or lambda body (renaming on clashes) and drop
/// bindings that are never used. Afterwards each body is a straight chain
/// of bindings followed by a let-free expression, which is what the code
/// generator expects.
pub fn simplify_lets(global: &mut Global) -> (&'static str, usize) {
    let mut defs = std::mem::take(&mut global.sub.defs);
    let mut count = 0usize;
    let mut hints: Vec<(Position, String)> = Vec::new();
    for def in &mut defs {
        if let Def::Fun(fun) = def {
            let mut fresh = 0u32;
            let body = std::mem::replace(&mut fun.body, Expr::Int(0, fun.pos));
            let mut bound: FxHashSet<String> = fun.params.iter().cloned().collect();
            fun.body = float_body(body, &mut bound, &mut fresh, &mut count, &mut hints);
        }
    }
    for (pos, text) in hints {
        global.hint(Some(pos), text);
    }
    global.sub.defs = defs;
    ("lets", count)
}

/// Rebuild a body as a flat let-chain over a let-free core, dropping unused
/// bindings.
fn float_body(
    expr: Expr,
    bound: &mut FxHashSet<String>,
    fresh: &mut u32,
    count: &mut usize,
    hints: &mut Vec<(Position, String)>,
) -> Expr {
    let mut binds: Vec<(String, Expr, Position)> = Vec::new();
    let core = collect_lets(expr, &mut binds, bound, fresh, count, hints);

    // Drop bindings nothing refers to, starting from the back.
    let mut kept: Vec<(String, Expr, Position)> = Vec::new();
    for (name, value, pos) in binds.into_iter().rev() {
        let used_later = kept.iter().any(|(_, v, _)| refers_to(v, &name))
            || refers_to(&core, &name);
        if used_later {
            kept.push((name, value, pos));
        } else {
            hints.push((pos, format!("unused let binding '{name}'")));
        }
    }
    kept.reverse();

    kept.into_iter().rev().fold(core, |body, (name, value, pos)| Expr::Let {
        name,
        value: Box::new(value),
        body: Box::new(body),
        pos,
    })
}

fn collect_lets(
    expr: Expr,
    binds: &mut Vec<(String, Expr, Position)>,
    bound: &mut FxHashSet<String>,
    fresh: &mut u32,
    count: &mut usize,
    hints: &mut Vec<(Position, String)>,
) -> Expr {
    match expr {
        Expr::Let {
            name,
            value,
            body,
            pos,
        } => {
            *count += 1;
            let value = collect_lets(*value, binds, bound, fresh, count, hints);
            let (final_name, body) = if bound.contains(&name) {
                *fresh += 1;
                let renamed = format!("{name}${fresh}");
                (renamed.clone(), rename_var(*body, &name, &renamed))
            } else {
                (name, *body)
            };
            bound.insert(final_name.clone());
            binds.push((final_name, value, pos));
            collect_lets(body, binds, bound, fresh, count, hints)
        }
        Expr::App { f, args } => {
            let f = collect_lets(*f, binds, bound, fresh, count, hints);
            let args = args
                .into_iter()
                .map(|a| collect_lets(a, binds, bound, fresh, count, hints))
                .collect();
            Expr::App {
                f: Box::new(f),
                args,
            }
        }
        Expr::Bin { op, lhs, rhs, pos } => {
            let lhs = collect_lets(*lhs, binds, bound, fresh, count, hints);
            let rhs = collect_lets(*rhs, binds, bound, fresh, count, hints);
            Expr::Bin {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            }
        }
        Expr::If {
            cond,
            then,
            els,
            pos,
        } => {
            let cond = collect_lets(*cond, binds, bound, fresh, count, hints);
            let then = collect_lets(*then, binds, bound, fresh, count, hints);
            let els = collect_lets(*els, binds, bound, fresh, count, hints);
            Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
                pos,
            }
        }
        Expr::Lam { params, body, pos } => {
            // Lets never float across a lambda; the lambda body gets its own
            // chain.
            let mut inner: FxHashSet<String> = bound.clone();
            inner.extend(params.iter().cloned());
            let body = float_body(*body, &mut inner, fresh, count, hints);
            Expr::Lam {
                params,
                body: Box::new(body),
                pos,
            }
        }
        leaf => leaf,
    }
}

/// Does `expr` mention the unqualified variable `name`, honoring shadowing?
pub(crate) fn refers_to(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Int(..) | Expr::Str(..) | Expr::Bool(..) => false,
        Expr::Var {
            name: n, qual: None, ..
        } => n == name,
        Expr::Var { .. } => false,
        Expr::App { f, args } => refers_to(f, name) || args.iter().any(|a| refers_to(a, name)),
        Expr::Bin { lhs, rhs, .. } => refers_to(lhs, name) || refers_to(rhs, name),
        Expr::If { cond, then, els, .. } => {
            refers_to(cond, name) || refers_to(then, name) || refers_to(els, name)
        }
        Expr::Let {
            name: n,
            value,
            body,
            ..
        } => refers_to(value, name) || (n != name && refers_to(body, name)),
        Expr::Lam { params, body, .. } => {
            !params.iter().any(|p| p == name) && refers_to(body, name)
        }
    }
}

/// Rename free occurrences of `old` to `new`, honoring shadowing.
fn rename_var(expr: Expr, old: &str, new: &str) -> Expr {
    match expr {
        Expr::Var {
            name,
            qual: None,
            pos,
        } if name == old => Expr::Var {
            name: new.to_string(),
            qual: None,
            pos,
        },
        Expr::App { f, args } => Expr::App {
            f: Box::new(rename_var(*f, old, new)),
            args: args.into_iter().map(|a| rename_var(a, old, new)).collect(),
        },
        Expr::Bin { op, lhs, rhs, pos } => Expr::Bin {
            op,
            lhs: Box::new(rename_var(*lhs, old, new)),
            rhs: Box::new(rename_var(*rhs, old, new)),
            pos,
        },
        Expr::If {
            cond,
            then,
            els,
            pos,
        } => Expr::If {
            cond: Box::new(rename_var(*cond, old, new)),
            then: Box::new(rename_var(*then, old, new)),
            els: Box::new(rename_var(*els, old, new)),
            pos,
        },
        Expr::Let {
            name,
            value,
            body,
            pos,
        } => {
            let value = Box::new(rename_var(*value, old, new));
            let body = if name == old {
                body
            } else {
                Box::new(rename_var(*body, old, new))
            };
            Expr::Let {
                name,
                value,
                body,
                pos,
            }
        }
        Expr::Lam { params, body, pos } => {
            let body = if params.iter().any(|p| p == old) {
                body
            } else {
                Box::new(rename_var(*body, old, new))
            };
            Expr::Lam { params, body, pos }
        }
        leaf => leaf,
    }
}

// ---- simplify-expressions -------------------------------------------------

/// The `simplify-expressions` pass: constant folding over literal operands
/// and `if` with a literal condition.
pub fn simplify_expressions(global: &mut Global) -> (&'static str, usize) {
    let mut defs = std::mem::take(&mut global.sub.defs);
    let mut count = 0usize;
    for def in &mut defs {
        if let Def::Fun(fun) = def {
            let body = std::mem::replace(&mut fun.body, Expr::Int(0, fun.pos));
            fun.body = fold(body, &mut count);
        }
    }
    global.sub.defs = defs;
    ("reductions", count)
}

fn fold(expr: Expr, count: &mut usize) -> Expr {
    match expr {
        Expr::Bin { op, lhs, rhs, pos } => {
            let lhs = fold(*lhs, count);
            let rhs = fold(*rhs, count);
            if let Some(folded) = fold_bin(op, &lhs, &rhs, pos) {
                *count += 1;
                return folded;
            }
            Expr::Bin {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            }
        }
        Expr::If {
            cond,
            then,
            els,
            pos,
        } => {
            let cond = fold(*cond, count);
            let then = fold(*then, count);
            let els = fold(*els, count);
            if let Expr::Bool(value, _) = cond {
                *count += 1;
                return if value { then } else { els };
            }
            Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
                pos,
            }
        }
        Expr::App { f, args } => Expr::App {
            f: Box::new(fold(*f, count)),
            args: args.into_iter().map(|a| fold(a, count)).collect(),
        },
        Expr::Let {
            name,
            value,
            body,
            pos,
        } => Expr::Let {
            name,
            value: Box::new(fold(*value, count)),
            body: Box::new(fold(*body, count)),
            pos,
        },
        Expr::Lam { params, body, pos } => Expr::Lam {
            params,
            body: Box::new(fold(*body, count)),
            pos,
        },
        leaf => leaf,
    }
}

fn fold_bin(op: BinOp, lhs: &Expr, rhs: &Expr, pos: Position) -> Option<Expr> {
    match (lhs, rhs) {
        (Expr::Int(a, _), Expr::Int(b, _)) => match op {
            BinOp::Add => a.checked_add(*b).map(|v| Expr::Int(v, pos)),
            BinOp::Sub => a.checked_sub(*b).map(|v| Expr::Int(v, pos)),
            BinOp::Mul => a.checked_mul(*b).map(|v| Expr::Int(v, pos)),
            BinOp::Div => {
                if *b == 0 {
                    None
                } else {
                    a.checked_div(*b).map(|v| Expr::Int(v, pos))
                }
            }
            BinOp::Eq => Some(Expr::Bool(a == b, pos)),
            BinOp::Ne => Some(Expr::Bool(a != b, pos)),
            BinOp::Lt => Some(Expr::Bool(a < b, pos)),
            BinOp::Le => Some(Expr::Bool(a <= b, pos)),
            BinOp::Gt => Some(Expr::Bool(a > b, pos)),
            BinOp::Ge => Some(Expr::Bool(a >= b, pos)),
            _ => None,
        },
        (Expr::Bool(a, _), Expr::Bool(b, _)) => match op {
            BinOp::And => Some(Expr::Bool(*a && *b, pos)),
            BinOp::Or => Some(Expr::Bool(*a || *b, pos)),
            BinOp::Eq => Some(Expr::Bool(a == b, pos)),
            BinOp::Ne => Some(Expr::Bool(a != b, pos)),
            _ => None,
        },
        (Expr::Str(a, _), Expr::Str(b, _)) => match op {
            BinOp::Concat => Some(Expr::Str(format!("{a}{b}"), pos)),
            BinOp::Eq => Some(Expr::Bool(a == b, pos)),
            BinOp::Ne => Some(Expr::Bool(a != b, pos)),
            _ => None,
        },
        _ => None,
    }
}

// ---- globalize-lambdas ----------------------------------------------------

/// The `globalize-lambdas` pass: lift every lambda into a fresh top-level
/// function whose leading parameters are the captured variables, and turn
/// the call sites into saturated calls of the lifted function.
pub fn globalize_lambdas(global: &mut Global) -> (&'static str, usize) {
    let mut defs = std::mem::take(&mut global.sub.defs);
    let mut lifted: Vec<FunDef> = Vec::new();
    let mut count = 0usize;

    for def in &mut defs {
        if let Def::Fun(fun) = def {
            let outer = fun.name.clone();
            let mut scope: Vec<String> = fun.params.clone();
            let body = std::mem::replace(&mut fun.body, Expr::Int(0, fun.pos));
            fun.body = lift_expr(
                body,
                &outer,
                &mut scope,
                &mut FxHashMap::default(),
                &mut lifted,
                &mut count,
            );
        }
    }

    for fun in &lifted {
        global.sub.symtab.enter_value(Symbol {
            name: fun.name.clone(),
            pos: fun.pos,
            kind: SymKind::Fun {
                arity: fun.params.len(),
                sig: None,
                checked: None,
                strict: Vec::new(),
            },
        });
    }
    // The new functions were not seen by the type-check pass; check them now
    // so code generation has their types.
    for fun in &lifted {
        if let Some(funty) = check_new_function(global, fun) {
            if let Some(sym) = global.sub.symtab.value_mut(&fun.name) {
                if let SymKind::Fun { checked, .. } = &mut sym.kind {
                    *checked = Some(funty);
                }
            }
        }
    }
    defs.extend(lifted.into_iter().map(Def::Fun));
    global.sub.defs = defs;
    ("lambdas", count)
}

/// A let-bound lambda awaiting call-site rewriting.
struct LiftedLam {
    lifted_name: String,
    captured: Vec<String>,
}

fn lift_expr(
    expr: Expr,
    outer: &str,
    scope: &mut Vec<String>,
    lambdas: &mut FxHashMap<String, LiftedLam>,
    lifted: &mut Vec<FunDef>,
    count: &mut usize,
) -> Expr {
    match expr {
        Expr::Let {
            name,
            value,
            body,
            pos,
        } => match *value {
            Expr::Lam {
                params,
                body: lam_body,
                pos: lam_pos,
            } => {
                *count += 1;
                let lifted_name = format!("{outer}${}{}", name, lifted.len());
                let captured = captured_vars(&lam_body, &params, scope);
                // The lambda body may itself contain lambdas.
                let mut inner_scope: Vec<String> =
                    captured.iter().chain(params.iter()).cloned().collect();
                let lam_body = lift_expr(
                    *lam_body,
                    outer,
                    &mut inner_scope,
                    lambdas,
                    lifted,
                    count,
                );
                let mut fn_params = captured.clone();
                fn_params.extend(params.iter().cloned());
                lifted.push(FunDef {
                    name: lifted_name.clone(),
                    pos: lam_pos,
                    params: fn_params,
                    body: lam_body,
                    sig: None,
                });
                lambdas.insert(
                    name.clone(),
                    LiftedLam {
                        lifted_name,
                        captured,
                    },
                );
                let result = lift_expr(*body, outer, scope, lambdas, lifted, count);
                lambdas.remove(&name);
                result
            }
            value => {
                let value = lift_expr(value, outer, scope, lambdas, lifted, count);
                // A plain binding shadows any lifted lambda of that name.
                let shadowed = lambdas.remove(&name);
                scope.push(name.clone());
                let body = lift_expr(*body, outer, scope, lambdas, lifted, count);
                scope.pop();
                if let Some(lam) = shadowed {
                    lambdas.insert(name.clone(), lam);
                }
                Expr::Let {
                    name,
                    value: Box::new(value),
                    body: Box::new(body),
                    pos,
                }
            }
        },
        Expr::App { f, args } => {
            let args: Vec<Expr> = args
                .into_iter()
                .map(|a| lift_expr(a, outer, scope, lambdas, lifted, count))
                .collect();
            match *f {
                // Call of a let-bound lambda: pass the captured variables.
                Expr::Var {
                    ref name,
                    qual: None,
                    pos,
                } if lambdas.contains_key(name) => {
                    let lam = &lambdas[name];
                    let mut full_args: Vec<Expr> = lam
                        .captured
                        .iter()
                        .map(|c| Expr::Var {
                            name: c.clone(),
                            qual: None,
                            pos,
                        })
                        .collect();
                    full_args.extend(args);
                    Expr::App {
                        f: Box::new(Expr::Var {
                            name: lam.lifted_name.clone(),
                            qual: None,
                            pos,
                        }),
                        args: full_args,
                    }
                }
                // Directly applied lambda.
                Expr::Lam {
                    params,
                    body,
                    pos: lam_pos,
                } => {
                    *count += 1;
                    let lifted_name = format!("{outer}$lam{}", lifted.len());
                    let captured = captured_vars(&body, &params, scope);
                    let mut inner_scope: Vec<String> =
                        captured.iter().chain(params.iter()).cloned().collect();
                    let body =
                        lift_expr(*body, outer, &mut inner_scope, lambdas, lifted, count);
                    let mut fn_params = captured.clone();
                    fn_params.extend(params.iter().cloned());
                    lifted.push(FunDef {
                        name: lifted_name.clone(),
                        pos: lam_pos,
                        params: fn_params,
                        body,
                        sig: None,
                    });
                    let mut full_args: Vec<Expr> = captured
                        .iter()
                        .map(|c| Expr::Var {
                            name: c.clone(),
                            qual: None,
                            pos: lam_pos,
                        })
                        .collect();
                    full_args.extend(args);
                    Expr::App {
                        f: Box::new(Expr::Var {
                            name: lifted_name,
                            qual: None,
                            pos: lam_pos,
                        }),
                        args: full_args,
                    }
                }
                f => Expr::App {
                    f: Box::new(lift_expr(f, outer, scope, lambdas, lifted, count)),
                    args,
                },
            }
        }
        Expr::Bin { op, lhs, rhs, pos } => Expr::Bin {
            op,
            lhs: Box::new(lift_expr(*lhs, outer, scope, lambdas, lifted, count)),
            rhs: Box::new(lift_expr(*rhs, outer, scope, lambdas, lifted, count)),
            pos,
        },
        Expr::If {
            cond,
            then,
            els,
            pos,
        } => Expr::If {
            cond: Box::new(lift_expr(*cond, outer, scope, lambdas, lifted, count)),
            then: Box::new(lift_expr(*then, outer, scope, lambdas, lifted, count)),
            els: Box::new(lift_expr(*els, outer, scope, lambdas, lifted, count)),
            pos,
        },
        Expr::Lam { params, body, pos } => {
            // Escaping lambdas were rejected by the type checker; keep the
            // node to avoid inventing a second error here.
            Expr::Lam { params, body, pos }
        }
        leaf => leaf,
    }
}

/// Free variables of a lambda body that are locals of the enclosing
/// function, in first-use order.
fn captured_vars(body: &Expr, params: &[String], scope: &[String]) -> Vec<String> {
    let mut captured = Vec::new();
    let mut bound: Vec<String> = params.to_vec();
    free_locals(body, scope, &mut bound, &mut captured);
    captured
}

fn free_locals(
    expr: &Expr,
    scope: &[String],
    bound: &mut Vec<String>,
    out: &mut Vec<String>,
) {
    match expr {
        Expr::Var {
            name, qual: None, ..
        } => {
            if scope.contains(name)
                && !bound.contains(name)
                && !out.contains(name)
            {
                out.push(name.clone());
            }
        }
        Expr::Var { .. } | Expr::Int(..) | Expr::Str(..) | Expr::Bool(..) => {}
        Expr::App { f, args } => {
            free_locals(f, scope, bound, out);
            for arg in args {
                free_locals(arg, scope, bound, out);
            }
        }
        Expr::Bin { lhs, rhs, .. } => {
            free_locals(lhs, scope, bound, out);
            free_locals(rhs, scope, bound, out);
        }
        Expr::If { cond, then, els, .. } => {
            free_locals(cond, scope, bound, out);
            free_locals(then, scope, bound, out);
            free_locals(els, scope, bound, out);
        }
        Expr::Let {
            name, value, body, ..
        } => {
            free_locals(value, scope, bound, out);
            bound.push(name.clone());
            free_locals(body, scope, bound, out);
            bound.pop();
        }
        Expr::Lam { params, body, .. } => {
            let depth = bound.len();
            bound.extend(params.iter().cloned());
            free_locals(body, scope, bound, out);
            bound.truncate(depth);
        }
    }
}

// ---- strictness-analysis --------------------------------------------------

/// The `strictness-analysis` pass: mark the parameters every evaluation
/// path forces. The marks end up in the symbol table and in the emitted
/// module metadata, where importing compilations can read them.
pub fn strictness_analysis(global: &mut Global) -> (&'static str, usize) {
    let funs: Vec<(String, Vec<String>, Expr)> = global
        .sub
        .defs
        .iter()
        .filter_map(|def| match def {
            Def::Fun(fun) => Some((fun.name.clone(), fun.params.clone(), fun.body.clone())),
            _ => None,
        })
        .collect();
    let count = funs.len();

    for (name, params, body) in funs {
        let demanded = demanded_vars(&body);
        let strict: Vec<bool> = params.iter().map(|p| demanded.contains(p)).collect();
        if let Some(sym) = global.sub.symtab.value_mut(&name) {
            if let SymKind::Fun { strict: slot, .. } = &mut sym.kind {
                *slot = strict;
            }
        }
    }
    ("functions", count)
}

/// Variables demanded on every evaluation path of `expr`.
fn demanded_vars(expr: &Expr) -> FxHashSet<String> {
    match expr {
        Expr::Int(..) | Expr::Str(..) | Expr::Bool(..) => FxHashSet::default(),
        Expr::Var {
            name, qual: None, ..
        } => {
            let mut set = FxHashSet::default();
            set.insert(name.clone());
            set
        }
        Expr::Var { .. } => FxHashSet::default(),
        Expr::App { args, .. } => {
            // Arguments are evaluated before the call in the strict target.
            let mut set = FxHashSet::default();
            for arg in args {
                set.extend(demanded_vars(arg));
            }
            set
        }
        Expr::Bin { lhs, rhs, .. } => {
            let mut set = demanded_vars(lhs);
            set.extend(demanded_vars(rhs));
            set
        }
        Expr::If { cond, then, els, .. } => {
            let mut set = demanded_vars(cond);
            let then_set = demanded_vars(then);
            let else_set = demanded_vars(els);
            set.extend(then_set.intersection(&else_set).cloned());
            set
        }
        Expr::Let {
            name, value, body, ..
        } => {
            let mut set = demanded_vars(value);
            let mut body_set = demanded_vars(body);
            body_set.remove(name);
            set.extend(body_set);
            set
        }
        // A lambda body only runs when called.
        Expr::Lam { .. } => FxHashSet::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testutil::analyzed_upto;

    fn fun_named<'a>(g: &'a crate::global::Global, name: &str) -> &'a FunDef {
        g.sub
            .defs
            .iter()
            .find_map(|d| match d {
                Def::Fun(f) if f.name == name => Some(f),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no function '{name}'"))
    }

    fn strict_of(g: &crate::global::Global, name: &str) -> Vec<bool> {
        match g.sub.symtab.value(name).map(|s| &s.kind) {
            Some(SymKind::Fun { strict, .. }) => strict.clone(),
            _ => panic!("no fun symbol '{name}'"),
        }
    }

    #[test]
    fn lets_float_to_the_front() {
        let g = analyzed_upto(
            "module T where\nmain = (let a = 1 in a) + (let b = 2 in b)\n",
            "simplify lets",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        let main = fun_named(&g, "main");
        // Two leading lets, then a let-free core.
        let Expr::Let { body, .. } = &main.body else {
            panic!("expected let chain, got {:?}", main.body);
        };
        let Expr::Let { body: inner, .. } = body.as_ref() else {
            panic!("expected second let");
        };
        assert!(matches!(inner.as_ref(), Expr::Bin { .. }));
    }

    #[test]
    fn colliding_floated_lets_are_renamed() {
        let g = analyzed_upto(
            "module T where\nmain = (let x = 1 in x) + (let x = 2 in x)\n",
            "simplify lets",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        let main = fun_named(&g, "main");
        let Expr::Let {
            name: first, body, ..
        } = &main.body
        else {
            panic!("expected let");
        };
        let Expr::Let { name: second, .. } = body.as_ref() else {
            panic!("expected second let");
        };
        assert_ne!(first, second);
    }

    #[test]
    fn unused_lets_are_dropped_with_a_hint() {
        let g = analyzed_upto("module T where\nmain = let dead = 1 in 42\n", "simplify lets");
        assert!(!g.has_errors());
        let main = fun_named(&g, "main");
        assert!(matches!(main.body, Expr::Int(42, _)));
        assert!(g
            .sub
            .messages
            .iter()
            .any(|m| m.text.contains("unused let binding 'dead'")));
    }

    #[test]
    fn constant_folding_reduces_literals() {
        let g = analyzed_upto(
            "module T where\nmain = if 1 + 1 == 2 then 6 * 7 else 0\n",
            "simplify expressions",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        let main = fun_named(&g, "main");
        assert!(matches!(main.body, Expr::Int(42, _)));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let g = analyzed_upto("module T where\nmain = 1 / 0\n", "simplify expressions");
        assert!(!g.has_errors());
        let main = fun_named(&g, "main");
        assert!(matches!(main.body, Expr::Bin { .. }));
    }

    #[test]
    fn let_bound_lambda_is_lifted() {
        let g = analyzed_upto(
            "module T where\n\
             scale :: Int -> Int\n\
             scale k = let f = \\x -> x * k in f 21\n",
            "globalize lambdas",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        // A lifted function exists and the call passes the captured `k`.
        let lifted = g
            .sub
            .defs
            .iter()
            .find_map(|d| match d {
                Def::Fun(f) if f.name.starts_with("scale$") => Some(f),
                _ => None,
            })
            .expect("lifted function");
        assert_eq!(lifted.params, vec!["k", "x"]);
        let scale = fun_named(&g, "scale");
        let Expr::App { args, .. } = &scale.body else {
            panic!("expected call, got {:?}", scale.body);
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn lifted_functions_are_typed() {
        let g = analyzed_upto(
            "module T where\n\
             scale :: Int -> Int\n\
             scale k = let f = \\x -> x * k in f 21\n",
            "globalize lambdas",
        );
        let lifted_name = g
            .sub
            .defs
            .iter()
            .find_map(|d| match d {
                Def::Fun(f) if f.name.starts_with("scale$") => Some(f.name.clone()),
                _ => None,
            })
            .unwrap();
        match g.sub.symtab.value(&lifted_name).map(|s| &s.kind) {
            Some(SymKind::Fun {
                checked: Some(funty),
                ..
            }) => {
                assert_eq!(funty.params.len(), 2);
            }
            other => panic!("lifted function not checked: {other:?}"),
        }
    }

    #[test]
    fn strictness_marks_demanded_params() {
        let g = analyzed_upto(
            "module T where\n\
             pick :: Bool -> Int -> Int -> Int\n\
             pick c a b = if c then a + 1 else b\n",
            "strictness analysis",
        );
        assert!(!g.has_errors(), "messages: {:?}", g.sub.messages);
        // c is always demanded; a and b only on one branch each.
        assert_eq!(strict_of(&g, "pick"), vec![true, false, false]);
    }

    #[test]
    fn strictness_sees_through_lets() {
        let g = analyzed_upto(
            "module T where\n\
             f :: Int -> Int\n\
             f x = let y = x + 1 in y\n",
            "strictness analysis",
        );
        assert_eq!(strict_of(&g, "f"), vec![true]);
    }
}

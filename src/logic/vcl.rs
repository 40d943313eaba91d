//! VCL rendering of edge logic programs.

use std::fmt::Write;

use crate::logic::ir::{Builtin, CmpOp, Expr, Place, Program, Scope, Stmt, VarType};
use crate::logic::Renderer;

const INDENT: &str = "  ";

/// Renders programs as Fastly-flavoured VCL snippet text.
#[derive(Debug, Clone, Copy, Default)]
pub struct VclRenderer;

impl VclRenderer {
    fn stmts(&self, out: &mut String, stmts: &[Stmt], depth: usize) {
        for stmt in stmts {
            self.stmt(out, stmt, depth);
        }
    }

    fn stmt(&self, out: &mut String, stmt: &Stmt, depth: usize) {
        let pad = INDENT.repeat(depth);
        match stmt {
            Stmt::Declare(name, ty) => {
                let ty = match ty {
                    VarType::Integer => "INTEGER",
                    VarType::String => "STRING",
                };
                let _ = writeln!(out, "{pad}declare local var.{name} {ty};");
            }
            Stmt::Set(place, value) => {
                let _ = writeln!(out, "{pad}set {} = {};", place_text(place), expr(value));
            }
            Stmt::AddAssign(name, value) => {
                let _ = writeln!(out, "{pad}set var.{name} += {};", expr(value));
            }
            Stmt::If { branches, otherwise } => {
                for (i, (cond, body)) in branches.iter().enumerate() {
                    if i == 0 {
                        let _ = writeln!(out, "{pad}if ({}) {{", condition(cond));
                    } else {
                        let _ = writeln!(out, "{pad}}} else if ({}) {{", condition(cond));
                    }
                    self.stmts(out, body, depth + 1);
                }
                if let Some(body) = otherwise {
                    if branches.is_empty() {
                        let _ = writeln!(out, "{pad}{{");
                    } else {
                        let _ = writeln!(out, "{pad}}} else {{");
                    }
                    self.stmts(out, body, depth + 1);
                }
                if !branches.is_empty() || otherwise.is_some() {
                    let _ = writeln!(out, "{pad}}}");
                }
            }
            Stmt::Raw(text) => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    let _ = writeln!(out, "{pad}{}", line.trim_end());
                }
            }
        }
    }
}

impl Renderer for VclRenderer {
    fn render(&self, program: &Program) -> String {
        let mut out = String::new();
        self.stmts(&mut out, &program.stmts, 0);
        out
    }
}

fn scope_prefix(scope: Scope) -> &'static str {
    match scope {
        Scope::Req => "req",
        Scope::Beresp => "beresp",
        Scope::Resp => "resp",
    }
}

fn place_text(place: &Place) -> String {
    match place {
        Place::Var(name) => format!("var.{name}"),
        Place::Header(scope, name) => format!("{}.http.{name}", scope_prefix(*scope)),
        Place::ReqBackend => "req.backend".to_string(),
        Place::BereqUrl => "bereq.url".to_string(),
        Place::BerespCacheable => "beresp.cacheable".to_string(),
    }
}

/// Plain strings decode `%xx` escapes and cannot hold `"`; anything with
/// either goes into a long string, delimited when it contains `"}`.
fn string_literal(s: &str) -> String {
    if !s.contains(['"', '%']) {
        return format!("\"{s}\"");
    }
    let mut delimiter = String::new();
    while s.contains(&format!("\"{delimiter}}}")) {
        delimiter.push('E');
    }
    format!("{{{delimiter}\"{s}\"{delimiter}}}")
}

/// Top-level condition: no redundant outer parentheses.
fn condition(e: &Expr) -> String {
    match e {
        Expr::And(items) => join(items, " && "),
        Expr::Or(items) => join(items, " || "),
        other => expr(other),
    }
}

fn join(items: &[Expr], sep: &str) -> String {
    items.iter().map(expr).collect::<Vec<_>>().join(sep)
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Str(s) => string_literal(s),
        Expr::Bool(b) => b.to_string(),
        Expr::Var(name) => format!("var.{name}"),
        Expr::Header(scope, name) => format!("{}.http.{name}", scope_prefix(*scope)),
        Expr::Builtin(Builtin::ReqUrl) => "req.url".to_string(),
        Expr::Builtin(Builtin::ReqBackend) => "req.backend".to_string(),
        Expr::Builtin(Builtin::BereqUrl) => "bereq.url".to_string(),
        Expr::Backend(name) => name.clone(),
        Expr::BackendHealthy(name) => format!("backend.{name}.healthy"),
        Expr::RandomInt(low, high) => format!("randomint({low}, {high})"),
        Expr::Atoi(inner) => format!("std.atoi({})", expr(inner)),
        Expr::TableLookup {
            table,
            key,
            default,
        } => format!(
            "table.lookup({table}, {}, {})",
            string_literal(key),
            string_literal(default)
        ),
        Expr::Subfield {
            source,
            key,
            separator,
        } => format!(
            "subfield({}, {}, {})",
            expr(source),
            string_literal(key),
            string_literal(separator)
        ),
        Expr::RegSub {
            input,
            pattern,
            replacement,
        } => format!(
            "regsub({}, {}, {})",
            expr(input),
            string_literal(pattern),
            string_literal(replacement)
        ),
        Expr::RegexGroup(n) => format!("re.group.{n}"),
        Expr::Concat(parts) if parts.is_empty() => "\"\"".to_string(),
        Expr::Concat(parts) => join(parts, " + "),
        Expr::Compare(op, lhs, rhs) => {
            let op = match op {
                CmpOp::Eq => "==",
                CmpOp::Le => "<=",
            };
            format!("{} {op} {}", expr(lhs), expr(rhs))
        }
        Expr::Matches {
            subject,
            pattern,
            negated,
        } => {
            let op = if *negated { "!~" } else { "~" };
            format!("{} {op} {}", expr(subject), string_literal(pattern))
        }
        Expr::And(items) => format!("({})", join(items, " && ")),
        Expr::Or(items) => format!("({})", join(items, " || ")),
    }
}

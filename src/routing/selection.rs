//! Health-aware weighted backend selection.
//!
//! # Responsibilities
//! - Compile deployers + priority table into a [`SelectionPlan`]
//! - Evaluate the plan in-process (pure, for tests and simulation)
//! - Lower the plan to edge logic IR for the recv phase
//!
//! # Selection rule
//! ```text
//! r ← uniform [0, 100)
//! for each target t at index i, in order:
//!     (r <= threshold[i] && healthy(t) && no override) || override == key(t)
//!         → select t
//! nothing matched → target 0, unconditionally, plus its fallback logic
//! ```
//!
//! An override that names no known target disables every weighted branch,
//! so such requests land on target 0.

use crate::logic::ir::{CmpOp, Expr, Place, Program, Scope, Stmt, VarType};
use crate::routing::deployer::Deployer;
use crate::routing::weights::{resolve_weights, PriorityTable};
use crate::routing::CompileError;

/// Name of the edge lookup table holding priorities.
pub const PRIORITY_TABLE: &str = "priorities";

/// Request header carrying the space-joined health snapshot.
pub const HEALTH_HEADER: &str = "X-Backend-Health";

/// Sub-field of the sticky override header naming the pinned target.
pub const OVERRIDE_KEY: &str = "env";

/// Separator between `key=value` pairs in the sticky override header.
pub const OVERRIDE_SEPARATOR: char = '&';

/// Exclusive upper bound of the random draw.
pub const DRAW_RANGE: u32 = 100;

const DRAW_VAR: &str = "draw";
const WEIGHT_VAR_PREFIX: &str = "weight_";

/// One selectable target in a compiled plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    /// Lower-cased name: table key, local suffix, override token.
    pub key: String,
    pub backend: String,
    pub weight: i64,
    pub threshold: i64,
}

impl Candidate {
    fn weight_var(&self) -> String {
        format!("{WEIGHT_VAR_PREFIX}{}", self.key)
    }
}

/// Per-request inputs to selection.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Random draw in `[0, 100)`.
    pub draw: u32,
    /// Health of each target, in descriptor order. Missing entries are unhealthy.
    pub health: &'a [bool],
    /// Raw value of the sticky override header, if present.
    pub version_lock: Option<&'a str>,
}

/// Outcome of evaluating a plan for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub name: String,
    /// Health booleans as the edge stringifies them (`1`/`0`), space-joined.
    pub health_snapshot: String,
    /// True when no branch matched and the fallback logic ran.
    pub fallback: bool,
}

/// Compiled weighted selection for one routing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPlan {
    candidates: Vec<Candidate>,
    default_weight: i64,
    fallback_logic: String,
    lock_header: String,
}

impl SelectionPlan {
    pub fn compile(
        deployers: &[Deployer],
        priorities: &PriorityTable,
        lock_header: &str,
    ) -> Result<Self, CompileError> {
        let first = deployers.first().ok_or(CompileError::NoDeployers)?;
        super::check_names(deployers)?;

        let weights = resolve_weights(deployers, priorities);
        let candidates = deployers
            .iter()
            .zip(weights.weights.iter().zip(&weights.thresholds))
            .map(|(d, (weight, threshold))| Candidate {
                name: d.name().to_string(),
                key: d.key(),
                backend: d.backend_ref(),
                weight: *weight,
                threshold: *threshold,
            })
            .collect();

        Ok(Self {
            candidates,
            default_weight: weights.default_weight,
            fallback_logic: first.fallback_logic().to_string(),
            lock_header: lock_header.to_string(),
        })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn default_weight(&self) -> i64 {
        self.default_weight
    }

    pub fn lock_header(&self) -> &str {
        &self.lock_header
    }

    /// Evaluate the plan for one request. Pure in its inputs.
    pub fn select(&self, ctx: RequestContext<'_>) -> Selection {
        let health_snapshot = self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, _)| if healthy_at(ctx.health, i) { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(" ");

        let token = ctx.version_lock.and_then(override_token);

        let matched = self.candidates.iter().enumerate().find(|(i, c)| {
            let weighted = i64::from(ctx.draw) <= c.threshold && healthy_at(ctx.health, *i) && token.is_none();
            let pinned = token == Some(c.key.as_str());
            weighted || pinned
        });

        match matched {
            Some((index, c)) => Selection {
                index,
                name: c.name.clone(),
                health_snapshot,
                fallback: false,
            },
            None => Selection {
                index: 0,
                name: self.candidates[0].name.clone(),
                health_snapshot,
                fallback: true,
            },
        }
    }

    /// Lower the plan to a recv-phase program.
    pub fn to_program(&self) -> Program {
        let mut program = Program::new();

        for c in &self.candidates {
            program.push(Stmt::Declare(c.weight_var(), VarType::Integer));
        }
        for c in &self.candidates {
            program.push(Stmt::set_var(
                c.weight_var(),
                Expr::Atoi(Box::new(Expr::TableLookup {
                    table: PRIORITY_TABLE.to_string(),
                    key: c.key.clone(),
                    default: c.weight.to_string(),
                })),
            ));
        }
        for pair in self.candidates.windows(2) {
            program.push(Stmt::AddAssign(pair[1].weight_var(), Expr::var(pair[0].weight_var())));
        }

        program
            .push(Stmt::Declare(DRAW_VAR.to_string(), VarType::Integer))
            .push(Stmt::set_var(DRAW_VAR, Expr::RandomInt(0, i64::from(DRAW_RANGE) - 1)));

        let mut health = Vec::new();
        for (i, c) in self.candidates.iter().enumerate() {
            if i > 0 {
                health.push(Expr::str(" "));
            }
            health.push(Expr::BackendHealthy(c.backend.clone()));
        }
        program.push(Stmt::Set(
            Place::Header(Scope::Req, HEALTH_HEADER.to_string()),
            Expr::Concat(health),
        ));

        let token = || Expr::Subfield {
            source: Box::new(Expr::req_header(&self.lock_header)),
            key: OVERRIDE_KEY.to_string(),
            separator: OVERRIDE_SEPARATOR.to_string(),
        };

        let branches = self
            .candidates
            .iter()
            .map(|c| {
                let weighted = Expr::And(vec![
                    Expr::compare(CmpOp::Le, Expr::var(DRAW_VAR), Expr::var(c.weight_var())),
                    Expr::BackendHealthy(c.backend.clone()),
                    Expr::not_matches(token(), "."),
                ]);
                let pinned = Expr::eq(token(), Expr::str(&c.key));
                (
                    Expr::Or(vec![weighted, pinned]),
                    vec![Stmt::Set(Place::ReqBackend, Expr::Backend(c.backend.clone()))],
                )
            })
            .collect();

        let mut otherwise = vec![Stmt::Set(
            Place::ReqBackend,
            Expr::Backend(self.candidates[0].backend.clone()),
        )];
        if !self.fallback_logic.trim().is_empty() {
            otherwise.push(Stmt::Raw(self.fallback_logic.clone()));
        }

        program.push(Stmt::If {
            branches,
            otherwise: Some(otherwise),
        });
        program
    }
}

fn healthy_at(health: &[bool], index: usize) -> bool {
    health.get(index).copied().unwrap_or(false)
}

/// Value of `key` in a list of `key=value` pairs split on `separator`.
///
/// A key present without `=` yields an empty value.
pub fn subfield<'a>(source: &'a str, key: &str, separator: char) -> Option<&'a str> {
    source.split(separator).find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == key).then_some(v)
    })
}

/// The override token in a sticky override header; empty counts as absent.
pub fn override_token(header: &str) -> Option<&str> {
    subfield(header, OVERRIDE_KEY, OVERRIDE_SEPARATOR).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Renderer, VclRenderer};
    use crate::routing::deployer::UrlTemplate;

    const LOCK: &str = "X-OW-Version-Lock";

    fn deployers(names: &[&str]) -> Vec<Deployer> {
        names
            .iter()
            .map(|n| {
                Deployer::new(*n, format!("{}.example.com", n.to_lowercase()), UrlTemplate::parse("{rest}").unwrap())
            })
            .collect()
    }

    fn ctx<'a>(draw: u32, health: &'a [bool], lock: Option<&'a str>) -> RequestContext<'a> {
        RequestContext {
            draw,
            health,
            version_lock: lock,
        }
    }

    #[test]
    fn test_even_split_selects_middle() {
        let plan = SelectionPlan::compile(&deployers(&["A", "B", "C"]), &PriorityTable::new(), LOCK).unwrap();
        let thresholds: Vec<i64> = plan.candidates().iter().map(|c| c.threshold).collect();
        assert_eq!(thresholds, vec![33, 66, 99]);

        let s = plan.select(ctx(50, &[true, true, true], None));
        assert_eq!(s.name, "B");
        assert_eq!(s.health_snapshot, "1 1 1");
        assert!(!s.fallback);
    }

    #[test]
    fn test_priority_table_draws() {
        let table = PriorityTable::new().with("a", 90);
        let plan = SelectionPlan::compile(&deployers(&["a", "b"]), &table, LOCK).unwrap();
        for r in 0..90 {
            assert_eq!(plan.select(ctx(r, &[true, true], None)).name, "a");
        }
        assert_eq!(plan.select(ctx(95, &[true, true], None)).name, "b");
    }

    #[test]
    fn test_negative_weight_never_wins_a_draw() {
        let table = PriorityTable::new().with("a", -5);
        let plan = SelectionPlan::compile(&deployers(&["a", "b"]), &table, LOCK).unwrap();
        for r in 0..=45 {
            assert_eq!(plan.select(ctx(r, &[true, true], None)).name, "b");
        }
        assert!(plan.select(ctx(46, &[true, true], None)).fallback);
    }

    #[test]
    fn test_unhealthy_skipped() {
        let plan = SelectionPlan::compile(&deployers(&["A", "B", "C"]), &PriorityTable::new(), LOCK).unwrap();
        let s = plan.select(ctx(10, &[false, true, true], None));
        assert_eq!(s.name, "B");
        assert_eq!(s.health_snapshot, "0 1 1");
    }

    #[test]
    fn test_all_unhealthy_falls_back_to_first() {
        let mut ds = deployers(&["A", "B"]);
        ds[0] = ds[0].clone().with_fallback_logic("set req.http.X-Fallback = \"1\";");
        let plan = SelectionPlan::compile(&ds, &PriorityTable::new(), LOCK).unwrap();
        for r in [0, 49, 50, 99] {
            let s = plan.select(ctx(r, &[false, false], None));
            assert_eq!(s.index, 0);
            assert!(s.fallback);
        }
        let vcl = VclRenderer.render(&plan.to_program());
        assert!(vcl.contains("set req.http.X-Fallback = \"1\";"));
    }

    #[test]
    fn test_draw_beyond_total_falls_back() {
        let plan = SelectionPlan::compile(&deployers(&["A", "B", "C"]), &PriorityTable::new(), LOCK).unwrap();
        let s = plan.select(ctx(99, &[true, true, true], None));
        assert_eq!(s.name, "C");
        let s = plan.select(ctx(99, &[true, true, false], None));
        assert_eq!(s.name, "A");
        assert!(s.fallback);
    }

    #[test]
    fn test_override_pins_target_regardless_of_draw() {
        let plan = SelectionPlan::compile(&deployers(&["A", "B", "C"]), &PriorityTable::new(), LOCK).unwrap();
        for r in 0..DRAW_RANGE {
            let s = plan.select(ctx(r, &[true, true, true], Some("foo=bar&env=c")));
            assert_eq!(s.name, "C");
        }
        // pinning bypasses health as well
        let s = plan.select(ctx(0, &[true, true, false], Some("env=c")));
        assert_eq!(s.name, "C");
    }

    #[test]
    fn test_unknown_override_falls_back() {
        let plan = SelectionPlan::compile(&deployers(&["A", "B"]), &PriorityTable::new(), LOCK).unwrap();
        let s = plan.select(ctx(70, &[true, true], Some("env=staging")));
        assert_eq!(s.index, 0);
        assert!(s.fallback);
    }

    #[test]
    fn test_empty_override_is_absent() {
        let plan = SelectionPlan::compile(&deployers(&["A", "B"]), &PriorityTable::new(), LOCK).unwrap();
        let s = plan.select(ctx(70, &[true, true], Some("env=&x=1")));
        assert_eq!(s.name, "B");
        assert!(!s.fallback);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let plan = SelectionPlan::compile(&deployers(&["A", "B", "C"]), &PriorityTable::new(), LOCK).unwrap();
        let health = [true, false, true];
        for r in 0..DRAW_RANGE {
            let first = plan.select(ctx(r, &health, Some("x=1")));
            for _ in 0..3 {
                assert_eq!(plan.select(ctx(r, &health, Some("x=1"))), first);
            }
        }
    }

    #[test]
    fn test_subfield() {
        assert_eq!(subfield("a=1&env=prod", "env", '&'), Some("prod"));
        assert_eq!(subfield("env&a=1", "env", '&'), Some(""));
        assert_eq!(subfield("a=1", "env", '&'), None);
        assert_eq!(override_token("env="), None);
    }

    #[test]
    fn test_no_deployers() {
        assert_eq!(
            SelectionPlan::compile(&[], &PriorityTable::new(), LOCK),
            Err(CompileError::NoDeployers)
        );
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = SelectionPlan::compile(&deployers(&["Prod", "prod"]), &PriorityTable::new(), LOCK);
        assert_eq!(result, Err(CompileError::DuplicateName("prod".into())));
    }

    #[test]
    fn test_rendered_recv_logic() {
        let table = PriorityTable::new().with("a", 90);
        let plan = SelectionPlan::compile(&deployers(&["a", "b"]), &table, LOCK).unwrap();
        let vcl = VclRenderer.render(&plan.to_program());

        assert!(vcl.contains("set var.weight_a = std.atoi(table.lookup(priorities, \"a\", \"90\"));"));
        assert!(vcl.contains("set var.weight_b = std.atoi(table.lookup(priorities, \"b\", \"50\"));"));
        assert!(vcl.contains("set var.weight_b += var.weight_a;"));
        assert!(vcl.contains("set var.draw = randomint(0, 99);"));
        assert!(vcl.contains("set req.http.X-Backend-Health = backend.F_a.healthy + \" \" + backend.F_b.healthy;"));
        assert!(vcl.contains(
            "if ((var.draw <= var.weight_a && backend.F_a.healthy && subfield(req.http.X-OW-Version-Lock, \"env\", \"&\") !~ \".\") || subfield(req.http.X-OW-Version-Lock, \"env\", \"&\") == \"a\") {"
        ));
        assert!(vcl.contains("} else {\n  set req.backend = F_a;\n}"));
    }
}

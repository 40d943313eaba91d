//! Assembly of the complete edge logic for one routing set.
//!
//! # Units
//! ```text
//! backend            recv     weighted selection, override, fallback
//! missurl            miss     path parse + per-backend URL rewrite
//! passurl            pass     same rewrite, for bypassed requests
//! logurl             fetch    diagnostic headers, response not cacheable
//! stashsurrogates    fetch    Surrogate-* → X-Surrogate-*
//! restoresurrogates  deliver  X-Surrogate-* → Surrogate-*
//! ```
//!
//! Synthesis is pure: same deployers and priorities, same text.

use crate::logic::ir::{Builtin, Expr, Place, Program, Scope, Stmt};
use crate::logic::{Renderer, VclRenderer};
use crate::platform::resources::{SnippetPhase, SnippetSpec};
use crate::routing::deployer::Deployer;
use crate::routing::rewrite::RewritePlan;
use crate::routing::selection::{SelectionPlan, HEALTH_HEADER};
use crate::routing::weights::PriorityTable;
use crate::routing::CompileError;

pub const BACKEND_UNIT: &str = "backend";
pub const MISS_URL_UNIT: &str = "missurl";
pub const PASS_URL_UNIT: &str = "passurl";
pub const LOG_URL_UNIT: &str = "logurl";
pub const STASH_SURROGATES_UNIT: &str = "stashsurrogates";
pub const RESTORE_SURROGATES_UNIT: &str = "restoresurrogates";

/// Response header naming the selected backend.
pub const BACKEND_NAME_HEADER: &str = "X-Backend-Name";
/// Response header carrying the rewritten upstream URL.
pub const BACKEND_URL_HEADER: &str = "X-Backend-URL";

const SURROGATE_HEADERS: [&str; 2] = ["Surrogate-Key", "Surrogate-Control"];

/// One rendered piece of edge logic, bound to a request phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicUnit {
    pub name: &'static str,
    pub phase: SnippetPhase,
    pub content: String,
}

impl LogicUnit {
    pub fn to_snippet(&self) -> SnippetSpec {
        SnippetSpec::new(self.name, self.phase, self.content.clone())
    }
}

/// Everything the deployer installs for one routing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicBundle {
    pub selection: SelectionPlan,
    pub rewrite: RewritePlan,
    pub units: Vec<LogicUnit>,
}

impl LogicBundle {
    pub fn unit(&self, name: &str) -> Option<&LogicUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn snippets(&self) -> Vec<SnippetSpec> {
        self.units.iter().map(LogicUnit::to_snippet).collect()
    }
}

/// Compiles routing plans and renders them into logic units.
#[derive(Debug)]
pub struct Synthesizer<R: Renderer = VclRenderer> {
    renderer: R,
    lock_header: String,
}

impl Synthesizer<VclRenderer> {
    pub fn vcl(lock_header: impl Into<String>) -> Self {
        Self::new(VclRenderer, lock_header)
    }
}

impl<R: Renderer> Synthesizer<R> {
    pub fn new(renderer: R, lock_header: impl Into<String>) -> Self {
        Self {
            renderer,
            lock_header: lock_header.into(),
        }
    }

    pub fn synthesize(
        &self,
        deployers: &[Deployer],
        priorities: &PriorityTable,
    ) -> Result<LogicBundle, CompileError> {
        let selection = SelectionPlan::compile(deployers, priorities, &self.lock_header)?;
        let rewrite = RewritePlan::compile(deployers)?;

        let recv = self.renderer.render(&selection.to_program());
        let url = self.renderer.render(&rewrite.to_program());

        let units = vec![
            LogicUnit {
                name: BACKEND_UNIT,
                phase: SnippetPhase::Recv,
                content: recv,
            },
            LogicUnit {
                name: MISS_URL_UNIT,
                phase: SnippetPhase::Miss,
                content: url.clone(),
            },
            LogicUnit {
                name: PASS_URL_UNIT,
                phase: SnippetPhase::Pass,
                content: url,
            },
            LogicUnit {
                name: LOG_URL_UNIT,
                phase: SnippetPhase::Fetch,
                content: self.renderer.render(&diagnostics_program()),
            },
            LogicUnit {
                name: STASH_SURROGATES_UNIT,
                phase: SnippetPhase::Fetch,
                content: self.renderer.render(&stash_surrogates_program()),
            },
            LogicUnit {
                name: RESTORE_SURROGATES_UNIT,
                phase: SnippetPhase::Deliver,
                content: self.renderer.render(&restore_surrogates_program()),
            },
        ];

        tracing::debug!(
            deployers = deployers.len(),
            units = units.len(),
            "Synthesized gateway logic"
        );

        Ok(LogicBundle {
            selection,
            rewrite,
            units,
        })
    }
}

fn diagnostics_program() -> Program {
    Program::from(vec![
        Stmt::Set(
            Place::Header(Scope::Beresp, BACKEND_URL_HEADER.to_string()),
            Expr::Builtin(Builtin::BereqUrl),
        ),
        Stmt::Set(
            Place::Header(Scope::Beresp, BACKEND_NAME_HEADER.to_string()),
            Expr::Builtin(Builtin::ReqBackend),
        ),
        Stmt::Set(
            Place::Header(Scope::Beresp, HEALTH_HEADER.to_string()),
            Expr::req_header(HEALTH_HEADER),
        ),
        Stmt::Set(Place::BerespCacheable, Expr::Bool(false)),
    ])
}

fn stash_surrogates_program() -> Program {
    SURROGATE_HEADERS
        .iter()
        .map(|h| {
            Stmt::Set(
                Place::Header(Scope::Beresp, format!("X-{h}")),
                Expr::Header(Scope::Beresp, h.to_string()),
            )
        })
        .collect::<Vec<_>>()
        .into()
}

fn restore_surrogates_program() -> Program {
    SURROGATE_HEADERS
        .iter()
        .map(|h| {
            Stmt::Set(
                Place::Header(Scope::Resp, h.to_string()),
                Expr::Header(Scope::Resp, format!("X-{h}")),
            )
        })
        .collect::<Vec<_>>()
        .into()
}

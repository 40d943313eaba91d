//! Edge logic generation.
//!
//! # Data Flow
//! ```text
//! SelectionPlan / RewritePlan (routing)
//!     → ir.rs (statement/expression tree)
//!     → Renderer (vcl.rs for Fastly-style edges)
//!     → snippet text handed to the synthesizer
//! ```
//!
//! # Design Decisions
//! - Routing algorithms never build strings directly; they lower to IR
//! - Renderers are pure and swappable per edge platform

pub mod ir;
pub mod vcl;

pub use ir::{Expr, Program, Stmt};
pub use vcl::VclRenderer;

/// Turns an IR program into platform-specific text.
pub trait Renderer: Send + Sync + std::fmt::Debug {
    fn render(&self, program: &Program) -> String;
}

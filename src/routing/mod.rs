//! Routing compilation subsystem.
//!
//! # Data Flow
//! ```text
//! Deployer[] + PriorityTable
//!     → weights.rs (per-target weight, cumulative thresholds)
//!     → selection.rs (health-aware weighted choice, override, fallback)
//!     → rewrite.rs (path parsing, per-backend URL templates)
//!     → plans lowered to logic IR, rendered by the synthesizer
//! ```
//!
//! # Design Decisions
//! - Plans are recompiled from the live descriptor list every time
//! - Deterministic: same descriptors and table always yield the same plan
//! - First matching target wins; target 0 is the unconditional fallback

use std::collections::HashSet;

use thiserror::Error;

pub mod deployer;
pub mod rewrite;
pub mod selection;
pub mod weights;

pub use deployer::{Deployer, UrlTemplate};
pub use rewrite::{PathFields, RewritePlan};
pub use selection::{RequestContext, Selection, SelectionPlan};
pub use weights::{resolve_weights, PriorityTable, Weights};

/// Errors raised while compiling a routing set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("routing set has no deployers")]
    NoDeployers,

    /// Name is not usable as an edge identifier.
    #[error("deployer name '{0}' must start with a letter and contain only letters, digits or '_'")]
    InvalidName(String),

    /// Two deployers collide once lower-cased.
    #[error("duplicate deployer name '{0}'")]
    DuplicateName(String),
}

/// `[A-Za-z][A-Za-z0-9_]*`: names end up in generated locals and backend refs.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_names(deployers: &[Deployer]) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for d in deployers {
        if !is_identifier(d.name()) {
            return Err(CompileError::InvalidName(d.name().to_string()));
        }
        let key = d.key();
        if !seen.insert(key.clone()) {
            return Err(CompileError::DuplicateName(key));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(names: &[&str]) -> Vec<Deployer> {
        names
            .iter()
            .map(|n| Deployer::new(*n, "example.com", UrlTemplate::parse("{rest}").unwrap()))
            .collect()
    }

    #[test]
    fn test_identifier_rule() {
        for ok in ["a", "Blue", "prod_2", "X9"] {
            assert!(is_identifier(ok), "{ok}");
        }
        for bad in ["", "my-app", "2fast", "_x", "a b", "é"] {
            assert!(!is_identifier(bad), "{bad}");
        }
    }

    #[test]
    fn test_invalid_name_rejected_before_rendering() {
        let deployers = named(&["my-app", "b"]);
        let err = CompileError::InvalidName("my-app".into());
        assert_eq!(check_names(&deployers), Err(err.clone()));
        assert_eq!(
            SelectionPlan::compile(&deployers, &PriorityTable::new(), "X-OW-Version-Lock"),
            Err(err.clone())
        );
        assert_eq!(RewritePlan::compile(&deployers), Err(err));
    }

    #[test]
    fn test_duplicate_after_lower_casing() {
        assert_eq!(
            check_names(&named(&["Prod", "prod"])),
            Err(CompileError::DuplicateName("prod".into()))
        );
    }
}

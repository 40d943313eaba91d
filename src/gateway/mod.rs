//! Gateway synthesis and deployment subsystem.
//!
//! # Data Flow
//! ```text
//! Deployer[] + PriorityTable
//!     → synthesizer.rs (compile plans, render six logic units)
//!     → plan.rs (resources + dependency edges, topological layers)
//!     → transaction.rs (draft version, layered writes, Ready or Aborted)
//!     → EdgePlatform (remote API)
//! ```
//!
//! # Design Decisions
//! - Everything up to the first remote call is pure and testable offline
//! - The remote side only ever sees a draft; activation is a separate step
//! - A failed attempt reports the resource and state where it stopped

pub mod plan;
pub mod synthesizer;
pub mod transaction;

pub use plan::{PlanError, PlannedResource, ProvisioningPlan, ResourceId, ResourceSpec};
pub use synthesizer::{LogicBundle, LogicUnit, Synthesizer};
pub use transaction::{DeployError, DeployReport, DeployState, TransactionalDeployer};

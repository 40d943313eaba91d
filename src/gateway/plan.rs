//! Provisioning plan: every remote resource of a deployment and the
//! dependencies between them.
//!
//! # Dependencies
//! ```text
//! condition "false"     ─┐
//! <name>Check ───────────┴→ backend <name> ─┐
//! dictionary "priorities" ──────────────────┴→ logic units
//! ```
//!
//! The deployer walks [`ProvisioningPlan::layers`]: each layer only depends
//! on earlier ones, so health checks are always in place before the
//! backends that reference them.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::gateway::synthesizer::LogicBundle;
use crate::platform::resources::{
    BackendSpec, ConditionSpec, DictionarySpec, HealthCheckSpec, SnippetSpec,
};
use crate::routing::deployer::Deployer;
use crate::routing::selection::PRIORITY_TABLE;

/// Identity of a remote resource inside one draft version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    Condition(String),
    Dictionary(String),
    HealthCheck(String),
    Backend(String),
    Snippet(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Condition(n) => write!(f, "condition/{n}"),
            ResourceId::Dictionary(n) => write!(f, "dictionary/{n}"),
            ResourceId::HealthCheck(n) => write!(f, "healthcheck/{n}"),
            ResourceId::Backend(n) => write!(f, "backend/{n}"),
            ResourceId::Snippet(n) => write!(f, "snippet/{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSpec {
    Condition(ConditionSpec),
    Dictionary(DictionarySpec),
    HealthCheck(HealthCheckSpec),
    Backend(BackendSpec),
    Snippet(SnippetSpec),
}

impl ResourceSpec {
    pub fn id(&self) -> ResourceId {
        match self {
            ResourceSpec::Condition(s) => ResourceId::Condition(s.name.clone()),
            ResourceSpec::Dictionary(s) => ResourceId::Dictionary(s.name.clone()),
            ResourceSpec::HealthCheck(s) => ResourceId::HealthCheck(s.name.clone()),
            ResourceSpec::Backend(s) => ResourceId::Backend(s.name.clone()),
            ResourceSpec::Snippet(s) => ResourceId::Snippet(s.name.clone()),
        }
    }

    /// Logic units embed the resolved target list and are written one by one.
    pub fn is_logic(&self) -> bool {
        matches!(self, ResourceSpec::Snippet(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedResource {
    pub spec: ResourceSpec,
    pub depends_on: Vec<ResourceId>,
}

impl PlannedResource {
    pub fn id(&self) -> ResourceId {
        self.spec.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{resource} depends on {dependency}, which is not in the plan")]
    MissingDependency {
        resource: ResourceId,
        dependency: ResourceId,
    },

    #[error("dependency cycle among {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<ResourceId>),

    #[error("{0} is planned more than once")]
    Duplicate(ResourceId),
}

/// Ordered set of resources with declared dependency edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningPlan {
    resources: Vec<PlannedResource>,
}

impl ProvisioningPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan every resource needed to serve `bundle` from `deployers`.
    pub fn build(deployers: &[Deployer], bundle: &LogicBundle, check_path: &str) -> Self {
        let mut plan = Self::new();

        let condition = ConditionSpec::always_false();
        let condition_id = ResourceId::Condition(condition.name.clone());
        plan.add(ResourceSpec::Condition(condition), vec![]);

        let dictionary_id = ResourceId::Dictionary(PRIORITY_TABLE.to_string());
        plan.add(ResourceSpec::Dictionary(DictionarySpec::new(PRIORITY_TABLE)), vec![]);

        for d in deployers {
            plan.add(
                ResourceSpec::HealthCheck(HealthCheckSpec::for_deployer(d, check_path)),
                vec![],
            );
        }

        let mut backend_ids = Vec::with_capacity(deployers.len());
        for d in deployers {
            let spec = BackendSpec::for_deployer(d);
            let deps = vec![
                ResourceId::HealthCheck(spec.healthcheck.clone()),
                condition_id.clone(),
            ];
            backend_ids.push(ResourceId::Backend(spec.name.clone()));
            plan.add(ResourceSpec::Backend(spec), deps);
        }

        let mut logic_deps = backend_ids;
        logic_deps.push(dictionary_id);
        for snippet in bundle.snippets() {
            plan.add(ResourceSpec::Snippet(snippet), logic_deps.clone());
        }

        plan
    }

    pub fn add(&mut self, spec: ResourceSpec, depends_on: Vec<ResourceId>) -> &mut Self {
        self.resources.push(PlannedResource { spec, depends_on });
        self
    }

    pub fn resources(&self) -> &[PlannedResource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Topological layers. Every resource appears after all of its
    /// dependencies; within a layer, plan order is kept.
    pub fn layers(&self) -> Result<Vec<Vec<&PlannedResource>>, PlanError> {
        let mut ids = HashSet::new();
        for r in &self.resources {
            if !ids.insert(r.id()) {
                return Err(PlanError::Duplicate(r.id()));
            }
        }
        for r in &self.resources {
            if let Some(dep) = r.depends_on.iter().find(|d| !ids.contains(*d)) {
                return Err(PlanError::MissingDependency {
                    resource: r.id(),
                    dependency: dep.clone(),
                });
            }
        }

        let mut placed: HashSet<ResourceId> = HashSet::new();
        let mut remaining: Vec<&PlannedResource> = self.resources.iter().collect();
        let mut layers = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|r| r.depends_on.iter().all(|d| placed.contains(d)));

            if ready.is_empty() {
                return Err(PlanError::Cycle(blocked.iter().map(|r| r.id()).collect()));
            }

            placed.extend(ready.iter().map(|r| r.id()));
            layers.push(ready);
            remaining = blocked;
        }

        Ok(layers)
    }
}

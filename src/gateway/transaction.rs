//! Transactional deployment of a routing set into a draft version.
//!
//! # States
//! ```text
//! Opening → ProvisioningIndependent → WritingLogic → Ready
//!    │               │                     │
//!    └───────────────┴─────────────────────┴──→ Aborted
//! ```
//!
//! - Logic is synthesized and the plan laid out before any remote call
//! - Non-logic layers are written as concurrent batches; the first failure
//!   aborts the attempt
//! - Logic units are written one at a time
//! - Backends are created, or updated when they already exist
//! - Nothing is retried or rolled back; a failed draft is left for
//!   inspection and can never be activated through this type

use std::fmt;

use futures_util::future::try_join_all;
use thiserror::Error;

use crate::gateway::plan::{PlanError, PlannedResource, ProvisioningPlan, ResourceId, ResourceSpec};
use crate::gateway::synthesizer::{LogicBundle, Synthesizer};
use crate::platform::client::{DraftVersion, EdgePlatform, PlatformError};
use crate::routing::deployer::Deployer;
use crate::routing::weights::PriorityTable;
use crate::routing::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Opening,
    ProvisioningIndependent,
    WritingLogic,
    Ready,
    Aborted,
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployState::Opening => "opening draft version",
            DeployState::ProvisioningIndependent => "provisioning resources",
            DeployState::WritingLogic => "writing logic",
            DeployState::Ready => "ready",
            DeployState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Errors that end a deployment attempt.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("invalid provisioning plan: {0}")]
    Plan(#[from] PlanError),

    /// A remote call failed; `state` is where the attempt stopped.
    #[error("deployment aborted while {state}: {source}")]
    Remote {
        state: DeployState,
        version: Option<DraftVersion>,
        #[source]
        source: PlatformError,
    },
}

impl DeployError {
    /// Remote resource whose write failed, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            DeployError::Remote { source, .. } => Some(source.resource()),
            _ => None,
        }
    }

    /// Draft that received writes before the failure, if one was opened.
    pub fn draft(&self) -> Option<DraftVersion> {
        match self {
            DeployError::Remote { version, .. } => *version,
            _ => None,
        }
    }
}

/// Result of a successful attempt. Only a Ready draft produces one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub version: DraftVersion,
    /// Resources written, layer by layer, in plan order within a layer.
    pub written: Vec<ResourceId>,
    /// Backends that already existed and were updated instead.
    pub updated_existing: Vec<ResourceId>,
    /// States passed through, ending in `Ready`.
    pub states: Vec<DeployState>,
}

impl DeployReport {
    pub fn state(&self) -> DeployState {
        self.states.last().copied().unwrap_or(DeployState::Ready)
    }
}

enum Applied {
    Written(ResourceId),
    UpdatedExisting(ResourceId),
}

/// Drives one deployment attempt against an [`EdgePlatform`].
pub struct TransactionalDeployer<'a, P: EdgePlatform> {
    platform: &'a P,
    synthesizer: Synthesizer,
    check_path: String,
}

impl<'a, P: EdgePlatform> TransactionalDeployer<'a, P> {
    pub fn new(platform: &'a P, check_path: impl Into<String>, lock_header: impl Into<String>) -> Self {
        Self {
            platform,
            synthesizer: Synthesizer::vcl(lock_header),
            check_path: check_path.into(),
        }
    }

    /// Synthesize logic and lay out the plan. No remote calls.
    pub fn prepare(
        &self,
        deployers: &[Deployer],
        priorities: &PriorityTable,
    ) -> Result<(LogicBundle, ProvisioningPlan), DeployError> {
        let bundle = self.synthesizer.synthesize(deployers, priorities)?;
        let plan = ProvisioningPlan::build(deployers, &bundle, &self.check_path);
        plan.layers()?;
        Ok((bundle, plan))
    }

    /// Stage the routing set into a fresh draft version.
    pub async fn deploy(
        &self,
        deployers: &[Deployer],
        priorities: &PriorityTable,
    ) -> Result<DeployReport, DeployError> {
        let (_, plan) = self.prepare(deployers, priorities)?;
        self.execute(&plan).await
    }

    /// Apply a prepared plan inside a fresh draft version.
    pub async fn execute(&self, plan: &ProvisioningPlan) -> Result<DeployReport, DeployError> {
        let layers = plan.layers()?;
        let mut states = vec![DeployState::Opening];

        tracing::info!(resources = plan.len(), layers = layers.len(), "Opening draft version");
        let version = match self.platform.open_draft_version().await {
            Ok(v) => v,
            Err(source) => return Err(abort(DeployState::Opening, None, source)),
        };
        tracing::info!(version = %version, "Draft version opened");

        let mut written = Vec::with_capacity(plan.len());
        let mut updated_existing = Vec::new();

        for layer in layers {
            let logic = layer.iter().any(|r| r.spec.is_logic());
            let state = if logic {
                DeployState::WritingLogic
            } else {
                DeployState::ProvisioningIndependent
            };
            if states.last() != Some(&state) {
                tracing::info!(version = %version, state = %state, "Deployment state changed");
                states.push(state);
            }

            let results = if logic {
                let mut results = Vec::with_capacity(layer.len());
                for resource in &layer {
                    match self.apply(version, resource).await {
                        Ok(applied) => results.push(applied),
                        Err(source) => return Err(abort(state, Some(version), source)),
                    }
                }
                results
            } else {
                match try_join_all(layer.iter().map(|r| self.apply(version, r))).await {
                    Ok(results) => results,
                    Err(source) => return Err(abort(state, Some(version), source)),
                }
            };

            for applied in results {
                match applied {
                    Applied::Written(id) => written.push(id),
                    Applied::UpdatedExisting(id) => {
                        updated_existing.push(id.clone());
                        written.push(id);
                    }
                }
            }
        }

        states.push(DeployState::Ready);
        tracing::info!(
            version = %version,
            written = written.len(),
            updated_existing = updated_existing.len(),
            "Draft version ready for activation"
        );

        Ok(DeployReport {
            version,
            written,
            updated_existing,
            states,
        })
    }

    /// Activate the draft of a successful attempt.
    pub async fn activate(&self, report: &DeployReport) -> Result<(), DeployError> {
        self.platform
            .activate_version(report.version)
            .await
            .map_err(|source| DeployError::Remote {
                state: DeployState::Ready,
                version: Some(report.version),
                source,
            })
    }

    async fn apply(&self, version: DraftVersion, resource: &PlannedResource) -> Result<Applied, PlatformError> {
        let id = resource.id();
        tracing::debug!(version = %version, resource = %id, "Writing resource");

        match &resource.spec {
            ResourceSpec::Condition(spec) => self.platform.write_condition(version, spec).await?,
            ResourceSpec::Dictionary(spec) => self.platform.write_dictionary(version, spec).await?,
            ResourceSpec::HealthCheck(spec) => self.platform.write_health_check(version, spec).await?,
            ResourceSpec::Snippet(spec) => self.platform.write_snippet(version, spec).await?,
            ResourceSpec::Backend(spec) => match self.platform.create_backend(version, spec).await {
                Ok(()) => {}
                Err(e) if e.is_conflict() => {
                    tracing::info!(version = %version, resource = %id, "Backend exists, updating");
                    self.platform.update_backend(version, spec).await?;
                    return Ok(Applied::UpdatedExisting(id));
                }
                Err(e) => return Err(e),
            },
        }

        Ok(Applied::Written(id))
    }
}

fn abort(state: DeployState, version: Option<DraftVersion>, source: PlatformError) -> DeployError {
    tracing::error!(
        state = %state,
        version = ?version.map(|v| v.0),
        resource = %source.resource(),
        error = %source,
        "Deployment aborted; draft left unactivated"
    );
    DeployError::Remote {
        state,
        version,
        source,
    }
}

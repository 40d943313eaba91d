//! Edge gateway: weighted backend routing compiled into edge logic and
//! staged transactionally on a CDN service.

pub mod config;
pub mod gateway;
pub mod logic;
pub mod observability;
pub mod platform;
pub mod routing;

pub use config::schema::EdgeConfig;
pub use gateway::{DeployReport, Synthesizer, TransactionalDeployer};
pub use platform::{EdgePlatform, FastlyClient};
pub use routing::{Deployer, PriorityTable, SelectionPlan};

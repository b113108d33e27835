//! # corral-compose
//!
//! Turns a compose manifest into the set of logical services and service
//! links that an orchestration API understands.
//!
//! Handles:
//! - **Parser**: YAML loading, field allow-list, `extends`, `env_file`, and
//!   the per-project overlay file.
//! - **Classifier**: standard, load-balancer, DNS, and external services.
//! - **Sidekick**: grouping of sidekick containers under their primary.
//! - **Launch config**: per-container mapping, network and restart policies.
//! - **Links**: link parsing and consume-map edge resolution.
//! - **Resolver**: the end-to-end pipeline over a [`parser::Manifest`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod classifier;
pub mod context;
pub mod graph;
pub mod launch_config;
pub mod links;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod sidekick;

pub use model::{ConsumeMapEdge, LaunchConfig, LogicalService, ServiceKind};
pub use parser::Manifest;
pub use resolver::{ResolvedProject, resolve_manifest, resolve_with_existing};

//! # corral-engine
//!
//! Talks to the orchestration API and reconciles a resolved manifest
//! against the project it describes.
//!
//! Handles:
//! - **API**: the [`api::OrchestrationApi`] client contract with an HTTP
//!   implementation and an in-memory one for tests and dry runs.
//! - **Engine**: `create`, `up` and teardown of a named project.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod api;
pub mod engine;

pub use api::OrchestrationApi;
pub use api::http::HttpApi;
pub use api::memory::InMemoryApi;
pub use engine::{Change, Engine, Mode, Project, plan};

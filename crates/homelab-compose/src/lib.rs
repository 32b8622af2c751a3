//! # homelab-compose
//!
//! Turns a catalog of self-hosted service definitions into a deterministic
//! orchestration manifest.
//!
//! Stages, in pipeline order:
//! - **Catalog**: Loads raw records into typed [`catalog::ServiceDefinition`]s.
//! - **Overrides**: Merges host-specific customization onto catalog defaults.
//! - **Validator**: Collects every conflict into a [`report::ValidationReport`].
//! - **Planner**: Orders services so dependencies start first.
//! - **Emitter**: Renders the ordered set as a manifest plus a summary.
//!
//! [`pipeline::run`] threads a catalog through all five.

pub mod catalog;
pub mod emitter;
pub mod overrides;
pub mod pipeline;
pub mod planner;
pub mod report;
pub mod validator;

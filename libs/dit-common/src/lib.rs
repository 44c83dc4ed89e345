//! Shared model for the Docker Image Tester: plan documents, outcomes,
//! artifact naming and run-wide defaults.

pub mod artifacts;
pub mod config;
pub mod plan;
pub mod types;

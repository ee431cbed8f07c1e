//! Business logic services.
//!
//! This module contains the GitLab collaborator, the change-detection store,
//! and the rotation engine that ties them together each polling cycle.

pub mod gitlab_client;
pub mod review_engine;
pub mod status_store;

pub use gitlab_client::{GitLabClient, GitLabClientConfig};
pub use review_engine::{ReviewEngine, DEFAULT_POLL_INTERVAL_SECS};
pub use status_store::{StatusItem, StatusStore};

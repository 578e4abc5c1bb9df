//! Utility modules for wastewatch-ai

pub mod cluster_locks;
pub mod db_retry;
pub mod retry;

pub use cluster_locks::{ClusterLocks, NeighborhoodGuard};
pub use db_retry::retry_on_lock;
pub use retry::{retry_with_policy, Exhaustion, RetryPolicy};

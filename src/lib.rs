//! Agent benchmark engine: runs agents against file-search tasks and caches
//! verdicts keyed by content fingerprints of the agent and the task.

pub mod agents;
pub mod contexts;
pub mod data;
pub mod evaluator;
pub mod fingerprint;
pub mod registries;
pub mod report;

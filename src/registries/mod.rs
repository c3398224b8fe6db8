mod agent_registry;
mod task_registry;

pub use agent_registry::{FileAgentRegistry, AGENT_ARTIFACT};
pub use task_registry::FileTaskRegistry;

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the benchmark setup; fatal before anything executes
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No agent directories found in {}", .0.display())]
    NoAgents(PathBuf),

    #[error("No benchmark files found in {}", .0.display())]
    NoTasks(PathBuf),

    #[error("Nothing to run: the {0} list is empty")]
    EmptyInput(&'static str),

    #[error("Unknown agent: {name}. Available agents: {}", available.join(", "))]
    UnknownAgent { name: String, available: Vec<String> },

    #[error("Invalid benchmark file {}: {message}", path.display())]
    InvalidTask { path: PathBuf, message: String },

    #[error("Duplicate benchmark id '{id}' in {}", path.display())]
    DuplicateTask { id: String, path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

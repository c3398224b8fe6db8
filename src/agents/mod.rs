//! Invocable agents and the manifest loader that binds them
//!
//! An agent lives in its own directory with an `agent.yml` manifest. The
//! manifest's `kind` selects how it is invoked:
//!
//! ```yaml
//! kind: command
//! description: File search agent
//! command: python3
//! args: ["run_agent.py"]
//! env:
//!   MODEL: gemini-2.0-flash
//! ```
//!
//! Every kind produces the same thing: an [`EventStream`] of
//! [`AgentEvent`]s for a single query within a single [`Session`].

mod command;
mod scripted;

pub use command::{CommandAgent, CommandSpec};
pub use scripted::{ScriptedAgent, ScriptedSpec};

use crate::data::AgentEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors raised while loading or invoking an agent
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read agent artifact {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed agent artifact {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Agent stream failed: {0}")]
    Stream(String),

    #[error("Agent emitted an invalid event ({source}): {line}")]
    InvalidEvent {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Agent exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("Agent reported an error: {0}")]
    Reported(String),
}

/// Ordered stream of events produced by one invocation
pub type EventStream = BoxStream<'static, Result<AgentEvent, AgentError>>;

/// Capability every agent kind implements
#[async_trait]
pub trait Invocable: Send + Sync {
    /// Submits `query` within `session` and returns the response as a stream
    async fn invoke(&self, session: &Session, query: &str) -> Result<EventStream, AgentError>;
}

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

pub const DEFAULT_USER_ID: &str = "benchmark_user";

/// Logical session scoped to exactly one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
}

impl Session {
    /// Creates a session whose id is unique even for back-to-back invocations
    pub fn new(agent_name: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);

        Self {
            id: format!("session_{}_{}_{}", agent_name, millis, seq),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

/// Contents of `agent.yml`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentManifest {
    Command(CommandSpec),
    Scripted(ScriptedSpec),
}

impl AgentManifest {
    pub fn parse(path: &Path, content: &str) -> Result<Self, AgentError> {
        serde_yaml::from_str(content).map_err(|e| AgentError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reads and parses the manifest at `path`
    pub fn read(path: &Path) -> Result<Self, AgentError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                AgentError::NotFound(path.to_path_buf())
            } else {
                AgentError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(path, &content)
    }

    /// Binds the manifest to an invocable rooted at `agent_dir`
    pub fn bind(self, agent_dir: &Path) -> Result<Box<dyn Invocable>, AgentError> {
        match self {
            AgentManifest::Command(spec) => Ok(Box::new(CommandAgent::new(spec, agent_dir)?)),
            AgentManifest::Scripted(spec) => Ok(Box::new(ScriptedAgent::new(spec))),
        }
    }
}

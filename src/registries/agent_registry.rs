use super::ConfigError;
use crate::agents::{AgentError, AgentManifest, Invocable};
use crate::contexts::AgentLoader;
use crate::data::AgentDescriptor;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Manifest file every agent directory must contain
pub const AGENT_ARTIFACT: &str = "agent.yml";

/// File-based agent source
/// Discovers agents as `agents/<name>/agent.yml` and loads them from their manifests
#[derive(Clone)]
pub struct FileAgentRegistry {
    agents_dir: PathBuf,
}

impl FileAgentRegistry {
    /// Creates a new FileAgentRegistry
    ///
    /// # Arguments
    /// * `agents_dir` - Optional path to agents directory (defaults to "agents")
    pub fn new(agents_dir: Option<PathBuf>) -> Self {
        Self {
            agents_dir: agents_dir.unwrap_or_else(|| PathBuf::from("agents")),
        }
    }

    /// Every sub-directory holding a manifest, sorted by name
    pub fn discover(&self) -> Result<Vec<AgentDescriptor>, ConfigError> {
        let entries = match fs::read_dir(&self.agents_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::NoAgents(self.agents_dir.clone()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.agents_dir.clone(),
                    source,
                });
            }
        };

        let mut agents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: self.agents_dir.clone(),
                source,
            })?;
            let dir = entry.path();
            let artifact = dir.join(AGENT_ARTIFACT);
            if !dir.is_dir() || !artifact.is_file() {
                continue;
            }
            if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
                agents.push(AgentDescriptor::new(name, artifact));
            }
        }

        if agents.is_empty() {
            return Err(ConfigError::NoAgents(self.agents_dir.clone()));
        }

        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }
}

impl AgentLoader for FileAgentRegistry {
    fn load(&self, agent: &AgentDescriptor) -> Result<Box<dyn Invocable>, AgentError> {
        AgentManifest::read(&agent.artifact)?.bind(&agent.root())
    }
}

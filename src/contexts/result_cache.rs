use crate::contexts::FileCache;
use crate::data::{
    AgentCachePartition, AgentDescriptor, CacheEntry, CacheError, PartitionStore, TaskDefinition,
    TaskResult, CACHE_VERSION,
};
use crate::fingerprint;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Cache statistics computed from durable storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_cached: usize,
    pub cache_version: &'static str,
}

/// Authoritative store of validated (agent, task) results.
///
/// A stored result is served only while the fingerprint of the agent
/// directory and of the task definition both equal the ones recorded when it
/// was written. Fingerprints are recomputed on every lookup.
pub struct ResultCache<S = FileCache>
where
    S: PartitionStore,
{
    store: S,
    /// Partitions loaded by this process, keyed by agent name
    partitions: HashMap<String, AgentCachePartition>,
}

impl ResultCache<FileCache> {
    /// Opens a cache backed by partition files under `results_dir`
    pub fn open(results_dir: impl Into<PathBuf>) -> Self {
        Self::new(FileCache::new(Some(results_dir.into())))
    }
}

impl<S> ResultCache<S>
where
    S: PartitionStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            partitions: HashMap::new(),
        }
    }

    /// Read access to a partition already loaded by this process
    pub fn partition(&self, agent_name: &str) -> Option<&AgentCachePartition> {
        self.partitions.get(agent_name)
    }

    fn load_partition(&mut self, agent_name: &str) -> &mut AgentCachePartition {
        let store = &self.store;
        self.partitions
            .entry(agent_name.to_string())
            .or_insert_with(|| match store.load(agent_name) {
                None => AgentCachePartition::empty(agent_name),
                Some(raw) => AgentCachePartition::parse(&raw).unwrap_or_else(|| {
                    warn!(
                        "Discarding unreadable cache partition for '{}' (expected version {})",
                        agent_name, CACHE_VERSION
                    );
                    AgentCachePartition::empty(agent_name)
                }),
            })
    }

    fn current_hashes(
        agent: &AgentDescriptor,
        task: &TaskDefinition,
    ) -> Result<(String, String), CacheError> {
        let agent_hash =
            fingerprint::hash_tree(&agent.root()).map_err(|e| CacheError::Fingerprint {
                what: format!("agent '{}'", agent.name),
                message: format!("{:#}", e),
            })?;
        let benchmark_hash =
            fingerprint::hash_definition(task.definition()).map_err(|e| CacheError::Fingerprint {
                what: format!("task '{}'", task.id()),
                message: format!("{:#}", e),
            })?;
        Ok((agent_hash, benchmark_hash))
    }

    /// Returns the stored result for `task` only if neither the agent's files
    /// nor the task definition changed since it was stored.
    ///
    /// Never fails: an entry that cannot be validated is a miss.
    pub fn lookup(&mut self, agent: &AgentDescriptor, task: &TaskDefinition) -> Option<TaskResult> {
        let has_entry = self
            .load_partition(&agent.name)
            .tasks
            .contains_key(task.id());
        if !has_entry {
            return None;
        }

        let (agent_hash, benchmark_hash) = match Self::current_hashes(agent, task) {
            Ok(hashes) => hashes,
            Err(e) => {
                debug!("Cache entry for {}/{} cannot be validated: {}", agent.name, task.id(), e);
                return None;
            }
        };

        let entry = self.partitions.get(&agent.name)?.tasks.get(task.id())?;
        if entry.agent_hash == agent_hash && entry.benchmark_hash == benchmark_hash {
            Some(entry.result.clone())
        } else {
            debug!("Cache entry for {}/{} is stale", agent.name, task.id());
            None
        }
    }

    /// Records `result` for `task` under the current fingerprints and persists
    /// the agent's whole partition before returning.
    ///
    /// The in-process copy only changes once the partition is durable.
    pub fn store(
        &mut self,
        agent: &AgentDescriptor,
        task: &TaskDefinition,
        result: TaskResult,
        timestamp: &str,
    ) -> Result<(), CacheError> {
        let (agent_hash, benchmark_hash) = Self::current_hashes(agent, task)?;

        let mut partition = self.load_partition(&agent.name).clone();
        partition.tasks.insert(
            task.id().to_string(),
            CacheEntry {
                task_name: task.label().to_string(),
                agent_hash,
                benchmark_hash,
                timestamp: timestamp.to_string(),
                result,
            },
        );
        partition.last_updated = Some(timestamp.to_string());
        partition.recalculate_summary();

        let data = serde_json::to_string_pretty(&partition).map_err(|source| {
            CacheError::Serialize {
                key: agent.name.clone(),
                source,
            }
        })?;
        self.store.save(&agent.name, &data)?;

        self.partitions.insert(agent.name.clone(), partition);
        Ok(())
    }

    /// Discards loaded partitions and removes every durable record
    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.partitions.clear();
        self.store.clear()
    }

    /// Counts cached entries across every durable partition
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut total_cached = 0;
        for key in self.store.keys()? {
            if let Some(partition) = self.store.load(&key).and_then(|raw| AgentCachePartition::parse(&raw)) {
                total_cached += partition.tasks.len();
            }
        }

        Ok(CacheStats {
            total_cached,
            cache_version: CACHE_VERSION,
        })
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written into every partition record
pub const CACHE_VERSION: &str = "2.0";

/// Result payload recorded for one (agent, task) evaluation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskResult {
    pub correct: bool,
    /// Wall time of the invocation in seconds
    pub execution_time: f64,
    pub agent_output: String,
    pub expected_answer: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TaskResult {
    /// A result carrying a non-empty error is always bucketed as an error
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_error() {
            "ERROR"
        } else if self.correct {
            "CORRECT"
        } else {
            "INCORRECT"
        }
    }
}

/// Counts over a set of results; the three buckets partition `total`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub errors: usize,
}

impl Summary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TaskResult>) -> Self {
        let mut summary = Summary::default();
        for result in results {
            summary.record(result);
        }
        summary
    }

    pub fn record(&mut self, result: &TaskResult) {
        self.total += 1;
        if result.is_error() {
            self.errors += 1;
        } else if result.correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
    }

    /// Percentage of correct results, 0.0 when empty
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

/// Cached evaluation of one task, valid only while both hashes still match
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheEntry {
    pub task_name: String,
    pub agent_hash: String,
    pub benchmark_hash: String,
    pub timestamp: String,
    pub result: TaskResult,
}

/// Durable record of every cached result for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCachePartition {
    pub agent_name: String,
    #[serde(default)]
    pub cache_version: String,
    #[serde(default)]
    pub tasks: BTreeMap<String, CacheEntry>,
    #[serde(default)]
    pub summary: Summary,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl AgentCachePartition {
    pub fn empty(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            cache_version: CACHE_VERSION.to_string(),
            tasks: BTreeMap::new(),
            summary: Summary::default(),
            last_updated: None,
        }
    }

    /// Parse a stored record; `None` for anything unparseable or of another schema version
    pub fn parse(raw: &str) -> Option<Self> {
        let partition: AgentCachePartition = serde_json::from_str(raw).ok()?;
        (partition.cache_version == CACHE_VERSION).then_some(partition)
    }

    pub fn recalculate_summary(&mut self) {
        self.summary = Summary::from_results(self.tasks.values().map(|entry| &entry.result));
    }
}

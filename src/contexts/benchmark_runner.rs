use crate::contexts::{AgentLoader, AgentRunner, ResultCache};
use crate::data::{AgentDescriptor, CacheError, PartitionStore, Summary, TaskDefinition, TaskResult};
use crate::evaluator::Evaluator;
use crate::registries::ConfigError;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Switches honoured at the orchestration boundary
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Always execute, but still write fresh results through the cache
    pub ignore_cache: bool,
    /// Restrict the matrix to one agent
    pub agent: Option<String>,
    /// Wipe every cached result before the first task; only happens once the
    /// configuration has been validated
    pub clear_cache: bool,
}

/// Where a task's result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Cached,
    Executed,
}

/// Receives per-task status as the matrix is driven
pub trait RunObserver {
    fn cache_cleared(&mut self) {}
    fn agent_started(&mut self, _agent: &AgentDescriptor, _task_count: usize) {}
    fn task_started(&mut self, _agent: &AgentDescriptor, _task: &TaskDefinition) {}
    fn task_finished(
        &mut self,
        _agent: &AgentDescriptor,
        _task: &TaskDefinition,
        _result: &TaskResult,
        _provenance: Provenance,
    ) {
    }
}

impl RunObserver for () {}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentRun {
    pub tasks: BTreeMap<String, TaskResult>,
    pub summary: Summary,
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub timestamp: String,
    pub agents: BTreeMap<String, AgentRun>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.cache_hits + self.cache_misses
    }

    /// Percentage of results served from cache, 0.0 for an empty run
    pub fn hit_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.cache_hits as f64 / total as f64 * 100.0,
        }
    }
}

/// Applies the optional agent filter; an unknown name is a configuration error
pub fn select_agents(
    agents: Vec<AgentDescriptor>,
    selected: Option<&str>,
) -> Result<Vec<AgentDescriptor>, ConfigError> {
    let Some(name) = selected else {
        return Ok(agents);
    };

    let available: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
    agents
        .into_iter()
        .find(|a| a.name == name)
        .map(|a| vec![a])
        .ok_or_else(|| ConfigError::UnknownAgent {
            name: name.to_string(),
            available,
        })
}

/// Benchmark Runner context drives the agents x tasks matrix.
///
/// Pairs run strictly one after another. Each fresh result is persisted by
/// the cache as soon as it exists; the runner keeps nothing durable itself.
pub struct BenchmarkRunner<'a, L, E, S>
where
    L: AgentLoader,
    E: Evaluator,
    S: PartitionStore,
{
    agents: Vec<AgentDescriptor>,
    tasks: Vec<TaskDefinition>,
    harness: AgentRunner<L>,
    evaluator: E,
    cache: &'a mut ResultCache<S>,
    ignore_cache: bool,
    clear_cache: bool,
}

impl<'a, L, E, S> BenchmarkRunner<'a, L, E, S>
where
    L: AgentLoader,
    E: Evaluator,
    S: PartitionStore,
{
    /// Validates the matrix before anything executes
    pub fn new(
        agents: Vec<AgentDescriptor>,
        tasks: Vec<TaskDefinition>,
        harness: AgentRunner<L>,
        evaluator: E,
        cache: &'a mut ResultCache<S>,
        options: &RunOptions,
    ) -> Result<Self, ConfigError> {
        if agents.is_empty() {
            return Err(ConfigError::EmptyInput("agent"));
        }
        if tasks.is_empty() {
            return Err(ConfigError::EmptyInput("task"));
        }
        let mut agents = select_agents(agents, options.agent.as_deref())?;
        agents.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            agents,
            tasks,
            harness,
            evaluator,
            cache,
            ignore_cache: options.ignore_cache,
            clear_cache: options.clear_cache,
        })
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    /// Public function: run
    ///
    /// Only a cache failure aborts the run; every per-task failure ends up
    /// as an error result instead.
    pub async fn run(&mut self, observer: &mut impl RunObserver) -> Result<RunReport, RunError> {
        if self.clear_cache {
            self.cache.clear()?;
            self.clear_cache = false;
            info!("Cleared cached results");
            observer.cache_cleared();
        }

        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut report = RunReport {
            timestamp: timestamp.clone(),
            agents: BTreeMap::new(),
            cache_hits: 0,
            cache_misses: 0,
        };

        for agent in &self.agents {
            observer.agent_started(agent, self.tasks.len());
            let mut agent_run = AgentRun::default();

            for task in &self.tasks {
                observer.task_started(agent, task);

                let cached = if self.ignore_cache {
                    None
                } else {
                    self.cache.lookup(agent, task)
                };

                let (result, provenance) = match cached {
                    Some(result) => {
                        report.cache_hits += 1;
                        (result, Provenance::Cached)
                    }
                    None => {
                        let result = self.execute(agent, task).await;
                        self.cache.store(agent, task, result.clone(), &timestamp)?;
                        report.cache_misses += 1;
                        (result, Provenance::Executed)
                    }
                };

                info!(
                    "{}/{}: {} ({:?}, {:.2}s)",
                    agent.name,
                    task.id(),
                    result.status_label(),
                    provenance,
                    result.execution_time
                );
                observer.task_finished(agent, task, &result, provenance);

                agent_run.summary.record(&result);
                agent_run.tasks.insert(task.id().to_string(), result);
            }

            report.agents.insert(agent.name.clone(), agent_run);
        }

        Ok(report)
    }

    /// Role method: harness.execute, then evaluator.evaluate
    async fn execute(&self, agent: &AgentDescriptor, task: &TaskDefinition) -> TaskResult {
        let execution = self.harness.run(agent, task.query()).await;
        let evaluation =
            self.evaluator
                .evaluate(&execution.output, task.expected_answer(), execution.success);

        TaskResult {
            correct: evaluation.correct,
            execution_time: execution.execution_time.as_secs_f64(),
            agent_output: execution.output,
            expected_answer: task.expected_answer().to_string(),
            input_tokens: execution.input_tokens,
            output_tokens: execution.output_tokens,
            error: execution.error,
            reason: Some(evaluation.reason),
        }
    }
}

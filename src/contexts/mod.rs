mod agent_runner;
mod benchmark_runner;
mod file_cache;
mod result_cache;

pub use agent_runner::{AgentLoader, AgentRunner, ExecutionResult, DEFAULT_TIMEOUT};
pub use benchmark_runner::{
    select_agents, AgentRun, BenchmarkRunner, Provenance, RunError, RunObserver, RunOptions,
    RunReport,
};
pub use file_cache::FileCache;
pub use result_cache::{CacheStats, ResultCache};

mod cache;
pub mod event;
mod partition;
mod task;

pub use cache::{CacheError, PartitionStore};
pub use event::{AgentEvent, EventFold, FoldedOutput, PartEvent, UsageDelta, WireEvent};
pub use partition::{AgentCachePartition, CacheEntry, Summary, TaskResult, CACHE_VERSION};
pub use task::{AgentDescriptor, TaskDefinition};

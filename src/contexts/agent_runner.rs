use crate::agents::{AgentError, Invocable, Session};
use crate::data::{AgentDescriptor, EventFold, FoldedOutput};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one invocation; always well-formed, whatever went wrong
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub output: String,
    pub success: bool,
    pub error: Option<String>,
    pub execution_time: Duration,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl ExecutionResult {
    fn succeeded(folded: FoldedOutput, execution_time: Duration) -> Self {
        Self {
            output: folded.output,
            success: true,
            error: None,
            execution_time,
            input_tokens: folded.input_tokens,
            output_tokens: folded.output_tokens,
        }
    }

    fn failed(error: String, execution_time: Duration) -> Self {
        Self {
            output: String::new(),
            success: false,
            error: Some(error),
            execution_time,
            input_tokens: None,
            output_tokens: None,
        }
    }
}

/// Trait for resolving an agent descriptor to something that can be invoked
pub trait AgentLoader {
    /// Load the agent implementation from its declared location
    fn load(&self, agent: &AgentDescriptor) -> Result<Box<dyn Invocable>, AgentError>;
}

/// Agent Runner context drives one agent through one query.
///
/// Loading, session setup and stream consumption share a single timeout;
/// when it expires the in-flight invocation is dropped, which tears down
/// any process it owns. There are no retries.
pub struct AgentRunner<L>
where
    L: AgentLoader,
{
    loader: L,
    timeout: Duration,
}

impl<L> AgentRunner<L>
where
    L: AgentLoader,
{
    /// Creates a new AgentRunner context
    ///
    /// # Arguments
    /// * `loader` - Resolves descriptors to invocable agents
    /// * `timeout` - Budget for a whole invocation
    pub fn new(loader: L, timeout: Duration) -> Self {
        Self { loader, timeout }
    }

    /// Public function: run
    ///
    /// Invokes `agent` on `query` and normalizes whatever happens into an
    /// [`ExecutionResult`]. Elapsed time is measured from the call on every path.
    pub async fn run(&self, agent: &AgentDescriptor, query: &str) -> ExecutionResult {
        let start = Instant::now();
        info!("Running agent {}", agent.name);

        let outcome = tokio::time::timeout(self.timeout, self.execute(agent, query)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(folded)) => {
                info!("Agent {} finished in {:.2}s", agent.name, elapsed.as_secs_f64());
                ExecutionResult::succeeded(folded, elapsed)
            }
            Ok(Err(e)) => {
                warn!("Agent {} failed: {}", agent.name, e);
                ExecutionResult::failed(e.to_string(), elapsed)
            }
            Err(_) => {
                warn!("Agent {} timed out", agent.name);
                ExecutionResult::failed(
                    format!("Agent timed out after {}s", self.timeout.as_secs_f64()),
                    elapsed,
                )
            }
        }
    }

    /// Role method: agent.execute
    ///
    /// Load, open a fresh session, then consume the event stream in arrival order.
    async fn execute(&self, agent: &AgentDescriptor, query: &str) -> Result<FoldedOutput, AgentError> {
        let invocable = self.loader.load(agent)?;
        let session = Session::new(&agent.name);
        debug!("Opened {} for {}", session.id, agent.name);

        let mut events = invocable.invoke(&session, query).await?;
        let mut fold = EventFold::default();
        while let Some(event) = events.next().await {
            fold.push(event?);
        }

        debug!("{} closed after {} event(s)", session.id, fold.event_count());
        Ok(fold.finish())
    }
}

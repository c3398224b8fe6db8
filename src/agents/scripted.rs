use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;

use super::{AgentError, EventStream, Invocable, Session};
use crate::data::WireEvent;

/// `kind: scripted` manifest section
///
/// Replays a fixed response, which makes it useful as a deterministic
/// baseline and as a fixture.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptedSpec {
    pub description: Option<String>,
    pub events: Vec<WireEvent>,
    /// Pause before each event, in milliseconds
    pub delay_ms: u64,
    /// Error raised after all events have been replayed
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    spec: ScriptedSpec,
}

impl ScriptedAgent {
    pub fn new(spec: ScriptedSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Invocable for ScriptedAgent {
    async fn invoke(&self, _session: &Session, _query: &str) -> Result<EventStream, AgentError> {
        let delay = Duration::from_millis(self.spec.delay_ms);

        let events = self
            .spec
            .events
            .iter()
            .cloned()
            .flat_map(WireEvent::into_events)
            .map(Ok)
            .chain(self.spec.error.clone().map(|e| Err(AgentError::Reported(e))))
            .collect::<Vec<_>>();

        Ok(futures::stream::iter(events)
            .then(move |event| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                event
            })
            .boxed())
    }
}

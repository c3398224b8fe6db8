//! Agent response events and the fold that reduces them to output text and usage
//!
//! Agents emit a heterogeneous stream: bare text fragments, structured
//! content made of parts (text or sandboxed code execution output), and
//! usage telemetry. On the wire one JSON object may carry both content and
//! usage; [`WireEvent::into_events`] splits it into typed [`AgentEvent`]s.

use serde::{Deserialize, Serialize};

/// Token usage attached to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageDelta {
    pub prompt_token_count: Option<u64>,
    pub tool_use_prompt_token_count: Option<u64>,
    pub candidates_token_count: Option<u64>,
    pub thoughts_token_count: Option<u64>,
}

impl UsageDelta {
    /// Prompt-side tokens, tool-use prompt contributions included
    pub fn input_tokens(&self) -> u64 {
        self.prompt_token_count
            .unwrap_or(0)
            .saturating_add(self.tool_use_prompt_token_count.unwrap_or(0))
    }

    /// Completion-side tokens, reasoning tokens included
    pub fn output_tokens(&self) -> u64 {
        self.candidates_token_count
            .unwrap_or(0)
            .saturating_add(self.thoughts_token_count.unwrap_or(0))
    }
}

/// One part of a structured content event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartEvent {
    Text(String),
    CodeExecutionResult(String),
    /// Parts with no textual payload (function calls and the like)
    Other,
}

impl PartEvent {
    fn text(&self) -> Option<&str> {
        match self {
            PartEvent::Text(text) | PartEvent::CodeExecutionResult(text) => Some(text),
            PartEvent::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Text(String),
    Parts(Vec<PartEvent>),
    Usage(UsageDelta),
}

/// Event as written by agents, one JSON object per line
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WireEvent {
    pub content: Option<WireContent>,
    pub usage_metadata: Option<UsageDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Structured {
        #[serde(default)]
        parts: Vec<WirePart>,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WirePart {
    pub text: Option<String>,
    pub code_execution_result: Option<CodeExecutionOutput>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeExecutionOutput {
    pub output: Option<String>,
}

impl WirePart {
    fn into_part(self) -> PartEvent {
        match (self.text, self.code_execution_result) {
            (Some(text), _) if !text.is_empty() => PartEvent::Text(text),
            (_, Some(CodeExecutionOutput { output: Some(output) })) if !output.is_empty() => {
                PartEvent::CodeExecutionResult(output)
            }
            _ => PartEvent::Other,
        }
    }
}

impl WireEvent {
    /// Split into typed events: content first, then usage
    pub fn into_events(self) -> Vec<AgentEvent> {
        let mut events = Vec::with_capacity(2);

        match self.content {
            Some(WireContent::Text(text)) if !text.is_empty() => events.push(AgentEvent::Text(text)),
            Some(WireContent::Structured { parts }) => {
                events.push(AgentEvent::Parts(
                    parts.into_iter().map(WirePart::into_part).collect(),
                ));
            }
            _ => {}
        }

        if let Some(usage) = self.usage_metadata {
            events.push(AgentEvent::Usage(usage));
        }

        events
    }
}

/// Output text and token totals reduced from an event stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FoldedOutput {
    pub output: String,
    /// `None` when the agent never reported usage
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Accumulator for an event stream; events must be pushed in arrival order
#[derive(Debug, Default)]
pub struct EventFold {
    output: String,
    input_tokens: u64,
    output_tokens: u64,
    saw_usage: bool,
    events: usize,
}

impl EventFold {
    pub fn push(&mut self, event: AgentEvent) {
        self.events += 1;
        match event {
            AgentEvent::Text(text) => self.output.push_str(&text),
            AgentEvent::Parts(parts) => {
                for text in parts.iter().filter_map(PartEvent::text) {
                    self.output.push_str(text);
                }
            }
            AgentEvent::Usage(usage) => {
                self.saw_usage = true;
                self.input_tokens = self.input_tokens.saturating_add(usage.input_tokens());
                self.output_tokens = self.output_tokens.saturating_add(usage.output_tokens());
            }
        }
    }

    pub fn event_count(&self) -> usize {
        self.events
    }

    pub fn finish(self) -> FoldedOutput {
        let (input_tokens, output_tokens) = if self.saw_usage {
            (Some(self.input_tokens), Some(self.output_tokens))
        } else {
            (None, None)
        };

        FoldedOutput {
            output: self.output.trim().to_string(),
            input_tokens,
            output_tokens,
        }
    }
}

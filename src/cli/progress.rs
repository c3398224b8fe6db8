use std::time::Instant;

use agentbench::contexts::{Provenance, RunObserver};
use agentbench::data::{AgentDescriptor, TaskDefinition, TaskResult};

/// Prints per-task status lines while the matrix runs
pub struct ProgressIndicator {
    total: usize,
    processed: usize,
    errors: usize,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            errors: 0,
            start_time: Instant::now(),
        }
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        println!(
            "\nProcessed {}/{} task run(s) in {:.2}s ({} error(s))",
            self.processed,
            self.total,
            elapsed.as_secs_f64(),
            self.errors
        );
    }
}

impl RunObserver for ProgressIndicator {
    fn cache_cleared(&mut self) {
        println!("Cache cleared");
    }

    fn agent_started(&mut self, agent: &AgentDescriptor, task_count: usize) {
        println!("\nRunning agent: {} ({} task(s))", agent.name, task_count);
    }

    fn task_started(&mut self, _agent: &AgentDescriptor, task: &TaskDefinition) {
        println!(
            "  Task: {} - {} ({}/{})",
            task.id(),
            task.label(),
            self.processed + 1,
            self.total
        );
    }

    fn task_finished(
        &mut self,
        _agent: &AgentDescriptor,
        _task: &TaskDefinition,
        result: &TaskResult,
        provenance: Provenance,
    ) {
        self.processed += 1;
        if result.is_error() {
            self.errors += 1;
        }

        let marker = match provenance {
            Provenance::Cached => " [CACHED]",
            Provenance::Executed => "",
        };
        let symbol = if result.is_error() {
            "!"
        } else if result.correct {
            "✓"
        } else {
            "✗"
        };
        println!(
            "    Result: {} {} ({:.2}s){}",
            symbol,
            result.status_label(),
            result.execution_time,
            marker
        );
        if let Some(error) = result.error.as_deref().filter(|e| !e.is_empty()) {
            println!("    Error: {}", error);
        }
    }
}

//! Markdown report built solely from persisted cache partitions

use crate::contexts::FileCache;
use crate::data::{AgentCachePartition, PartitionStore};
use anyhow::Result;
use std::fmt::Write;
use std::path::Path;

/// Ranks agents by accuracy (ties broken by name) and lists per-task results
pub fn render_markdown(results_dir: &Path) -> Result<String> {
    let store = FileCache::new(Some(results_dir.to_path_buf()));

    let mut partitions: Vec<AgentCachePartition> = store
        .keys()?
        .iter()
        .filter_map(|key| store.load(key))
        .filter_map(|raw| AgentCachePartition::parse(&raw))
        .collect();
    partitions.sort_by(|a, b| {
        b.summary
            .accuracy()
            .total_cmp(&a.summary.accuracy())
            .then_with(|| a.agent_name.cmp(&b.agent_name))
    });

    let mut out = String::new();
    writeln!(out, "# Agent Benchmark Report")?;
    writeln!(out)?;

    if partitions.is_empty() {
        writeln!(out, "No cached results found in `{}`.", results_dir.display())?;
        return Ok(out);
    }

    writeln!(out, "| Rank | Agent | Accuracy | Correct | Incorrect | Errors | Total | Last updated |")?;
    writeln!(out, "|---:|---|---:|---:|---:|---:|---:|---|")?;
    for (rank, partition) in partitions.iter().enumerate() {
        let summary = &partition.summary;
        writeln!(
            out,
            "| {} | {} | {:.1}% | {} | {} | {} | {} | {} |",
            rank + 1,
            partition.agent_name,
            summary.accuracy(),
            summary.correct,
            summary.incorrect,
            summary.errors,
            summary.total,
            partition.last_updated.as_deref().unwrap_or("-"),
        )?;
    }

    for partition in &partitions {
        writeln!(out)?;
        writeln!(out, "## {}", partition.agent_name)?;
        writeln!(out)?;
        for (task_id, entry) in &partition.tasks {
            let result = &entry.result;
            write!(
                out,
                "- **{}** ({}): {} in {:.2}s",
                task_id,
                entry.task_name,
                result.status_label(),
                result.execution_time
            )?;
            if let (Some(input), Some(output)) = (result.input_tokens, result.output_tokens) {
                write!(out, ", tokens {} in / {} out", input, output)?;
            }
            writeln!(out)?;
            if let Some(error) = result.error.as_deref().filter(|e| !e.is_empty()) {
                writeln!(out, "  - error: {}", error)?;
            }
        }
    }

    Ok(out)
}

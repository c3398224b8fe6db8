use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod progress;

use agentbench::contexts::{AgentRunner, BenchmarkRunner, ResultCache, RunOptions, RunReport};
use agentbench::evaluator::SubstringEvaluator;
use agentbench::registries::{FileAgentRegistry, FileTaskRegistry};
use agentbench::report;
use progress::ProgressIndicator;

#[derive(Clone, Debug)]
pub struct Config {
    pub verbose: bool,
    pub agents_dir: PathBuf,
    pub tasks_dir: PathBuf,
    pub results_dir: PathBuf,
}

pub struct RunArgs {
    pub ignore_cache: bool,
    pub clear_cache: bool,
    pub agent: Option<String>,
    pub timeout: Duration,
}

pub async fn run(args: RunArgs, config: &Config) -> Result<()> {
    let agent_registry = FileAgentRegistry::new(Some(config.agents_dir.clone()));
    let agents = agent_registry.discover()?;
    let tasks = FileTaskRegistry::new(Some(config.tasks_dir.clone())).discover()?;

    let mut cache = ResultCache::open(&config.results_dir);
    let cached_before = if args.clear_cache {
        0
    } else {
        cache.stats()?.total_cached
    };

    // The runner validates the agent filter before clearing anything
    let options = RunOptions {
        ignore_cache: args.ignore_cache,
        agent: args.agent,
        clear_cache: args.clear_cache,
    };
    let harness = AgentRunner::new(agent_registry, args.timeout);
    let mut runner = BenchmarkRunner::new(
        agents,
        tasks,
        harness,
        SubstringEvaluator,
        &mut cache,
        &options,
    )?;

    println!(
        "Found {} agent(s) and {} benchmark task(s)",
        runner.agents().len(),
        runner.tasks().len()
    );
    if options.ignore_cache {
        println!(
            "Cache enabled (ignoring existing results): {} cached results available",
            cached_before
        );
    } else {
        println!("Cache enabled: {} cached results available", cached_before);
    }
    if config.verbose {
        println!(
            "Agents: {}  Tasks: {}  Results: {}  Timeout: {}s",
            config.agents_dir.display(),
            config.tasks_dir.display(),
            config.results_dir.display(),
            args.timeout.as_secs()
        );
    }

    let mut progress = ProgressIndicator::new(runner.agents().len() * runner.tasks().len());
    let report = runner.run(&mut progress).await?;
    progress.finish();

    println!(
        "\nResults saved per agent under {}",
        config.results_dir.display()
    );
    print_cache_statistics(&report, options.ignore_cache);
    print_summary(&report);

    Ok(())
}

pub fn clear_cache(config: &Config) -> Result<()> {
    let mut cache = ResultCache::open(&config.results_dir);
    let stats = cache.stats()?;
    cache.clear().context("Failed to clear cache")?;
    println!(
        "Removed {} cached result(s) from {}",
        stats.total_cached,
        config.results_dir.display()
    );
    Ok(())
}

pub fn stats(config: &Config) -> Result<()> {
    let stats = ResultCache::open(&config.results_dir).stats()?;
    println!(
        "Cache {}: {} cached result(s) (cache version {})",
        config.results_dir.display(),
        stats.total_cached,
        stats.cache_version
    );
    Ok(())
}

pub fn report(output: Option<PathBuf>, config: &Config) -> Result<()> {
    let markdown = report::render_markdown(&config.results_dir)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, markdown)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", markdown),
    }

    Ok(())
}

fn print_cache_statistics(report: &RunReport, ignore_cache: bool) {
    let total = report.total();
    let miss_rate = if total == 0 {
        0.0
    } else {
        report.cache_misses as f64 / total as f64 * 100.0
    };

    println!("\nCache Statistics:");
    println!(
        "  Cache hits: {}/{} ({:.1}%)",
        report.cache_hits,
        total,
        report.hit_rate()
    );
    println!(
        "  New executions: {}/{} ({:.1}%)",
        report.cache_misses, total, miss_rate
    );
    if ignore_cache {
        println!("  Existing cached results were ignored for this run.");
    }
}

fn print_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK SUMMARY");
    println!("{}", "=".repeat(60));

    for (agent_name, agent_run) in &report.agents {
        let summary = &agent_run.summary;
        println!("\n{}:", agent_name);
        println!("  Total tasks: {}", summary.total);
        println!("  Correct:     {}", summary.correct);
        println!("  Incorrect:   {}", summary.incorrect);
        println!("  Errors:      {}", summary.errors);
        println!("  Accuracy:    {:.1}%", summary.accuracy());
    }
}

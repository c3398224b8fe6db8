use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "agentbench")]
#[command(about = "Benchmark AI agents against file-search tasks with a fingerprint-keyed result cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, default_value = "agents", help = "Directory holding one sub-directory per agent")]
    agents_dir: PathBuf,

    #[arg(long, global = true, default_value = "benchmarks", help = "Directory holding task definition JSON files")]
    tasks_dir: PathBuf,

    #[arg(long, global = true, default_value = "results", help = "Directory holding per-agent cache partitions")]
    results_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run agents against every benchmark task")]
    Run {
        #[arg(long, help = "Ignore cached results and re-run all tasks while still updating the cache")]
        ignore_cache: bool,

        #[arg(long, help = "Remove all cached results before running")]
        clear_cache: bool,

        #[arg(long, help = "Optional agent directory name to run (default: all)")]
        agent: Option<String>,

        #[arg(long, default_value_t = 60, help = "Per-invocation timeout in seconds")]
        timeout: u64,
    },

    #[command(about = "Remove all cached results")]
    ClearCache,

    #[command(about = "Show how many results are cached")]
    Stats,

    #[command(about = "Render a Markdown report from cached results")]
    Report {
        #[arg(long, help = "Write the report to a file instead of stdout")]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "agentbench=debug" } else { "agentbench=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Agents may need API keys from a local .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
        agents_dir: cli.agents_dir,
        tasks_dir: cli.tasks_dir,
        results_dir: cli.results_dir,
    };

    match cli.command {
        Commands::Run {
            ignore_cache,
            clear_cache,
            agent,
            timeout,
        } => {
            let args = cli::RunArgs {
                ignore_cache,
                clear_cache,
                agent,
                timeout: Duration::from_secs(timeout),
            };
            cli::run(args, &config).await?;
        }
        Commands::ClearCache => {
            cli::clear_cache(&config)?;
        }
        Commands::Stats => {
            cli::stats(&config)?;
        }
        Commands::Report { output } => {
            cli::report(output, &config)?;
        }
    }

    Ok(())
}

/// Integration tests for the benchmark workflow
///
/// Each test builds an isolated workspace with `agents/`, `benchmarks/` and
/// `results/` directories and drives the full matrix through the public API.
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use agentbench::contexts::{
    AgentRunner, BenchmarkRunner, Provenance, ResultCache, RunObserver, RunOptions, RunReport,
};
use agentbench::data::{AgentDescriptor, Summary, TaskDefinition, TaskResult};
use agentbench::evaluator::SubstringEvaluator;
use agentbench::registries::{ConfigError, FileAgentRegistry, FileTaskRegistry};
use serde_json::json;

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("agents")).unwrap();
        fs::create_dir_all(root.join("benchmarks")).unwrap();
        Self { _dir: dir, root }
    }

    fn agent(&self, name: &str, manifest: &str) -> PathBuf {
        let dir = self.root.join("agents").join(name);
        fs::create_dir_all(&dir).unwrap();
        let artifact = dir.join("agent.yml");
        fs::write(&artifact, manifest).unwrap();
        artifact
    }

    fn task(&self, file: &str, value: serde_json::Value) {
        fs::write(
            self.root.join("benchmarks").join(file),
            serde_json::to_string_pretty(&value).unwrap(),
        )
        .unwrap();
    }

    fn results(&self) -> PathBuf {
        self.root.join("results")
    }

    fn registry(&self) -> FileAgentRegistry {
        FileAgentRegistry::new(Some(self.root.join("agents")))
    }

    async fn run(&self, options: RunOptions) -> Result<(RunReport, Recorder), String> {
        let agents = self.registry().discover().map_err(|e| e.to_string())?;
        let tasks = FileTaskRegistry::new(Some(self.root.join("benchmarks")))
            .discover()
            .map_err(|e| e.to_string())?;
        let mut cache = ResultCache::open(self.results());
        let harness = AgentRunner::new(self.registry(), Duration::from_secs(10));

        let mut runner = BenchmarkRunner::new(
            agents,
            tasks,
            harness,
            SubstringEvaluator,
            &mut cache,
            &options,
        )
        .map_err(|e| e.to_string())?;

        let mut recorder = Recorder::default();
        let report = runner.run(&mut recorder).await.map_err(|e| e.to_string())?;
        Ok((report, recorder))
    }
}

#[derive(Default, Debug)]
struct Recorder {
    events: Vec<(String, String, Provenance)>,
    cleared: bool,
}

impl RunObserver for Recorder {
    fn cache_cleared(&mut self) {
        self.cleared = true;
    }

    fn task_finished(
        &mut self,
        agent: &AgentDescriptor,
        task: &TaskDefinition,
        _result: &TaskResult,
        provenance: Provenance,
    ) {
        self.events
            .push((agent.name.clone(), task.id().to_string(), provenance));
    }
}

const FINDER: &str = r#"
kind: scripted
events:
  - content: "Searching the tree...\n"
  - content:
      parts:
        - code_execution_result:
            output: "FOUND: test_files/scenario1/setup.py"
    usage_metadata:
      prompt_token_count: 40
      candidates_token_count: 8
"#;

const WRONG: &str = r#"
kind: scripted
events:
  - content: "FOUND: nowhere.txt"
"#;

fn standard_tasks(ws: &Workspace) {
    ws.task(
        "scenario1.json",
        json!({
            "name": "Find setup.py",
            "query": "Find the setup.py file",
            "expected_answer": "test_files/scenario1/setup.py"
        }),
    );
    ws.task(
        "scenario2.json",
        json!({
            "name": "Find the log",
            "query": "Find app.log",
            "expected_answer": "logs/app.log",
            "difficulty": "medium"
        }),
    );
}

fn partition_json(ws: &Workspace, agent: &str) -> serde_json::Value {
    let raw = fs::read_to_string(ws.results().join(format!("{}.json", agent))).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn empty_task_source_is_a_configuration_error() {
    let ws = Workspace::new();
    ws.agent("finder", FINDER);

    let err = FileTaskRegistry::new(Some(ws.root.join("benchmarks")))
        .discover()
        .unwrap_err();
    assert!(matches!(err, ConfigError::NoTasks(_)));

    // The runner itself refuses an empty matrix before invoking anything
    let mut cache = ResultCache::open(ws.results());
    let result = BenchmarkRunner::new(
        ws.registry().discover().unwrap(),
        Vec::new(),
        AgentRunner::new(ws.registry(), Duration::from_secs(1)),
        SubstringEvaluator,
        &mut cache,
        &RunOptions::default(),
    );
    assert!(matches!(result, Err(ConfigError::EmptyInput("task"))));
    assert!(!ws.results().exists());
}

#[tokio::test]
async fn unknown_agent_filter_is_a_configuration_error() {
    let ws = Workspace::new();
    ws.agent("finder", FINDER);
    standard_tasks(&ws);

    let err = ws
        .run(RunOptions {
            agent: Some("missing".to_string()),
            ..RunOptions::default()
        })
        .await
        .err()
        .unwrap();
    assert_eq!(err, "Unknown agent: missing. Available agents: finder");
}

#[tokio::test]
async fn agent_filter_restricts_matrix() {
    let ws = Workspace::new();
    ws.agent("finder", FINDER);
    ws.agent("wrong", WRONG);
    standard_tasks(&ws);

    let (report, _) = ws
        .run(RunOptions {
            agent: Some("wrong".to_string()),
            ..RunOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.agents.keys().collect::<Vec<_>>(), vec!["wrong"]);
    assert!(!ws.results().join("finder.json").exists());
}

#[tokio::test]
async fn unloadable_agent_is_bucketed_as_error() {
    let ws = Workspace::new();
    ws.agent("broken", "kind: command\ndescription: no entry point\n");
    standard_tasks(&ws);

    let (report, _) = ws.run(RunOptions::default()).await.unwrap();
    let run = &report.agents["broken"];

    assert_eq!(
        run.summary,
        Summary {
            total: 2,
            correct: 0,
            incorrect: 0,
            errors: 2
        }
    );
    for result in run.tasks.values() {
        assert_eq!(result.agent_output, "");
        assert!(!result.error.as_deref().unwrap_or("").is_empty());
        assert!(!result.correct);
    }
    assert_eq!(partition_json(&ws, "broken")["summary"]["errors"], 2);
}

#[tokio::test]
async fn second_run_is_fully_cached() {
    let ws = Workspace::new();
    ws.agent("finder", FINDER);
    ws.agent("wrong", WRONG);
    standard_tasks(&ws);

    let (first, first_events) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(first.cache_hits, 0);
    assert_eq!(first.cache_misses, 4);
    assert!(first_events
        .events
        .iter()
        .all(|(_, _, p)| *p == Provenance::Executed));

    let finder = &first.agents["finder"];
    assert_eq!(finder.summary.correct, 1);
    assert_eq!(finder.summary.incorrect, 1);
    let scenario1 = &finder.tasks["scenario1"];
    assert_eq!(
        scenario1.agent_output,
        "Searching the tree...\nFOUND: test_files/scenario1/setup.py"
    );
    assert_eq!(scenario1.input_tokens, Some(40));
    assert_eq!(scenario1.output_tokens, Some(8));

    let (second, second_events) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(second.cache_hits, 4);
    assert_eq!(second.cache_misses, 0);
    assert_eq!(second.hit_rate(), 100.0);
    assert!(second_events
        .events
        .iter()
        .all(|(_, _, p)| *p == Provenance::Cached));

    for name in ["finder", "wrong"] {
        assert_eq!(first.agents[name].summary, second.agents[name].summary);
        assert_eq!(first.agents[name].tasks, second.agents[name].tasks);
    }
}

#[tokio::test]
async fn ignore_cache_refreshes_entries() {
    let ws = Workspace::new();
    ws.agent("finder", FINDER);
    standard_tasks(&ws);

    ws.run(RunOptions::default()).await.unwrap();
    let before = partition_json(&ws, "finder");

    let (forced, _) = ws
        .run(RunOptions {
            ignore_cache: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(forced.cache_hits, 0);
    assert_eq!(forced.cache_misses, 2);

    let after = partition_json(&ws, "finder");
    assert_ne!(before["last_updated"], after["last_updated"]);
    assert_eq!(after["summary"]["total"], 2);
}

#[tokio::test]
async fn editing_agent_or_task_invalidates_only_what_changed() {
    let ws = Workspace::new();
    let finder = ws.agent("finder", FINDER);
    ws.agent("wrong", WRONG);
    standard_tasks(&ws);

    ws.run(RunOptions::default()).await.unwrap();

    // Any byte of the agent artifact counts
    fs::write(&finder, format!("{}\n", FINDER)).unwrap();
    let (after_agent_edit, events) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(after_agent_edit.cache_misses, 2);
    assert!(events
        .events
        .iter()
        .all(|(agent, _, p)| (agent == "finder") == (*p == Provenance::Executed)));

    // A single extra field on one task invalidates that task for every agent
    ws.task(
        "scenario2.json",
        json!({
            "name": "Find the log",
            "query": "Find app.log",
            "expected_answer": "logs/app.log",
            "difficulty": "hard"
        }),
    );
    let (after_task_edit, events) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(after_task_edit.cache_misses, 2);
    assert!(events
        .events
        .iter()
        .all(|(_, task, p)| (task == "scenario2") == (*p == Provenance::Executed)));
}

#[tokio::test]
async fn clear_then_stats_is_zero() {
    let ws = Workspace::new();
    ws.agent("finder", FINDER);
    standard_tasks(&ws);
    ws.run(RunOptions::default()).await.unwrap();

    let mut cache = ResultCache::open(ws.results());
    assert_eq!(cache.stats().unwrap().total_cached, 2);
    cache.clear().unwrap();
    assert_eq!(cache.stats().unwrap().total_cached, 0);

    let (rerun, _) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(rerun.cache_misses, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn command_agent_runs_end_to_end() {
    let ws = Workspace::new();
    ws.agent(
        "shell",
        r#"
kind: command
command: sh
args:
  - "-c"
  - |
    read request
    echo '{"content": {"parts": [{"text": "FOUND: "}, {"text": "logs/app.log"}]}}'
    echo '{"usage_metadata": {"prompt_token_count": 3, "thoughts_token_count": 4, "candidates_token_count": 1}}'
"#,
    );
    standard_tasks(&ws);

    let (report, _) = ws.run(RunOptions::default()).await.unwrap();
    let shell = &report.agents["shell"];
    let scenario2 = &shell.tasks["scenario2"];
    assert!(scenario2.correct);
    assert_eq!(scenario2.agent_output, "FOUND: logs/app.log");
    assert_eq!(scenario2.output_tokens, Some(5));
    assert_eq!(shell.summary.incorrect, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn hung_agent_times_out_and_run_continues() {
    let ws = Workspace::new();
    ws.agent(
        "sleeper",
        "kind: command\ncommand: sh\nargs: [\"-c\", \"exec sleep 30\"]\n",
    );
    standard_tasks(&ws);

    let agents = ws.registry().discover().unwrap();
    let tasks = FileTaskRegistry::new(Some(ws.root.join("benchmarks")))
        .discover()
        .unwrap();
    let mut cache = ResultCache::open(ws.results());
    let mut runner = BenchmarkRunner::new(
        agents,
        tasks,
        AgentRunner::new(ws.registry(), Duration::from_millis(200)),
        SubstringEvaluator,
        &mut cache,
        &RunOptions::default(),
    )
    .unwrap();

    let report = runner.run(&mut ()).await.unwrap();
    let sleeper = &report.agents["sleeper"];
    assert_eq!(sleeper.summary.errors, 2);
    for result in sleeper.tasks.values() {
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert!(result.execution_time < 5.0);
    }
}

#[tokio::test]
async fn clear_cache_waits_for_a_valid_configuration() {
    let ws = Workspace::new();
    ws.agent("finder", FINDER);
    standard_tasks(&ws);
    ws.run(RunOptions::default()).await.unwrap();

    let err = ws
        .run(RunOptions {
            clear_cache: true,
            agent: Some("fnder".to_string()),
            ..RunOptions::default()
        })
        .await
        .unwrap_err();
    assert!(err.contains("Unknown agent: fnder"));
    assert_eq!(ResultCache::open(ws.results()).stats().unwrap().total_cached, 2);

    let (cleared, recorder) = ws
        .run(RunOptions {
            clear_cache: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert!(recorder.cleared);
    assert_eq!(cleared.cache_hits, 0);
    assert_eq!(cleared.cache_misses, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn editing_agent_script_invalidates_its_results() {
    let ws = Workspace::new();
    let manifest = ws.agent("shell", "kind: command\ncommand: sh\nargs: [run.sh]\n");
    let script = manifest.with_file_name("run.sh");
    fs::write(&script, "echo '{\"content\": \"FOUND: nowhere.txt\"}'\n").unwrap();
    standard_tasks(&ws);

    let (first, _) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(first.agents["shell"].summary.correct, 0);

    fs::write(&script, "echo '{\"content\": \"FOUND: logs/app.log\"}'\n").unwrap();
    let (second, _) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(second.cache_hits, 0);
    assert_eq!(second.cache_misses, 2);
    assert_eq!(
        second.agents["shell"].tasks["scenario2"].agent_output,
        "FOUND: logs/app.log"
    );
    assert!(second.agents["shell"].tasks["scenario2"].correct);

    let (third, _) = ws.run(RunOptions::default()).await.unwrap();
    assert_eq!(third.cache_hits, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn timeout_tears_down_background_children() {
    let ws = Workspace::new();
    let pid_file = ws.root.join("child.pid");
    ws.agent(
        "spawner",
        &format!(
            "kind: command\ncommand: sh\nargs:\n  - \"-c\"\n  - \"sleep 30 >/dev/null 2>&1 & echo $! > {}; wait\"\n",
            pid_file.display()
        ),
    );
    ws.task(
        "only.json",
        json!({"query": "q", "expected_answer": "a"}),
    );

    let agents = ws.registry().discover().unwrap();
    let tasks = FileTaskRegistry::new(Some(ws.root.join("benchmarks")))
        .discover()
        .unwrap();
    let mut cache = ResultCache::open(ws.results());
    let mut runner = BenchmarkRunner::new(
        agents,
        tasks,
        AgentRunner::new(ws.registry(), Duration::from_millis(300)),
        SubstringEvaluator,
        &mut cache,
        &RunOptions::default(),
    )
    .unwrap();

    let report = runner.run(&mut ()).await.unwrap();
    assert_eq!(report.agents["spawner"].summary.errors, 1);

    let pid: i32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    let mut gone = false;
    for _ in 0..100 {
        let alive = match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat.contains(") Z"),
            Err(_) => nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok(),
        };
        if !alive {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gone, "background child {} outlived the timeout", pid);
}

//! Subprocess agents speaking JSON Lines
//!
//! The process receives one request line on stdin and answers with one
//! [`WireEvent`] per stdout line until it exits. On unix it runs in its own
//! process group, and the whole group is killed once the stream is dropped.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{AgentError, EventStream, Invocable, Session};
use crate::data::{AgentEvent, WireEvent};

/// `kind: command` manifest section
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory, relative to the agent directory
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Agent backed by an external process
#[derive(Debug, Clone)]
pub struct CommandAgent {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: PathBuf,
}

impl CommandAgent {
    pub fn new(spec: CommandSpec, agent_dir: &Path) -> Result<Self, AgentError> {
        if spec.command.trim().is_empty() {
            return Err(AgentError::Malformed {
                path: agent_dir.to_path_buf(),
                message: "empty 'command' entry point".to_string(),
            });
        }

        // Bare names go through PATH; relative paths are anchored at the agent directory
        let command = PathBuf::from(&spec.command);
        let program = if command.is_relative() && command.components().count() > 1 {
            agent_dir.join(command)
        } else {
            command
        };

        let working_dir = match spec.working_dir {
            Some(dir) => agent_dir.join(dir),
            None => agent_dir.to_path_buf(),
        };

        Ok(Self {
            program,
            args: spec.args,
            env: spec.env,
            working_dir,
        })
    }

    fn request_line(session: &Session, query: &str) -> String {
        let request = serde_json::json!({
            "session_id": session.id,
            "user_id": session.user_id,
            "query": query,
        });
        format!("{}\n", request)
    }
}

#[async_trait]
impl Invocable for CommandAgent {
    async fn invoke(&self, session: &Session, query: &str) -> Result<EventStream, AgentError> {
        let command_name = self.program.display().to_string();

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .env("AGENTBENCH_SESSION_ID", &session.id)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| AgentError::Spawn {
            command: command_name.clone(),
            source,
        })?;
        let group = ProcessGroup(child.id());

        info!("Started {} for {}", command_name, session.id);

        // An agent may exit without reading its request; its output still counts
        if let Some(mut stdin) = child.stdin.take() {
            let request = Self::request_line(session, query);
            match stdin.write_all(request.as_bytes()).await {
                Ok(()) => {
                    if let Err(e) = stdin.shutdown().await {
                        debug!("{} closed stdin early: {}", command_name, e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("{} exited before reading its request", command_name);
                }
                Err(e) => {
                    return Err(AgentError::Stream(format!("Failed to write query: {}", e)));
                }
            }
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Stream("stdout not captured".to_string()))?;

        // Drain stderr concurrently so a chatty agent cannot block on a full pipe
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                stderr.read_to_string(&mut buf).await.ok();
                buf
            })
        });

        let state = StreamState {
            lines: BufReader::new(stdout).lines(),
            _group: group,
            child,
            stderr,
            pending: VecDeque::new(),
        };

        Ok(futures::stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            match state.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(state))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed())
    }
}

/// Process group led by the spawned child; killed as a whole on drop so
/// nothing the agent started outlives its invocation
#[cfg_attr(not(unix), allow(dead_code))]
struct ProcessGroup(Option<u32>);

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.0.and_then(|id| i32::try_from(id).ok()) {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            // ESRCH just means every member already exited
            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                if e != nix::errno::Errno::ESRCH {
                    debug!("Failed to kill process group {}: {}", pgid, e);
                }
            }
        }
    }
}

/// Owns the child for the lifetime of the stream; dropping it kills the
/// process and everything it spawned
struct StreamState {
    lines: Lines<BufReader<ChildStdout>>,
    _group: ProcessGroup,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    pending: VecDeque<AgentEvent>,
}

impl StreamState {
    async fn next_event(&mut self) -> Result<Option<AgentEvent>, AgentError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| AgentError::Stream(format!("Failed to read stdout: {}", e)))?;

            let Some(line) = line else {
                self.finish().await?;
                return Ok(None);
            };

            if line.trim().is_empty() {
                continue;
            }

            let wire: WireEvent = serde_json::from_str(&line)
                .map_err(|source| AgentError::InvalidEvent { line: line.clone(), source })?;
            debug!("Agent event: {}", line);
            self.pending.extend(wire.into_events());
        }
    }

    async fn finish(&mut self) -> Result<(), AgentError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| AgentError::Stream(format!("Process error: {}", e)))?;

        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            Ok(())
        } else {
            Err(AgentError::Exited {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

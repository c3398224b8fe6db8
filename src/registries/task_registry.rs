use super::ConfigError;
use crate::data::TaskDefinition;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File-based task source
/// Loads one task definition per `*.json` file in the benchmarks directory
#[derive(Clone)]
pub struct FileTaskRegistry {
    tasks_dir: PathBuf,
}

impl FileTaskRegistry {
    /// Creates a new FileTaskRegistry
    ///
    /// # Arguments
    /// * `tasks_dir` - Optional path to the task directory (defaults to "benchmarks")
    pub fn new(tasks_dir: Option<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.unwrap_or_else(|| PathBuf::from("benchmarks")),
        }
    }

    /// All task definitions, ordered by file name
    pub fn discover(&self) -> Result<Vec<TaskDefinition>, ConfigError> {
        let entries = match fs::read_dir(&self.tasks_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::NoTasks(self.tasks_dir.clone()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.tasks_dir.clone(),
                    source,
                });
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| ConfigError::Io {
                    path: self.tasks_dir.clone(),
                    source,
                })?
                .path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(files.len());
        for path in files {
            let task = load_task(&path)?;
            if !seen.insert(task.id().to_string()) {
                return Err(ConfigError::DuplicateTask {
                    id: task.id().to_string(),
                    path,
                });
            }
            tasks.push(task);
        }

        if tasks.is_empty() {
            return Err(ConfigError::NoTasks(self.tasks_dir.clone()));
        }

        Ok(tasks)
    }
}

/// Parses one task file, defaulting `id` to the file stem
fn load_task(path: &Path) -> Result<TaskDefinition, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidTask {
        path: path.to_path_buf(),
        message,
    };

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut value: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

    let object = value
        .as_object_mut()
        .ok_or_else(|| invalid("expected a JSON object".to_string()))?;
    if !object.contains_key("id") {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| invalid("file name is not valid UTF-8".to_string()))?;
        object.insert("id".to_string(), Value::String(stem.to_string()));
    }

    TaskDefinition::try_from(value).map_err(invalid)
}

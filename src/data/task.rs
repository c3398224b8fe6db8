use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Identity of an invocable agent
///
/// `name` is the cache partition key; `artifact` is the manifest the
/// implementation is loaded from. The directory holding it is the agent's
/// implementation and is what gets fingerprinted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub name: String,
    pub artifact: PathBuf,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, artifact: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            artifact: artifact.into(),
        }
    }

    /// Directory holding the artifact, used as the agent's working directory
    pub fn root(&self) -> PathBuf {
        self.artifact
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// One benchmark case
///
/// The JSON object is kept exactly as loaded and is what the definition
/// fingerprint covers; the typed accessors are read-only views of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct TaskDefinition {
    id: String,
    name: Option<String>,
    query: String,
    expected_answer: String,
    definition: Map<String, Value>,
}

impl TaskDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        query: impl Into<String>,
        expected_answer: impl Into<String>,
    ) -> Self {
        let (id, name, query, expected_answer) =
            (id.into(), name.into(), query.into(), expected_answer.into());

        let mut definition = Map::new();
        definition.insert("id".to_string(), Value::String(id.clone()));
        definition.insert("name".to_string(), Value::String(name.clone()));
        definition.insert("query".to_string(), Value::String(query.clone()));
        definition.insert(
            "expected_answer".to_string(),
            Value::String(expected_answer.clone()),
        );

        Self {
            id,
            name: Some(name),
            query,
            expected_answer,
            definition,
        }
    }

    /// Cache key of the task; numeric and boolean ids are rendered as text
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn expected_answer(&self) -> &str {
        &self.expected_answer
    }

    /// Any field of the definition, known or not
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.definition.get(key)
    }

    /// The definition as loaded
    pub fn definition(&self) -> &Map<String, Value> {
        &self.definition
    }

    /// Human-readable label, falling back to the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

fn required_str(definition: &Map<String, Value>, key: &str) -> Result<String, String> {
    match definition.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(format!("'{}' must be a string", key)),
        None => Err(format!("missing field '{}'", key)),
    }
}

impl TryFrom<Value> for TaskDefinition {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(definition) = value else {
            return Err("expected a JSON object".to_string());
        };

        let id = match definition.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(Value::Bool(id)) => id.to_string(),
            Some(_) => return Err("'id' must be a string, number or boolean".to_string()),
            None => return Err("missing field 'id'".to_string()),
        };
        let name = match definition.get("name") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => Some(other.to_string()),
        };
        let query = required_str(&definition, "query")?;
        let expected_answer = required_str(&definition, "expected_answer")?;

        Ok(Self {
            id,
            name,
            query,
            expected_answer,
            definition,
        })
    }
}

impl From<TaskDefinition> for Value {
    fn from(task: TaskDefinition) -> Self {
        Value::Object(task.definition)
    }
}

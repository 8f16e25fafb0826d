use std::time::Duration;

use anyhow::{Context, anyhow};
use planner_shared::{DeleteTaskInput, Task};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::gateway::{GatewayError, SyncGateway};

pub const LIST_TASKS: &str = "query ListTasks(
  $filter: ModelTaskFilterInput
  $limit: Int
  $nextToken: String
) {
  listTasks(filter: $filter, limit: $limit, nextToken: $nextToken) {
    items {
      id
      name
      completed
    }
    nextToken
  }
}";

pub const CREATE_TASK: &str = "mutation CreateTask(
  $input: CreateTaskInput!
  $condition: ModelTaskConditionInput
) {
  createTask(input: $input, condition: $condition) {
    id
    name
    completed
  }
}";

pub const UPDATE_TASK: &str = "mutation UpdateTask(
  $input: UpdateTaskInput!
  $condition: ModelTaskConditionInput
) {
  updateTask(input: $input, condition: $condition) {
    id
    name
    completed
  }
}";

pub const DELETE_TASK: &str = "mutation DeleteTask(
  $input: DeleteTaskInput!
  $condition: ModelTaskConditionInput
) {
  deleteTask(input: $input, condition: $condition) {
    id
    name
    completed
  }
}";

const API_KEY_HEADER: &str = "x-api-key";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct GraphqlSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl GraphqlSettings {
    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let endpoint = cfg
            .get("api.endpoint")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "api.endpoint is not configured; set it in ~/.plannerrc, \
                     PLANNER_API_ENDPOINT or --rc api.endpoint=<url>"
                )
            })?;

        let api_key = cfg
            .get("api.key")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            endpoint,
            api_key,
            timeout: cfg.api_timeout()?,
        })
    }
}

/// [`SyncGateway`] speaking the generated CRUD operations of a managed
/// GraphQL task API.
#[derive(Debug, Clone)]
pub struct GraphqlGateway {
    client: reqwest::Client,
    settings: GraphqlSettings,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksData {
    list_tasks: Option<TaskConnection>,
}

#[derive(Debug, Deserialize)]
struct TaskConnection {
    #[serde(default)]
    items: Vec<Option<Task>>,
}

impl GraphqlGateway {
    pub fn new(settings: GraphqlSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed building HTTP client for the task API")?;

        debug!(
            endpoint = %settings.endpoint,
            has_api_key = settings.api_key.is_some(),
            timeout_secs = settings.timeout.as_secs(),
            "configured GraphQL gateway"
        );

        Ok(Self { client, settings })
    }

    pub fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    #[instrument(skip(self, query, variables), fields(endpoint = %self.settings.endpoint))]
    async fn execute(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<Value, GatewayError> {
        let body = serde_json::to_vec(&json!({
            "query": query,
            "variables": variables,
        }))
        .map_err(|source| GatewayError::Encode { operation, source })?;

        let mut request = self
            .client
            .post(self.settings.endpoint.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body);

        if let Some(key) = self.settings.api_key.as_deref() {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|source| self.transport(source))?;
        let status = response.status();
        let text = response.text().await.map_err(|source| self.transport(source))?;
        debug!(status = status.as_u16(), bytes = text.len(), "GraphQL response received");

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let envelope: GraphqlResponse = serde_json::from_str(&text)
            .map_err(|source| GatewayError::Decode { operation, source })?;

        if !envelope.errors.is_empty() {
            let messages = envelope
                .errors
                .into_iter()
                .map(|entry| entry.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GatewayError::Rejected {
                operation,
                messages,
            });
        }

        envelope
            .data
            .filter(|data| !data.is_null())
            .ok_or(GatewayError::MissingData { operation })
    }

    async fn mutate(
        &self,
        operation: &'static str,
        query: &str,
        input: Value,
    ) -> Result<(), GatewayError> {
        let data = self.execute(operation, query, json!({ "input": input })).await?;
        match data.get(operation) {
            Some(record) if !record.is_null() => Ok(()),
            _ => Err(GatewayError::MissingData { operation }),
        }
    }

    fn transport(&self, source: reqwest::Error) -> GatewayError {
        GatewayError::Transport {
            endpoint: self.settings.endpoint.clone(),
            source,
        }
    }
}

impl SyncGateway for GraphqlGateway {
    async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError> {
        let data = self.execute("listTasks", LIST_TASKS, json!({})).await?;
        let decoded: ListTasksData = decode("listTasks", data)?;
        let connection = decoded
            .list_tasks
            .ok_or(GatewayError::MissingData {
                operation: "listTasks",
            })?;
        Ok(connection.items.into_iter().flatten().collect())
    }

    async fn create_task(&self, task: &Task) -> Result<(), GatewayError> {
        let input = encode("createTask", task)?;
        self.mutate("createTask", CREATE_TASK, input).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), GatewayError> {
        let input = encode("updateTask", task)?;
        self.mutate("updateTask", UPDATE_TASK, input).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), GatewayError> {
        let input = encode(
            "deleteTask",
            &DeleteTaskInput { id: id.to_string() },
        )?;
        self.mutate("deleteTask", DELETE_TASK, input).await
    }
}

fn encode<T: serde::Serialize>(operation: &'static str, value: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(value).map_err(|source| GatewayError::Encode { operation, source })
}

fn decode<T: DeserializeOwned>(operation: &'static str, value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|source| GatewayError::Decode { operation, source })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

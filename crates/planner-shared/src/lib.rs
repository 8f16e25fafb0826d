use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix carried by every client-generated task id.
pub const TASK_ID_PREFIX: &str = "todo-";

/// A single to-do item. The same shape travels over the GraphQL API for
/// every operation that takes or returns a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Builds a fresh, not yet completed task with a newly generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_task_id(),
            name: name.into(),
            completed: false,
        }
    }

    /// Copy of this task with `completed` inverted.
    #[must_use]
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }

    /// Copy of this task carrying `name`; completion is left alone.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

pub fn new_task_id() -> String {
    format!("{TASK_ID_PREFIX}{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TaskFilter {
    /// Every filter, in the order they are offered to the user.
    pub const ALL: [TaskFilter; 3] = [TaskFilter::All, TaskFilter::Active, TaskFilter::Completed];

    pub fn name(self) -> &'static str {
        match self {
            TaskFilter::All => "All",
            TaskFilter::Active => "Active",
            TaskFilter::Completed => "Completed",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Active => !task.completed,
            TaskFilter::Completed => task.completed,
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter {0:?}; expected one of All, Active, Completed")]
pub struct UnknownFilter(pub String);

impl FromStr for TaskFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TaskFilter::ALL
            .into_iter()
            .find(|filter| filter.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownFilter(wanted.to_string()))
    }
}

/// Input record for the remote delete mutation, keyed only by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteTaskInput {
    pub id: String,
}

/// Events produced by the presentation layer and consumed by the task store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    Add { name: String },
    Toggle { id: String },
    Edit { id: String, name: String },
    Delete { id: String },
    SetFilter { filter: TaskFilter },
}

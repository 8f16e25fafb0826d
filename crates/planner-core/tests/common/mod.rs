#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use planner_core::{GatewayError, SyncGateway};
use planner_shared::Task;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(Task),
    Update(Task),
    Delete(String),
}

/// In-memory remote that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    remote: Mutex<Vec<Task>>,
    calls: Mutex<Vec<Call>>,
    fail_list: bool,
    fail_writes: bool,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingGateway {
    pub fn with_remote(tasks: Vec<Task>) -> Self {
        Self {
            remote: Mutex::new(tasks),
            ..Self::default()
        }
    }

    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Writes are recorded on arrival but only applied once a permit is
    /// added to the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let gateway = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (gateway, gate)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn write_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| *call != Call::List)
            .collect()
    }

    pub fn remote(&self) -> Vec<Task> {
        self.remote.lock().clone()
    }

    async fn write(&self, call: Call) -> Result<(), GatewayError> {
        self.calls.lock().push(call.clone());

        if let Some(gate) = self.gate.as_ref() {
            gate.acquire()
                .await
                .map_err(|_| GatewayError::Status {
                    status: 503,
                    body: "gate closed".to_string(),
                })?
                .forget();
        }

        if self.fail_writes {
            return Err(GatewayError::Status {
                status: 500,
                body: "write rejected".to_string(),
            });
        }

        let mut remote = self.remote.lock();
        match call {
            Call::Create(task) => remote.push(task),
            Call::Update(task) => {
                if let Some(slot) = remote.iter_mut().find(|existing| existing.id == task.id) {
                    *slot = task;
                }
            }
            Call::Delete(id) => remote.retain(|existing| existing.id != id),
            Call::List => {}
        }
        Ok(())
    }
}

impl SyncGateway for RecordingGateway {
    async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError> {
        self.calls.lock().push(Call::List);
        if self.fail_list {
            return Err(GatewayError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        let remote = self.remote.lock().clone();
        Ok(remote)
    }

    async fn create_task(&self, task: &Task) -> Result<(), GatewayError> {
        self.write(Call::Create(task.clone())).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), GatewayError> {
        self.write(Call::Update(task.clone())).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), GatewayError> {
        self.write(Call::Delete(id.to_string())).await
    }
}

pub fn task(id: &str, name: &str, completed: bool) -> Task {
    Task {
        id: id.to_string(),
        name: name.to_string(),
        completed,
    }
}

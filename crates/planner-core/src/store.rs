//! In-session task list with optimistic remote mirroring.
//!
//! Every mutation rewrites the local list first, publishes the new list to
//! subscribers, and only then hands the matching write to the gateway on a
//! spawned task. Remote failures are logged and counted but never roll the
//! local list back, so local and remote state can drift apart.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use planner_shared::{Task, TaskFilter, UiEvent};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::gateway::{GatewayError, SyncGateway, SyncOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncOutcome {
    Confirmed,
    Failed,
}

/// Counts of remote writes drained by [`TaskStore::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub confirmed: usize,
    pub failed: usize,
}

pub struct TaskStore<G> {
    tasks: Vec<Task>,
    filter: TaskFilter,
    gateway: Arc<G>,
    published: watch::Sender<Vec<Task>>,
    in_flight: JoinSet<SyncOutcome>,
    settled: SyncSummary,
}

impl SyncSummary {
    fn record(&mut self, joined: Result<SyncOutcome, JoinError>) {
        match joined {
            Ok(SyncOutcome::Confirmed) => self.confirmed += 1,
            Ok(SyncOutcome::Failed) => self.failed += 1,
            Err(err) => {
                warn!(error = %err, "remote sync task did not complete");
                self.failed += 1;
            }
        }
    }
}

impl<G> TaskStore<G>
where
    G: SyncGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_tasks(gateway, Vec::new())
    }

    /// Starts the session from an injected list instead of an empty one.
    /// Later entries that repeat an id are dropped.
    pub fn with_tasks(gateway: Arc<G>, tasks: Vec<Task>) -> Self {
        let tasks = dedupe_by_id(tasks);
        let (published, _) = watch::channel(tasks.clone());
        Self {
            tasks,
            filter: TaskFilter::All,
            gateway,
            published,
            in_flight: JoinSet::new(),
            settled: SyncSummary::default(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        debug!(%filter, "filter changed");
        self.filter = filter;
    }

    /// Receives the full task list after every local change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.published.subscribe()
    }

    /// The active filter applied to the list, in list order.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        let filter = self.filter;
        self.tasks.iter().filter(|task| filter.matches(task)).collect()
    }

    /// Replaces the whole list with the remote one. Returns `false` and
    /// leaves the list untouched when the remote query fails.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> bool {
        match self.gateway.list_tasks().await {
            Ok(tasks) => {
                self.tasks = dedupe_by_id(tasks);
                info!(count = self.tasks.len(), "loaded tasks from remote");
                self.publish();
                true
            }
            Err(err) => {
                warn!(
                    error = %err,
                    kept = self.tasks.len(),
                    "listTasks failed; keeping local list"
                );
                false
            }
        }
    }

    #[instrument(skip(self, name))]
    pub fn add(&mut self, name: impl Into<String>) -> Task {
        let task = self.fresh_task(name.into());
        debug!(id = %task.id, "adding task");
        self.tasks.push(task.clone());
        self.publish();

        let gateway = Arc::clone(&self.gateway);
        let record = task.clone();
        self.spawn_sync(SyncOp::Create, task.id.clone(), async move {
            gateway.create_task(&record).await
        });
        task
    }

    #[instrument(skip(self))]
    pub fn toggle_completed(&mut self, id: &str) -> Option<Task> {
        let updated = self.replace(id, Task::toggled)?;
        debug!(id, completed = updated.completed, "toggled task");
        self.push_update(&updated);
        Some(updated)
    }

    #[instrument(skip(self, new_name))]
    pub fn edit(&mut self, id: &str, new_name: impl Into<String>) -> Option<Task> {
        let new_name = new_name.into();
        let updated = self.replace(id, |task| task.renamed(new_name))?;
        debug!(id, "renamed task");
        self.push_update(&updated);
        Some(updated)
    }

    #[instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let Some(idx) = self.tasks.iter().position(|task| task.id == id) else {
            debug!(id, "remove ignored; no such task");
            return None;
        };
        let removed = self.tasks.remove(idx);
        self.publish();

        let gateway = Arc::clone(&self.gateway);
        let key = removed.id.clone();
        self.spawn_sync(SyncOp::Delete, removed.id.clone(), async move {
            gateway.delete_task(&key).await
        });
        Some(removed)
    }

    /// Routes a presentation event to the matching operation. Returns
    /// `false` when the event named a task that is not in the list.
    pub fn apply(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::Add { name } => {
                self.add(name);
                true
            }
            UiEvent::Toggle { id } => self.toggle_completed(&id).is_some(),
            UiEvent::Edit { id, name } => self.edit(&id, name).is_some(),
            UiEvent::Delete { id } => self.remove(&id).is_some(),
            UiEvent::SetFilter { filter } => {
                self.set_filter(filter);
                true
            }
        }
    }

    /// Remote writes spawned but not yet finished.
    pub fn pending_syncs(&mut self) -> usize {
        self.reap_settled();
        self.in_flight.len()
    }

    /// Waits for every remote write spawned so far. A call that never
    /// resolves keeps this from returning.
    #[instrument(skip(self))]
    pub async fn flush(&mut self) -> SyncSummary {
        let mut summary = std::mem::take(&mut self.settled);
        while let Some(joined) = self.in_flight.join_next().await {
            summary.record(joined);
        }
        debug!(
            confirmed = summary.confirmed,
            failed = summary.failed,
            "drained remote syncs"
        );
        summary
    }

    fn fresh_task(&self, name: String) -> Task {
        loop {
            let task = Task::new(name.clone());
            if !self.tasks.iter().any(|existing| existing.id == task.id) {
                return task;
            }
        }
    }

    fn replace(&mut self, id: &str, update: impl FnOnce(&Task) -> Task) -> Option<Task> {
        let Some(slot) = self.tasks.iter_mut().find(|task| task.id == id) else {
            debug!(id, "update ignored; no such task");
            return None;
        };
        let updated = update(&*slot);
        *slot = updated.clone();
        self.publish();
        Some(updated)
    }

    fn push_update(&mut self, updated: &Task) {
        let gateway = Arc::clone(&self.gateway);
        let record = updated.clone();
        self.spawn_sync(SyncOp::Update, updated.id.clone(), async move {
            gateway.update_task(&record).await
        });
    }

    fn publish(&self) {
        self.published.send_replace(self.tasks.clone());
    }

    fn spawn_sync<F>(&mut self, op: SyncOp, id: String, call: F)
    where
        F: Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        self.reap_settled();
        self.in_flight.spawn(async move {
            match call.await {
                Ok(()) => {
                    debug!(%op, id = %id, "remote sync confirmed");
                    SyncOutcome::Confirmed
                }
                Err(err) => {
                    warn!(%op, id = %id, error = %err, "remote sync failed; local state kept");
                    SyncOutcome::Failed
                }
            }
        });
    }

    /// Moves finished writes out of the join set; their outcomes stay
    /// counted until the next `flush`.
    fn reap_settled(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.settled.record(joined);
        }
    }
}

impl<G> Drop for TaskStore<G> {
    // Writes already handed to the runtime keep running after the store goes away.
    fn drop(&mut self) {
        self.in_flight.detach_all();
    }
}

fn dedupe_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let before = tasks.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<Task> = tasks
        .into_iter()
        .filter(|task| seen.insert(task.id.clone()))
        .collect();
    if kept.len() != before {
        warn!(
            dropped = before - kept.len(),
            "dropped tasks with repeated ids"
        );
    }
    kept
}

//! Owned registry of pipeline tasks.

use super::Task;
use crate::cancellation::CancellationToken;
use crate::report::Report;
use crate::stages::Stage;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Keeps track of tasks by id, remembering the order they were added in.
#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: DashMap<Uuid, (u64, Arc<Task>)>,
    next_seq: AtomicU64,
}

impl TaskManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task, replacing any task with the same id.
    pub fn add(&self, task: Task) -> Arc<Task> {
        self.add_shared(Arc::new(task))
    }

    /// Adds an already shared task.
    pub fn add_shared(&self, task: Arc<Task>) -> Arc<Task> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        debug!(task = %task.name(), id = %task.id(), "Adding task");
        self.tasks.insert(task.id(), (seq, task.clone()));
        task
    }

    /// Looks a task up by id.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Arc<Task>> {
        self.tasks.get(&id).map(|entry| entry.value().1.clone())
    }

    /// Removes a task.
    pub fn remove(&self, id: Uuid) -> Option<Arc<Task>> {
        self.tasks.remove(&id).map(|(_, (_, task))| task)
    }

    /// Every task, in the order added.
    #[must_use]
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        let mut tasks: Vec<_> = self
            .tasks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|(seq, _)| *seq);
        tasks.into_iter().map(|(_, task)| task).collect()
    }

    /// Tasks that have not completed, in the order added.
    #[must_use]
    pub fn active(&self) -> Vec<Arc<Task>> {
        self.tasks().into_iter().filter(|t| !t.is_complete()).collect()
    }

    /// Completed tasks, in the order added.
    #[must_use]
    pub fn completed(&self) -> Vec<Arc<Task>> {
        self.tasks().into_iter().filter(|t| t.is_complete()).collect()
    }

    /// Drops every completed task and returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, (_, task)| !task.is_complete());
        before - self.tasks.len()
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True if no tasks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Runs a registered task; `None` if the id is unknown.
    pub async fn run(
        &self,
        id: Uuid,
        stages: &[Arc<dyn Stage>],
        token: &CancellationToken,
    ) -> Option<Arc<Report>> {
        let Some(task) = self.get(id) else {
            warn!(%id, "No such task");
            return None;
        };
        Some(task.run(stages, token).await)
    }
}

use crate::error::{AppError, AppResult};
use crate::models::{Task, TaskResult, TaskSpec, TaskStatus};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};
use uuid::Uuid;

/// Completions kept for the rolling duration average
const DURATION_WINDOW: usize = 100;

/// Point-in-time queue counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean run time of the most recent completions
    pub average_duration_ms: Option<f64>,
}

#[derive(Default)]
struct QueueState {
    /// Descending priority, FIFO among equal priorities
    pending: Vec<Task>,
    running: HashMap<Uuid, Task>,
    finished: HashMap<Uuid, Task>,
    durations_ms: VecDeque<i64>,
}

impl QueueState {
    fn insert_pending(&mut self, task: Task) {
        let position = self.pending.partition_point(|queued| queued.priority >= task.priority);
        self.pending.insert(position, task);
    }

    fn take_running(&mut self, id: Uuid) -> AppResult<Task> {
        if let Some(task) = self.running.remove(&id) {
            return Ok(task);
        }
        let known = self.pending.iter().any(|t| t.id == id) || self.finished.contains_key(&id);
        if known {
            Err(AppError::InvalidState(format!("Task {} is not running", id)))
        } else {
            Err(AppError::NotFound(format!("Task {}", id)))
        }
    }
}

/// Priority work list with explicit running/finished state and retry-with-requeue.
///
/// All state sits behind one lock, so `dequeue_batch` can never hand the same
/// task to two callers.
#[derive(Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, spec: TaskSpec) -> Uuid {
        let task = Task::new(spec);
        let id = task.id;
        info!(
            task_id = %id,
            kind = task.kind.as_str(),
            target = %task.target,
            market = %task.market,
            priority = task.priority,
            "Task enqueued"
        );
        self.state.lock().insert_pending(task);
        id
    }

    pub fn enqueue_many(&self, specs: impl IntoIterator<Item = TaskSpec>) -> Vec<Uuid> {
        specs.into_iter().map(|spec| self.enqueue(spec)).collect()
    }

    /// Move up to `max_count` highest-priority pending tasks to Running
    pub fn dequeue_batch(&self, max_count: usize) -> Vec<Task> {
        let mut state = self.state.lock();
        let take = max_count.min(state.pending.len());
        let now = Utc::now();

        let batch: Vec<Task> = state
            .pending
            .drain(..take)
            .map(|mut task| {
                task.status = TaskStatus::Running;
                task.started_at = Some(now);
                task
            })
            .collect();

        for task in &batch {
            state.running.insert(task.id, task.clone());
        }
        batch
    }

    pub fn complete(&self, id: Uuid, result: TaskResult) -> AppResult<()> {
        let mut state = self.state.lock();
        let mut task = state.take_running(id)?;

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(result);

        if let Some(ms) = task.duration_ms() {
            state.durations_ms.push_back(ms);
            while state.durations_ms.len() > DURATION_WINDOW {
                state.durations_ms.pop_front();
            }
        }

        state.finished.insert(id, task);
        Ok(())
    }

    /// Requeue while retries remain, otherwise fail terminally. Returns the resulting status.
    pub fn fail(&self, id: Uuid, error: impl Into<String>) -> AppResult<TaskStatus> {
        let error = error.into();
        let mut state = self.state.lock();
        let mut task = state.take_running(id)?;
        task.last_error = Some(error.clone());

        if task.can_retry() {
            task.retry_count += 1;
            task.status = TaskStatus::Pending;
            task.started_at = None;
            warn!(
                task_id = %id,
                retry = task.retry_count,
                max_retries = task.max_retries,
                "Task failed, requeued: {}",
                error
            );
            state.insert_pending(task);
            Ok(TaskStatus::Pending)
        } else {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(Utc::now());
            warn!(task_id = %id, retries = task.retry_count, "Task failed permanently: {}", error);
            state.finished.insert(id, task);
            Ok(TaskStatus::Failed)
        }
    }

    /// Snapshot of a task wherever it currently lives
    pub fn get(&self, id: Uuid) -> Option<Task> {
        let state = self.state.lock();
        state
            .running
            .get(&id)
            .or_else(|| state.finished.get(&id))
            .or_else(|| state.pending.iter().find(|t| t.id == id))
            .cloned()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn running_len(&self) -> usize {
        self.state.lock().running.len()
    }

    /// True when nothing is waiting to be dispatched
    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        let (completed, failed) = state.finished.values().fold((0, 0), |(c, f), task| match task.status {
            TaskStatus::Completed => (c + 1, f),
            _ => (c, f + 1),
        });
        let average_duration_ms = if state.durations_ms.is_empty() {
            None
        } else {
            Some(state.durations_ms.iter().sum::<i64>() as f64 / state.durations_ms.len() as f64)
        };

        QueueStats {
            pending: state.pending.len(),
            running: state.running.len(),
            completed,
            failed,
            average_duration_ms,
        }
    }

    /// Forget finished tasks and duration samples. Returns how many tasks were dropped.
    pub fn clear_finished(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.finished.len();
        state.finished.clear();
        state.durations_ms.clear();
        dropped
    }
}

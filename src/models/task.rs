use super::product::Market;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry budget for new tasks
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What a task fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Product,
    Category,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Product => "product",
            TaskKind::Category => "category",
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Outcome recorded when a task completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskResult {
    Analyzed { deal_id: Uuid, qualifies: bool },
    Expanded { discovered: usize },
}

/// Enqueue request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub target: String,
    pub market: Market,
    pub priority: i32,
    pub max_retries: u32,
    pub category: Option<String>,
    pub cost_price: Option<Decimal>,
}

impl TaskSpec {
    pub fn product(item_id: impl Into<String>, market: Market) -> Self {
        Self {
            kind: TaskKind::Product,
            target: item_id.into(),
            market,
            priority: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            category: None,
            cost_price: None,
        }
    }

    pub fn category(category_ref: impl Into<String>, market: Market) -> Self {
        let target = category_ref.into();
        Self {
            kind: TaskKind::Category,
            category: Some(target.clone()),
            target,
            market,
            priority: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            cost_price: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_cost_price(mut self, cost_price: Decimal) -> Self {
        self.cost_price = Some(cost_price);
        self
    }
}

/// Unit of scheduled fetch-and-evaluate work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub target: String,
    pub market: Market,
    pub priority: i32,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub category: Option<String>,
    pub cost_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<TaskResult>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: spec.kind,
            target: spec.target,
            market: spec.market,
            priority: spec.priority,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: spec.max_retries,
            category: spec.category,
            cost_price: spec.cost_price,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            result: None,
        }
    }

    /// Wall-clock time between start and completion, if both are stamped
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0)),
            _ => None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(TaskSpec::product("B0001", Market::De).with_priority(5));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, 5);
        assert_eq!(task.retry_count, 0);
        assert!(task.can_retry());
        assert!(task.duration_ms().is_none());
    }

    #[test]
    fn test_category_spec_carries_category() {
        let spec = TaskSpec::category("electronics", Market::Fr);
        assert_eq!(spec.kind, TaskKind::Category);
        assert_eq!(spec.category.as_deref(), Some("electronics"));
    }
}

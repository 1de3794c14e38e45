//! `ListTasks` filtering and pagination (§6), ordered by `created_at`
//! descending.

use orch_core::ids::TaskId;
use orch_core::task_spec::{RiskBand, TaskSpec, TaskState};
use serde::{Deserialize, Serialize};

/// A condensed view of a `TaskSpec` for list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub intent: String,
    pub state: TaskState,
    pub risk_band: RiskBand,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&TaskSpec> for TaskSummary {
    fn from(spec: &TaskSpec) -> Self {
        Self {
            task_id: spec.task_id,
            intent: spec.intent.clone(),
            state: spec.state,
            risk_band: spec.risk_band,
            created_at: spec.created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub state: Option<TaskState>,
    pub created_after: Option<chrono::DateTime<chrono::Utc>>,
    pub agent: Option<String>,
    pub risk_band: Option<RiskBand>,
}

impl ListFilter {
    fn matches(&self, spec: &TaskSpec) -> bool {
        if let Some(state) = self.state {
            if spec.state != state {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if spec.created_at <= after {
                return false;
            }
        }
        if let Some(agent) = &self.agent {
            if !spec.agent_chain.iter().any(|a| a == agent) {
                return false;
            }
        }
        if let Some(band) = self.risk_band {
            if spec.risk_band != band {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

#[derive(Debug, Clone)]
pub struct PagedSummaries {
    pub items: Vec<TaskSummary>,
    pub total_matching: usize,
}

/// Apply `filter`, sort by `created_at` descending, and slice to `page`.
#[must_use]
pub fn paginate(specs: &[TaskSpec], filter: &ListFilter, page: Page) -> PagedSummaries {
    let mut matching: Vec<&TaskSpec> = specs.iter().filter(|s| filter.matches(s)).collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total_matching = matching.len();
    let items = matching
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .map(TaskSummary::from)
        .collect();
    PagedSummaries { items, total_matching }
}

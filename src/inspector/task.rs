use super::{InspectorSession, StageOutcome};
use crate::core::Patch;
use crate::entity::{DoneReason, Priority, Task, TaskStatus, TaskValue};
use crate::normalize::{normalize_optional_text, to_timestamp_or_null};
use chrono::Utc;

/// Task-only actions. Each one commits immediately.
impl InspectorSession<Task> {
    /// Done carries the done reason and stamps a local completion time; any
    /// other status clears both.
    pub async fn set_status(&mut self, status: TaskStatus) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        if record.status == status {
            return StageOutcome::Unchanged;
        }

        let (wire, local) = if status == TaskStatus::Done {
            let reason = record.done_reason.unwrap_or_default();
            let completed_at = record
                .completed_at
                .unwrap_or_else(|| Utc::now().timestamp_millis());
            let wire = Patch::new()
                .with(TaskValue::Status(status))
                .with(TaskValue::DoneReason(Some(reason)));
            let local = wire.clone().with(TaskValue::CompletedAt(Some(completed_at)));
            (wire, local)
        } else {
            let wire = Patch::new()
                .with(TaskValue::Status(status))
                .with(TaskValue::DoneReason(None));
            let local = wire.clone().with(TaskValue::CompletedAt(None));
            (wire, local)
        };
        self.commit_action(wire, local).await
    }

    /// Only meaningful while the task is done.
    pub async fn set_done_reason(&mut self, reason: DoneReason) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        if record.status != TaskStatus::Done {
            return StageOutcome::Skipped;
        }
        if record.done_reason == Some(reason) {
            return StageOutcome::Unchanged;
        }
        let patch = Patch::new().with(TaskValue::DoneReason(Some(reason)));
        self.commit_action(patch.clone(), patch).await
    }

    pub async fn set_priority(&mut self, priority: Priority) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        if record.priority == priority {
            return StageOutcome::Unchanged;
        }
        let patch = Patch::new().with(TaskValue::Priority(priority));
        self.commit_action(patch.clone(), patch).await
    }

    /// Takes a `YYYY-MM-DD` date input; anything unparsable clears the deadline.
    pub async fn set_deadline_input(&mut self, input: &str) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        let deadline_at = to_timestamp_or_null(input);
        if record.deadline_at == deadline_at {
            return StageOutcome::Unchanged;
        }
        let patch = Patch::new().with(TaskValue::DeadlineAt(deadline_at));
        self.commit_action(patch.clone(), patch).await
    }

    pub async fn clear_deadline(&mut self) -> StageOutcome {
        self.set_deadline_input("").await
    }

    /// Moving to another space detaches the task from its project.
    pub async fn set_space(&mut self, space_id: &str) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        let space_id = space_id.trim();
        if space_id.is_empty() {
            return StageOutcome::Skipped;
        }
        if record.space_id == space_id {
            return StageOutcome::Unchanged;
        }
        let patch = Patch::new()
            .with(TaskValue::SpaceId(space_id.to_string()))
            .with(TaskValue::ProjectId(None));
        self.commit_action(patch.clone(), patch).await
    }

    pub async fn set_project(&mut self, project_id: Option<&str>) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        let project_id = normalize_optional_text(project_id);
        if record.project_id == project_id {
            return StageOutcome::Unchanged;
        }
        let patch = Patch::new().with(TaskValue::ProjectId(project_id));
        self.commit_action(patch.clone(), patch).await
    }
}

use super::{InspectorSession, StageOutcome};
use crate::core::{EntityId, Patch};
use crate::entity::{Priority, Project, ProjectRecord, ProjectValue};
use crate::normalize::normalize_optional_text;
use std::collections::{HashMap, HashSet};

/// Ids of every project below `root` in the parent hierarchy of `projects`.
pub fn collect_descendant_ids(projects: &[ProjectRecord], root: &EntityId) -> HashSet<EntityId> {
    let mut children: HashMap<&str, Vec<&EntityId>> = HashMap::new();
    for project in projects {
        if let Some(parent_id) = project.parent_id.as_deref() {
            children.entry(parent_id).or_default().push(&project.id);
        }
    }

    let mut descendants = HashSet::new();
    let mut stack: Vec<&EntityId> = children.get(root.as_str()).cloned().unwrap_or_default();
    while let Some(next) = stack.pop() {
        if !descendants.insert(next.clone()) {
            continue;
        }
        if let Some(grandchildren) = children.get(next.as_str()) {
            stack.extend(grandchildren.iter().copied());
        }
    }
    descendants
}

/// Project-only actions. Each one commits immediately.
impl InspectorSession<Project> {
    pub async fn set_priority(&mut self, priority: Priority) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        if record.priority == priority {
            return StageOutcome::Unchanged;
        }
        let patch = Patch::new().with(ProjectValue::Priority(priority));
        self.commit_action(patch.clone(), patch).await
    }

    /// Re-parents the project. `None` moves it to the root. A parent that is
    /// the project itself or one of its descendants in `space_projects` is
    /// refused.
    pub async fn set_parent(
        &mut self,
        parent_id: Option<&str>,
        space_projects: &[ProjectRecord],
    ) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        let parent_id = normalize_optional_text(parent_id);
        if record.parent_id == parent_id {
            return StageOutcome::Unchanged;
        }
        if let Some(parent) = parent_id.as_deref() {
            let parent = EntityId::from(parent);
            if parent == record.id
                || collect_descendant_ids(space_projects, &record.id).contains(&parent)
            {
                return StageOutcome::Skipped;
            }
        }
        let patch = Patch::new().with(ProjectValue::ParentId(parent_id));
        self.commit_action(patch.clone(), patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, parent: Option<&str>) -> ProjectRecord {
        let mut record = ProjectRecord::new(id, "s-1", id);
        record.parent_id = parent.map(str::to_string);
        record
    }

    #[test]
    fn descendants_follow_the_whole_subtree() {
        let projects = vec![
            project("root", None),
            project("a", Some("root")),
            project("b", Some("a")),
            project("c", Some("b")),
            project("other", None),
        ];

        let descendants = collect_descendant_ids(&projects, &EntityId::from("a"));

        assert_eq!(descendants.len(), 2);
        assert!(descendants.contains(&EntityId::from("b")));
        assert!(descendants.contains(&EntityId::from("c")));
        assert!(collect_descendant_ids(&projects, &EntityId::from("other")).is_empty());
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let projects = vec![project("a", Some("b")), project("b", Some("a"))];
        let descendants = collect_descendant_ids(&projects, &EntityId::from("a"));
        assert_eq!(descendants.len(), 2);
    }
}

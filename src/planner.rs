//! Task groups: reusable task templates a focus session can be started from.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::PlannerError;
use crate::models::*;
use crate::store::{load_json, save_json, KeyValueStore, TASK_GROUPS_KEY};

pub struct TaskPlanner {
    store: Arc<dyn KeyValueStore>,
    groups: Vec<TaskGroup>,
}

impl TaskPlanner {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self, PlannerError> {
        let groups = load_json(store.as_ref(), TASK_GROUPS_KEY)?.unwrap_or_default();
        Ok(Self { store, groups })
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn groups(&self) -> &[TaskGroup] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&TaskGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Look a task up by id across all groups.
    pub fn task(&self, id: &str) -> Option<&TaskTemplate> {
        self.groups
            .iter()
            .flat_map(|g| g.tasks.iter())
            .find(|t| t.id == id)
    }

    /// Snapshot of a stored task, ready to hand to
    /// [`crate::session::SessionEngine::start_session`].
    pub fn current_task(&self, id: &str) -> Result<CurrentTask, PlannerError> {
        self.task(id)
            .map(CurrentTask::from)
            .ok_or_else(|| PlannerError::TaskNotFound(id.to_string()))
    }

    // ============================================================
    // Groups
    // ============================================================

    pub fn create_group(&mut self, name: &str) -> Result<TaskGroup, PlannerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlannerError::NameRequired);
        }
        let group = TaskGroup {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            tasks: Vec::new(),
        };

        let mut next = self.groups.clone();
        next.push(group.clone());
        self.commit(next)?;

        info!(id = %group.id, name, "task group created");
        Ok(group)
    }

    pub fn rename_group(&mut self, id: &str, name: &str) -> Result<(), PlannerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlannerError::NameRequired);
        }
        let mut next = self.groups.clone();
        let group = group_mut(&mut next, id)?;
        group.name = name.to_string();
        self.commit(next)
    }

    // ============================================================
    // Tasks
    // ============================================================

    /// Append a new idle task to `group_id`.
    pub fn add_task(
        &mut self,
        group_id: &str,
        input: TaskInput,
    ) -> Result<TaskTemplate, PlannerError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(PlannerError::TitleRequired);
        }
        let task = TaskTemplate {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: input.content,
            minutes: input.minutes,
            kind: input.kind,
            status: TASK_IDLE.to_string(),
        };

        let mut next = self.groups.clone();
        group_mut(&mut next, group_id)?.tasks.push(task.clone());
        self.commit(next)?;

        debug!(id = %task.id, group_id, "task added");
        Ok(task)
    }

    /// Add [`TASK_PRESETS`]`[index]` to `group_id`.
    pub fn add_preset(
        &mut self,
        group_id: &str,
        index: usize,
    ) -> Result<TaskTemplate, PlannerError> {
        let preset = TASK_PRESETS
            .get(index)
            .ok_or(PlannerError::UnknownPreset(index))?;
        self.add_task(group_id, preset.to_input())
    }

    pub fn update_task(
        &mut self,
        task_id: &str,
        update: TaskUpdate,
    ) -> Result<TaskTemplate, PlannerError> {
        let mut next = self.groups.clone();
        let task = next
            .iter_mut()
            .flat_map(|g| g.tasks.iter_mut())
            .find(|t| t.id == task_id)
            .ok_or_else(|| PlannerError::TaskNotFound(task_id.to_string()))?;

        if let Some(title) = update.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(PlannerError::TitleRequired);
            }
            task.title = title.to_string();
        }
        if let Some(content) = update.content {
            task.content = content;
        }
        if let Some(minutes) = update.minutes {
            task.minutes = minutes;
        }
        if let Some(kind) = update.kind {
            task.kind = kind;
        }
        let task = task.clone();
        self.commit(next)?;

        debug!(id = task_id, "task updated");
        Ok(task)
    }

    /// Returns true if a task was removed.
    pub fn delete_task(&mut self, task_id: &str) -> Result<bool, PlannerError> {
        if self.task(task_id).is_none() {
            return Ok(false);
        }
        let mut next = self.groups.clone();
        for group in &mut next {
            group.tasks.retain(|t| t.id != task_id);
        }
        self.commit(next)?;

        debug!(id = task_id, "task deleted");
        Ok(true)
    }

    fn commit(&mut self, next: Vec<TaskGroup>) -> Result<(), PlannerError> {
        save_json(self.store.as_ref(), TASK_GROUPS_KEY, &next)?;
        self.groups = next;
        Ok(())
    }
}

fn group_mut<'a>(groups: &'a mut [TaskGroup], id: &str) -> Result<&'a mut TaskGroup, PlannerError> {
    groups
        .iter_mut()
        .find(|g| g.id == id)
        .ok_or_else(|| PlannerError::GroupNotFound(id.to_string()))
}

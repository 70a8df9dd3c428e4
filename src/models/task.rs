use serde::{Deserialize, Serialize};

/// Status every stored task template carries.
pub const TASK_IDLE: &str = "idle";

/// A task the user committed to for one focus session.
///
/// The session engine keeps a snapshot for the duration of a session and
/// copies it into the history entry on completion. Tasks picked from a
/// [`TaskGroup`] also carry the template's id and content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Planned length in minutes, if the task has one.
    #[serde(default)]
    pub minutes: Option<u32>,
}

impl CurrentTask {
    pub fn new(title: impl Into<String>, minutes: Option<u32>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: String::new(),
            minutes,
        }
    }
}

impl From<&TaskTemplate> for CurrentTask {
    fn from(task: &TaskTemplate) -> Self {
        Self {
            id: Some(task.id.clone()),
            title: task.title.clone(),
            content: task.content.clone(),
            minutes: task.minutes,
        }
    }
}

/// The self-control flavour of a task.
///
/// - `IWill`: Something to do
/// - `IWant`: Something to work towards
/// - `IWont`: An urge to hold off
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    IWill,
    IWant,
    IWont,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IWill => "i_will",
            Self::IWant => "i_want",
            Self::IWont => "i_wont",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "i_will" => Some(Self::IWill),
            "i_want" => Some(Self::IWant),
            "i_wont" => Some(Self::IWont),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::IWill => "💪",
            Self::IWant => "🎯",
            Self::IWont => "🛑",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reusable task a session can be started from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Planned length in minutes. `None` means open-ended.
    #[serde(default)]
    pub minutes: Option<u32>,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    #[serde(default = "idle_status")]
    pub status: String,
}

fn idle_status() -> String {
    TASK_IDLE.to_string()
}

/// A named list of task templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<TaskTemplate>,
}

/// Input for adding a task to a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub content: String,
    pub minutes: Option<u32>,
    pub kind: TaskKind,
}

/// Input for editing a task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` makes the task open-ended.
    pub minutes: Option<Option<u32>>,
    pub kind: Option<TaskKind>,
}

/// A built-in task users can add to a group in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPreset {
    pub title: &'static str,
    pub content: &'static str,
    pub minutes: Option<u32>,
    pub kind: TaskKind,
}

impl TaskPreset {
    pub fn to_input(&self) -> TaskInput {
        TaskInput {
            title: self.title.to_string(),
            content: self.content.to_string(),
            minutes: self.minutes,
            kind: self.kind,
        }
    }
}

pub const TASK_PRESETS: &[TaskPreset] = &[
    TaskPreset {
        title: "Pomodoro",
        content: "Focus for one pomodoro",
        minutes: Some(25),
        kind: TaskKind::IWill,
    },
    TaskPreset {
        title: "Deep work",
        content: "Uninterrupted deep work",
        minutes: Some(90),
        kind: TaskKind::IWill,
    },
    TaskPreset {
        title: "Reading",
        content: "Read a non-fiction book",
        minutes: Some(30),
        kind: TaskKind::IWant,
    },
    TaskPreset {
        title: "No smoking / no phone",
        content: "Sit out the urge",
        minutes: Some(15),
        kind: TaskKind::IWont,
    },
    TaskPreset {
        title: "Free practice",
        content: "Open-ended practice",
        minutes: None,
        kind: TaskKind::IWill,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_reads_web_client_blob() {
        let task: TaskTemplate = serde_json::from_str(
            r#"{"id":"1718000000000","title":"Read","content":"20 pages","minutes":null,"type":"i_want","status":"idle"}"#,
        )
        .unwrap();
        assert_eq!(task.kind, TaskKind::IWant);
        assert_eq!(task.minutes, None);

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "i_want");
    }

    #[test]
    fn missing_type_and_status_default() {
        let task: TaskTemplate = serde_json::from_str(r#"{"id":"t","title":"T"}"#).unwrap();
        assert_eq!(task.kind, TaskKind::IWill);
        assert_eq!(task.status, TASK_IDLE);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [TaskKind::IWill, TaskKind::IWant, TaskKind::IWont] {
            assert_eq!(TaskKind::from_str(kind.as_str()), Some(kind));
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
        assert_eq!(TaskKind::from_str("i_might"), None);
    }

    #[test]
    fn current_task_from_template_keeps_id() {
        let template = TaskTemplate {
            id: "t1".to_string(),
            title: "Write".to_string(),
            content: "chapter 2".to_string(),
            minutes: Some(50),
            kind: TaskKind::IWill,
            status: idle_status(),
        };
        let task = CurrentTask::from(&template);
        assert_eq!(task.id.as_deref(), Some("t1"));
        assert_eq!(task.content, "chapter 2");
        assert_eq!(task.minutes, Some(50));
    }

    #[test]
    fn ad_hoc_task_serializes_without_template_fields() {
        let json = serde_json::to_value(CurrentTask::new("Walk", None)).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("content").is_none());
    }
}

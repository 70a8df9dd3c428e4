use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed id of the single root node.
pub const ROOT_ID: &str = "root";

/// A commitment in the gated tree.
///
/// Nodes form a tree through `parent_id` and the ordered `children` id list.
/// Both directions are stored so the tree survives a round trip through the
/// flat share token without re-deriving child order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentNode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

impl CommitmentNode {
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            status: NodeStatus::Inactive,
            parent_id,
            children: Vec::new(),
        }
    }

    /// The node every fresh tree starts with.
    pub fn default_root() -> Self {
        Self::new(
            ROOT_ID,
            None,
            "Core protocol",
            "Open this every day and review these commitments.",
        )
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}

/// The unlock/progress state of a commitment node.
///
/// - `Inactive`: Locked or extinguished
/// - `Active`: Unlocked; children may now be unlocked
/// - `Completed`: Done; children may be unlocked
/// - `Failed`: Broken; children stay locked
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Inactive,
    Active,
    Completed,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(Self::Inactive),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether a node in this state lets its children be unlocked.
    pub fn unlocks_children(&self) -> bool {
        matches!(self, Self::Active | Self::Completed)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count of quota-consuming tree mutations made on `date`.
///
/// `date` is the local calendar date of the last check. A record whose date
/// differs from today is stale and is rolled over on the next check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyQuota {
    pub date: Option<NaiveDate>,
    pub count: u32,
}

impl DailyQuota {
    /// Reset the counter if `today` is a new day. Returns true if it rolled over.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.date == Some(today) {
            return false;
        }
        self.date = Some(today);
        self.count = 0;
        true
    }
}

/// A read-only copy of an imported tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportedTreeSnapshot {
    pub id: String,
    pub name: String,
    /// Decoded nodes, every status normalized to `Inactive`.
    pub nodes: Vec<CommitmentNode>,
}

impl ImportedTreeSnapshot {
    pub fn node(&self, id: &str) -> Option<&CommitmentNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// How [`crate::tree::TreeEngine::import_tree`] applies a decoded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Decode and validate only; the live tree is untouched.
    Preview,
    /// Overwrite the live tree with the decoded nodes.
    Replace,
}

//! Gated commitment tree engine (RSIP).
//!
//! A single tree rooted at `"root"`. A node can be unlocked only when its
//! parent is active or completed, and unlocking or adding a node draws on a
//! small per-day quota so a plan has to be worked through one step at a time.
//! Imported trees are kept as frozen snapshots beside the live tree.

mod arena;
pub mod codec;
pub mod invariants;
pub mod render;

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::DisciplineConfig;
use crate::error::TreeError;
use crate::models::*;
use crate::store::{
    load_json, save_json, KeyValueStore, DAILY_KEY, IMPORTED_KEY, NODES_KEY, SHARED_KEY,
};

pub use arena::NodeSet;

/// Name given to imported trees when the caller doesn't supply one.
pub const DEFAULT_IMPORT_NAME: &str = "Imported tree";

#[derive(Debug, Clone, Default)]
struct TreeState {
    nodes: NodeSet,
    imported: Vec<ImportedTreeSnapshot>,
    daily: DailyQuota,
    shared: bool,
}

pub struct TreeEngine {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    daily_limit: u32,
    state: TreeState,
}

impl TreeEngine {
    /// Load the persisted tree. A store with no tree is seeded with the root.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Result<Self, TreeError> {
        let nodes: Option<Vec<CommitmentNode>> = load_json(store.as_ref(), NODES_KEY)?;
        let seeded = nodes.is_none();
        let state = TreeState {
            nodes: NodeSet::from_vec(
                nodes.unwrap_or_else(|| vec![CommitmentNode::default_root()]),
            ),
            imported: load_json(store.as_ref(), IMPORTED_KEY)?.unwrap_or_default(),
            daily: load_json(store.as_ref(), DAILY_KEY)?.unwrap_or_default(),
            shared: load_json(store.as_ref(), SHARED_KEY)?.unwrap_or(false),
        };

        let engine = Self {
            store,
            clock,
            daily_limit: 1,
            state,
        };
        if seeded {
            debug!("no stored tree, seeding root node");
            engine.persist(&engine.state)?;
        }
        Ok(engine)
    }

    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &DisciplineConfig,
    ) -> Result<Self, TreeError> {
        let mut engine = Self::new(store, clock)?;
        engine.daily_limit = config.daily_limit;
        Ok(engine)
    }

    // ============================================================
    // Queries
    // ============================================================

    /// The live node list in stable order.
    pub fn nodes(&self) -> Vec<CommitmentNode> {
        self.state.nodes.to_vec()
    }

    pub fn node(&self, id: &str) -> Option<&CommitmentNode> {
        self.state.nodes.get(id)
    }

    pub fn imported_trees(&self) -> &[ImportedTreeSnapshot] {
        &self.state.imported
    }

    pub fn is_shared(&self) -> bool {
        self.state.shared
    }

    pub fn quota(&self) -> &DailyQuota {
        &self.state.daily
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Whether `id` may be unlocked as far as its parent is concerned.
    ///
    /// The root is always unlockable. A node whose parent can't be found is
    /// treated as unlockable too.
    pub fn can_activate_node(&self, id: &str) -> bool {
        let Some(node) = self.state.nodes.get(id) else {
            return false;
        };
        if node.is_root() {
            return true;
        }
        match node.parent_id.as_deref() {
            None => true,
            Some(parent_id) => match self.state.nodes.get(parent_id) {
                None => true,
                Some(parent) => parent.status.unlocks_children(),
            },
        }
    }

    // ============================================================
    // Daily quota
    // ============================================================

    /// Whether a quota-consuming operation is allowed right now.
    ///
    /// Rolls the quota over (and persists it) on the first check of a new day.
    pub fn can_activate_today(&mut self) -> Result<bool, TreeError> {
        let today = self.clock.today();
        if self.state.daily.date != Some(today) {
            let mut next = self.state.clone();
            next.daily.roll_over(today);
            self.commit(next)?;
            debug!(%today, "daily quota rolled over");
        }
        Ok(self.state.daily.count < self.daily_limit)
    }

    /// Roll over if needed and fail if today's quota is spent.
    fn check_quota(&self, next: &mut TreeState) -> Result<(), TreeError> {
        next.daily.roll_over(self.clock.today());
        if next.daily.count >= self.daily_limit {
            return Err(TreeError::DailyQuotaExceeded);
        }
        Ok(())
    }

    fn increase_daily(&self, next: &mut TreeState) {
        next.daily.roll_over(self.clock.today());
        next.daily.count += 1;
    }

    // ============================================================
    // Node operations
    // ============================================================

    /// Add an inactive node under `parent_id`. Consumes quota.
    ///
    /// If `parent_id` doesn't resolve the node is still created, detached
    /// from the tree, and the quota is still spent.
    pub fn add_node(
        &mut self,
        parent_id: &str,
        title: &str,
        description: &str,
    ) -> Result<CommitmentNode, TreeError> {
        let mut next = self.state.clone();
        self.check_quota(&mut next)?;

        let node = CommitmentNode::new(
            Uuid::new_v4().to_string(),
            Some(parent_id.to_string()),
            title,
            description,
        );
        match next.nodes.get_mut(parent_id) {
            Some(parent) => parent.children.push(node.id.clone()),
            None => warn!(parent_id, node = %node.id, "parent not found, node created detached"),
        }
        next.nodes.insert(node.clone());
        self.increase_daily(&mut next);
        self.commit(next)?;

        info!(id = %node.id, parent_id, "node added");
        Ok(node)
    }

    /// Unlock a node. Consumes quota.
    pub fn activate_node(&mut self, id: &str) -> Result<&CommitmentNode, TreeError> {
        if !self.state.nodes.contains(id) {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }
        let mut next = self.state.clone();
        self.check_quota(&mut next)?;
        if !self.can_activate_node(id) {
            return Err(TreeError::ParentNotUnlocked(id.to_string()));
        }

        if let Some(node) = next.nodes.get_mut(id) {
            node.status = NodeStatus::Active;
        }
        self.increase_daily(&mut next);
        self.commit(next)?;

        info!(id, "node activated");
        self.state
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    /// Record progress on a node (e.g. completed or failed). No quota.
    pub fn set_node_status(&mut self, id: &str, status: NodeStatus) -> Result<(), TreeError> {
        let mut next = self.state.clone();
        let node = next
            .nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;
        node.status = status;
        self.commit(next)?;

        debug!(id, %status, "node status set");
        Ok(())
    }

    /// Set `id` and every descendant inactive. Returns how many were touched.
    pub fn extinguish_node(&mut self, id: &str) -> Result<usize, TreeError> {
        let subtree = self.state.nodes.subtree(id);
        if subtree.is_empty() {
            return Ok(0);
        }

        let mut next = self.state.clone();
        for node_id in &subtree {
            if let Some(node) = next.nodes.get_mut(node_id) {
                node.status = NodeStatus::Inactive;
            }
        }
        self.commit(next)?;

        info!(id, count = subtree.len(), "subtree extinguished");
        Ok(subtree.len())
    }

    /// Remove `id` and all its descendants. The root can't be deleted.
    ///
    /// Descendants are found through child lists and through `parent_id`
    /// links, so a node whose parent doesn't list it still goes with that
    /// parent. Returns the removed ids. Stale references to them are dropped
    /// from the child lists of the nodes that remain.
    pub fn delete_node(&mut self, id: &str) -> Result<Vec<String>, TreeError> {
        if id == ROOT_ID || !self.state.nodes.contains(id) {
            return Ok(Vec::new());
        }

        let mut next = self.state.clone();
        if let Some(parent_id) = next.nodes.get(id).and_then(|n| n.parent_id.clone()) {
            next.nodes.detach(&parent_id, id);
        }
        let removed = next.nodes.removal_set(id);
        for node_id in &removed {
            next.nodes.remove(node_id);
        }
        let survivors: Vec<String> = next.nodes.iter().map(|n| n.id.clone()).collect();
        for survivor in &survivors {
            if let Some(node) = next.nodes.get_mut(survivor) {
                node.children.retain(|c| !removed.contains(c));
            }
        }
        self.commit(next)?;

        info!(id, count = removed.len(), "subtree deleted");
        Ok(removed)
    }

    /// Reparent `node_id` under `new_parent_id`, appended last.
    ///
    /// Returns false without changes when moving the root or moving a node
    /// onto itself.
    pub fn move_node(&mut self, node_id: &str, new_parent_id: &str) -> Result<bool, TreeError> {
        if node_id == ROOT_ID || node_id == new_parent_id {
            return Ok(false);
        }
        for id in [node_id, new_parent_id] {
            if !self.state.nodes.contains(id) {
                return Err(TreeError::NodeNotFound(id.to_string()));
            }
        }
        if self.state.nodes.is_descendant(node_id, new_parent_id) {
            return Err(TreeError::CycleRejected {
                node: node_id.to_string(),
                new_parent: new_parent_id.to_string(),
            });
        }

        let mut next = self.state.clone();
        let old_parent = next.nodes.get(node_id).and_then(|n| n.parent_id.clone());
        if let Some(old_parent) = &old_parent {
            next.nodes.detach(old_parent, node_id);
        }
        if let Some(node) = next.nodes.get_mut(node_id) {
            node.parent_id = Some(new_parent_id.to_string());
        }
        if let Some(parent) = next.nodes.get_mut(new_parent_id) {
            parent.children.push(node_id.to_string());
        }
        self.commit(next)?;

        info!(node_id, from = ?old_parent, to = new_parent_id, "node moved");
        Ok(true)
    }

    /// Toggle whether the tree is shared. Returns the new value.
    pub fn toggle_share(&mut self) -> Result<bool, TreeError> {
        let mut next = self.state.clone();
        next.shared = !next.shared;
        self.commit(next)?;
        Ok(self.state.shared)
    }

    // ============================================================
    // Export / import
    // ============================================================

    /// Encode the live tree as a share code.
    pub fn export_tree(&self) -> Result<String, TreeError> {
        codec::encode(&self.state.nodes.to_vec())
    }

    /// Decode a share code and either preview it or replace the live tree.
    ///
    /// Returns the decoded nodes in both modes.
    pub fn import_tree(
        &mut self,
        token: &str,
        mode: ImportMode,
    ) -> Result<Vec<CommitmentNode>, TreeError> {
        let nodes = codec::decode(token)?;
        if mode == ImportMode::Replace {
            let mut next = self.state.clone();
            next.nodes = NodeSet::from_vec(nodes.clone());
            self.commit(next)?;
            info!(count = nodes.len(), "live tree replaced from share code");
        }
        Ok(nodes)
    }

    /// Store a share code as a new read-only snapshot. Returns its id.
    ///
    /// Every imported node starts inactive. The live tree and quota are not
    /// touched.
    pub fn import_as_new_tree(&mut self, token: &str, name: &str) -> Result<String, TreeError> {
        let nodes = self
            .import_tree(token, ImportMode::Preview)?
            .into_iter()
            .map(|mut n| {
                n.status = NodeStatus::Inactive;
                n
            })
            .collect();
        let name = match name.trim() {
            "" => DEFAULT_IMPORT_NAME,
            trimmed => trimmed,
        };
        let snapshot = ImportedTreeSnapshot {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            nodes,
        };
        let id = snapshot.id.clone();

        let mut next = self.state.clone();
        next.imported.push(snapshot);
        self.commit(next)?;

        info!(%id, name, "tree imported as snapshot");
        Ok(id)
    }

    /// Copy one node from a snapshot into the live tree under
    /// `target_parent_id`. Only title and description are copied; this goes
    /// through [`TreeEngine::add_node`] and so consumes quota.
    pub fn import_node_from_snapshot(
        &mut self,
        snapshot_id: &str,
        node_id: &str,
        target_parent_id: &str,
    ) -> Result<CommitmentNode, TreeError> {
        let snapshot = self
            .state
            .imported
            .iter()
            .find(|s| s.id == snapshot_id)
            .ok_or_else(|| TreeError::SnapshotNotFound(snapshot_id.to_string()))?;
        let source = snapshot
            .node(node_id)
            .ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))?;
        let (title, description) = (source.title.clone(), source.description.clone());

        self.add_node(target_parent_id, &title, &description)
    }

    // ============================================================
    // Internals
    // ============================================================

    fn commit(&mut self, next: TreeState) -> Result<(), TreeError> {
        self.persist(&next)?;
        self.state = next;
        Ok(())
    }

    fn persist(&self, state: &TreeState) -> Result<(), TreeError> {
        let store = self.store.as_ref();
        save_json(store, NODES_KEY, &state.nodes.to_vec())?;
        save_json(store, IMPORTED_KEY, &state.imported)?;
        save_json(store, DAILY_KEY, &state.daily)?;
        save_json(store, SHARED_KEY, &state.shared)?;
        Ok(())
    }
}

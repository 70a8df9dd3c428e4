//! Id-indexed node storage with explicit child lists.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::CommitmentNode;

/// The live node set.
///
/// Nodes are looked up by id; `order` remembers insertion order so the
/// exported list is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: HashMap<String, CommitmentNode>,
    order: Vec<String>,
}

impl NodeSet {
    /// Build from a flat list. A later duplicate id replaces the earlier node.
    pub fn from_vec(list: Vec<CommitmentNode>) -> Self {
        let mut set = Self::default();
        for node in list {
            set.insert(node);
        }
        set
    }

    pub fn to_vec(&self) -> Vec<CommitmentNode> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitmentNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CommitmentNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CommitmentNode> {
        self.nodes.get_mut(id)
    }

    pub fn insert(&mut self, node: CommitmentNode) {
        if !self.nodes.contains_key(&node.id) {
            self.order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove(&mut self, id: &str) -> Option<CommitmentNode> {
        let node = self.nodes.remove(id)?;
        self.order.retain(|o| o != id);
        Some(node)
    }

    /// `id` followed by all of its descendants, breadth first.
    ///
    /// Follows child lists only. Ids already visited are skipped, so a
    /// corrupt cycle in stored data can't loop forever.
    pub fn subtree(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                queue.extend(node.children.iter().cloned());
                out.push(current);
            }
        }
        out
    }

    /// Every node that has to go when `id` is deleted.
    ///
    /// Like [`NodeSet::subtree`], but a node also belongs to the set when its
    /// `parent_id` points into it, even if the parent's child list doesn't
    /// name it. Imported trees can carry such one-sided links.
    pub fn removal_set(&self, id: &str) -> Vec<String> {
        let mut by_parent: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in self.iter() {
            if let Some(parent_id) = node.parent_id.as_deref() {
                by_parent.entry(parent_id).or_default().push(node.id.as_str());
            }
        }

        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            queue.extend(node.children.iter().map(String::as_str));
            if let Some(linked) = by_parent.get(current) {
                queue.extend(linked.iter().copied());
            }
            out.push(current.to_string());
        }
        out
    }

    /// True if `candidate` lies strictly below `ancestor`.
    pub fn is_descendant(&self, ancestor: &str, candidate: &str) -> bool {
        self.subtree(ancestor)
            .iter()
            .skip(1)
            .any(|id| id == candidate)
    }

    /// Remove `child` from the child list of `parent`, if both exist.
    pub fn detach(&mut self, parent: &str, child: &str) {
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.retain(|c| c != child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, children: &[&str]) -> CommitmentNode {
        let mut n = CommitmentNode::new(id, parent.map(str::to_string), id, "");
        n.children = children.iter().map(|c| c.to_string()).collect();
        n
    }

    fn sample() -> NodeSet {
        NodeSet::from_vec(vec![
            node("root", None, &["a", "b"]),
            node("a", Some("root"), &["a1"]),
            node("a1", Some("a"), &[]),
            node("b", Some("root"), &[]),
        ])
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let ids: Vec<_> = sample().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn subtree_is_breadth_first_and_inclusive() {
        assert_eq!(sample().subtree("root"), vec!["root", "a", "b", "a1"]);
        assert_eq!(sample().subtree("a"), vec!["a", "a1"]);
        assert!(sample().subtree("missing").is_empty());
    }

    #[test]
    fn descendant_check_is_strict() {
        let set = sample();
        assert!(set.is_descendant("root", "a1"));
        assert!(!set.is_descendant("a", "a"));
        assert!(!set.is_descendant("a1", "a"));
        assert!(!set.is_descendant("b", "a1"));
    }

    #[test]
    fn corrupt_cycle_terminates() {
        let set = NodeSet::from_vec(vec![node("x", None, &["y"]), node("y", Some("x"), &["x"])]);
        assert_eq!(set.subtree("x"), vec!["x", "y"]);
    }

    #[test]
    fn removal_set_follows_one_sided_parent_links() {
        let set = NodeSet::from_vec(vec![
            node("root", None, &["a"]),
            node("a", Some("root"), &[]),
            node("b", Some("a"), &["c"]),
            node("c", Some("b"), &[]),
        ]);
        assert_eq!(set.subtree("a"), vec!["a"]);
        assert_eq!(set.removal_set("a"), vec!["a", "b", "c"]);
        assert!(set.removal_set("missing").is_empty());
    }

    #[test]
    fn remove_drops_from_order() {
        let mut set = sample();
        set.remove("a");
        assert_eq!(set.iter().count(), 3);
        assert!(set.iter().all(|n| n.id != "a"));
    }
}

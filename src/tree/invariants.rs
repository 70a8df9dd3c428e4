//! Structural checks for a flat node list.

use std::collections::{HashMap, HashSet};

use crate::models::{CommitmentNode, ROOT_ID};

/// Check the tree invariants and return one message per violation:
/// - Ids are unique and exactly one node is `"root"`
/// - Only the root has no parent
/// - Every parent link is mirrored by the parent's child list, and vice versa
/// - Every node is reachable from the root without revisiting a node
///
/// Orphans created by adding under a missing parent are reported as
/// unreachable.
pub fn validate_invariants(nodes: &[CommitmentNode]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut index: HashMap<&str, &CommitmentNode> = HashMap::new();

    for node in nodes {
        if index.insert(node.id.as_str(), node).is_some() {
            errors.push(format!("duplicate id '{}'", node.id));
        }
    }

    let Some(root) = index.get(ROOT_ID) else {
        errors.push("root node missing".to_string());
        return errors;
    };
    if root.parent_id.is_some() {
        errors.push("root must not have a parent".to_string());
    }

    for node in nodes {
        if !node.is_root() {
            match node.parent_id.as_deref() {
                None => errors.push(format!("'{}' has no parent", node.id)),
                Some(parent_id) => match index.get(parent_id) {
                    None => errors.push(format!(
                        "'{}' points at missing parent '{}'",
                        node.id, parent_id
                    )),
                    Some(parent) if !parent.children.contains(&node.id) => errors.push(format!(
                        "'{}' is not listed as a child of '{}'",
                        node.id, parent_id
                    )),
                    Some(_) => {}
                },
            }
        }

        for child_id in &node.children {
            match index.get(child_id.as_str()) {
                None => errors.push(format!(
                    "'{}' lists missing child '{}'",
                    node.id, child_id
                )),
                Some(child) if child.parent_id.as_deref() != Some(node.id.as_str()) => {
                    errors.push(format!(
                        "'{}' lists '{}' whose parent is {:?}",
                        node.id, child_id, child.parent_id
                    ))
                }
                Some(_) => {}
            }
        }
    }

    let mut seen = HashSet::new();
    let mut stack = vec![ROOT_ID];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            errors.push(format!("cycle through '{}'", id));
            continue;
        }
        if let Some(node) = index.get(id) {
            stack.extend(node.children.iter().map(String::as_str));
        }
    }
    for node in nodes {
        if !seen.contains(node.id.as_str()) {
            errors.push(format!("'{}' is unreachable from root", node.id));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, children: &[&str]) -> CommitmentNode {
        let mut n = CommitmentNode::new(id, parent.map(str::to_string), id, "");
        n.children = children.iter().map(|c| c.to_string()).collect();
        n
    }

    #[test]
    fn well_formed_tree_has_no_errors() {
        let nodes = vec![
            node("root", None, &["a"]),
            node("a", Some("root"), &["b"]),
            node("b", Some("a"), &[]),
        ];
        assert!(validate_invariants(&nodes).is_empty());
    }

    #[test]
    fn reports_missing_root() {
        let errors = validate_invariants(&[node("a", None, &[])]);
        assert_eq!(errors, vec!["root node missing"]);
    }

    #[test]
    fn reports_orphan_and_unmirrored_link() {
        let nodes = vec![
            node("root", None, &[]),
            node("a", Some("root"), &[]),
            node("o", Some("ghost"), &[]),
        ];
        let errors = validate_invariants(&nodes);
        assert!(errors.iter().any(|e| e.contains("not listed as a child")));
        assert!(errors.iter().any(|e| e.contains("missing parent 'ghost'")));
        assert!(errors.iter().any(|e| e.contains("'o' is unreachable")));
    }

    #[test]
    fn reports_cycles() {
        let nodes = vec![
            node("root", None, &["a"]),
            node("a", Some("b"), &["b"]),
            node("b", Some("a"), &["a"]),
        ];
        let errors = validate_invariants(&nodes);
        assert!(errors.iter().any(|e| e.starts_with("cycle")));
    }
}

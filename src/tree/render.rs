//! ASCII tree rendering for commitment trees.

use std::collections::{HashMap, HashSet};

use crate::models::{CommitmentNode, NodeStatus, ROOT_ID};

const INACTIVE: char = '◇';
const ACTIVE: char = '●';
const COMPLETED: char = '✓';
const FAILED: char = '✗';

/// Get the status symbol for a node status.
fn status_symbol(status: NodeStatus) -> char {
    match status {
        NodeStatus::Inactive => INACTIVE,
        NodeStatus::Active => ACTIVE,
        NodeStatus::Completed => COMPLETED,
        NodeStatus::Failed => FAILED,
    }
}

/// Render the tree under `"root"` as ASCII art with status symbols.
///
/// Example output:
/// ```text
/// ● Core protocol
/// ├── ● Exercise
/// │   ├── ✓ Run 5k
/// │   └── ◇ Run 10k
/// └── ✗ No sugar
/// ```
///
/// Nodes not reachable from the root are not rendered.
pub fn render_tree(nodes: &[CommitmentNode]) -> String {
    let index: HashMap<&str, &CommitmentNode> =
        nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut output = String::new();
    let mut seen = HashSet::from([ROOT_ID]);
    if let Some(root) = index.get(ROOT_ID) {
        render_node(&mut output, &index, &mut seen, root, "", true, true);
    }
    output
}

/// Recursively render a node and its children.
///
/// Children are claimed in `seen` before any of them is drawn, so a node
/// listed twice is drawn once and the last drawn sibling gets `└──`.
fn render_node<'a>(
    output: &mut String,
    index: &HashMap<&str, &'a CommitmentNode>,
    seen: &mut HashSet<&'a str>,
    node: &'a CommitmentNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
) {
    if !is_root {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
    }
    output.push(status_symbol(node.status));
    output.push(' ');
    output.push_str(&node.title);
    output.push('\n');

    // Calculate prefix for children
    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    let children: Vec<&CommitmentNode> = node
        .children
        .iter()
        .filter_map(|id| index.get(id.as_str()).copied())
        .filter(|&child| seen.insert(child.id.as_str()))
        .collect();
    for (i, child) in children.iter().enumerate() {
        let child_is_last = i == children.len() - 1;
        render_node(output, index, seen, child, &child_prefix, child_is_last, false);
    }
}

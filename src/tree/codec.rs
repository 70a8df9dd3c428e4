//! Portable share codes for commitment trees.
//!
//! A share code is the standard (padded) base64 encoding of the UTF-8 JSON
//! array of nodes. This is the same format the web client produces,
//! so codes are interchangeable.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use crate::error::{StoreError, TreeError};
use crate::models::{CommitmentNode, ROOT_ID};

/// Query parameter carrying a share code inside a share link.
const IMPORT_PARAM: &str = "?import=";

pub fn encode(nodes: &[CommitmentNode]) -> Result<String, TreeError> {
    let json = serde_json::to_string(nodes).map_err(StoreError::from)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Decode and validate a share code.
///
/// The payload must be a JSON array of nodes with unique ids, exactly one of
/// which is `"root"`.
pub fn decode(token: &str) -> Result<Vec<CommitmentNode>, TreeError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| invalid(format!("not base64 ({e})")))?;
    let json = String::from_utf8(bytes).map_err(|_| invalid("payload is not UTF-8"))?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| invalid(format!("payload is not JSON ({e})")))?;
    if !value.is_array() {
        return Err(invalid("payload is not an array"));
    }
    let nodes: Vec<CommitmentNode> =
        serde_json::from_value(value).map_err(|e| invalid(format!("malformed node ({e})")))?;

    // Ids key the live node set, so a repeated id would silently replace an
    // earlier node on import.
    let mut seen = HashSet::new();
    for node in &nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(invalid(format!("duplicate node id '{}'", node.id)));
        }
    }
    if !seen.contains(ROOT_ID) {
        return Err(invalid("root node missing"));
    }

    Ok(nodes)
}

/// Pull the share code out of a share link, or return the input unchanged.
pub fn extract_share_code(input: &str) -> &str {
    let input = input.trim();
    match input.split_once(IMPORT_PARAM) {
        Some((_, rest)) => rest.split('&').next().unwrap_or(rest),
        None => input,
    }
}

fn invalid(reason: impl Into<String>) -> TreeError {
    TreeError::InvalidImportFormat(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        STANDARD.encode(s.as_bytes())
    }

    fn assert_invalid(token: &str, needle: &str) {
        match decode(token) {
            Err(TreeError::InvalidImportFormat(reason)) => {
                assert!(reason.contains(needle), "{reason:?} lacks {needle:?}")
            }
            other => panic!("expected InvalidImportFormat, got {other:?}"),
        }
    }

    #[test]
    fn decodes_code_from_web_client() {
        // btoa(unescape(encodeURIComponent(JSON.stringify(nodes)))) output
        let token = b64(
            r#"[{"id":"root","title":"核心协议","description":"","status":"active","parentId":null,"children":["1"]},{"id":"1","title":"Run","description":"5k","status":"inactive","parentId":"root","children":[]}]"#,
        );
        let nodes = decode(&token).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].title, "核心协议");
        assert_eq!(nodes[1].parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn rejects_non_base64() {
        assert_invalid("%%%not-base64%%%", "base64");
    }

    #[test]
    fn rejects_non_json() {
        assert_invalid(&b64("hello"), "JSON");
    }

    #[test]
    fn rejects_non_utf8_payload() {
        assert_invalid(&STANDARD.encode([0xff, 0xfe, 0x5b, 0x5d]), "UTF-8");
    }

    #[test]
    fn rejects_non_array() {
        assert_invalid(&b64(r#"{"id":"root"}"#), "array");
    }

    #[test]
    fn rejects_rootless_tree() {
        assert_invalid(&b64(r#"[{"id":"a","title":"A"}]"#), "root");
    }

    #[test]
    fn rejects_duplicate_roots() {
        assert_invalid(
            &b64(r#"[{"id":"root","title":"A"},{"id":"root","title":"B"}]"#),
            "duplicate",
        );
    }

    #[test]
    fn rejects_repeated_child_id() {
        assert_invalid(
            &b64(r#"[{"id":"root","title":"R","children":["a"]},{"id":"a","title":"A","parentId":"root"},{"id":"a","title":"B","parentId":"root"}]"#),
            "duplicate node id 'a'",
        );
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let token = format!("  {}\n", b64(r#"[{"id":"root","title":"R"}]"#));
        assert_eq!(decode(&token).unwrap().len(), 1);
    }

    #[test]
    fn extracts_code_from_share_link() {
        assert_eq!(
            extract_share_code("https://example.org/app?import=QUJD&utm=x"),
            "QUJD"
        );
        assert_eq!(extract_share_code("https://example.org/?import=QUJD"), "QUJD");
        assert_eq!(extract_share_code(" QUJD "), "QUJD");
    }
}

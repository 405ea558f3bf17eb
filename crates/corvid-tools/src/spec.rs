//! Tool specifications loaded at startup from a directory of JSON files.
//!
//! Each file is one JSON document: `{"type": "function", "function": {name,
//! description, parameters}}`. Loading is directory-scan-and-skip-invalid,
//! the same shape as the teacher's plugin-manifest loader, just for plain
//! declarative specs instead of executable scripts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use corvid_core::types::UserId;
use corvid_policy::PolicyGate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

/// Scan `dir` for `*.json` files and parse each as a `ToolSpec`. Invalid or
/// unreadable files are skipped with a warning, not fatal to startup.
pub fn load_tool_specs(dir: &Path) -> Vec<ToolSpec> {
    let mut specs = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return specs,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match std::fs::read_to_string(&path).and_then(|content| {
            serde_json::from_str::<ToolSpec>(&content)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            Ok(spec) => specs.push(spec),
            Err(e) => warn!(path = %path.display(), error = %e, "skipped invalid tool spec"),
        }
    }

    specs
}

/// Filter `specs` down to the ones `user_id` is allowed to invoke, per C3.
pub fn filter_for_user(specs: &[ToolSpec], gate: &PolicyGate, user_id: UserId) -> Vec<ToolSpec> {
    specs
        .iter()
        .filter(|s| gate.is_tool_allowed(user_id, &s.function.name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_empty() {
        let specs = load_tool_specs(Path::new("/nonexistent/path/for/tests"));
        assert!(specs.is_empty());
    }

    #[test]
    fn filter_respects_policy_gate() {
        let gate = PolicyGate::new(vec![], vec![]);
        let specs = vec![ToolSpec {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: "send_voice_note".to_string(),
                description: "not gated, shouldn't show up here".to_string(),
                parameters: serde_json::json!({}),
            },
        }];
        let filtered = filter_for_user(&specs, &gate, UserId(1));
        assert!(filtered.is_empty());
    }
}

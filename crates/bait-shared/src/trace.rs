//! Per-call trace metadata.
//!
//! Process-wide configuration, read-only: loaded once at startup and handed
//! to every stage call of every request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Name of the system issuing the calls
    #[serde(default = "default_source")]
    pub source: String,

    /// Workflow the calls are grouped under on the reasoning service
    #[serde(default)]
    pub workflow_id: Option<String>,
}

fn default_source() -> String {
    "baitd".to_string()
}

impl Default for TraceMetadata {
    fn default() -> Self {
        Self {
            source: default_source(),
            workflow_id: None,
        }
    }
}

impl TraceMetadata {
    /// Key/value form attached to outgoing requests.
    pub fn as_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("trace_source".to_string(), self.source.clone());
        if let Some(id) = &self.workflow_id {
            map.insert("workflow_id".to_string(), id.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_omits_missing_workflow() {
        let trace = TraceMetadata::default();
        let map = trace.as_map();
        assert_eq!(map.get("trace_source").map(String::as_str), Some("baitd"));
        assert!(!map.contains_key("workflow_id"));

        let trace = TraceMetadata {
            workflow_id: Some("wf_demo".to_string()),
            ..TraceMetadata::default()
        };
        assert_eq!(trace.as_map().len(), 2);
    }
}

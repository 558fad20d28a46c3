//! Whole-state backup snapshot
//!
//! An opaque aggregate of the application's top-level collections. The
//! remote backup endpoint overwrites its copy on every push.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Collection name -> collection contents
    pub collections: BTreeMap<String, serde_json::Value>,
    /// When the aggregate was taken (Unix millis)
    pub taken_at: i64,
}

impl Snapshot {
    pub fn new(collections: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            collections,
            taken_at: crate::util::now_millis(),
        }
    }

    /// True when no collection holds any data.
    ///
    /// `null`, empty arrays and empty objects all count as empty.
    pub fn is_empty(&self) -> bool {
        self.collections.values().all(|v| match v {
            serde_json::Value::Null => true,
            serde_json::Value::Array(a) => a.is_empty(),
            serde_json::Value::Object(o) => o.is_empty(),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_detection() {
        assert!(Snapshot::default().is_empty());

        let mut collections = BTreeMap::new();
        collections.insert("packages".to_string(), json!([]));
        collections.insert("boxes".to_string(), json!({}));
        assert!(Snapshot::new(collections.clone()).is_empty());

        collections.insert("packages".to_string(), json!([{ "id": 1 }]));
        assert!(!Snapshot::new(collections).is_empty());
    }
}

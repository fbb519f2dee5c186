//! Sync cursor issued by the gateway

use serde::{Deserialize, Serialize};

/// One `Key`/`Val` pair of the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncKeyEntry {
    #[serde(rename = "Key")]
    pub key: i64,
    #[serde(rename = "Val")]
    pub val: i64,
}

/// Opaque position in the inbound message stream
///
/// Round-tripped verbatim in every sync request and replaced as a whole by
/// the value each successful sync response carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncKey {
    #[serde(rename = "Count", default)]
    pub count: u32,
    #[serde(rename = "List", default)]
    pub list: Vec<SyncKeyEntry>,
}

impl SyncKey {
    /// Build a cursor from key/value pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let list: Vec<SyncKeyEntry> = pairs
            .into_iter()
            .map(|(key, val)| SyncKeyEntry { key, val })
            .collect();
        Self {
            count: list.len() as u32,
            list,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Render as `key_val|key_val` for the heartbeat query string
    pub fn to_query_value(&self) -> String {
        self.list
            .iter()
            .map(|entry| format!("{}_{}", entry.key, entry.val))
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl std::fmt::Display for SyncKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_value() {
        let key = SyncKey::from_pairs([(1, 650), (2, 651), (1000, 1700000000)]);
        assert_eq!(key.count, 3);
        assert_eq!(key.to_query_value(), "1_650|2_651|1000_1700000000");
    }

    #[test]
    fn test_empty_key() {
        let key = SyncKey::default();
        assert!(key.is_empty());
        assert_eq!(key.to_query_value(), "");
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{"Count":2,"List":[{"Key":1,"Val":10},{"Key":2,"Val":20}]}"#;
        let key: SyncKey = serde_json::from_str(json).unwrap();
        assert_eq!(key, SyncKey::from_pairs([(1, 10), (2, 20)]));
        assert_eq!(serde_json::to_string(&key).unwrap(), json);
    }
}

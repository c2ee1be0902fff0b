//! Rows, statements and decoded correspondent entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::PeerId;

/// One result row, column name to value.
pub type Row = Map<String, Value>;

/// Liveness probe run by `on_ready`.
pub const READY_CHECK: &str = "SELECT 1";

/// Confirmed correspondent owning a public key.
pub const LOOKUP_DEVICE_BY_PUBKEY: &str =
    "SELECT device_address FROM correspondent_devices WHERE pubkey = ? AND is_confirmed = 1";

/// Correspondents ordered by most recent chat message, then name.
pub const CORRESPONDENT_LIST: &str = "SELECT device_address, hub, name, my_record_pref, \
     peer_record_pref, latest_message_date FROM correspondent_devices CD LEFT JOIN \
     (SELECT correspondent_address, MAX(creation_date) AS latest_message_date \
     FROM chat_messages GROUP BY correspondent_address) CM \
     ON CM.correspondent_address = CD.device_address \
     ORDER BY latest_message_date DESC, name ASC";

/// A statement and its positional parameters, as queued.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCall {
    /// SQL text with `?` placeholders.
    pub statement: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

impl QueryCall {
    /// Statement with parameters.
    pub fn new(statement: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            statement: statement.into(),
            params,
        }
    }

    /// Parameters as a JSON array, for error messages.
    #[must_use]
    pub fn rendered_params(&self) -> String {
        Value::Array(self.params.clone()).to_string()
    }
}

/// One entry of the correspondent list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondentSummary {
    #[serde(rename = "device_address")]
    pub peer_id: PeerId,
    pub hub: String,
    pub name: String,
    #[serde(default)]
    pub my_record_pref: Option<i64>,
    #[serde(default)]
    pub peer_record_pref: Option<i64>,
    /// Creation date of the newest chat message, if any.
    #[serde(default)]
    pub latest_message_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rendered_params() {
        let call = QueryCall::new(LOOKUP_DEVICE_BY_PUBKEY, vec![json!("A1b2"), json!(1)]);
        assert_eq!(call.rendered_params(), r#"["A1b2",1]"#);
    }

    #[test]
    fn test_summary_without_messages() {
        let summary: CorrespondentSummary = serde_json::from_value(json!({
            "device_address": "0PEER",
            "hub": "hub.example.com",
            "name": "Alice",
            "my_record_pref": 1,
            "peer_record_pref": 0,
            "latest_message_date": null
        }))
        .unwrap();

        assert_eq!(summary.peer_id, PeerId::from("0PEER"));
        assert_eq!(summary.latest_message_date, None);
    }
}

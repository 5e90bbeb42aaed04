use serde::{Deserialize, Serialize};

/// A validation-rejected record, preserved verbatim for the operator.
/// Quarantine is the audit surface: the pipeline never deletes from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub entity_type: String,
    pub match_id: Option<u64>,
    pub map_number: Option<u8>,
    /// JSON dump of the rejected input.
    pub payload_json: String,
    /// Verbatim validation or parse error text.
    pub error: String,
}

impl QuarantineEntry {
    pub fn new(
        entity_type: impl Into<String>,
        match_id: Option<u64>,
        map_number: Option<u8>,
        payload_json: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            match_id,
            map_number,
            payload_json: payload_json.into(),
            error: error.into(),
        }
    }
}

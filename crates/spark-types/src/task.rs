//! Verification tasks

use serde::{Deserialize, Serialize};

/// A dispute awaiting a retrieval-correctness determination.
///
/// Immutable once created: produced by the event source or a bulk poll and
/// consumed exactly once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalTask {
    /// Opaque dispute identifier
    pub id: String,

    /// Content identifier to retrieve
    pub cid: String,

    /// Storage provider actor id, e.g. `f0142637`
    pub miner_id: String,

    /// Address that raised the dispute, when the event source knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raiser: Option<String>,
}

impl RetrievalTask {
    pub fn new(id: impl Into<String>, cid: impl Into<String>, miner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cid: cid.into(),
            miner_id: miner_id.into(),
            raiser: None,
        }
    }

    pub fn with_raiser(mut self, raiser: impl Into<String>) -> Self {
        self.raiser = Some(raiser.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_json_field_names() {
        let task: RetrievalTask = serde_json::from_str(
            r#"{"id":"42","cid":"bafkqaaa","minerId":"f01234","raiser":"0xabc"}"#,
        )
        .unwrap();
        assert_eq!(task, RetrievalTask::new("42", "bafkqaaa", "f01234").with_raiser("0xabc"));

        let task: RetrievalTask =
            serde_json::from_str(r#"{"id":"1","cid":"bafkqaaa","minerId":"f01"}"#).unwrap();
        assert_eq!(task.raiser, None);
        assert!(!serde_json::to_string(&task).unwrap().contains("raiser"));
    }
}

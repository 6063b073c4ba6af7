//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Complete checkpoint document for a connector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Per-stream state
    #[serde(default)]
    pub streams: BTreeMap<String, StreamCheckpoint>,

    /// Keys written by other versions
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Checkpoint {
    /// Create a new empty checkpoint
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamCheckpoint> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamCheckpoint {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Get the checkpoint of one partition
    pub fn get_partition(&self, stream: &str, partition: &str) -> Result<Option<PartitionCheckpoint>> {
        match self.get_stream(stream) {
            Some(s) => s.get_partition(partition),
            None => Ok(None),
        }
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamCheckpoint {
    /// Per-partition state, kept raw until a cursor claims it
    #[serde(default)]
    pub partitions: BTreeMap<String, Value>,

    /// Keys written by other versions
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamCheckpoint {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get partition state
    ///
    /// Fails when the stored value is not a mapping or its known fields have
    /// the wrong shape.
    pub fn get_partition(&self, partition: &str) -> Result<Option<PartitionCheckpoint>> {
        let Some(raw) = self.partitions.get(partition) else {
            return Ok(None);
        };
        if !raw.is_object() {
            return Err(Error::checkpoint_corruption(
                partition,
                format!("expected a mapping, found {raw}"),
            ));
        }
        serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|e| Error::checkpoint_corruption(partition, e.to_string()))
    }

    /// Store partition state, keeping any keys of the previous value that the
    /// new value does not set
    pub fn set_partition(&mut self, partition: &str, checkpoint: &PartitionCheckpoint) -> Result<()> {
        let Value::Object(new_fields) = serde_json::to_value(checkpoint)? else {
            return Err(Error::state("partition checkpoint must serialize to a mapping"));
        };

        match self.partitions.get_mut(partition) {
            Some(Value::Object(existing)) => {
                for (key, value) in new_fields {
                    existing.insert(key, value);
                }
            }
            _ => {
                self.partitions
                    .insert(partition.to_string(), Value::Object(new_fields));
            }
        }
        Ok(())
    }

    /// Ids of all partitions with stored state
    pub fn partition_ids(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }
}

/// State for a single partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionCheckpoint {
    /// Watermark: everything up to here is durably processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,

    /// Bounded history of resource id to last-seen position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<BTreeMap<String, String>>,

    /// Keys written by other versions
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PartitionCheckpoint {
    /// Create a new empty partition state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create partition state holding a watermark
    pub fn with_position(position: impl Into<Value>) -> Self {
        Self {
            position: Some(position.into()),
            ..Self::default()
        }
    }

    /// Position as a string, if it is one
    pub fn position_str(&self) -> Option<&str> {
        self.position.as_ref().and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_default() {
        let checkpoint = Checkpoint::new();
        assert!(checkpoint.streams.is_empty());
        assert!(checkpoint.get_partition("orders", "p1").unwrap().is_none());
    }

    #[test]
    fn test_partition_round_trip() {
        let mut checkpoint = Checkpoint::new();
        checkpoint
            .get_stream_mut("orders")
            .set_partition("p1", &PartitionCheckpoint::with_position("2024-01-05"))
            .unwrap();

        let json = serde_json::to_string(&checkpoint).unwrap();
        let restored: Checkpoint = serde_json::from_str(&json).unwrap();

        let partition = restored.get_partition("orders", "p1").unwrap().unwrap();
        assert_eq!(partition.position_str(), Some("2024-01-05"));
        assert!(partition.history.is_none());
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let doc = json!({
            "version": 3,
            "streams": {
                "orders": {
                    "sync_mode": "incremental",
                    "partitions": {
                        "p1": {"position": "2024-01-05", "lookback_hint": "P1D"}
                    }
                }
            }
        });

        let mut checkpoint: Checkpoint = serde_json::from_value(doc).unwrap();
        checkpoint
            .get_stream_mut("orders")
            .set_partition("p1", &PartitionCheckpoint::with_position("2024-01-09"))
            .unwrap();

        let written = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(written["version"], 3);
        assert_eq!(written["streams"]["orders"]["sync_mode"], "incremental");
        assert_eq!(
            written["streams"]["orders"]["partitions"]["p1"],
            json!({"position": "2024-01-09", "lookback_hint": "P1D"})
        );
    }

    #[test]
    fn test_non_mapping_partition_is_corruption() {
        let doc = json!({"streams": {"orders": {"partitions": {"p1": "2024-01-05"}}}});
        let checkpoint: Checkpoint = serde_json::from_value(doc).unwrap();

        let err = checkpoint.get_partition("orders", "p1").unwrap_err();
        assert!(matches!(err, Error::CheckpointCorruption { ref partition, .. } if partition == "p1"));
    }

    #[test]
    fn test_malformed_history_is_corruption() {
        let doc = json!({"streams": {"files": {"partitions": {"b": {"history": ["a.csv"]}}}}});
        let checkpoint: Checkpoint = serde_json::from_value(doc).unwrap();

        let err = checkpoint.get_partition("files", "b").unwrap_err();
        assert!(matches!(err, Error::CheckpointCorruption { .. }));
    }
}

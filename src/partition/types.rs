//! Partition types and traits
//!
//! Defines the core partition abstractions.

use crate::error::Result;
use serde_json::{Map, Value};

/// Id of the partition used by streams that are not partitioned
pub const DEFAULT_PARTITION_ID: &str = "default";

/// A single partition
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Unique identifier for this partition within its stream
    pub id: String,
    /// Values to inject into templates/queries
    pub values: Map<String, Value>,
}

impl Partition {
    /// Create a new partition
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Map::new(),
        }
    }

    /// Add a value to the partition
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value by key
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Partition values as a JSON object, for template contexts
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Trait for partition routers
pub trait PartitionRouter: Send + Sync {
    /// Enumerate partitions in a stable order
    fn partitions(&self) -> Result<Vec<Partition>>;

    /// Get the partition field name (for template interpolation)
    fn partition_field(&self) -> Option<&str>;
}

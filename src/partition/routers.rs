//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{Partition, PartitionRouter, DEFAULT_PARTITION_ID};
use crate::error::{Error, Result};
use crate::template::{EvalContext, Evaluator};
use crate::types::extract_path;
use serde_json::Value;
use std::collections::HashSet;

// ============================================================================
// Single Partition Router
// ============================================================================

/// Router for streams that are not partitioned
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartitionRouter;

impl PartitionRouter for SinglePartitionRouter {
    fn partitions(&self) -> Result<Vec<Partition>> {
        Ok(vec![Partition::new(DEFAULT_PARTITION_ID)])
    }

    fn partition_field(&self) -> Option<&str> {
        None
    }
}

// ============================================================================
// List Router
// ============================================================================

/// List-based partition router
///
/// Creates partitions from a static list of values.
#[derive(Debug, Clone)]
pub struct ListRouter {
    /// List of partition values
    values: Vec<String>,
    /// Field name for partition
    partition_field: String,
}

impl ListRouter {
    /// Create a new list router
    pub fn new(values: Vec<String>, partition_field: impl Into<String>) -> Self {
        Self {
            values,
            partition_field: partition_field.into(),
        }
    }

    /// Create a list router from an expression
    ///
    /// The expression may resolve to a JSON array or a comma-separated string,
    /// e.g. `{{ config.account_ids }}`.
    pub fn from_expression(
        expression: &str,
        partition_field: impl Into<String>,
        evaluator: &dyn Evaluator,
        ctx: &EvalContext,
    ) -> Result<Self> {
        let partition_field = partition_field.into();
        let resolved = evaluator.resolve(expression, ctx)?;

        let values = match resolved {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(Error::invalid_value(
                        partition_field.clone(),
                        format!("unsupported partition value: {other}"),
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect(),
            other => {
                return Err(Error::invalid_value(
                    partition_field,
                    format!("expected a list, got {other}"),
                ))
            }
        };

        Ok(Self::new(values, partition_field))
    }
}

impl PartitionRouter for ListRouter {
    fn partitions(&self) -> Result<Vec<Partition>> {
        let mut seen = HashSet::new();
        Ok(self
            .values
            .iter()
            .filter(|v| seen.insert(v.as_str()))
            .map(|v| Partition::new(v.clone()).with_value(self.partition_field.clone(), v.clone()))
            .collect())
    }

    fn partition_field(&self) -> Option<&str> {
        Some(&self.partition_field)
    }
}

// ============================================================================
// Parent Router
// ============================================================================

/// Parent stream-based partition router
///
/// Creates partitions from records in a parent stream.
#[derive(Debug, Clone)]
pub struct ParentRouter {
    /// Records from parent stream
    parent_records: Vec<Value>,
    /// Key to extract from parent records
    parent_key: String,
    /// Field name for partition
    partition_field: String,
}

impl ParentRouter {
    /// Create a new parent router
    pub fn new(
        parent_records: Vec<Value>,
        parent_key: impl Into<String>,
        partition_field: impl Into<String>,
    ) -> Self {
        Self {
            parent_records,
            parent_key: parent_key.into(),
            partition_field: partition_field.into(),
        }
    }

    /// Extract value from a record using the parent key
    fn extract_key(&self, record: &Value) -> Option<String> {
        match extract_path(record, &self.parent_key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl PartitionRouter for ParentRouter {
    fn partitions(&self) -> Result<Vec<Partition>> {
        let mut partitions = Vec::new();
        let mut seen = HashSet::new();

        for record in &self.parent_records {
            let Some(key_value) = self.extract_key(record) else {
                tracing::debug!(
                    parent_key = %self.parent_key,
                    "Parent record without partition key, skipping"
                );
                continue;
            };

            if seen.insert(key_value.clone()) {
                partitions.push(
                    Partition::new(&key_value)
                        .with_value(self.partition_field.clone(), key_value)
                        .with_value("parent", record.clone()),
                );
            }
        }

        Ok(partitions)
    }

    fn partition_field(&self) -> Option<&str> {
        Some(&self.partition_field)
    }
}

//! YAML parser for stream definitions
//!
//! Parses and validates stream YAML files, and builds the runtime
//! components they describe.

use crate::cursor::{CursorFactory, DatetimeCursorSettings, FileHistorySettings};
use crate::error::{Error, Result};
use crate::job::OrchestratorConfig;
use crate::loader::types::{
    AsyncJobDefinition, CursorDefinition, ListValues, PartitionDefinition, StreamDefinition,
};
use crate::partition::{ListRouter, ParentRouter, PartitionRouter, SinglePartitionRouter};
use crate::template::{EvalContext, Evaluator, TemplateEvaluator};
use crate::types::CursorFormat;
use crate::window::parse_duration;
use chrono::Duration;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Load a stream definition from a YAML file
pub fn load_stream(path: impl AsRef<Path>) -> Result<StreamDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read stream file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_stream_from_str(&content)
}

/// Load a stream definition from a YAML string
///
/// Everything that can be checked without connector config or a clock is
/// checked here, before any extraction starts.
pub fn load_stream_from_str(yaml: &str) -> Result<StreamDefinition> {
    let def: StreamDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse stream YAML: {e}")))?;

    validate_stream(&def)?;
    Ok(def)
}

/// Validate a stream definition
fn validate_stream(def: &StreamDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    build_cursor(&def.cursor)?.validate(&TemplateEvaluator::new(), &EvalContext::new())?;
    validate_partition(&def.name, &def.partition)?;

    if let Some(async_job) = &def.async_job {
        build_orchestrator_config(async_job)?;
    }

    Ok(())
}

fn validate_partition(stream: &str, def: &PartitionDefinition) -> Result<()> {
    match def {
        PartitionDefinition::Single => Ok(()),
        PartitionDefinition::List {
            values,
            partition_field,
        } => {
            if partition_field.is_empty() {
                return Err(Error::missing_field("partition_field"));
            }
            let empty = match values {
                ListValues::Literal(items) => items.is_empty(),
                ListValues::Expression(expr) => expr.trim().is_empty(),
            };
            if empty {
                return Err(Error::config(format!(
                    "Stream '{stream}' list partition has no values"
                )));
            }
            Ok(())
        }
        PartitionDefinition::Parent {
            parent_stream,
            parent_key,
            partition_field,
        } => {
            if parent_stream == stream {
                return Err(Error::config(format!(
                    "Stream '{stream}' cannot be its own parent"
                )));
            }
            if parent_key.is_empty() {
                return Err(Error::missing_field("parent_key"));
            }
            if partition_field.is_empty() {
                return Err(Error::missing_field("partition_field"));
            }
            Ok(())
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Granularity used when none is configured
///
/// The smallest unit the format can represent.
pub fn default_granularity(format: &CursorFormat) -> Duration {
    match format {
        CursorFormat::Date => Duration::days(1),
        CursorFormat::UnixMs => Duration::milliseconds(1),
        _ => Duration::seconds(1),
    }
}

fn parse_format(format: Option<&str>) -> Result<CursorFormat> {
    format.map_or(Ok(CursorFormat::Iso8601), |f| f.parse())
}

fn parse_optional_duration(value: Option<&str>) -> Result<Option<Duration>> {
    value.map(parse_duration).transpose()
}

/// Build the cursor factory of a stream
pub fn build_cursor(def: &CursorDefinition) -> Result<CursorFactory> {
    match def {
        CursorDefinition::Datetime {
            cursor_field,
            start_datetime,
            end_datetime,
            step,
            granularity,
            lookback_window,
            datetime_format,
        } => {
            let format = parse_format(datetime_format.as_deref())?;
            let step = parse_duration(step)?;
            let granularity = parse_optional_duration(granularity.as_deref())?
                .unwrap_or_else(|| default_granularity(&format));

            let mut settings =
                DatetimeCursorSettings::new(start_datetime.clone(), step, granularity, cursor_field.clone())
                    .with_format(format);
            if let Some(end) = end_datetime {
                settings = settings.with_end(end.clone());
            }
            if let Some(lookback) = parse_optional_duration(lookback_window.as_deref())? {
                settings = settings.with_lookback(lookback);
            }
            Ok(CursorFactory::Datetime(Arc::new(settings)))
        }
        CursorDefinition::FullRefresh => Ok(CursorFactory::FullRefresh),
        CursorDefinition::FileHistory {
            resource_field,
            cursor_field,
            max_history_size,
            datetime_format,
        } => {
            let mut settings = FileHistorySettings::new(resource_field.clone(), cursor_field.clone())
                .with_capacity(*max_history_size);
            settings.format = parse_format(datetime_format.as_deref())?;
            Ok(CursorFactory::FileHistory(settings))
        }
    }
}

/// Build the partition router of a stream
///
/// Parent partitions need the parent stream's records, read beforehand by
/// the caller.
pub fn build_router(
    def: &PartitionDefinition,
    evaluator: &dyn Evaluator,
    ctx: &EvalContext,
    parent_records: Option<Vec<Value>>,
) -> Result<Box<dyn PartitionRouter>> {
    match def {
        PartitionDefinition::Single => Ok(Box::new(SinglePartitionRouter)),
        PartitionDefinition::List {
            values,
            partition_field,
        } => {
            let router = match values {
                ListValues::Literal(items) => ListRouter::new(items.clone(), partition_field.clone()),
                ListValues::Expression(expr) => {
                    ListRouter::from_expression(expr, partition_field.clone(), evaluator, ctx)?
                }
            };
            Ok(Box::new(router))
        }
        PartitionDefinition::Parent {
            parent_stream,
            parent_key,
            partition_field,
        } => {
            let records = parent_records.ok_or_else(|| {
                Error::partition(
                    parent_stream.clone(),
                    "parent records are required to enumerate partitions",
                )
            })?;
            Ok(Box::new(ParentRouter::new(
                records,
                parent_key.clone(),
                partition_field.clone(),
            )))
        }
    }
}

/// Build orchestrator settings from an async job section
pub fn build_orchestrator_config(def: &AsyncJobDefinition) -> Result<OrchestratorConfig> {
    let to_std = |field: &str, d: Duration| {
        d.to_std()
            .map_err(|e| Error::invalid_value(field, e.to_string()))
    };

    let mut config = OrchestratorConfig::default()
        .with_poll_interval(to_std("poll_interval", parse_duration(&def.poll_interval)?)?)
        .with_max_concurrent_jobs(def.max_concurrent_jobs);
    if let Some(timeout) = parse_optional_duration(def.job_timeout.as_deref())? {
        config = config.with_job_timeout(to_std("job_timeout", timeout)?);
    }

    config.validate()?;
    Ok(config)
}

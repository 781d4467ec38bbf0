//! Exporter: fetches an entity's records and writes them to CSV or JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::entity::EntityType;
use crate::error::CoreError;
use crate::types::Record;

/// Fetches records of one entity type matching equality filters.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, entity_type: EntityType, filters: &Record)
        -> Result<Vec<Record>, CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub const CSV: &'static str = "csv";
    pub const JSON: &'static str = "json";

    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            Self::CSV => Ok(Self::Csv),
            Self::JSON => Ok(Self::Json),
            other => Err(CoreError::Configuration(format!(
                "Unsupported export format '{other}'. Must be one of: csv, json"
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => Self::CSV,
            Self::Json => Self::JSON,
        }
    }
}

/// What an export produced. No file is written for an empty result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub output_file: Option<PathBuf>,
    pub record_count: usize,
}

pub struct Exporter {
    source: Arc<dyn RecordSource>,
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(source: Arc<dyn RecordSource>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fetch `entity_type` records matching `filters` and write them under
    /// the output directory in `format`.
    pub async fn export(
        &self,
        entity_type: EntityType,
        filters: &Record,
        format: &str,
    ) -> Result<ExportOutcome, CoreError> {
        let format = ExportFormat::from_str_value(format)?;
        let records = self.source.fetch(entity_type, filters).await?;

        if records.is_empty() {
            tracing::info!(
                entity_type = %entity_type,
                "Export matched no records; no file written",
            );
            return Ok(ExportOutcome {
                output_file: None,
                record_count: 0,
            });
        }

        let body = match format {
            ExportFormat::Csv => render_csv(&records)?,
            ExportFormat::Json => render_json(&records)?,
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to create export dir: {e}")))?;

        let path = self.output_dir.join(export_file_name(entity_type, format));
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to write export file: {e}")))?;

        tracing::info!(
            entity_type = %entity_type,
            records = records.len(),
            file = %path.display(),
            "Export written",
        );

        Ok(ExportOutcome {
            output_file: Some(path),
            record_count: records.len(),
        })
    }
}

/// `<entity>_export_<UTC timestamp>_<short id>.<ext>`
pub fn export_file_name(entity_type: EntityType, format: ExportFormat) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let short_id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!(
        "{}_export_{stamp}_{short_id}.{}",
        entity_type.as_str(),
        format.extension()
    )
}

/// Header is the first record's field names in order. Later records missing
/// a column get an empty cell; keys not in the header are ignored.
pub fn render_csv(records: &[Record]) -> Result<Vec<u8>, CoreError> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| CoreError::Internal(format!("Failed to write CSV: {e}"));

    writer.write_record(&headers).map_err(csv_err)?;
    for record in records {
        let row = headers
            .iter()
            .map(|h| record.get(*h).map(cell_text).unwrap_or_default());
        writer.write_record(row).map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("Failed to flush CSV: {e}")))
}

pub fn render_json(records: &[Record]) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec_pretty(records)
        .map_err(|e| CoreError::Internal(format!("Failed to serialise export: {e}")))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Upload payload parsing (CSV and JSON) into ordered record lists.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::CoreError;
use crate::types::Record;

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Csv,
    Json,
}

impl PayloadFormat {
    pub const CSV: &'static str = "csv";
    pub const JSON: &'static str = "json";

    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            Self::CSV => Ok(Self::Csv),
            Self::JSON => Ok(Self::Json),
            other => Err(CoreError::Payload(format!(
                "Unsupported payload format '{other}'. Must be one of: csv, json"
            ))),
        }
    }

    /// Detect the format from a file extension (`.csv` / `.json`).
    pub fn from_file_name(name: &str) -> Result<Self, CoreError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                CoreError::Payload(format!("Cannot detect payload format of '{name}'"))
            })?;
        Self::from_str_value(ext)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => Self::CSV,
            Self::Json => Self::JSON,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an upload, rejecting anything larger than `max_bytes`.
pub fn parse_payload(
    bytes: &[u8],
    format: PayloadFormat,
    max_bytes: u64,
) -> Result<Vec<Record>, CoreError> {
    ensure_size(bytes.len() as u64, max_bytes)?;
    match format {
        PayloadFormat::Csv => parse_csv(bytes),
        PayloadFormat::Json => parse_json(bytes),
    }
}

fn ensure_size(len: u64, max_bytes: u64) -> Result<(), CoreError> {
    if len > max_bytes {
        return Err(CoreError::Payload(format!(
            "Payload of {len} bytes exceeds the {max_bytes} byte limit"
        )));
    }
    Ok(())
}

/// First row is the header; every later row becomes a record of trimmed
/// string cells in header order. Rows with a different cell count are an
/// error.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<Record>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| CoreError::Payload(format!("Failed to read CSV headers: {e}")))?
        .clone();

    if headers.iter().any(|h| h.is_empty()) {
        return Err(CoreError::Payload("CSV header contains an empty column name".into()));
    }

    reader
        .records()
        .map(|row| {
            let row = row.map_err(|e| CoreError::Payload(format!("Failed to read CSV row: {e}")))?;
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .map(|(h, cell)| (h.to_string(), Value::String(cell.to_string())))
                .collect();
            Ok(record)
        })
        .collect()
}

/// The body must be a JSON array of objects.
pub fn parse_json(bytes: &[u8]) -> Result<Vec<Record>, CoreError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::Payload(format!("Invalid JSON payload: {e}")))?;

    let Value::Array(items) = value else {
        return Err(CoreError::Payload("JSON payload must be an array of objects".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(CoreError::Payload(format!(
                "JSON payload item {i} is not an object"
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Upload directory
// ---------------------------------------------------------------------------

/// Resolve `file_name` inside `upload_dir`. Only bare file names are
/// accepted.
pub fn resolve_upload_path(upload_dir: &Path, file_name: &str) -> Result<PathBuf, CoreError> {
    let name = file_name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(CoreError::Payload(format!(
            "Invalid upload file name '{file_name}'"
        )));
    }
    Ok(upload_dir.join(name))
}

/// Read and parse an upload from `upload_dir`, detecting the format from
/// the extension.
pub async fn read_upload(
    upload_dir: &Path,
    file_name: &str,
    max_bytes: u64,
) -> Result<Vec<Record>, CoreError> {
    let path = resolve_upload_path(upload_dir, file_name)?;
    let format = PayloadFormat::from_file_name(file_name)?;

    let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
        CoreError::Payload(format!("Cannot read upload '{file_name}': {e}"))
    })?;
    ensure_size(metadata.len(), max_bytes)?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| CoreError::Payload(format!("Cannot read upload '{file_name}': {e}")))?;
    tracing::debug!(
        file = %path.display(),
        bytes = bytes.len(),
        format = format.as_str(),
        "Read bulk upload",
    );

    parse_payload(&bytes, format, max_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn csv_rows_become_string_records_in_header_order() {
        let csv = b"property_name, units ,city\nOak Court, 12 ,Springfield\nElm,3,Shelbyville\n";
        let records = parse_payload(csv, PayloadFormat::Csv, MB).unwrap();

        assert_eq!(records.len(), 2);
        let keys: Vec<_> = records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["property_name", "units", "city"]);
        assert_eq!(records[0]["units"], json!("12"));
        assert_eq!(records[1]["property_name"], json!("Elm"));
    }

    #[test]
    fn ragged_csv_is_rejected() {
        let csv = b"a,b\n1,2\n3\n";
        assert_matches!(parse_csv(csv), Err(CoreError::Payload(_)));
    }

    #[test]
    fn header_only_csv_is_empty() {
        assert!(parse_csv(b"a,b\n").unwrap().is_empty());
    }

    #[test]
    fn json_must_be_array_of_objects() {
        let ok = parse_json(br#"[{"a": 1}, {"a": "2"}]"#).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[0]["a"], json!(1));

        assert_matches!(parse_json(br#"{"a": 1}"#), Err(CoreError::Payload(_)));
        assert_matches!(
            parse_json(br#"[{"a": 1}, 3]"#),
            Err(CoreError::Payload(m)) if m.contains("item 1")
        );
        assert_matches!(parse_json(b"not json"), Err(CoreError::Payload(_)));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let body = br#"[{"a": 1}]"#;
        assert_matches!(
            parse_payload(body, PayloadFormat::Json, 4),
            Err(CoreError::Payload(m)) if m.contains("exceeds")
        );
    }

    #[test]
    fn format_detection() {
        assert_eq!(PayloadFormat::from_file_name("tenants.CSV").unwrap(), PayloadFormat::Csv);
        assert_eq!(PayloadFormat::from_file_name("x.json").unwrap(), PayloadFormat::Json);
        assert!(PayloadFormat::from_file_name("x.xlsx").is_err());
        assert!(PayloadFormat::from_file_name("noext").is_err());
    }

    #[test]
    fn upload_names_cannot_escape_the_directory() {
        let dir = Path::new("/srv/uploads");
        assert!(resolve_upload_path(dir, "tenants.csv").is_ok());
        for bad in ["../etc/passwd", "a/b.csv", "a\\b.csv", "..", ""] {
            assert!(resolve_upload_path(dir, bad).is_err(), "{bad} should be rejected");
        }
    }

    #[tokio::test]
    async fn read_upload_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.csv"), "username,email\nada,ada@x.io\n").unwrap();

        let records = read_upload(dir.path(), "users.csv", MB).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["email"], json!("ada@x.io"));

        assert_matches!(
            read_upload(dir.path(), "missing.csv", MB).await,
            Err(CoreError::Payload(_))
        );
        assert_matches!(
            read_upload(dir.path(), "users.csv", 4).await,
            Err(CoreError::Payload(_))
        );
    }
}

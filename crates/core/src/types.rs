/// All entity primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A raw bulk record: field name to JSON value, in input order.
pub type Record = serde_json::Map<String, serde_json::Value>;

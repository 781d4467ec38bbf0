use std::path::PathBuf;

/// Default number of operations allowed to execute at the same time.
pub const DEFAULT_MAX_CONCURRENT_OPERATIONS: usize = 3;

/// Default number of records per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default maximum upload size in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;

/// Bulk pipeline configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    /// Operations allowed to hold an execution permit at once (min 1).
    pub max_concurrent_operations: usize,
    /// Records per chunk (min 1).
    pub chunk_size: usize,
    /// Largest accepted upload, in megabytes.
    pub max_file_size_mb: u64,
    /// Directory `execute_file` reads uploads from.
    pub upload_dir: PathBuf,
    /// Directory exports are written to.
    pub output_dir: PathBuf,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: DEFAULT_MAX_CONCURRENT_OPERATIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            upload_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./exports"),
        }
    }
}

impl BulkConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default     |
    /// |----------------------------------|-------------|
    /// | `BULK_MAX_CONCURRENT_OPERATIONS` | `3`         |
    /// | `BULK_CHUNK_SIZE`                | `100`       |
    /// | `BULK_MAX_FILE_SIZE_MB`          | `50`        |
    /// | `BULK_UPLOAD_DIR`                | `./uploads` |
    /// | `BULK_OUTPUT_DIR`                | `./exports` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_concurrent_operations = parse_or(
            &lookup,
            "BULK_MAX_CONCURRENT_OPERATIONS",
            defaults.max_concurrent_operations,
        )
        .max(1);
        let chunk_size = parse_or(&lookup, "BULK_CHUNK_SIZE", defaults.chunk_size).max(1);
        let max_file_size_mb =
            parse_or(&lookup, "BULK_MAX_FILE_SIZE_MB", defaults.max_file_size_mb);

        let upload_dir = lookup("BULK_UPLOAD_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);
        let output_dir = lookup("BULK_OUTPUT_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        Self {
            max_concurrent_operations,
            chunk_size,
            max_file_size_mb,
            upload_dir,
            output_dir,
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                key,
                value = %raw,
                default = %default,
                "Invalid bulk setting, using default",
            );
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(BulkConfig::from_lookup(lookup(&[])), BulkConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = BulkConfig::from_lookup(lookup(&[
            ("BULK_MAX_CONCURRENT_OPERATIONS", "8"),
            ("BULK_CHUNK_SIZE", "25"),
            ("BULK_MAX_FILE_SIZE_MB", "2"),
            ("BULK_UPLOAD_DIR", "/srv/in"),
            ("BULK_OUTPUT_DIR", "/srv/out"),
        ]));
        assert_eq!(config.max_concurrent_operations, 8);
        assert_eq!(config.chunk_size, 25);
        assert_eq!(config.max_file_size_bytes(), 2 * 1024 * 1024);
        assert_eq!(config.upload_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = BulkConfig::from_lookup(lookup(&[
            ("BULK_CHUNK_SIZE", "lots"),
            ("BULK_MAX_FILE_SIZE_MB", "-1"),
        ]));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.max_file_size_mb, DEFAULT_MAX_FILE_SIZE_MB);
    }

    #[test]
    fn zero_sizes_are_raised_to_one() {
        let config = BulkConfig::from_lookup(lookup(&[
            ("BULK_CHUNK_SIZE", "0"),
            ("BULK_MAX_CONCURRENT_OPERATIONS", "0"),
        ]));
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.max_concurrent_operations, 1);
    }
}

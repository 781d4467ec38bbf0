//! Bulk operations pipeline: tracking, chunked execution, payload parsing
//! and export.

pub mod config;
pub mod executor;
pub mod export;
pub mod operation;
pub mod payload;
pub mod service;
pub mod tracker;

pub use config::BulkConfig;
pub use executor::{HandlerRegistry, RecordError, RecordHandler};
pub use export::{ExportFormat, ExportOutcome, Exporter, RecordSource};
pub use operation::{
    BulkOperationResult, Completion, NewOperation, Operation, OperationId, OperationSummary,
    Progress, RecordFailure,
};
pub use payload::PayloadFormat;
pub use service::{BulkOperations, Job, RunSlot};
pub use tracker::{InMemoryOperationStore, OperationStore};

//! Entity, operation type and operation status enums for bulk operations.
//!
//! The string forms are what the database lookup tables and the HTTP API
//! use, so they are kept as constants next to the enums.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const ENTITY_PROPERTIES: &str = "properties";
pub const ENTITY_TENANTS: &str = "tenants";
pub const ENTITY_MAINTENANCE_REQUESTS: &str = "maintenance_requests";
pub const ENTITY_USERS: &str = "users";

/// All valid entity type strings.
pub const VALID_ENTITY_TYPES: &[&str] = &[
    ENTITY_PROPERTIES,
    ENTITY_TENANTS,
    ENTITY_MAINTENANCE_REQUESTS,
    ENTITY_USERS,
];

pub const OP_CREATE: &str = "create";
pub const OP_UPDATE: &str = "update";
pub const OP_DELETE: &str = "delete";
pub const OP_EXPORT: &str = "export";
pub const OP_IMPORT: &str = "import";
pub const OP_ARCHIVE: &str = "archive";
pub const OP_ACTIVATE: &str = "activate";
pub const OP_DEACTIVATE: &str = "deactivate";

/// All valid operation type strings.
pub const VALID_OPERATION_TYPES: &[&str] = &[
    OP_CREATE,
    OP_UPDATE,
    OP_DELETE,
    OP_EXPORT,
    OP_IMPORT,
    OP_ARCHIVE,
    OP_ACTIVATE,
    OP_DEACTIVATE,
];

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_PARTIAL_SUCCESS: &str = "partial_success";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_CANCELLED: &str = "cancelled";

/// All valid status strings.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_QUEUED,
    STATUS_PROCESSING,
    STATUS_COMPLETED,
    STATUS_PARTIAL_SUCCESS,
    STATUS_FAILED,
    STATUS_CANCELLED,
];

// ---------------------------------------------------------------------------
// Entity type
// ---------------------------------------------------------------------------

/// Domain record families that bulk operations can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Properties,
    Tenants,
    MaintenanceRequests,
    Users,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        Self::Properties,
        Self::Tenants,
        Self::MaintenanceRequests,
        Self::Users,
    ];

    /// Convert from a database / API string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            ENTITY_PROPERTIES => Ok(Self::Properties),
            ENTITY_TENANTS => Ok(Self::Tenants),
            ENTITY_MAINTENANCE_REQUESTS => Ok(Self::MaintenanceRequests),
            ENTITY_USERS => Ok(Self::Users),
            _ => Err(CoreError::Validation(format!(
                "Invalid entity type '{s}'. Must be one of: {}",
                VALID_ENTITY_TYPES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Properties => ENTITY_PROPERTIES,
            Self::Tenants => ENTITY_TENANTS,
            Self::MaintenanceRequests => ENTITY_MAINTENANCE_REQUESTS,
            Self::Users => ENTITY_USERS,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Operation type
// ---------------------------------------------------------------------------

/// What a bulk operation does to each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Export,
    Import,
    Archive,
    Activate,
    Deactivate,
}

impl OperationType {
    /// Convert from a database / API string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            OP_CREATE => Ok(Self::Create),
            OP_UPDATE => Ok(Self::Update),
            OP_DELETE => Ok(Self::Delete),
            OP_EXPORT => Ok(Self::Export),
            OP_IMPORT => Ok(Self::Import),
            OP_ARCHIVE => Ok(Self::Archive),
            OP_ACTIVATE => Ok(Self::Activate),
            OP_DEACTIVATE => Ok(Self::Deactivate),
            _ => Err(CoreError::Validation(format!(
                "Invalid operation type '{s}'. Must be one of: {}",
                VALID_OPERATION_TYPES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => OP_CREATE,
            Self::Update => OP_UPDATE,
            Self::Delete => OP_DELETE,
            Self::Export => OP_EXPORT,
            Self::Import => OP_IMPORT,
            Self::Archive => OP_ARCHIVE,
            Self::Activate => OP_ACTIVATE,
            Self::Deactivate => OP_DEACTIVATE,
        }
    }

    /// Whether each record carries a full entity (create/import) rather
    /// than a reference to an existing one.
    pub fn creates_records(&self) -> bool {
        matches!(self, Self::Create | Self::Import)
    }

    /// Operations that only need the record `id` (no field payload).
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Delete | Self::Archive | Self::Activate | Self::Deactivate
        )
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Operation status
// ---------------------------------------------------------------------------

/// Lifecycle status of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Queued,
    Processing,
    Completed,
    PartialSuccess,
    Failed,
    Cancelled,
}

impl OperationStatus {
    /// Convert from a database / API string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            STATUS_QUEUED => Ok(Self::Queued),
            STATUS_PROCESSING => Ok(Self::Processing),
            STATUS_COMPLETED => Ok(Self::Completed),
            STATUS_PARTIAL_SUCCESS => Ok(Self::PartialSuccess),
            STATUS_FAILED => Ok(Self::Failed),
            STATUS_CANCELLED => Ok(Self::Cancelled),
            _ => Err(CoreError::Validation(format!(
                "Invalid status '{s}'. Must be one of: {}",
                VALID_STATUSES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => STATUS_QUEUED,
            Self::Processing => STATUS_PROCESSING,
            Self::Completed => STATUS_COMPLETED,
            Self::PartialSuccess => STATUS_PARTIAL_SUCCESS,
            Self::Failed => STATUS_FAILED,
            Self::Cancelled => STATUS_CANCELLED,
        }
    }

    /// Terminal statuses accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Only queued and processing operations can be cancelled or updated.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn entity_type_round_trips_through_strings() {
        for entity in EntityType::ALL {
            assert_eq!(EntityType::from_str_value(entity.as_str()).unwrap(), entity);
        }
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        assert_matches!(
            EntityType::from_str_value("leases"),
            Err(CoreError::Validation(msg)) if msg.contains("leases")
        );
    }

    #[test]
    fn operation_type_serde_matches_as_str() {
        let json = serde_json::to_string(&OperationType::Deactivate).unwrap();
        assert_eq!(json, "\"deactivate\"");
        assert_eq!(
            OperationType::from_str_value("import").unwrap(),
            OperationType::Import
        );
    }

    #[test]
    fn lifecycle_classification() {
        assert!(OperationType::Archive.is_lifecycle());
        assert!(OperationType::Delete.is_lifecycle());
        assert!(!OperationType::Update.is_lifecycle());
        assert!(OperationType::Import.creates_records());
        assert!(!OperationType::Export.creates_records());
    }

    #[test]
    fn terminal_statuses() {
        assert!(OperationStatus::Queued.is_active());
        assert!(OperationStatus::Processing.is_active());
        for status in [
            OperationStatus::Completed,
            OperationStatus::PartialSuccess,
            OperationStatus::Failed,
            OperationStatus::Cancelled,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn partial_success_uses_snake_case() {
        let json = serde_json::to_string(&OperationStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
    }
}

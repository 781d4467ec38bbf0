//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table.

use estatecore_core::entity::{OperationStatus, OperationType};

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by database ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Bulk operation lifecycle status (`bulk_operation_statuses`).
    BulkOperationStatus {
        Queued = 1,
        Processing = 2,
        Completed = 3,
        PartialSuccess = 4,
        Failed = 5,
        Cancelled = 6,
    }
}

define_status_enum! {
    /// Bulk operation kind (`bulk_operation_types`).
    BulkOperationType {
        Create = 1,
        Update = 2,
        Delete = 3,
        Export = 4,
        Import = 5,
        Archive = 6,
        Activate = 7,
        Deactivate = 8,
    }
}

// ---------------------------------------------------------------------------
// Core conversions
// ---------------------------------------------------------------------------

impl From<OperationStatus> for BulkOperationStatus {
    fn from(status: OperationStatus) -> Self {
        match status {
            OperationStatus::Queued => Self::Queued,
            OperationStatus::Processing => Self::Processing,
            OperationStatus::Completed => Self::Completed,
            OperationStatus::PartialSuccess => Self::PartialSuccess,
            OperationStatus::Failed => Self::Failed,
            OperationStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<BulkOperationStatus> for OperationStatus {
    fn from(status: BulkOperationStatus) -> Self {
        match status {
            BulkOperationStatus::Queued => Self::Queued,
            BulkOperationStatus::Processing => Self::Processing,
            BulkOperationStatus::Completed => Self::Completed,
            BulkOperationStatus::PartialSuccess => Self::PartialSuccess,
            BulkOperationStatus::Failed => Self::Failed,
            BulkOperationStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<OperationType> for BulkOperationType {
    fn from(kind: OperationType) -> Self {
        match kind {
            OperationType::Create => Self::Create,
            OperationType::Update => Self::Update,
            OperationType::Delete => Self::Delete,
            OperationType::Export => Self::Export,
            OperationType::Import => Self::Import,
            OperationType::Archive => Self::Archive,
            OperationType::Activate => Self::Activate,
            OperationType::Deactivate => Self::Deactivate,
        }
    }
}

impl From<BulkOperationType> for OperationType {
    fn from(kind: BulkOperationType) -> Self {
        match kind {
            BulkOperationType::Create => Self::Create,
            BulkOperationType::Update => Self::Update,
            BulkOperationType::Delete => Self::Delete,
            BulkOperationType::Export => Self::Export,
            BulkOperationType::Import => Self::Import,
            BulkOperationType::Archive => Self::Archive,
            BulkOperationType::Activate => Self::Activate,
            BulkOperationType::Deactivate => Self::Deactivate,
        }
    }
}

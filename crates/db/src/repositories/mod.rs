//! Repository layer: one unit struct per table with async CRUD functions
//! taking a `&PgPool`.

pub mod bulk_operation_repo;
pub mod lifecycle_repo;
pub mod maintenance_request_repo;
pub mod property_repo;
pub mod tenant_repo;
pub mod user_repo;

pub use bulk_operation_repo::BulkOperationRepo;
pub use lifecycle_repo::LifecycleRepo;
pub use maintenance_request_repo::MaintenanceRequestRepo;
pub use property_repo::PropertyRepo;
pub use tenant_repo::TenantRepo;
pub use user_repo::UserRepo;

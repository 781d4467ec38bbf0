pub mod bulk_operation;
pub mod maintenance_request;
pub mod property;
pub mod status;
pub mod tenant;
pub mod user;

//! EstateCore domain core.
//!
//! Pure types and logic for the bulk operations pipeline. Persistence and
//! HTTP concerns live in `estatecore-db` and `estatecore-api`; this crate
//! only talks to them through the traits in [`bulk`].

pub mod bulk;
pub mod entity;
pub mod error;
pub mod types;
pub mod validation;

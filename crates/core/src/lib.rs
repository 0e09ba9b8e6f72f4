//! Pure domain logic for the delivery back office.
//!
//! This crate has no internal dependencies and performs no I/O, so the
//! repository layer, API handlers, and background tasks can all share the
//! same status rules, lock policy, and error taxonomy.

pub mod error;
pub mod locking;
pub mod roles;
pub mod status;
pub mod types;
pub mod version;

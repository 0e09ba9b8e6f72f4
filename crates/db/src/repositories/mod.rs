//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-step mutations open an
//! explicit transaction so lock acquisition, field updates, version
//! increments, and lock release commit or roll back as one unit.

pub mod handover_repo;
pub mod lock_repo;
pub mod order_repo;

pub use handover_repo::HandoverRepo;
pub use lock_repo::{LockRepo, LockTable};
pub use order_repo::OrderRepo;

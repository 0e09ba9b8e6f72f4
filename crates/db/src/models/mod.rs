//! Row structs and request/response DTOs.

pub mod handover;
pub mod order;

pub mod handover;
pub mod order;

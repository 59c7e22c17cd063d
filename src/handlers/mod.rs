//! HTTP handlers for reference resources and orders.

pub mod orders;
pub mod resources;

//! Domain model: reference entity descriptors and typed resources, plus the order aggregate.

mod entity;
mod order;
mod reference;

pub use entity::*;
pub use order::*;
pub use reference::*;

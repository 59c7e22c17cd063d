//! Service layer: validation, generic reference CRUD and order workflows.

mod orders;
mod resource;
pub mod validation;

pub use orders::OrderService;
pub use resource::ResourceService;
pub use validation::RequestValidator;

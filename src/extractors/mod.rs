//! Request extractors.

mod order_form;

pub use order_form::{parse_date, ItemsField, OrderForm};

//! `depot-catalog` — product schema (SKU) and category definitions.
//!
//! Schemas are immutable once stored; allocation reads them, never writes.

pub mod category;
pub mod schema;
pub mod source;

pub use category::Category;
pub use schema::ProductSchema;
pub use source::{InMemoryCatalog, SchemaSource};

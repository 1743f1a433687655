//! Configuration document and the schema it is validated against.

pub mod document;
pub mod schema;

pub use document::ConfigDocument;
pub use schema::{DefaultsGenerator, ParameterSchema, SchemaWalker};

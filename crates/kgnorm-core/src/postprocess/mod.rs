//! Repairs recognizer and extractor output into a graph-ready form.

mod entities;
mod relations;

pub use entities::{EntityOutput, EntityPostprocessor};
pub use relations::{RelationOutput, RelationPostprocessor};

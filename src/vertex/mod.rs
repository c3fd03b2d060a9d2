//! Vertex data: attribute formats, attribute values and vertex arrays.

pub mod array;
pub mod format;
pub mod value;

pub use array::VertexArray;
pub use format::{Attr, AttrFormat, AttrLayout, AttrType};
pub use value::AttrValue;

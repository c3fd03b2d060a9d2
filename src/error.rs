//! Error types for vertex array management

use thiserror::Error;

use crate::backend::BackendError;
use crate::executor::ExecutorError;
use crate::vertex::AttrType;

/// Result type for vertex array operations
pub type Result<T> = std::result::Result<T, VertexArrayError>;

/// Vertex array error type
#[derive(Error, Debug)]
pub enum VertexArrayError {
    #[error("Attribute '{name}' has type {ty:?}, which is not a vertex attribute type")]
    InvalidFormat { name: String, ty: AttrType },
    #[error("{vertex_count} vertices of {stride} bytes do not fit in an addressable buffer")]
    TooManyVertices { vertex_count: usize, stride: usize },
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
}

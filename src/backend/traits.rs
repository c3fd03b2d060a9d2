//! Core backend abstraction traits
//!
//! [`DeviceBackend`] is the device resource API the vertex array is written
//! against. Every method is called on the device thread only; backends are
//! free to be `!Send` (an OpenGL context usually is).

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create resource: {0}")]
    ResourceCreationFailed(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Buffer access out of range: offset {offset} + len {len} > size {size}")]
    OutOfRange { offset: usize, len: usize, size: usize },
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Main device backend trait
pub trait DeviceBackend: 'static {
    /// Get the backend name
    fn name(&self) -> &'static str;

    // Object lifetime

    /// Create a vertex array object
    fn create_vertex_array(&mut self) -> BackendResult<ObjectId>;

    /// Delete a vertex array object
    fn delete_vertex_array(&mut self, vertex_array: ObjectId);

    /// Create a buffer object with no storage
    fn create_buffer(&mut self) -> BackendResult<ObjectId>;

    /// Delete a buffer object
    fn delete_buffer(&mut self, buffer: ObjectId);

    // Binding state

    /// Query the object currently bound at `target`
    fn current_binding(&self, target: BindingTarget) -> Option<ObjectId>;

    /// Bind `object` at `target`, or clear the binding point with `None`
    fn bind(&mut self, target: BindingTarget, object: Option<ObjectId>);

    // Buffer contents

    /// Replace the storage of the buffer bound at `target` with `data`
    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: VertexUsage,
    ) -> BackendResult<()>;

    /// Overwrite `data.len()` bytes of the buffer bound at `target`, starting at `offset`
    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> BackendResult<()>;

    /// Read `out.len()` bytes of the buffer bound at `target`, starting at `offset`
    fn read_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        out: &mut [u8],
    ) -> BackendResult<()>;

    // Vertex input

    /// Look up the input slot a program assigns to the named attribute
    fn attrib_location(&mut self, program: ObjectId, name: &str) -> Option<u32>;

    /// Point attribute `location` at the bound array buffer as `components` 32-bit floats
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        stride: usize,
        offset: usize,
    );

    /// Enable reading attribute `location` from its buffer
    fn enable_vertex_attrib_array(&mut self, location: u32);

    // Drawing

    /// Draw `count` indices from the bound vertex array's index buffer
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: usize,
        format: IndexFormat,
        offset: usize,
    );
}

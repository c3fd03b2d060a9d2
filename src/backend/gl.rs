//! OpenGL device backend on top of glow.
//!
//! The backend borrows nothing: it owns the `glow::Context`, which must be
//! current on the device thread. Create it inside the executor's factory:
//!
//! ```ignore
//! let executor = Executor::spawn(ExecutorConfig::default(), move || {
//!     let gl = unsafe { glow::Context::from_loader_function(|s| loader(s)) };
//!     Ok(GlBackend::new(gl))
//! })?;
//! ```

use glow::HasContext;

use super::traits::{BackendError, BackendResult, DeviceBackend};
use super::types::*;

/// OpenGL device backend.
pub struct GlBackend {
    gl: glow::Context,
}

impl GlBackend {
    /// Wrap a context that is current on the calling thread.
    pub fn new(gl: glow::Context) -> Self {
        log::info!("OpenGL backend: {}", unsafe { gl.get_parameter_string(glow::VERSION) });
        Self { gl }
    }

    /// The wrapped context, for calls this backend does not cover.
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn binding_parameter(target: BindingTarget) -> u32 {
        match target {
            BindingTarget::VertexArray => glow::VERTEX_ARRAY_BINDING,
            BindingTarget::ArrayBuffer => glow::ARRAY_BUFFER_BINDING,
            BindingTarget::ElementArrayBuffer => glow::ELEMENT_ARRAY_BUFFER_BINDING,
            BindingTarget::Program => glow::CURRENT_PROGRAM,
        }
    }

    fn buffer_target(target: BufferTarget) -> u32 {
        match target {
            BufferTarget::Array => glow::ARRAY_BUFFER,
            BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
        }
    }

    fn usage(usage: VertexUsage) -> u32 {
        match usage {
            VertexUsage::Static => glow::STATIC_DRAW,
            VertexUsage::Dynamic => glow::DYNAMIC_DRAW,
            VertexUsage::Stream => glow::STREAM_DRAW,
        }
    }

    fn topology(topology: PrimitiveTopology) -> u32 {
        match topology {
            PrimitiveTopology::PointList => glow::POINTS,
            PrimitiveTopology::LineList => glow::LINES,
            PrimitiveTopology::TriangleList => glow::TRIANGLES,
        }
    }

    fn index_type(format: IndexFormat) -> u32 {
        match format {
            IndexFormat::Uint16 => glow::UNSIGNED_SHORT,
            IndexFormat::Uint32 => glow::UNSIGNED_INT,
        }
    }

    /// Size of the buffer bound at `target`, failing if none is bound.
    fn bound_buffer_size(&self, target: BufferTarget) -> BackendResult<usize> {
        if self.current_binding(target.binding()).is_none() {
            return Err(BackendError::InvalidOperation(format!(
                "no buffer bound to {target:?}"
            )));
        }
        let size = unsafe {
            self.gl
                .get_buffer_parameter_i32(Self::buffer_target(target), glow::BUFFER_SIZE)
        };
        Ok(usize::try_from(size).unwrap_or(0))
    }

    fn check_range(&self, target: BufferTarget, offset: usize, len: usize) -> BackendResult<i32> {
        let size = self.bound_buffer_size(target)?;
        match offset.checked_add(len) {
            Some(end) if end <= size => i32::try_from(offset)
                .map_err(|_| BackendError::OutOfRange { offset, len, size }),
            _ => Err(BackendError::OutOfRange { offset, len, size }),
        }
    }

    fn check_error(&self, call: &str) -> BackendResult<()> {
        match unsafe { self.gl.get_error() } {
            glow::NO_ERROR => Ok(()),
            glow::OUT_OF_MEMORY => Err(BackendError::ResourceCreationFailed(format!(
                "{call}: out of memory"
            ))),
            glow::CONTEXT_LOST => Err(BackendError::DeviceLost),
            code => Err(BackendError::InvalidOperation(format!(
                "{call}: GL error 0x{code:04X}"
            ))),
        }
    }
}

impl DeviceBackend for GlBackend {
    fn name(&self) -> &'static str {
        "OpenGL"
    }

    fn create_vertex_array(&mut self) -> BackendResult<ObjectId> {
        let vao = unsafe { self.gl.create_vertex_array() }
            .map_err(BackendError::ResourceCreationFailed)?;
        Ok(ObjectId(vao.0))
    }

    fn delete_vertex_array(&mut self, vertex_array: ObjectId) {
        unsafe { self.gl.delete_vertex_array(glow::NativeVertexArray(vertex_array.0)) };
    }

    fn create_buffer(&mut self) -> BackendResult<ObjectId> {
        let buffer = unsafe { self.gl.create_buffer() }
            .map_err(BackendError::ResourceCreationFailed)?;
        Ok(ObjectId(buffer.0))
    }

    fn delete_buffer(&mut self, buffer: ObjectId) {
        unsafe { self.gl.delete_buffer(glow::NativeBuffer(buffer.0)) };
    }

    fn current_binding(&self, target: BindingTarget) -> Option<ObjectId> {
        let raw = unsafe { self.gl.get_parameter_i32(Self::binding_parameter(target)) };
        u32::try_from(raw).ok().and_then(ObjectId::from_raw)
    }

    fn bind(&mut self, target: BindingTarget, object: Option<ObjectId>) {
        unsafe {
            match target {
                BindingTarget::VertexArray => self
                    .gl
                    .bind_vertex_array(object.map(|id| glow::NativeVertexArray(id.0))),
                BindingTarget::ArrayBuffer => self.gl.bind_buffer(
                    glow::ARRAY_BUFFER,
                    object.map(|id| glow::NativeBuffer(id.0)),
                ),
                BindingTarget::ElementArrayBuffer => self.gl.bind_buffer(
                    glow::ELEMENT_ARRAY_BUFFER,
                    object.map(|id| glow::NativeBuffer(id.0)),
                ),
                BindingTarget::Program => self
                    .gl
                    .use_program(object.map(|id| glow::NativeProgram(id.0))),
            }
        }
    }

    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: VertexUsage,
    ) -> BackendResult<()> {
        self.bound_buffer_size(target)?;
        unsafe {
            self.gl
                .buffer_data_u8_slice(Self::buffer_target(target), data, Self::usage(usage))
        };
        self.check_error("buffer_data")
    }

    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> BackendResult<()> {
        let offset = self.check_range(target, offset, data.len())?;
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(Self::buffer_target(target), offset, data)
        };
        self.check_error("buffer_sub_data")
    }

    fn read_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        out: &mut [u8],
    ) -> BackendResult<()> {
        let offset = self.check_range(target, offset, out.len())?;
        unsafe {
            self.gl
                .get_buffer_sub_data(Self::buffer_target(target), offset, out)
        };
        self.check_error("get_buffer_sub_data")
    }

    fn attrib_location(&mut self, program: ObjectId, name: &str) -> Option<u32> {
        unsafe {
            self.gl
                .get_attrib_location(glow::NativeProgram(program.0), name)
        }
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        stride: usize,
        offset: usize,
    ) {
        let (Ok(stride), Ok(offset)) = (i32::try_from(stride), i32::try_from(offset)) else {
            log::error!("vertex_attrib_pointer({location}): stride {stride}/offset {offset}");
            return;
        };
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                location,
                components as i32,
                glow::FLOAT,
                false,
                stride,
                offset,
            )
        };
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(location) };
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: usize,
        format: IndexFormat,
        offset: usize,
    ) {
        let (Ok(count), Ok(offset)) = (i32::try_from(count), i32::try_from(offset)) else {
            log::error!("draw_elements: count {count} or offset {offset} too large");
            return;
        };
        unsafe {
            self.gl.draw_elements(
                Self::topology(topology),
                count,
                Self::index_type(format),
                offset,
            )
        };
        if let Err(err) = self.check_error("draw_elements") {
            log::error!("{err}");
        }
    }
}

//! Dummy device backend for testing and development.
//!
//! This backend keeps every object in host memory and mimics the binding
//! rules of a real device closely enough to test binding discipline:
//!
//! - the element array binding is state of the bound vertex array,
//! - attribute pointers capture the array buffer bound when they are set,
//! - deleting a bound object clears the binding point.
//!
//! Draw calls are recorded (with the indices they resolved) instead of
//! rasterized, so tests can assert exactly what reached the device.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

use super::traits::{BackendError, BackendResult, DeviceBackend};
use super::types::*;

/// Attribute pointer state of one input slot of a vertex array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttribPointer {
    /// Array buffer bound when the pointer was set.
    pub buffer: Option<ObjectId>,
    /// Number of 32-bit float components.
    pub components: u32,
    /// Byte distance between consecutive vertices.
    pub stride: usize,
    /// Byte offset of the first component.
    pub offset: usize,
    /// Whether the slot reads from its buffer.
    pub enabled: bool,
}

/// State recorded by a vertex array object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexArrayState {
    /// Index buffer attached to the vertex array.
    pub element_buffer: Option<ObjectId>,
    /// Attribute pointers by input slot.
    pub attributes: BTreeMap<u32, AttribPointer>,
}

/// A draw call as seen by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_array: ObjectId,
    pub program: Option<ObjectId>,
    pub topology: PrimitiveTopology,
    pub format: IndexFormat,
    /// Indices read from the element buffer.
    pub indices: Vec<u32>,
}

#[derive(Debug)]
struct BufferState {
    data: Vec<u8>,
    usage: VertexUsage,
}

/// Dummy device backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_id: u32,
    object_limit: Option<usize>,
    vertex_arrays: HashMap<ObjectId, VertexArrayState>,
    buffers: HashMap<ObjectId, BufferState>,
    programs: HashMap<ObjectId, HashMap<String, u32>>,
    bound_vertex_array: Option<ObjectId>,
    bound_array_buffer: Option<ObjectId>,
    /// Element array binding used while no vertex array is bound.
    detached_element_buffer: Option<ObjectId>,
    bound_program: Option<ObjectId>,
    draw_calls: Vec<DrawCall>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail object creation once `limit` vertex arrays and buffers are alive.
    pub fn with_object_limit(mut self, limit: usize) -> Self {
        self.object_limit = Some(limit);
        self
    }

    /// Register a program that declares the given attribute slots.
    ///
    /// Shader compilation is not modelled; a program is only its attribute table.
    pub fn create_program(&mut self, attributes: &[(&str, u32)]) -> ObjectId {
        let id = self.allocate_id();
        let table = attributes
            .iter()
            .map(|(name, location)| ((*name).to_string(), *location))
            .collect();
        self.programs.insert(id, table);
        log::trace!("DummyBackend: created program {id} ({} attributes)", attributes.len());
        id
    }

    /// Delete a program created by [`create_program`](Self::create_program).
    pub fn delete_program(&mut self, program: ObjectId) {
        self.programs.remove(&program);
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    /// Draw calls issued so far, oldest first.
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    /// Drain the recorded draw calls.
    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draw_calls)
    }

    /// Contents of a buffer, if it exists.
    pub fn buffer_contents(&self, buffer: ObjectId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// Usage hint a buffer's storage was last allocated with.
    pub fn buffer_usage(&self, buffer: ObjectId) -> Option<VertexUsage> {
        self.buffers.get(&buffer).map(|b| b.usage)
    }

    /// State of a vertex array, if it exists.
    pub fn vertex_array(&self, vertex_array: ObjectId) -> Option<&VertexArrayState> {
        self.vertex_arrays.get(&vertex_array)
    }

    /// Number of live vertex arrays and buffers.
    pub fn live_objects(&self) -> usize {
        self.vertex_arrays.len() + self.buffers.len()
    }

    fn allocate_id(&mut self) -> ObjectId {
        let id = ObjectId(NonZeroU32::MIN.saturating_add(self.next_id));
        self.next_id += 1;
        id
    }

    fn check_limit(&self, kind: &str) -> BackendResult<()> {
        match self.object_limit {
            Some(limit) if self.live_objects() >= limit => {
                Err(BackendError::ResourceCreationFailed(format!(
                    "{kind}: object limit {limit} reached"
                )))
            }
            _ => Ok(()),
        }
    }

    fn element_binding(&self) -> Option<ObjectId> {
        match self.bound_vertex_array {
            Some(vao) => self
                .vertex_arrays
                .get(&vao)
                .and_then(|state| state.element_buffer),
            None => self.detached_element_buffer,
        }
    }

    fn bound_buffer(&self, target: BufferTarget) -> BackendResult<ObjectId> {
        let bound = match target {
            BufferTarget::Array => self.bound_array_buffer,
            BufferTarget::ElementArray => self.element_binding(),
        };
        bound.ok_or_else(|| {
            BackendError::InvalidOperation(format!("no buffer bound to {target:?}"))
        })
    }

    fn buffer_mut(&mut self, target: BufferTarget) -> BackendResult<&mut BufferState> {
        let id = self.bound_buffer(target)?;
        self.buffers
            .get_mut(&id)
            .ok_or_else(|| BackendError::InvalidOperation(format!("buffer {id} does not exist")))
    }
}

fn check_range(offset: usize, len: usize, size: usize) -> BackendResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(BackendError::OutOfRange { offset, len, size }),
    }
}

impl DeviceBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_vertex_array(&mut self) -> BackendResult<ObjectId> {
        self.check_limit("vertex array")?;
        let id = self.allocate_id();
        self.vertex_arrays.insert(id, VertexArrayState::default());
        log::trace!("DummyBackend: created vertex array {id}");
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: ObjectId) {
        log::trace!("DummyBackend: deleting vertex array {vertex_array}");
        self.vertex_arrays.remove(&vertex_array);
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn create_buffer(&mut self) -> BackendResult<ObjectId> {
        self.check_limit("buffer")?;
        let id = self.allocate_id();
        self.buffers.insert(
            id,
            BufferState {
                data: Vec::new(),
                usage: VertexUsage::default(),
            },
        );
        log::trace!("DummyBackend: created buffer {id}");
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: ObjectId) {
        log::trace!("DummyBackend: deleting buffer {buffer}");
        self.buffers.remove(&buffer);
        if self.bound_array_buffer == Some(buffer) {
            self.bound_array_buffer = None;
        }
        if self.detached_element_buffer == Some(buffer) {
            self.detached_element_buffer = None;
        }
        // only the bound vertex array drops its reference to a deleted index buffer
        if let Some(state) = self
            .bound_vertex_array
            .and_then(|vao| self.vertex_arrays.get_mut(&vao))
        {
            if state.element_buffer == Some(buffer) {
                state.element_buffer = None;
            }
        }
    }

    fn current_binding(&self, target: BindingTarget) -> Option<ObjectId> {
        match target {
            BindingTarget::VertexArray => self.bound_vertex_array,
            BindingTarget::ArrayBuffer => self.bound_array_buffer,
            BindingTarget::ElementArrayBuffer => self.element_binding(),
            BindingTarget::Program => self.bound_program,
        }
    }

    fn bind(&mut self, target: BindingTarget, object: Option<ObjectId>) {
        log::trace!("DummyBackend: bind {target:?} -> {object:?}");
        match target {
            BindingTarget::VertexArray => self.bound_vertex_array = object,
            BindingTarget::ArrayBuffer => self.bound_array_buffer = object,
            BindingTarget::ElementArrayBuffer => match self.bound_vertex_array {
                Some(vao) => match self.vertex_arrays.get_mut(&vao) {
                    Some(state) => state.element_buffer = object,
                    None => log::error!("DummyBackend: bound vertex array {vao} does not exist"),
                },
                None => self.detached_element_buffer = object,
            },
            BindingTarget::Program => self.bound_program = object,
        }
    }

    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: VertexUsage,
    ) -> BackendResult<()> {
        log::trace!("DummyBackend: buffer_data {target:?} len={} {usage:?}", data.len());
        let buffer = self.buffer_mut(target)?;
        buffer.data = data.to_vec();
        buffer.usage = usage;
        Ok(())
    }

    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> BackendResult<()> {
        log::trace!("DummyBackend: buffer_sub_data {target:?} offset={offset} len={}", data.len());
        let buffer = self.buffer_mut(target)?;
        check_range(offset, data.len(), buffer.data.len())?;
        buffer.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        out: &mut [u8],
    ) -> BackendResult<()> {
        log::trace!(
            "DummyBackend: read_buffer_sub_data {target:?} offset={offset} len={}",
            out.len()
        );
        let buffer = self.buffer_mut(target)?;
        check_range(offset, out.len(), buffer.data.len())?;
        out.copy_from_slice(&buffer.data[offset..offset + out.len()]);
        Ok(())
    }

    fn attrib_location(&mut self, program: ObjectId, name: &str) -> Option<u32> {
        self.programs
            .get(&program)
            .and_then(|table| table.get(name).copied())
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        stride: usize,
        offset: usize,
    ) {
        let buffer = self.bound_array_buffer;
        let Some(state) = self
            .bound_vertex_array
            .and_then(|vao| self.vertex_arrays.get_mut(&vao))
        else {
            log::error!("DummyBackend: vertex_attrib_pointer({location}) without a vertex array");
            return;
        };
        let pointer = state.attributes.entry(location).or_default();
        pointer.buffer = buffer;
        pointer.components = components;
        pointer.stride = stride;
        pointer.offset = offset;
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        let Some(state) = self
            .bound_vertex_array
            .and_then(|vao| self.vertex_arrays.get_mut(&vao))
        else {
            log::error!("DummyBackend: enable_vertex_attrib_array({location}) without a VAO");
            return;
        };
        state.attributes.entry(location).or_default().enabled = true;
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: usize,
        format: IndexFormat,
        offset: usize,
    ) {
        let Some(vertex_array) = self.bound_vertex_array else {
            log::error!("DummyBackend: draw_elements without a vertex array");
            return;
        };
        let Some(bytes) = self
            .element_binding()
            .and_then(|ebo| self.buffers.get(&ebo))
            .map(|b| b.data.as_slice())
        else {
            log::error!("DummyBackend: draw_elements without an index buffer");
            return;
        };
        let len = count * format.size();
        if let Err(err) = check_range(offset, len, bytes.len()) {
            log::error!("DummyBackend: draw_elements: {err}");
            return;
        }
        let bytes = &bytes[offset..offset + len];
        let indices = match format {
            IndexFormat::Uint16 => bytes
                .chunks_exact(2)
                .map(|c| u32::from(bytemuck::pod_read_unaligned::<u16>(c)))
                .collect(),
            IndexFormat::Uint32 => bytes
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<u32>)
                .collect(),
        };
        log::trace!("DummyBackend: draw_elements {topology:?} count={count}");
        self.draw_calls.push(DrawCall {
            vertex_array,
            program: self.bound_program,
            topology,
            format,
            indices,
        });
    }
}

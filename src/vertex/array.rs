//! Vertex arrays: a vertex buffer, an index buffer and the vertex array
//! object tying them to a shader's inputs.
//!
//! Every device call runs on the executor's device thread. The caller-side
//! methods only validate their arguments, package the work and submit it:
//!
//! | Operation | Submission | Binds |
//! |-----------|------------|-------|
//! | [`VertexArray::new`] | blocking | parent scope, vao, vbo |
//! | [`VertexArray::set_indices`] | async | vao, ebo |
//! | [`VertexArray::set_vertex_attr`] | async | vbo |
//! | [`VertexArray::vertex_attr`] | blocking | vbo |
//! | [`VertexArray::draw`] | async | parent scope, vao |
//! | drop / [`VertexArray::delete`] | async | none |
//!
//! Each bind goes through a [`BindGuard`](crate::binder::BindGuard), so the
//! device's bindings are the same after every task as before it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{
    BackendError, BackendResult, BindingTarget, BufferTarget, DeviceBackend, IndexFormat,
    ObjectId, PrimitiveTopology, VertexUsage,
};
use crate::binder::Binder;
use crate::context::{Context, Doer};
use crate::error::{Result, VertexArrayError};
use crate::executor::Executor;

use super::format::{Attr, AttrFormat, AttrLayout};
use super::value::AttrValue;

/// State needed on the device thread to draw the vertex array.
struct DrawState<B: DeviceBackend> {
    parent: Arc<dyn Doer<B>>,
    vao: Binder,
    /// Index count of the last upload that reached the device.
    index_count: AtomicUsize,
}

impl<B: DeviceBackend> DrawState<B> {
    fn scope(&self, device: &mut B, sub: &mut dyn FnMut(&mut B, &Context)) {
        self.parent.with_scope(device, &mut |device, ctx| {
            let mut vao_scope = self.vao.bind(device);
            sub(&mut *vao_scope, ctx);
            let count = self.index_count.load(Ordering::Acquire);
            vao_scope.draw_elements(PrimitiveTopology::TriangleList, count, IndexFormat::Uint32, 0);
        });
    }
}

#[derive(Debug, Clone, Copy)]
struct DeviceObjects {
    vao: ObjectId,
    vbo: ObjectId,
    ebo: ObjectId,
}

impl DeviceObjects {
    fn release<B: DeviceBackend>(self, device: &mut B) {
        device.delete_vertex_array(self.vao);
        device.delete_buffer(self.vbo);
        device.delete_buffer(self.ebo);
    }
}

/// A triangle mesh in device memory with a fixed vertex count and format.
///
/// Attribute values are addressed per vertex and per attribute, and written
/// in place. Indices are replaced wholesale. The device objects are released
/// by [`delete`](Self::delete) or when the vertex array is dropped.
///
/// `VertexArray` is `Send + Sync`; any thread may use it. Operations run on
/// the device thread in the order they were submitted.
pub struct VertexArray<B: DeviceBackend> {
    executor: Executor<B>,
    draw: Arc<DrawState<B>>,
    vbo: Binder,
    ebo: Binder,
    vertex_count: usize,
    format: AttrFormat,
    layout: AttrLayout,
    usage: VertexUsage,
    /// Index count of the last submitted upload. Locked across submission so
    /// it follows queue order.
    index_count: Mutex<usize>,
}

static_assertions::assert_impl_all!(VertexArray<crate::backend::DummyBackend>: Send, Sync);

impl<B: DeviceBackend> VertexArray<B> {
    /// Create a vertex array of `vertex_count` zeroed vertices in `format`.
    ///
    /// Runs inside `parent`'s scope: each attribute of `format` is connected
    /// to the input of the same name of the scope's shader. Attributes the
    /// shader does not declare stay disabled.
    ///
    /// # Errors
    ///
    /// [`InvalidFormat`](crate::VertexArrayError::InvalidFormat) if an
    /// attribute type cannot be stored in a vertex buffer, and
    /// [`TooManyVertices`](crate::VertexArrayError::TooManyVertices) if the
    /// vertex buffer size overflows `usize`, both before anything is
    /// allocated. Device and executor failures are returned as well, with no
    /// device objects left behind.
    ///
    /// # Panics
    ///
    /// Panics if `indices.len()` is not a multiple of 3 or an index does not
    /// fit in 32 bits.
    pub fn new(
        executor: &Executor<B>,
        parent: Arc<dyn Doer<B>>,
        format: AttrFormat,
        usage: VertexUsage,
        vertex_count: usize,
        indices: &[usize],
    ) -> Result<Self> {
        let layout = AttrLayout::new(&format)?;
        let buffer_size = vertex_count.checked_mul(layout.stride()).ok_or(
            VertexArrayError::TooManyVertices {
                vertex_count,
                stride: layout.stride(),
            },
        )?;
        let indices = device_indices(indices);

        let task_parent = Arc::clone(&parent);
        let task_layout = layout.clone();
        let objects = executor.try_submit(move |device: &mut B| {
            let mut created = None;
            task_parent.with_scope(device, &mut |device, ctx| {
                created = Some(create_objects(device, ctx, &task_layout, buffer_size, usage));
            });
            created.unwrap_or_else(|| {
                Err(BackendError::InvalidOperation(
                    "parent scope did not run the vertex array setup".to_string(),
                ))
            })
        })??;

        log::debug!(
            "Created vertex array {} ({} vertices, stride {}, {:?})",
            objects.vao,
            vertex_count,
            layout.stride(),
            usage
        );

        let array = Self {
            executor: executor.clone(),
            draw: Arc::new(DrawState {
                parent,
                vao: Binder::new(BindingTarget::VertexArray, objects.vao),
                index_count: AtomicUsize::new(0),
            }),
            vbo: Binder::new(BindingTarget::ArrayBuffer, objects.vbo),
            ebo: Binder::new(BindingTarget::ElementArrayBuffer, objects.ebo),
            vertex_count,
            format,
            layout,
            usage,
            index_count: Mutex::new(0),
        };
        array.upload_indices(indices);
        Ok(array)
    }

    /// Device name of the vertex array object.
    pub fn id(&self) -> ObjectId {
        self.draw.vao.object()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn vertex_format(&self) -> &AttrFormat {
        &self.format
    }

    pub fn vertex_usage(&self) -> VertexUsage {
        self.usage
    }

    /// Number of indices set by the most recent [`set_indices`](Self::set_indices).
    ///
    /// With concurrent callers, "most recent" is the upload queued last, which
    /// is also the one the next [`draw`](Self::draw) uses.
    pub fn index_count(&self) -> usize {
        *self.index_count.lock()
    }

    /// Bytes from one vertex to the next.
    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    /// Offset of the named attribute within a vertex.
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.layout.offset(name)
    }

    /// Replace the index buffer. Every three indices form one triangle.
    ///
    /// # Panics
    ///
    /// Panics if `indices.len()` is not a multiple of 3 or an index does not
    /// fit in 32 bits.
    pub fn set_indices(&self, indices: &[usize]) {
        self.upload_indices(device_indices(indices));
    }

    /// Write the value of `attr` for vertex `vertex`.
    ///
    /// Returns `false`, writing nothing, if the format has no attribute with
    /// that name and type.
    ///
    /// # Panics
    ///
    /// Panics if `vertex` is out of range or `value` is not of type `attr.ty`.
    pub fn set_vertex_attr(&self, vertex: usize, attr: &Attr, value: impl Into<AttrValue>) -> bool {
        if vertex >= self.vertex_count {
            panic!("set vertex attr: invalid vertex index");
        }
        let Some(offset) = self.attr_offset(vertex, attr) else {
            return false;
        };
        let value = value.into();
        if value.ty() != attr.ty {
            panic!(
                "set vertex attr: {:?} value for attribute '{}' of type {:?}",
                value.ty(),
                attr.name,
                attr.ty
            );
        }

        let vbo = self.vbo;
        let bytes = value.to_bytes();
        self.submit("set vertex attr", move |device| {
            let mut vbo_scope = vbo.bind(device);
            if let Err(err) = vbo_scope.buffer_sub_data(BufferTarget::Array, offset, &bytes) {
                log::error!("Failed to write vertex attribute at offset {offset}: {err}");
            }
        });
        true
    }

    /// Read the value of `attr` for vertex `vertex`.
    ///
    /// Waits for every operation submitted before it, so a value written by
    /// [`set_vertex_attr`](Self::set_vertex_attr) from the same thread is
    /// always seen. Returns `None` if the format has no attribute with that
    /// name and type.
    ///
    /// # Panics
    ///
    /// Panics if `vertex` is out of range, or if the device read fails.
    pub fn vertex_attr(&self, vertex: usize, attr: &Attr) -> Option<AttrValue> {
        if vertex >= self.vertex_count {
            panic!("vertex attr: invalid vertex index");
        }
        let offset = self.attr_offset(vertex, attr)?;

        let vbo = self.vbo;
        let ty = attr.ty;
        let bytes = self.executor.submit(move |device: &mut B| -> BackendResult<Vec<u8>> {
            let mut vbo_scope = vbo.bind(device);
            let mut bytes = vec![0; ty.size()];
            vbo_scope.read_buffer_sub_data(BufferTarget::Array, offset, &mut bytes)?;
            Ok(bytes)
        });
        match bytes {
            Ok(bytes) => Some(AttrValue::from_bytes(ty, &bytes)),
            Err(err) => panic!("vertex attr: {err}"),
        }
    }

    /// Draw the indexed triangles inside the parent scope.
    pub fn draw(&self) {
        let draw = Arc::clone(&self.draw);
        self.submit("draw", move |device| draw.scope(device, &mut |_, _| {}));
    }

    /// Release the device objects.
    ///
    /// Same as dropping the vertex array; the release is queued behind all
    /// previously submitted operations.
    pub fn delete(self) {}

    fn attr_offset(&self, vertex: usize, attr: &Attr) -> Option<usize> {
        if !self.format.contains(attr) {
            return None;
        }
        // vertex < vertex_count, and vertex_count * stride was checked in new
        self.layout
            .offset(&attr.name)
            .map(|offset| self.layout.stride() * vertex + offset)
    }

    fn upload_indices(&self, indices: Vec<u32>) {
        // held until the upload is queued
        let mut index_count = self.index_count.lock();
        *index_count = indices.len();

        let draw = Arc::clone(&self.draw);
        let ebo = self.ebo;
        let usage = self.usage;
        self.submit("set indices", move |device| {
            let mut vao_scope = draw.vao.bind(device);
            let mut ebo_scope = ebo.bind(&mut *vao_scope);
            match ebo_scope.buffer_data(
                BufferTarget::ElementArray,
                bytemuck::cast_slice(&indices),
                usage,
            ) {
                Ok(()) => draw.index_count.store(indices.len(), Ordering::Release),
                Err(err) => log::error!("Failed to upload {} indices: {err}", indices.len()),
            }
        });
    }

    fn submit<F>(&self, what: &str, task: F)
    where
        F: FnOnce(&mut B) + Send + 'static,
    {
        if let Err(err) = self.executor.submit_async(task) {
            log::warn!("Vertex array {}: {what} not submitted: {err}", self.id());
        }
    }
}

/// Draws the vertex array after running the nested work with it bound.
impl<B: DeviceBackend> Doer<B> for VertexArray<B> {
    fn with_scope(&self, device: &mut B, sub: &mut dyn FnMut(&mut B, &Context)) {
        self.draw.scope(device, sub);
    }
}

impl<B: DeviceBackend> Drop for VertexArray<B> {
    fn drop(&mut self) {
        let objects = DeviceObjects {
            vao: self.draw.vao.object(),
            vbo: self.vbo.object(),
            ebo: self.ebo.object(),
        };
        let result = self.executor.submit_async(move |device| {
            log::debug!("Releasing vertex array {}", objects.vao);
            objects.release(device);
        });
        if let Err(err) = result {
            log::debug!("Vertex array {} not released: {err}", objects.vao);
        }
    }
}

impl<B: DeviceBackend> std::fmt::Debug for VertexArray<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("id", &self.id())
            .field("vertex_count", &self.vertex_count)
            .field("format", &self.format)
            .field("usage", &self.usage)
            .field("index_count", &self.index_count())
            .finish()
    }
}

fn device_indices(indices: &[usize]) -> Vec<u32> {
    if indices.len() % 3 != 0 {
        panic!("vertex array set indices: number of indices not divisible by 3");
    }
    indices
        .iter()
        .map(|&index| {
            u32::try_from(index).unwrap_or_else(|_| {
                panic!("vertex array set indices: index {index} does not fit in 32 bits")
            })
        })
        .collect()
}

fn create_objects<B: DeviceBackend>(
    device: &mut B,
    ctx: &Context,
    layout: &AttrLayout,
    buffer_size: usize,
    usage: VertexUsage,
) -> BackendResult<DeviceObjects> {
    let vao = device.create_vertex_array()?;
    let vbo = match device.create_buffer() {
        Ok(vbo) => vbo,
        Err(err) => {
            device.delete_vertex_array(vao);
            return Err(err);
        }
    };
    let ebo = match device.create_buffer() {
        Ok(ebo) => ebo,
        Err(err) => {
            device.delete_vertex_array(vao);
            device.delete_buffer(vbo);
            return Err(err);
        }
    };

    let objects = DeviceObjects { vao, vbo, ebo };
    if let Err(err) = configure_objects(device, ctx, objects, layout, buffer_size, usage) {
        objects.release(device);
        return Err(err);
    }
    Ok(objects)
}

fn configure_objects<B: DeviceBackend>(
    device: &mut B,
    ctx: &Context,
    objects: DeviceObjects,
    layout: &AttrLayout,
    buffer_size: usize,
    usage: VertexUsage,
) -> BackendResult<()> {
    let mut vao_scope = Binder::new(BindingTarget::VertexArray, objects.vao).bind(device);
    let mut vbo_scope = Binder::new(BindingTarget::ArrayBuffer, objects.vbo).bind(&mut *vao_scope);

    let zeroed = vec![0u8; buffer_size];
    vbo_scope.buffer_data(BufferTarget::Array, &zeroed, usage)?;

    // element array binding is vertex-array state
    DeviceBackend::bind(&mut *vbo_scope, BindingTarget::ElementArrayBuffer, Some(objects.ebo));

    let Some(program) = ctx.shader() else {
        log::warn!(
            "Vertex array {} created without a shader; no attributes enabled",
            objects.vao
        );
        return Ok(());
    };

    for (attr, offset) in layout.iter() {
        let Some(components) = attr.ty.components() else {
            continue;
        };
        let Some(location) = vbo_scope.attrib_location(program, &attr.name) else {
            log::debug!(
                "Attribute '{}' is not an input of program {program}; left disabled",
                attr.name
            );
            continue;
        };
        vbo_scope.vertex_attrib_pointer(location, components, layout.stride(), offset);
        vbo_scope.enable_vertex_attrib_array(location);
    }
    Ok(())
}

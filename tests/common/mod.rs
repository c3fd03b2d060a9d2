//! Common utilities for vertex array integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use graphics_vertex::{
    AttrFormat, AttrType, BindingTarget, DeviceBackend, Doer, DummyBackend, Executor,
    ExecutorConfig, ObjectId, ShaderScope, VertexArray, VertexUsage,
};

/// Indices of the two triangles of a quad.
pub const QUAD_INDICES: [usize; 6] = [0, 1, 2, 0, 2, 3];

/// Every binding point the crate touches.
pub const ALL_BINDINGS: [BindingTarget; 4] = [
    BindingTarget::VertexArray,
    BindingTarget::ArrayBuffer,
    BindingTarget::ElementArrayBuffer,
    BindingTarget::Program,
];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Start a device thread running a fresh dummy backend.
pub fn spawn_executor() -> Executor<DummyBackend> {
    spawn_executor_with(DummyBackend::new)
}

/// Start a device thread running the backend built by `factory`.
pub fn spawn_executor_with(
    factory: impl FnOnce() -> DummyBackend + Send + 'static,
) -> Executor<DummyBackend> {
    init_logging();
    Executor::spawn(ExecutorConfig::default(), move || Ok(factory()))
        .expect("failed to start device thread")
}

/// Register a program declaring `attributes` and return a scope binding it.
pub fn shader_scope(
    executor: &Executor<DummyBackend>,
    attributes: &'static [(&'static str, u32)],
) -> Arc<dyn Doer<DummyBackend>> {
    let program = executor.submit(move |device| device.create_program(attributes));
    Arc::new(ShaderScope::new(program))
}

/// `{position: Vec2, color: Vec4}`
pub fn position_color_format() -> AttrFormat {
    AttrFormat::new()
        .with("position", AttrType::Vec2)
        .with("color", AttrType::Vec4)
}

/// A four-vertex quad in [`position_color_format`] drawn with a matching shader.
pub fn quad(executor: &Executor<DummyBackend>) -> VertexArray<DummyBackend> {
    let parent = shader_scope(executor, &[("position", 0), ("color", 1)]);
    VertexArray::new(
        executor,
        parent,
        position_color_format(),
        VertexUsage::Dynamic,
        4,
        &QUAD_INDICES,
    )
    .expect("failed to create quad")
}

/// Objects currently bound at every binding point.
pub fn bindings(executor: &Executor<DummyBackend>) -> Vec<Option<ObjectId>> {
    executor.submit(|device| {
        ALL_BINDINGS
            .iter()
            .map(|target| device.current_binding(*target))
            .collect()
    })
}

/// Number of live vertex arrays and buffers on the device.
pub fn live_objects(executor: &Executor<DummyBackend>) -> usize {
    executor.submit(|device| device.live_objects())
}

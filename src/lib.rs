//! Graphics Vertex - vertex array management on a dedicated device thread
//!
//! Graphics devices keep their bindings in global state and usually only
//! tolerate calls from one thread. This crate wraps both constraints:
//!
//! - **Device thread**: an [`Executor`] owns the device and runs closures
//!   submitted from any thread, in order, one at a time.
//! - **Scoped binding**: every bind is a [`BindGuard`] that restores the
//!   previous binding when dropped, so nested operations never leak state.
//! - **Vertex arrays**: a [`VertexArray`] packs named, typed attributes into
//!   one interleaved vertex buffer, with an index buffer of triangles.
//!
//! # Backends
//! - **Dummy**: in-memory device recording draw calls (always available)
//! - **OpenGL**: via glow (`gl-backend` feature, native only)
//!
//! # Example
//!
//! ```ignore
//! let executor = Executor::spawn(ExecutorConfig::default(), || Ok(DummyBackend::new()))?;
//! let program = executor.submit(|device| device.create_program(&[("position", 0), ("color", 1)]));
//!
//! let format = AttrFormat::new()
//!     .with("position", AttrType::Vec2)
//!     .with("color", AttrType::Vec4);
//! let quad = VertexArray::new(
//!     &executor,
//!     Arc::new(ShaderScope::new(program)),
//!     format,
//!     VertexUsage::Dynamic,
//!     4,
//!     &[0, 1, 2, 0, 2, 3],
//! )?;
//!
//! quad.set_vertex_attr(0, &Attr::new("position", AttrType::Vec2), [1.0, 2.0]);
//! quad.draw();
//! ```

pub mod backend;
pub mod binder;
pub mod context;
pub mod error;
pub mod executor;
pub mod vertex;

pub use backend::{
    BackendError, BackendResult, BindingTarget, BufferTarget, DeviceBackend, DummyBackend,
    IndexFormat, ObjectId, PrimitiveTopology, VertexUsage,
};
#[cfg(all(feature = "gl-backend", not(target_arch = "wasm32")))]
pub use backend::GlBackend;
pub use binder::{BindGuard, Binder};
pub use context::{Context, Doer, RootScope, ShaderScope};
pub use error::{Result, VertexArrayError};
pub use executor::{Executor, ExecutorConfig, ExecutorError};
pub use vertex::{Attr, AttrFormat, AttrLayout, AttrType, AttrValue, VertexArray};

//! Backend abstraction layer
//!
//! Provides the device trait and the types shared by all backends.
//!
//! # Available Backends
//!
//! - `dummy` (always built): in-memory device for tests and headless tooling
//! - `gl` (`gl-backend` feature): OpenGL through glow

pub mod dummy;
pub mod traits;
pub mod types;

#[cfg(all(feature = "gl-backend", not(target_arch = "wasm32")))]
pub mod gl;

pub use dummy::{AttribPointer, DrawCall, DummyBackend, VertexArrayState};
#[cfg(all(feature = "gl-backend", not(target_arch = "wasm32")))]
pub use gl::GlBackend;
pub use traits::*;
pub use types::*;

//! Enclosing scopes for device work.
//!
//! A vertex array never draws on its own: it runs inside a parent scope that
//! has already set up whatever the draw needs (typically a bound shader
//! program). Scopes nest through [`Doer::with_scope`], each one doing its
//! setup, running the inner work, then undoing the setup.

use crate::backend::{BindingTarget, DeviceBackend, ObjectId};
use crate::binder::BindGuard;

/// What an enclosing scope provides to the work nested inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Context {
    shader: Option<ObjectId>,
}

impl Context {
    /// A context with no shader program in effect.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context with `program` in effect.
    pub fn with_shader(program: ObjectId) -> Self {
        Self {
            shader: Some(program),
        }
    }

    /// The shader program in effect, if any.
    pub fn shader(&self) -> Option<ObjectId> {
        self.shader
    }
}

/// An enclosing scope.
///
/// `with_scope` runs on the device thread. Implementations perform their
/// setup on `device`, call `sub` exactly once with the device and the context
/// they establish, then undo their setup before returning.
pub trait Doer<B: DeviceBackend>: Send + Sync {
    fn with_scope(&self, device: &mut B, sub: &mut dyn FnMut(&mut B, &Context));
}

/// The outermost scope: no setup, no shader.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootScope;

impl<B: DeviceBackend> Doer<B> for RootScope {
    fn with_scope(&self, device: &mut B, sub: &mut dyn FnMut(&mut B, &Context)) {
        sub(device, &Context::new());
    }
}

/// Binds a shader program for the duration of the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderScope {
    program: ObjectId,
}

impl ShaderScope {
    pub fn new(program: ObjectId) -> Self {
        Self { program }
    }

    pub fn program(&self) -> ObjectId {
        self.program
    }
}

impl<B: DeviceBackend> Doer<B> for ShaderScope {
    fn with_scope(&self, device: &mut B, sub: &mut dyn FnMut(&mut B, &Context)) {
        let mut guard = BindGuard::bind(device, BindingTarget::Program, Some(self.program));
        sub(&mut *guard, &Context::with_shader(self.program));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn root_scope_has_no_shader() {
        let mut device = DummyBackend::new();
        let mut seen = None;
        RootScope.with_scope(&mut device, &mut |_, ctx| seen = Some(ctx.shader()));
        assert_eq!(seen, Some(None));
    }

    #[test]
    fn shader_scope_binds_and_restores_program() {
        let mut device = DummyBackend::new();
        let outer = device.create_program(&[]);
        let program = device.create_program(&[("position", 0)]);
        device.bind(BindingTarget::Program, Some(outer));

        let mut bound = None;
        ShaderScope::new(program).with_scope(&mut device, &mut |device, ctx| {
            assert_eq!(ctx.shader(), Some(program));
            bound = device.current_binding(BindingTarget::Program);
        });

        assert_eq!(bound, Some(program));
        assert_eq!(device.current_binding(BindingTarget::Program), Some(outer));
    }
}

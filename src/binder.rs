//! Scoped binding of device objects.
//!
//! Binding points are global device state. Every bind made by this crate goes
//! through a [`BindGuard`], which remembers what was bound before and puts it
//! back when dropped, on normal exit and during unwinding alike.
//!
//! The guard holds the device's `&mut` borrow and derefs to it, so the device
//! is reached *through* the guard. A nested guard therefore borrows the outer
//! one, and the borrow checker rejects any order of restores other than the
//! reverse of the binds:
//!
//! ```ignore
//! let mut vao = BindGuard::bind(device, BindingTarget::VertexArray, Some(va));
//! let mut vbo = BindGuard::bind(&mut *vao, BindingTarget::ArrayBuffer, Some(buffer));
//! vbo.buffer_sub_data(BufferTarget::Array, offset, bytes)?;
//! // vbo restores first, then vao
//! ```

use std::ops::{Deref, DerefMut};

use crate::backend::{BindingTarget, DeviceBackend, ObjectId};

/// Restores the previous binding of a binding point when dropped.
#[must_use = "the binding is restored as soon as the guard is dropped"]
pub struct BindGuard<'a, B: DeviceBackend> {
    device: &'a mut B,
    target: BindingTarget,
    previous: Option<ObjectId>,
}

impl<'a, B: DeviceBackend> BindGuard<'a, B> {
    /// Bind `object` at `target`, remembering the object bound there now.
    pub fn bind(device: &'a mut B, target: BindingTarget, object: Option<ObjectId>) -> Self {
        let previous = device.current_binding(target);
        device.bind(target, object);
        Self {
            device,
            target,
            previous,
        }
    }

    /// The binding point this guard restores.
    pub fn target(&self) -> BindingTarget {
        self.target
    }

    /// The object that will be bound again on restore.
    pub fn previous(&self) -> Option<ObjectId> {
        self.previous
    }

    /// Restore the previous binding now.
    pub fn restore(self) {}
}

impl<B: DeviceBackend> Deref for BindGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.device
    }
}

impl<B: DeviceBackend> DerefMut for BindGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.device
    }
}

impl<B: DeviceBackend> Drop for BindGuard<'_, B> {
    fn drop(&mut self) {
        self.device.bind(self.target, self.previous);
    }
}

/// A device object together with the binding point it is bound at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binder {
    target: BindingTarget,
    object: ObjectId,
}

impl Binder {
    pub fn new(target: BindingTarget, object: ObjectId) -> Self {
        Self { target, object }
    }

    pub fn target(&self) -> BindingTarget {
        self.target
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Bind the object for the lifetime of the returned guard.
    pub fn bind<'a, B: DeviceBackend>(&self, device: &'a mut B) -> BindGuard<'a, B> {
        BindGuard::bind(device, self.target, Some(self.object))
    }
}

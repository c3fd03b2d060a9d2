//! Common types shared between backends

use std::num::NonZeroU32;

/// Name of a device object (vertex array, buffer, program).
///
/// Zero is reserved by the device to mean "nothing bound", so a live object
/// always has a non-zero name. An empty binding point is `Option::<ObjectId>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) NonZeroU32);

impl ObjectId {
    /// Wrap a raw object name, returning `None` for zero.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw object name.
    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Global binding points whose bound object affects subsequent device calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingTarget {
    /// The current vertex array object.
    VertexArray,
    /// The buffer vertex attribute pointers read from.
    ArrayBuffer,
    /// The index buffer. Part of the bound vertex array's state.
    ElementArrayBuffer,
    /// The current shader program.
    Program,
}

/// Buffer binding targets accepted by the buffer data calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

impl BufferTarget {
    /// The binding point this target reads its buffer from.
    pub fn binding(self) -> BindingTarget {
        match self {
            BufferTarget::Array => BindingTarget::ArrayBuffer,
            BufferTarget::ElementArray => BindingTarget::ElementArrayBuffer,
        }
    }
}

/// How often the contents of a buffer are expected to change.
///
/// Only a hint to the device allocator; it has no effect on correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexUsage {
    /// The data never or rarely changes.
    #[default]
    Static,
    /// The data changes often.
    Dynamic,
    /// The data changes every frame.
    Stream,
}

/// Primitive assembly mode for draw calls.
///
/// Vertex arrays only draw triangle lists; the other modes are part of the
/// backend API for callers issuing their own draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    #[default]
    TriangleList,
}

/// Index format
///
/// Vertex arrays upload 32-bit indices; 16-bit indices are accepted by the
/// backend draw call for index buffers filled by other callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn size(self) -> usize {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_rejects_zero() {
        assert!(ObjectId::from_raw(0).is_none());
        assert_eq!(ObjectId::from_raw(7).map(ObjectId::raw), Some(7));
    }

    #[test]
    fn buffer_target_binding() {
        assert_eq!(BufferTarget::Array.binding(), BindingTarget::ArrayBuffer);
        assert_eq!(
            BufferTarget::ElementArray.binding(),
            BindingTarget::ElementArrayBuffer
        );
    }

    #[test]
    fn index_format_size() {
        assert_eq!(IndexFormat::Uint16.size(), 2);
        assert_eq!(IndexFormat::Uint32.size(), 4);
    }
}

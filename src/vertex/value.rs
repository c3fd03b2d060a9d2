//! Typed attribute values and their byte representation.

use glam::{Vec2, Vec3, Vec4};

use super::format::AttrType;

/// Value of one attribute of one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl AttrValue {
    /// The attribute type this value belongs to.
    pub fn ty(&self) -> AttrType {
        match self {
            Self::Float(_) => AttrType::Float,
            Self::Vec2(_) => AttrType::Vec2,
            Self::Vec3(_) => AttrType::Vec3,
            Self::Vec4(_) => AttrType::Vec4,
        }
    }

    /// Native-endian bytes as stored in a vertex buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vec2(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
        }
    }

    /// Rebuild a value of type `ty` from vertex buffer bytes.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not a vertex attribute type or `bytes` is not
    /// exactly `ty.size()` long.
    pub fn from_bytes(ty: AttrType, bytes: &[u8]) -> Self {
        assert_eq!(
            bytes.len(),
            ty.size(),
            "attribute value: expected {} bytes for {ty:?}",
            ty.size()
        );
        match ty {
            AttrType::Float => Self::Float(bytemuck::pod_read_unaligned(bytes)),
            AttrType::Vec2 => Self::Vec2(bytemuck::pod_read_unaligned(bytes)),
            AttrType::Vec3 => Self::Vec3(bytemuck::pod_read_unaligned(bytes)),
            AttrType::Vec4 => Self::Vec4(bytemuck::pod_read_unaligned(bytes)),
            AttrType::Int | AttrType::Uint | AttrType::Mat2 | AttrType::Mat3 | AttrType::Mat4 => {
                panic!("attribute value: unsupported attribute type {ty:?}")
            }
        }
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec2> for AttrValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for AttrValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vec4> for AttrValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<[f32; 2]> for AttrValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(Vec2::from(v))
    }
}

impl From<[f32; 3]> for AttrValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(Vec3::from(v))
    }
}

impl From<[f32; 4]> for AttrValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(Vec4::from(v))
    }
}

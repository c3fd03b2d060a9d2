//! Attribute formats and their byte layout.
//!
//! An [`AttrFormat`] is an ordered list of named, typed attributes. All
//! attributes of one vertex are packed back to back in insertion order, so a
//! format fully determines the vertex stride and each attribute's offset:
//!
//! ```ignore
//! let format = AttrFormat::new()
//!     .with("position", AttrType::Vec2) // offset 0,  8 bytes
//!     .with("color", AttrType::Vec4);   // offset 8, 16 bytes
//!
//! let layout = AttrLayout::new(&format)?;
//! assert_eq!(layout.stride(), 24);
//! assert_eq!(layout.offset("color"), Some(8));
//! ```

use crate::error::{Result, VertexArrayError};

/// Type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Vec2,
    /// Three 32-bit floats.
    Vec3,
    /// Four 32-bit floats.
    Vec4,
    /// Single 32-bit signed integer.
    Int,
    /// Single 32-bit unsigned integer.
    Uint,
    /// 2x2 matrix of 32-bit floats.
    Mat2,
    /// 3x3 matrix of 32-bit floats.
    Mat3,
    /// 4x4 matrix of 32-bit floats.
    Mat4,
}

impl AttrType {
    /// Get the size in bytes of this type.
    pub fn size(&self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 | Self::Mat2 => 16,
            Self::Mat3 => 36,
            Self::Mat4 => 64,
        }
    }

    /// Number of float components, for the types a vertex buffer can hold.
    pub fn components(&self) -> Option<u32> {
        match self {
            Self::Float => Some(1),
            Self::Vec2 => Some(2),
            Self::Vec3 => Some(3),
            Self::Vec4 => Some(4),
            Self::Int | Self::Uint | Self::Mat2 | Self::Mat3 | Self::Mat4 => None,
        }
    }

    /// Whether a vertex buffer can hold attributes of this type.
    pub fn is_vertex_type(&self) -> bool {
        self.components().is_some()
    }
}

/// A named, typed attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attr {
    pub name: String,
    pub ty: AttrType,
}

impl Attr {
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered set of attributes, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrFormat {
    attrs: Vec<Attr>,
}

impl AttrFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, ty: AttrType) -> Self {
        self.insert(name, ty);
        self
    }

    /// Append an attribute. An existing attribute of the same name keeps its
    /// position and takes the new type.
    pub fn insert(&mut self, name: impl Into<String>, ty: AttrType) {
        let name = name.into();
        match self.attrs.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.ty = ty,
            None => self.attrs.push(Attr { name, ty }),
        }
    }

    /// Type of the named attribute.
    pub fn get(&self, name: &str) -> Option<AttrType> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.ty)
    }

    /// Whether the format has an attribute with this name *and* type.
    pub fn contains(&self, attr: &Attr) -> bool {
        self.get(&attr.name) == Some(attr.ty)
    }

    /// Total size in bytes of one vertex.
    pub fn size(&self) -> usize {
        self.attrs.iter().map(|attr| attr.ty.size()).sum()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Attr> {
        self.attrs.iter()
    }
}

impl FromIterator<Attr> for AttrFormat {
    fn from_iter<I: IntoIterator<Item = Attr>>(iter: I) -> Self {
        let mut format = Self::new();
        for attr in iter {
            format.insert(attr.name, attr.ty);
        }
        format
    }
}

impl<'a> IntoIterator for &'a AttrFormat {
    type Item = &'a Attr;
    type IntoIter = std::slice::Iter<'a, Attr>;

    fn into_iter(self) -> Self::IntoIter {
        self.attrs.iter()
    }
}

/// Byte layout of a vertex format inside an interleaved vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrLayout {
    stride: usize,
    entries: Vec<(Attr, usize)>,
}

impl AttrLayout {
    /// Compute the layout of `format`.
    ///
    /// Fails with [`VertexArrayError::InvalidFormat`] on the first attribute
    /// whose type a vertex buffer cannot hold.
    pub fn new(format: &AttrFormat) -> Result<Self> {
        let mut offset = 0;
        let mut entries = Vec::with_capacity(format.len());
        for attr in format {
            if !attr.ty.is_vertex_type() {
                return Err(VertexArrayError::InvalidFormat {
                    name: attr.name.clone(),
                    ty: attr.ty,
                });
            }
            entries.push((attr.clone(), offset));
            offset += attr.ty.size();
        }
        Ok(Self {
            stride: offset,
            entries,
        })
    }

    /// Bytes from one vertex to the next.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Offset of the named attribute within a vertex.
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(attr, _)| attr.name == name)
            .map(|(_, offset)| *offset)
    }

    /// Attributes with their offsets, in format order.
    pub fn iter(&self) -> impl Iterator<Item = (&Attr, usize)> {
        self.entries.iter().map(|(attr, offset)| (attr, *offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AttrType::Float, 4)]
    #[case(AttrType::Vec2, 8)]
    #[case(AttrType::Vec3, 12)]
    #[case(AttrType::Vec4, 16)]
    #[case(AttrType::Int, 4)]
    #[case(AttrType::Uint, 4)]
    #[case(AttrType::Mat2, 16)]
    #[case(AttrType::Mat3, 36)]
    #[case(AttrType::Mat4, 64)]
    fn test_attr_type_size(#[case] ty: AttrType, #[case] size: usize) {
        assert_eq!(ty.size(), size);
    }

    #[test]
    fn test_position_color_layout() {
        let format = AttrFormat::new()
            .with("position", AttrType::Vec2)
            .with("color", AttrType::Vec4);
        let layout = AttrLayout::new(&format).unwrap();

        assert_eq!(format.size(), 24);
        assert_eq!(layout.stride(), 24);
        assert_eq!(layout.offset("position"), Some(0));
        assert_eq!(layout.offset("color"), Some(8));
        assert_eq!(layout.offset("normal"), None);
    }

    #[test]
    fn test_offsets_follow_insertion_order() {
        let format: AttrFormat = [
            Attr::new("c", AttrType::Vec3),
            Attr::new("a", AttrType::Float),
            Attr::new("b", AttrType::Vec4),
            Attr::new("d", AttrType::Vec2),
        ]
        .into_iter()
        .collect();
        let layout = AttrLayout::new(&format).unwrap();

        let mut expected = 0;
        for (attr, offset) in layout.iter() {
            assert_eq!(offset, expected);
            expected += attr.ty.size();
        }
        assert_eq!(expected, layout.stride());
        let names: Vec<_> = layout.iter().map(|(attr, _)| attr.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b", "d"]);
    }

    #[test]
    fn test_insert_existing_name_replaces_type_in_place() {
        let mut format = AttrFormat::new()
            .with("position", AttrType::Vec3)
            .with("uv", AttrType::Vec2);
        format.insert("position", AttrType::Vec2);

        assert_eq!(format.len(), 2);
        assert_eq!(format.get("position"), Some(AttrType::Vec2));
        assert_eq!(format.iter().next().map(|a| a.name.as_str()), Some("position"));
        assert_eq!(format.size(), 16);
    }

    #[test]
    fn test_contains_checks_name_and_type() {
        let format = AttrFormat::new().with("position", AttrType::Vec2);
        assert!(format.contains(&Attr::new("position", AttrType::Vec2)));
        assert!(!format.contains(&Attr::new("position", AttrType::Vec3)));
        assert!(!format.contains(&Attr::new("color", AttrType::Vec2)));
    }

    #[rstest]
    #[case(AttrType::Int)]
    #[case(AttrType::Uint)]
    #[case(AttrType::Mat2)]
    #[case(AttrType::Mat3)]
    #[case(AttrType::Mat4)]
    fn test_non_vertex_types_are_rejected(#[case] ty: AttrType) {
        let format = AttrFormat::new()
            .with("position", AttrType::Vec3)
            .with("extra", ty);
        match AttrLayout::new(&format) {
            Err(VertexArrayError::InvalidFormat { name, ty: rejected }) => {
                assert_eq!(name, "extra");
                assert_eq!(rejected, ty);
            }
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_format() {
        let format = AttrFormat::new();
        assert!(format.is_empty());
        assert_eq!(AttrLayout::new(&format).unwrap().stride(), 0);
    }
}

pub mod geom;

/// Logical type of a value, independent of its physical encoding.
///
/// Several encodings can share one logical type: a `String` may live inline,
/// on the heap, or borrow external memory, and an `Array` may be stored as a
/// compact typed buffer instead of per-element nodes. `Kind` is always derived
/// from the representation tag, never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    BinaryBlob,
    Array,
    Table,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::UInt => "uint",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::BinaryBlob => "binary_blob",
            Kind::Array => "array",
            Kind::Table => "table",
        }
    }
}

/// Semantic refinement of a value's logical type.
///
/// Subtypes do not change how the payload is stored; they tell consumers what
/// the value means (a `UInt` tagged `StringToken` is a token hash, a compact
/// float array tagged `Quaternion` is a rotation). `Unspecified` is resolved
/// to the canonical subtype for the kind the first time a node is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SubType {
    Invalid = 0,
    Resource,
    ResourceName,
    Panorama,
    SoundEvent,
    Subclass,
    EntityName,
    #[default]
    Unspecified,
    Null,
    BinaryBlob,
    Array,
    Table,
    Bool8,
    Char8,
    UChar32,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Pointer,
    Color32,
    Vector,
    Vector2D,
    Vector4D,
    RotationVector,
    Quaternion,
    QAngle,
    Matrix3x4,
    Transform,
    StringToken,
    EHandle,
}

impl SubType {
    /// The canonical subtype installed when a node is typed with
    /// `Unspecified`.
    pub fn canonical_for(kind: Kind) -> SubType {
        match kind {
            Kind::Null => SubType::Null,
            Kind::Bool => SubType::Bool8,
            Kind::Int => SubType::Int64,
            Kind::UInt => SubType::UInt64,
            Kind::Double => SubType::Float64,
            Kind::String => SubType::String,
            Kind::BinaryBlob => SubType::BinaryBlob,
            Kind::Array => SubType::Array,
            Kind::Table => SubType::Table,
        }
    }

    pub fn resolve(self, kind: Kind) -> SubType {
        if self == SubType::Unspecified {
            SubType::canonical_for(kind)
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubType::Invalid => "invalid",
            SubType::Resource => "resource",
            SubType::ResourceName => "resource_name",
            SubType::Panorama => "panorama",
            SubType::SoundEvent => "soundevent",
            SubType::Subclass => "subclass",
            SubType::EntityName => "entity_name",
            SubType::Unspecified => "unspecified",
            SubType::Null => "null",
            SubType::BinaryBlob => "binary_blob",
            SubType::Array => "array",
            SubType::Table => "table",
            SubType::Bool8 => "bool8",
            SubType::Char8 => "char8",
            SubType::UChar32 => "uchar32",
            SubType::Int8 => "int8",
            SubType::UInt8 => "uint8",
            SubType::Int16 => "int16",
            SubType::UInt16 => "uint16",
            SubType::Int32 => "int32",
            SubType::UInt32 => "uint32",
            SubType::Int64 => "int64",
            SubType::UInt64 => "uint64",
            SubType::Float32 => "float32",
            SubType::Float64 => "float64",
            SubType::String => "string",
            SubType::Pointer => "pointer",
            SubType::Color32 => "color32",
            SubType::Vector => "vector",
            SubType::Vector2D => "vector2d",
            SubType::Vector4D => "vector4d",
            SubType::RotationVector => "rotation_vector",
            SubType::Quaternion => "quaternion",
            SubType::QAngle => "qangle",
            SubType::Matrix3x4 => "matrix3x4",
            SubType::Transform => "transform",
            SubType::StringToken => "string_token",
            SubType::EHandle => "ehandle",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Option<SubType> {
        const TABLE: [SubType; 37] = [
            SubType::Invalid,
            SubType::Resource,
            SubType::ResourceName,
            SubType::Panorama,
            SubType::SoundEvent,
            SubType::Subclass,
            SubType::EntityName,
            SubType::Unspecified,
            SubType::Null,
            SubType::BinaryBlob,
            SubType::Array,
            SubType::Table,
            SubType::Bool8,
            SubType::Char8,
            SubType::UChar32,
            SubType::Int8,
            SubType::UInt8,
            SubType::Int16,
            SubType::UInt16,
            SubType::Int32,
            SubType::UInt32,
            SubType::Int64,
            SubType::UInt64,
            SubType::Float32,
            SubType::Float64,
            SubType::String,
            SubType::Pointer,
            SubType::Color32,
            SubType::Vector,
            SubType::Vector2D,
            SubType::Vector4D,
            SubType::RotationVector,
            SubType::Quaternion,
            SubType::QAngle,
            SubType::Matrix3x4,
            SubType::Transform,
            SubType::StringToken,
        ];
        if raw as usize == TABLE.len() {
            return Some(SubType::EHandle);
        }
        TABLE.get(raw as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{Kind, SubType};

    #[rstest::rstest]
    fn test_unspecified_resolves_per_kind() {
        assert_eq!(SubType::Unspecified.resolve(Kind::Int), SubType::Int64);
        assert_eq!(SubType::Unspecified.resolve(Kind::Double), SubType::Float64);
        assert_eq!(SubType::Unspecified.resolve(Kind::Table), SubType::Table);
        assert_eq!(SubType::Int8.resolve(Kind::Int), SubType::Int8);
    }

    #[rstest::rstest]
    fn test_subtype_byte_roundtrip() {
        for raw in 0u8..=37 {
            let subtype = SubType::from_u8(raw).unwrap();
            assert_eq!(subtype as u8, raw);
        }
        assert!(SubType::from_u8(38).is_none());
    }

    #[rstest::rstest]
    fn test_names_match_wire_spelling() {
        assert_eq!(Kind::BinaryBlob.as_str(), "binary_blob");
        assert_eq!(SubType::RotationVector.as_str(), "rotation_vector");
        assert_eq!(SubType::EHandle.as_str(), "ehandle");
    }
}

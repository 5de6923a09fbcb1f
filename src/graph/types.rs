//! GLSL value types, storage classes and the [`Variable`] record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A GLSL-compatible scalar, vector, matrix or sampler type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GlslType {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl GlslType {
    /// The GLSL spelling of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Sampler2D => "sampler2D",
            Self::SamplerCube => "samplerCube",
        }
    }

    /// Parses a GLSL type keyword.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            "samplerCube" => Self::SamplerCube,
            _ => return None,
        })
    }

    /// The literal spelling of "one" for this type, used for default outputs.
    #[must_use]
    pub fn one(self) -> String {
        match self {
            Self::Bool => "true".to_string(),
            Self::Int => "1".to_string(),
            Self::Float => "1.0".to_string(),
            other => format!("{}(1.0)", other.as_str()),
        }
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a variable lives.
///
/// The declaration order of a generated stage follows the `Ord` of this enum:
/// attributes, uniforms, varyings, then locals inside `main`. Built-ins are
/// provided by the language and never declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageClass {
    Attribute,
    Uniform,
    Varying,
    Local,
    BuiltIn,
}

impl StorageClass {
    /// The qualifier keyword for global declarations.
    #[must_use]
    pub const fn qualifier(self) -> Option<&'static str> {
        match self {
            Self::Attribute => Some("attribute"),
            Self::Uniform => Some("uniform"),
            Self::Varying => Some("varying"),
            Self::Local | Self::BuiltIn => None,
        }
    }
}

/// A named, typed shader variable owned by a compilation arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: GlslType,
    pub storage: StorageClass,
    /// Element count for uniform arrays.
    pub array_len: Option<u32>,
}

impl Variable {
    /// The declaration statement for this variable, or `None` for built-ins.
    #[must_use]
    pub fn declaration(&self) -> Option<String> {
        if self.storage == StorageClass::BuiltIn {
            return None;
        }

        let array = self.array_len.map(|n| format!("[{n}]")).unwrap_or_default();
        Some(match self.storage.qualifier() {
            Some(qualifier) => format!("{qualifier} {} {}{array};", self.ty, self.name),
            None => format!("{} {}{array};", self.ty, self.name),
        })
    }
}

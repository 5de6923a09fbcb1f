//! Uniform Values
//!
//! Typed values uploaded through a program's cached locations, and the
//! per-context table of shared uniform descriptors. Feature families whose
//! uniforms depend only on a small parameter (morph weights per target count,
//! the bone palette per bone count, light parameters per light kind) build
//! their descriptor list once per context and hand out the same
//! [`Arc`] afterwards.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::graph::types::GlslType;
use crate::state::config::{LightKind, RenderStateConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    Vec4Array(Vec<[f32; 4]>),
    /// Texture unit index bound to a sampler.
    Sampler(i32),
}

impl UniformValue {
    #[must_use]
    pub fn glsl_type(&self) -> GlslType {
        match self {
            Self::Float(_) => GlslType::Float,
            Self::Int(_) => GlslType::Int,
            Self::Vec2(_) => GlslType::Vec2,
            Self::Vec3(_) => GlslType::Vec3,
            Self::Vec4(_) | Self::Vec4Array(_) => GlslType::Vec4,
            Self::Mat3(_) => GlslType::Mat3,
            Self::Mat4(_) => GlslType::Mat4,
            Self::Sampler(_) => GlslType::Sampler2D,
        }
    }
}

/// Name, type and default value of one uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDescriptor {
    pub name: String,
    pub ty: GlslType,
    pub default: UniformValue,
}

impl UniformDescriptor {
    fn new(name: impl Into<String>, default: UniformValue) -> Self {
        Self {
            name: name.into(),
            ty: default.glsl_type(),
            default,
        }
    }
}

/// Family name plus the parameter the family's descriptors depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformBlockKey {
    pub family: &'static str,
    pub variant: u64,
}

pub type UniformBlock = Arc<[UniformDescriptor]>;

#[derive(Debug, Default)]
pub struct SharedUniforms {
    blocks: FxHashMap<UniformBlockKey, UniformBlock>,
}

impl SharedUniforms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with(
        &mut self,
        key: UniformBlockKey,
        build: impl FnOnce() -> Vec<UniformDescriptor>,
    ) -> UniformBlock {
        self.blocks
            .entry(key)
            .or_insert_with(|| build().into())
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Default-valued uniform blocks for every feature a configuration enables.
    pub fn blocks_for(&mut self, config: &RenderStateConfig) -> Vec<UniformBlock> {
        let mut blocks = Vec::new();

        if let Some(morph) = config.active_morph() {
            blocks.push(self.get_or_insert_with(
                UniformBlockKey {
                    family: "morph",
                    variant: u64::from(morph.target_count),
                },
                || vec![UniformDescriptor::new("uTargetWeights", UniformValue::Vec4([0.0; 4]))],
            ));
        }

        if let Some(skin) = config.active_skinning() {
            blocks.push(self.get_or_insert_with(
                UniformBlockKey {
                    family: "skinning",
                    variant: u64::from(skin.bone_count),
                },
                || {
                    // Identity rows for every bone.
                    let mut rows = Vec::with_capacity(skin.palette_size() as usize);
                    for _ in 0..skin.bone_count {
                        rows.extend([[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]]);
                    }
                    vec![UniformDescriptor::new("uBones", UniformValue::Vec4Array(rows))]
                },
            ));
        }

        for (index, light) in config.active_lights().iter().enumerate() {
            blocks.push(self.get_or_insert_with(
                UniformBlockKey {
                    family: light_family(light.kind),
                    variant: index as u64,
                },
                || light_descriptors(index, light.kind),
            ));
        }

        blocks
    }
}

fn light_family(kind: LightKind) -> &'static str {
    match kind {
        LightKind::Directional => "light-directional",
        LightKind::Point => "light-point",
        LightKind::Spot => "light-spot",
        LightKind::Hemi => "light-hemi",
    }
}

fn light_descriptors(index: usize, kind: LightKind) -> Vec<UniformDescriptor> {
    let name = |param: &str| format!("uLight{index}_{param}");
    let down = UniformValue::Vec3([0.0, -1.0, 0.0]);
    let white = UniformValue::Vec3([1.0; 3]);
    let origin = UniformValue::Vec3([0.0; 3]);

    match kind {
        LightKind::Directional => vec![
            UniformDescriptor::new(name("direction"), down),
            UniformDescriptor::new(name("color"), white),
        ],
        LightKind::Point => vec![
            UniformDescriptor::new(name("position"), origin),
            UniformDescriptor::new(name("color"), white),
        ],
        LightKind::Spot => vec![
            UniformDescriptor::new(name("position"), origin),
            UniformDescriptor::new(name("direction"), down),
            UniformDescriptor::new(name("color"), white),
            UniformDescriptor::new(name("cosCutoff"), UniformValue::Float(0.9)),
        ],
        LightKind::Hemi => vec![
            UniformDescriptor::new(name("direction"), down),
            UniformDescriptor::new(name("skyColor"), white),
            UniformDescriptor::new(name("groundColor"), UniformValue::Vec3([0.2; 3])),
        ],
    }
}

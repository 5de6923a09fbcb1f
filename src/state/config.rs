//! Render State Configuration
//!
//! The read-only description of everything that changes generated shader
//! text. Two equal configurations always compile to byte-identical sources;
//! see [`Fingerprint`](super::fingerprint::Fingerprint) for the cache key.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShaderGraphError};

/// Morph weights live in one `vec4`.
pub const MAX_MORPH_TARGETS: u32 = 4;

bitflags! {
    /// Vertex attribute streams present on the geometry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct VertexStreams: u32 {
        const POSITION  = 1 << 0;
        const NORMAL    = 1 << 1;
        const TANGENT   = 1 << 2;
        const COLOR     = 1 << 3;
        const TEXCOORD0 = 1 << 4;
        const TEXCOORD1 = 1 << 5;
        const TEXCOORD2 = 1 << 6;
        const TEXCOORD3 = 1 << 7;
    }
}

impl Default for VertexStreams {
    fn default() -> Self {
        Self::POSITION | Self::NORMAL
    }
}

impl VertexStreams {
    /// The texcoord stream flag for a set index, if one exists.
    #[must_use]
    pub fn texcoord(set: u32) -> Option<Self> {
        match set {
            0 => Some(Self::TEXCOORD0),
            1 => Some(Self::TEXCOORD1),
            2 => Some(Self::TEXCOORD2),
            3 => Some(Self::TEXCOORD3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkinningConfig {
    pub bone_count: u32,
}

impl SkinningConfig {
    /// Length of the `vec4` palette array: three rows per bone.
    #[must_use]
    pub const fn palette_size(&self) -> u32 {
        self.bone_count * 3
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MorphConfig {
    pub target_count: u32,
    /// Streams that carry targets (`Vertex`, `Normal`, `Tangent`). Order and
    /// duplicates are irrelevant.
    pub target_names: Vec<String>,
}

impl MorphConfig {
    #[must_use]
    pub fn has_target(&self, stream: &str) -> bool {
        self.target_names.iter().any(|name| name == stream)
    }

    /// Sorted, deduplicated target names.
    #[must_use]
    pub fn canonical_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.target_names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
    Hemi,
}

impl LightKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Directional => "directional",
            Self::Point => "point",
            Self::Spot => "spot",
            Self::Hemi => "hemi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightConfig {
    pub kind: LightKind,
    pub casts_shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowTechnique {
    Hard,
    Pcf,
    Esm,
    Vsm,
}

impl ShadowTechnique {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Pcf => "pcf",
            Self::Esm => "esm",
            Self::Vsm => "vsm",
        }
    }
}

/// A sampled texture: the sampler unit and the texcoord set it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureUnit {
    pub unit: u32,
    pub texcoord: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStateConfig {
    pub skinning: Option<SkinningConfig>,
    pub morph: Option<MorphConfig>,
    pub billboard: bool,
    pub point_size: bool,
    pub vertex_streams: VertexStreams,
    pub lights: Vec<LightConfig>,
    pub shadow: Option<ShadowTechnique>,
    pub texture_units: Vec<TextureUnit>,
}

impl RenderStateConfig {
    /// Rejects configurations no graph can be built for.
    pub fn validate(&self) -> Result<()> {
        if let Some(morph) = &self.morph
            && morph.target_count > MAX_MORPH_TARGETS
        {
            return Err(ShaderGraphError::TooManyMorphTargets {
                count: morph.target_count,
                max: MAX_MORPH_TARGETS,
            });
        }
        Ok(())
    }

    /// Geometry without positions draws nothing; it maps to the sentinel program.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !self.vertex_streams.contains(VertexStreams::POSITION)
    }

    /// Skinning settings, when the palette has at least one bone.
    #[must_use]
    pub fn active_skinning(&self) -> Option<SkinningConfig> {
        self.skinning.filter(|skin| skin.bone_count > 0)
    }

    /// Morph settings, when at least one target is configured.
    #[must_use]
    pub fn active_morph(&self) -> Option<&MorphConfig> {
        self.morph.as_ref().filter(|morph| morph.target_count > 0)
    }

    /// Lights that take part in shading: none without a normal stream.
    #[must_use]
    pub fn active_lights(&self) -> &[LightConfig] {
        if self.vertex_streams.contains(VertexStreams::NORMAL) {
            &self.lights
        } else {
            &[]
        }
    }

    /// Texture units whose texcoord stream is present.
    pub fn active_textures(&self) -> impl Iterator<Item = &TextureUnit> {
        self.texture_units.iter().filter(|texture| {
            VertexStreams::texcoord(texture.texcoord)
                .is_some_and(|stream| self.vertex_streams.contains(stream))
        })
    }

    /// The streams the generated program actually reads.
    #[must_use]
    pub fn effective_streams(&self) -> VertexStreams {
        let mut streams = self.vertex_streams & (VertexStreams::POSITION | VertexStreams::COLOR);
        if !self.active_lights().is_empty() {
            streams |= VertexStreams::NORMAL;
        }
        for stream in self.active_textures().filter_map(|t| VertexStreams::texcoord(t.texcoord)) {
            streams |= stream;
        }
        streams
    }

    /// Whether any active light both casts a shadow and has a technique to receive it with.
    #[must_use]
    pub fn receives_shadows(&self) -> bool {
        self.shadow.is_some() && self.active_lights().iter().any(|light| light.casts_shadow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_morph_names_canonical() {
        let morph = MorphConfig {
            target_count: 2,
            target_names: vec!["Normal".into(), "Vertex".into(), "Normal".into()],
        };
        assert_eq!(morph.canonical_names(), vec!["Normal", "Vertex"]);
        assert!(morph.has_target("Vertex"));
        assert!(!morph.has_target("Tangent"));
    }

    #[test]
    fn test_validate_morph_limit() {
        let config = RenderStateConfig {
            morph: Some(MorphConfig {
                target_count: 5,
                target_names: vec!["Vertex".into()],
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ShaderGraphError::TooManyMorphTargets { count: 5, max: 4 })
        ));
    }

    #[test]
    fn test_default_streams_and_degenerate() {
        let config = RenderStateConfig::default();
        assert!(!config.is_degenerate());

        let empty = RenderStateConfig {
            vertex_streams: VertexStreams::empty(),
            ..Default::default()
        };
        assert!(empty.is_degenerate());
    }

    #[test]
    fn test_missing_streams_disable_features() {
        let config = RenderStateConfig {
            vertex_streams: VertexStreams::POSITION | VertexStreams::TANGENT | VertexStreams::TEXCOORD1,
            lights: vec![LightConfig { kind: LightKind::Point, casts_shadow: true }],
            shadow: Some(ShadowTechnique::Pcf),
            texture_units: vec![
                TextureUnit { unit: 0, texcoord: 0 },
                TextureUnit { unit: 1, texcoord: 1 },
            ],
            ..Default::default()
        };

        assert!(config.active_lights().is_empty());
        assert!(!config.receives_shadows());
        let units: Vec<u32> = config.active_textures().map(|t| t.unit).collect();
        assert_eq!(units, vec![1]);
        assert_eq!(
            config.effective_streams(),
            VertexStreams::POSITION | VertexStreams::TEXCOORD1
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RenderStateConfig = serde_json::from_str(r#"{ "billboard": true }"#).unwrap();
        assert!(config.billboard);
        assert_eq!(config.vertex_streams, VertexStreams::default());
    }
}

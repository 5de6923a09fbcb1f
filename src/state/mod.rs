pub mod config;
pub mod fingerprint;

pub use config::{
    LightConfig, LightKind, MAX_MORPH_TARGETS, MorphConfig, RenderStateConfig, ShadowTechnique,
    SkinningConfig, TextureUnit, VertexStreams,
};
pub use fingerprint::{Fingerprint, variant_name};

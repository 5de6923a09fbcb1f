//! State Fingerprint
//!
//! A deterministic 128-bit key over every source-affecting field of a
//! [`RenderStateConfig`]. The encoding is canonical: morph target names are
//! sorted and deduplicated, and every variable-length list is length-prefixed,
//! so two configurations hash equal exactly when they would generate the same
//! program.

use std::fmt;

use xxhash_rust::xxh3::xxh3_128;

use super::config::{LightKind, RenderStateConfig, ShadowTechnique};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u128);

impl Fingerprint {
    #[must_use]
    pub fn of(config: &RenderStateConfig) -> Self {
        Self(xxh3_128(&canonical_bytes(config)))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

fn canonical_bytes(config: &RenderStateConfig) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);

    match config.active_skinning() {
        Some(skin) => {
            buf.push(1);
            put_u32(&mut buf, skin.bone_count);
        }
        None => buf.push(0),
    }

    match config.active_morph() {
        Some(morph) => {
            buf.push(1);
            put_u32(&mut buf, morph.target_count);
            let names = morph.canonical_names();
            put_u32(&mut buf, names.len() as u32);
            for name in names {
                put_u32(&mut buf, name.len() as u32);
                buf.extend_from_slice(name.as_bytes());
            }
        }
        None => buf.push(0),
    }

    buf.push(u8::from(config.billboard));
    buf.push(u8::from(config.point_size));
    put_u32(&mut buf, config.effective_streams().bits());

    let lights = config.active_lights();
    put_u32(&mut buf, lights.len() as u32);
    for light in lights {
        buf.push(light_tag(light.kind));
        buf.push(u8::from(light.casts_shadow));
    }

    let shadow = config.shadow.filter(|_| config.receives_shadows());
    buf.push(match shadow {
        None => 0,
        Some(ShadowTechnique::Hard) => 1,
        Some(ShadowTechnique::Pcf) => 2,
        Some(ShadowTechnique::Esm) => 3,
        Some(ShadowTechnique::Vsm) => 4,
    });

    let textures: Vec<_> = config.active_textures().collect();
    put_u32(&mut buf, textures.len() as u32);
    for unit in textures {
        put_u32(&mut buf, unit.unit);
        put_u32(&mut buf, unit.texcoord);
    }

    buf
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn light_tag(kind: LightKind) -> u8 {
    match kind {
        LightKind::Directional => 0,
        LightKind::Point => 1,
        LightKind::Spot => 2,
        LightKind::Hemi => 3,
    }
}

/// Stable human-readable variant name, used as `SHADER_NAME` in the sources.
///
/// e.g. `Morph2_Skin32_L2_Shadow-pcf_T1_Billboard`; the empty configuration is `Base`.
#[must_use]
pub fn variant_name(config: &RenderStateConfig) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(morph) = config.active_morph() {
        parts.push(format!("Morph{}", morph.target_count));
    }
    if let Some(skin) = config.active_skinning() {
        parts.push(format!("Skin{}", skin.bone_count));
    }
    let lights = config.active_lights().len();
    if lights > 0 {
        parts.push(format!("L{lights}"));
    }
    if config.receives_shadows()
        && let Some(shadow) = config.shadow
    {
        parts.push(format!("Shadow-{}", shadow.as_str()));
    }
    let textures = config.active_textures().count();
    if textures > 0 {
        parts.push(format!("T{textures}"));
    }
    if config.billboard {
        parts.push("Billboard".to_string());
    }
    if config.point_size {
        parts.push("PointSize".to_string());
    }

    if parts.is_empty() {
        return "Base".to_string();
    }
    parts.join("_")
}

//! Vertex Stage Builder
//!
//! Wires the vertex-stage graph for a [`RenderStateConfig`]:
//!
//! ```text
//! attribute ─► morph ─► skin ─► local ─► view / model ─► varyings, gl_Position
//! ```
//!
//! Each transform step passes its input through unchanged when the feature is
//! off, so toggles only change the shape of the graph. Every helper here is
//! vertex-only and fails with [`ShaderGraphError::VertexOnlyHelper`] on a
//! fragment graph.
//!
//! [`RenderStateConfig`]: crate::state::RenderStateConfig

use super::builder::GraphBuilder;
use super::context::{GL_POINT_SIZE, GL_POSITION};
use super::node::NodeKind;
use super::types::GlslType;
use super::variables::VariableKey;
use crate::errors::{Result, ShaderGraphError};

/// Type the vertex builder produces for a varying it knows how to write.
#[must_use]
pub fn known_varying_type(name: &str) -> Option<GlslType> {
    match name {
        "vViewVertex" | "vModelVertex" | "vViewTangent" | "vModelTangent" | "vVertexColor" => {
            Some(GlslType::Vec4)
        }
        "vViewNormal" | "vModelNormal" => Some(GlslType::Vec3),
        _ if texcoord_set(name).is_some() => Some(GlslType::Vec2),
        _ => None,
    }
}

fn texcoord_set(name: &str) -> Option<u32> {
    name.strip_prefix("vTexCoord")?.parse().ok()
}

impl GraphBuilder<'_> {
    /// Wires every vertex root: point size, position, then the varyings the
    /// fragment stage consumes.
    pub fn declare_vertex_main(&mut self, varyings: &[(String, GlslType)]) -> Result<()> {
        self.graph.require_vertex("declare_vertex_main")?;

        // gl_Position before the varyings keeps it first in the emitted body.
        self.declare_point_size()?;
        self.declare_vertex_position()?;
        self.declare_vertex_varyings(varyings)
    }

    pub fn declare_point_size(&mut self) -> Result<()> {
        self.graph.require_vertex("declare_point_size")?;
        let Some(point_size) = self.graph.builtin(GL_POINT_SIZE) else {
            return Ok(());
        };

        if self.config.point_size {
            let size = self.uniform(GlslType::Float, "uPointSize")?;
            self.assign(size, point_size);
        } else {
            self.graph
                .node(NodeKind::Assign)
                .literal("in", GlslType::Float.one())
                .output("out", point_size)
                .add();
        }
        Ok(())
    }

    pub fn declare_vertex_position(&mut self) -> Result<()> {
        self.graph.require_vertex("declare_vertex_position")?;
        let Some(position) = self.graph.builtin(GL_POSITION) else {
            return Ok(());
        };

        if self.config.billboard {
            let vertex = self.attribute(GlslType::Vec3, "Vertex")?;
            let model_view = self.uniform(GlslType::Mat4, "uModelViewMatrix")?;
            let projection = self.uniform(GlslType::Mat4, "uProjectionMatrix")?;
            self.graph
                .node(NodeKind::Billboard)
                .input("Vertex", vertex)
                .input("ModelViewMatrix", model_view)
                .input("ProjectionMatrix", projection)
                .output("result", position)
                .add();
        } else {
            let projection = self.uniform(GlslType::Mat4, "uProjectionMatrix")?;
            let view_vertex = self.view_vertex()?;
            self.graph
                .node(NodeKind::MatrixMultPosition { inverse: false })
                .input("matrix", projection)
                .input("vec", view_vertex)
                .output("vec", position)
                .add();
        }
        Ok(())
    }

    /// Creates, wires and roots each requested varying.
    pub fn declare_vertex_varyings(&mut self, varyings: &[(String, GlslType)]) -> Result<()> {
        self.graph.require_vertex("declare_vertex_varyings")?;

        for (name, ty) in varyings {
            if let Some(expected) = known_varying_type(name)
                && expected != *ty
            {
                return Err(ShaderGraphError::VaryingMismatch {
                    name: name.clone(),
                    vertex: expected,
                    fragment: *ty,
                });
            }

            let varying = self.varying(*ty, name)?;
            match name.as_str() {
                "vModelVertex" => {
                    let source = self.model_vertex()?;
                    self.assign(source, varying);
                }
                "vModelNormal" => {
                    let source = self.model_normal()?;
                    self.assign(source, varying);
                }
                "vModelTangent" => {
                    let source = self.model_tangent()?;
                    self.assign(source, varying);
                }
                "vViewVertex" => {
                    let source = self.view_vertex()?;
                    self.assign(source, varying);
                }
                "vViewNormal" => {
                    let source = self.view_normal()?;
                    self.assign(source, varying);
                }
                "vViewTangent" => {
                    let source = self.view_tangent()?;
                    self.assign(source, varying);
                }
                "vVertexColor" => {
                    let enabled = self.uniform(GlslType::Float, "uArrayColorEnabled")?;
                    let color = self.attribute(GlslType::Vec4, "Color")?;
                    self.graph
                        .node(NodeKind::InlineCode {
                            code: "%vcolor = %venabled == 1.0 ? %acolor : vec4(1.0, 1.0, 1.0, 1.0);"
                                .into(),
                        })
                        .input("venabled", enabled)
                        .input("acolor", color)
                        .output("vcolor", varying)
                        .add();
                }
                _ => {
                    if let Some(set) = texcoord_set(name) {
                        let texcoord = self.attribute(GlslType::Vec2, &format!("TexCoord{set}"))?;
                        self.assign(texcoord, varying);
                    }
                }
            }
            self.graph.add_root(varying);
        }
        Ok(())
    }

    // ─── Space transforms ────────────────────────────────────────────────────

    pub fn view_vertex(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("view_vertex")?;
        self.memoized("viewVertex", |b| {
            let local = b.local_vertex()?;
            b.transform_position("uModelViewMatrix", local, "viewVertex")
        })
    }

    pub fn model_vertex(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("model_vertex")?;
        self.memoized("modelVertex", |b| {
            let local = b.local_vertex()?;
            b.transform_position("uModelMatrix", local, "modelVertex")
        })
    }

    pub fn view_normal(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("view_normal")?;
        self.memoized("viewNormal", |b| {
            let local = b.local_normal()?;
            let direction = b.transform_direction("uModelViewNormalMatrix", local)?;
            Ok(b.normalize(direction, Some("viewNormal")))
        })
    }

    pub fn model_normal(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("model_normal")?;
        self.memoized("modelNormal", |b| {
            let local = b.local_normal()?;
            let direction = b.transform_direction("uModelNormalMatrix", local)?;
            Ok(b.normalize(direction, Some("modelNormal")))
        })
    }

    pub fn view_tangent(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("view_tangent")?;
        self.memoized("viewTangent", |b| {
            let local = b.local_tangent()?;
            let direction = b.transform_direction("uModelViewNormalMatrix", local)?;
            let handedness = b.attribute(GlslType::Vec4, "Tangent")?;
            Ok(b.normalize_and_set_alpha(direction, handedness, "viewTangent"))
        })
    }

    pub fn model_tangent(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("model_tangent")?;
        self.memoized("modelTangent", |b| {
            let local = b.local_tangent()?;
            let direction = b.transform_direction("uModelNormalMatrix", local)?;
            let handedness = b.attribute(GlslType::Vec4, "Tangent")?;
            Ok(b.normalize_and_set_alpha(direction, handedness, "modelTangent"))
        })
    }

    fn transform_position(&mut self, matrix: &str, vec: VariableKey, name: &str) -> Result<VariableKey> {
        let matrix = self.uniform(GlslType::Mat4, matrix)?;
        let out = self.local(GlslType::Vec4, Some(name));
        self.graph
            .node(NodeKind::MatrixMultPosition { inverse: false })
            .input("matrix", matrix)
            .input("vec", vec)
            .output("vec", out)
            .add();
        Ok(self.graph.resolve(out))
    }

    fn transform_direction(&mut self, matrix: &str, vec: VariableKey) -> Result<VariableKey> {
        let matrix = self.uniform(GlslType::Mat4, matrix)?;
        let out = self.local(GlslType::Vec3, None);
        self.graph
            .node(NodeKind::MatrixMultDirection { inverse: false })
            .input("matrix", matrix)
            .input("vec", vec)
            .output("vec", out)
            .add();
        Ok(self.graph.resolve(out))
    }

    // ─── Local space: morph then skin ────────────────────────────────────────

    pub fn local_vertex(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("local_vertex")?;
        self.skin_vertex()
    }

    /// Skinned or morphed normals are re-normalised; the raw attribute is used as is.
    pub fn local_normal(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("local_normal")?;
        self.memoized("localNormal", |b| {
            let normal = b.skin_normal()?;
            let attribute = b.attribute(GlslType::Vec3, "Normal")?;
            if normal == attribute {
                return Ok(normal);
            }
            Ok(b.normalize(normal, Some("localNormal")))
        })
    }

    /// Transformed tangents are normalised and keep the attribute's handedness in `w`.
    pub fn local_tangent(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("local_tangent")?;
        self.memoized("localTangent", |b| {
            let tangent = b.skin_tangent()?;
            let attribute = b.attribute(GlslType::Vec4, "Tangent")?;
            if tangent == attribute {
                return Ok(tangent);
            }
            Ok(b.normalize_and_set_alpha(tangent, attribute, "localTangent"))
        })
    }

    fn normalize_and_set_alpha(&mut self, tangent: VariableKey, alpha: VariableKey, name: &str) -> VariableKey {
        let normalized = self.normalize(tangent, None);
        let out = self.local(GlslType::Vec4, Some(name));
        self.graph
            .node(NodeKind::SetAlpha)
            .input("color", normalized)
            .input("alpha", alpha)
            .output("result", out)
            .add();
        self.graph.resolve(out)
    }

    pub fn skin_vertex(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("skin_vertex")?;
        self.memoized("skinVertex", |b| {
            let input = b.morph_vertex()?;
            if b.config.active_skinning().is_none() {
                return Ok(input);
            }
            let bone_matrix = b.bone_matrix()?;
            let out = b.local(GlslType::Vec3, Some("skinVertex"));
            b.graph
                .node(NodeKind::MatrixMultPosition { inverse: true })
                .input("matrix", bone_matrix)
                .input("vec", input)
                .output("vec", out)
                .add();
            Ok(b.graph.resolve(out))
        })
    }

    pub fn skin_normal(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("skin_normal")?;
        self.memoized("skinNormal", |b| {
            let input = b.morph_normal()?;
            b.skin_direction(input, "skinNormal")
        })
    }

    pub fn skin_tangent(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("skin_tangent")?;
        self.memoized("skinTangent", |b| {
            let input = b.morph_tangent()?;
            b.skin_direction(input, "skinTangent")
        })
    }

    fn skin_direction(&mut self, input: VariableKey, name: &str) -> Result<VariableKey> {
        if self.config.active_skinning().is_none() {
            return Ok(input);
        }
        let bone_matrix = self.bone_matrix()?;
        let out = self.local(GlslType::Vec3, Some(name));
        self.graph
            .node(NodeKind::MatrixMultDirection { inverse: true })
            .input("matrix", bone_matrix)
            .input("vec", input)
            .output("vec", out)
            .add();
        Ok(self.graph.resolve(out))
    }

    /// The weighted palette matrix, shared by vertex, normal and tangent.
    pub fn bone_matrix(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("bone_matrix")?;
        self.memoized("boneMatrix", |b| {
            let skin = b.config.active_skinning();
            let bone_count = skin.map_or(0, |skin| skin.bone_count);
            let palette_size = skin.map_or(0, |skin| skin.palette_size());

            let weights = b.attribute(GlslType::Vec4, "Weights")?;
            let bones = b.attribute(GlslType::Vec4, "Bones")?;
            let palette = b
                .graph
                .vars_mut()
                .get_or_create_uniform_array(GlslType::Vec4, "uBones", palette_size)?;
            let out = b.local(GlslType::Mat4, Some("boneMatrix"));

            b.graph
                .node(NodeKind::Skinning { bone_count })
                .input("weights", weights)
                .input("bonesIndex", bones)
                .input("matrixPalette", palette)
                .output("result", out)
                .add();
            Ok(out)
        })
    }

    pub fn morph_vertex(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("morph_vertex")?;
        self.memoized("morphVertex", |b| {
            b.morph_stream("Vertex", GlslType::Vec3, "morphVertex")
        })
    }

    pub fn morph_normal(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("morph_normal")?;
        self.memoized("morphNormal", |b| {
            b.morph_stream("Normal", GlslType::Vec3, "morphNormal")
        })
    }

    pub fn morph_tangent(&mut self) -> Result<VariableKey> {
        self.graph.require_vertex("morph_tangent")?;
        self.memoized("morphTangent", |b| {
            b.morph_stream("Tangent", GlslType::Vec4, "morphTangent")
        })
    }

    fn morph_stream(&mut self, stream: &str, ty: GlslType, name: &str) -> Result<VariableKey> {
        let input = self.attribute(ty, stream)?;
        let Some(morph) = self.config.active_morph().filter(|m| m.has_target(stream)) else {
            return Ok(input);
        };
        let target_count = morph.target_count;

        let weights = self.target_weights(stream)?;
        let out = self.local(GlslType::Vec3, Some(name));

        let mut targets = Vec::with_capacity(target_count as usize);
        for i in 0..target_count {
            targets.push(self.attribute(ty, &format!("{stream}_{i}"))?);
        }

        let mut node = self
            .graph
            .node(NodeKind::Morphing { target_count })
            .input("vertex", input)
            .input("weights", weights);
        for (i, target) in targets.into_iter().enumerate() {
            node = node.input(format!("target{i}"), target);
        }
        node.output("result", out).add();

        Ok(self.graph.resolve(out))
    }

    /// `uTargetWeights`, or for directions a copy whose weights sum to at most
    /// one so negative weights can't flip the base.
    pub fn target_weights(&mut self, stream: &str) -> Result<VariableKey> {
        self.graph.require_vertex("target_weights")?;
        let weights = self.uniform(GlslType::Vec4, "uTargetWeights")?;
        if stream != "Normal" && stream != "Tangent" {
            return Ok(weights);
        }

        self.memoized("nTargetWeights", |b| {
            let normalized = b.local(GlslType::Vec4, Some("nTargetWeights"));
            b.graph
                .node(NodeKind::InlineCode {
                    code: "%output = %wts / max(1.0, abs(%wts.x) + abs(%wts.y) + abs(%wts.z) + abs(%wts.w));"
                        .into(),
                })
                .input("wts", weights)
                .output("output", normalized)
                .add();
            Ok(normalized)
        })
    }
}

//! Fragment Stage Builder
//!
//! Material colour, modulated by the vertex colour stream and each texture
//! unit, then lit by the configured lights with optional shadow receiving.
//! Texture units without their texcoord stream and lights without a normal
//! stream are left out.
//! The fragment graph is built before the vertex graph: the varyings it
//! reads are what the vertex stage has to produce.

use super::builder::GraphBuilder;
use super::context::GL_FRAG_COLOR;
use super::node::{HelperRef, NodeKind};
use super::types::GlslType;
use super::variables::VariableKey;
use crate::errors::Result;
use crate::state::config::{LightConfig, LightKind, VertexStreams};

impl GraphBuilder<'_> {
    /// Wires `gl_FragColor`.
    pub fn declare_fragment_main(&mut self) -> Result<()> {
        let mut color = self.uniform(GlslType::Vec4, "uMaterialColor")?;

        if self.config.vertex_streams.contains(VertexStreams::COLOR) {
            let vertex_color = self.varying(GlslType::Vec4, "vVertexColor")?;
            color = self.multiply(color, vertex_color, GlslType::Vec4, "vertexColor");
        }

        let config = self.config;
        for texture in config.active_textures() {
            let sample = self.texture_sample(texture.unit, texture.texcoord)?;
            color = self.multiply(color, sample, GlslType::Vec4, "texturedColor");
        }

        if !self.config.active_lights().is_empty() {
            color = self.lit_color(color)?;
        }

        let Some(frag_color) = self.graph.builtin(GL_FRAG_COLOR) else {
            return Ok(());
        };
        self.assign(color, frag_color);
        Ok(())
    }

    /// `texture2D(Texture<unit>, vTexCoord<set>)`.
    pub fn texture_sample(&mut self, unit: u32, texcoord: u32) -> Result<VariableKey> {
        let sampler = self.uniform(GlslType::Sampler2D, &format!("Texture{unit}"))?;
        let uv = self.varying(GlslType::Vec2, &format!("vTexCoord{texcoord}"))?;
        let out = self.local(GlslType::Vec4, Some(&format!("textureColor{unit}")));
        self.graph
            .node(NodeKind::TextureSample)
            .input("sampler", sampler)
            .input("uv", uv)
            .output("color", out)
            .add();
        Ok(self.graph.resolve(out))
    }

    fn lit_color(&mut self, color: VariableKey) -> Result<VariableKey> {
        let view_normal = self.varying(GlslType::Vec3, "vViewNormal")?;
        let normal = self.normalize(view_normal, Some("normal"));
        let view_vertex = self.varying(GlslType::Vec4, "vViewVertex")?;

        let config = self.config;
        let lights = config.active_lights();
        let mut contributions = Vec::with_capacity(lights.len());
        for (index, light) in lights.iter().enumerate() {
            let mut diffuse = self.light_contribution(index, light, normal, view_vertex)?;
            if light.casts_shadow
                && let Some(shadow) = self.shadow_factor(index)?
            {
                diffuse = self.multiply(diffuse, shadow, GlslType::Vec3, "shadowedDiffuse");
            }
            contributions.push(diffuse);
        }

        let sum = self.local(GlslType::Vec3, Some("diffuse"));
        let code = (0..contributions.len())
            .map(|i| format!("%light{i}"))
            .collect::<Vec<_>>()
            .join(" + ");
        let mut node = self.graph.node(NodeKind::InlineCode {
            code: format!("%out = {code};"),
        });
        for (i, contribution) in contributions.into_iter().enumerate() {
            node = node.input(format!("light{i}"), contribution);
        }
        node.output("out", sum).add();
        let sum = self.graph.resolve(sum);

        let lit = self.local(GlslType::Vec4, Some("litColor"));
        self.graph
            .node(NodeKind::InlineCode {
                code: "%out = vec4(%color.rgb * %diffuse, %color.a);".into(),
            })
            .input("color", color)
            .input("diffuse", sum)
            .output("out", lit)
            .add();
        Ok(self.graph.resolve(lit))
    }

    /// Lambert diffuse of light `index`, parameterised by `uLight<index>_*` uniforms.
    fn light_contribution(
        &mut self,
        index: usize,
        light: &LightConfig,
        normal: VariableKey,
        view_vertex: VariableKey,
    ) -> Result<VariableKey> {
        let (function, params): (&'static str, &[(&str, GlslType)]) = match light.kind {
            LightKind::Directional => (
                "computeDirectionalLight",
                &[("direction", GlslType::Vec3), ("color", GlslType::Vec3)],
            ),
            LightKind::Point => (
                "computePointLight",
                &[("position", GlslType::Vec3), ("color", GlslType::Vec3)],
            ),
            LightKind::Spot => (
                "computeSpotLight",
                &[
                    ("position", GlslType::Vec3),
                    ("direction", GlslType::Vec3),
                    ("color", GlslType::Vec3),
                    ("cosCutoff", GlslType::Float),
                ],
            ),
            LightKind::Hemi => (
                "computeHemiLight",
                &[
                    ("direction", GlslType::Vec3),
                    ("skyColor", GlslType::Vec3),
                    ("groundColor", GlslType::Vec3),
                ],
            ),
        };

        let mut uniforms = Vec::with_capacity(params.len());
        for &(param, ty) in params {
            uniforms.push((param, self.uniform(ty, &format!("uLight{index}_{param}"))?));
        }

        let out = self.local(GlslType::Vec3, Some(&format!("lightDiffuse{index}")));
        let mut node = self
            .graph
            .node(NodeKind::Call {
                function: function.into(),
                snippet: Some(HelperRef::new("lighting").with_param("kind", light.kind.as_str())),
            })
            .input("normal", normal)
            .input("viewVertex", view_vertex);
        for (param, uniform) in uniforms {
            node = node.input(param.to_string(), uniform);
        }
        node.output("result", out).add();
        Ok(self.graph.resolve(out))
    }

    /// Shadow visibility of light `index`, `None` without a shadow technique.
    fn shadow_factor(&mut self, index: usize) -> Result<Option<VariableKey>> {
        let Some(technique) = self.config.shadow else {
            return Ok(None);
        };

        let model_vertex = self.varying(GlslType::Vec4, "vModelVertex")?;
        let matrix = self.uniform(GlslType::Mat4, &format!("uShadow{index}_matrix"))?;
        let depth_map = self.uniform(GlslType::Sampler2D, &format!("uShadow{index}_depthMap"))?;
        let texel_size = self.uniform(GlslType::Vec2, &format!("uShadow{index}_texelSize"))?;
        let bias = self.uniform(GlslType::Float, &format!("uShadow{index}_bias"))?;

        let shadow_vertex = self.local(GlslType::Vec4, Some(&format!("shadowVertex{index}")));
        self.graph
            .node(NodeKind::MatrixMultPosition { inverse: false })
            .input("matrix", matrix)
            .input("vec", model_vertex)
            .output("vec", shadow_vertex)
            .add();

        let out = self.local(GlslType::Float, Some(&format!("shadow{index}")));
        self.graph
            .node(NodeKind::Call {
                function: "computeShadow".into(),
                snippet: Some(HelperRef::new("shadow").with_param("technique", technique.as_str())),
            })
            .input("depthMap", depth_map)
            .input("shadowVertex", shadow_vertex)
            .input("texelSize", texel_size)
            .input("bias", bias)
            .output("result", out)
            .add();
        Ok(Some(self.graph.resolve(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::context::Stage;
    use crate::state::config::{RenderStateConfig, ShadowTechnique, TextureUnit};

    fn varying_names(builder: &GraphBuilder<'_>) -> Vec<String> {
        builder.graph().varyings().into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_unlit_fragment_reads_no_varyings() {
        let config = RenderStateConfig::default();
        let mut builder = GraphBuilder::new(Stage::Fragment, "test", &config);
        builder.declare_fragment_main().unwrap();
        assert!(varying_names(&builder).is_empty());
    }

    #[test]
    fn test_textures_and_color_request_varyings() {
        let config = RenderStateConfig {
            vertex_streams: VertexStreams::POSITION | VertexStreams::COLOR | VertexStreams::TEXCOORD0,
            texture_units: vec![TextureUnit { unit: 0, texcoord: 0 }],
            ..Default::default()
        };
        let mut builder = GraphBuilder::new(Stage::Fragment, "test", &config);
        builder.declare_fragment_main().unwrap();
        assert_eq!(varying_names(&builder), vec!["vVertexColor", "vTexCoord0"]);
    }

    #[test]
    fn test_shadowed_light_requests_model_vertex() {
        let config = RenderStateConfig {
            lights: vec![LightConfig {
                kind: LightKind::Spot,
                casts_shadow: true,
            }],
            shadow: Some(ShadowTechnique::Esm),
            ..Default::default()
        };
        let mut builder = GraphBuilder::new(Stage::Fragment, "test", &config);
        builder.declare_fragment_main().unwrap();

        let names = varying_names(&builder);
        assert!(names.contains(&"vModelVertex".to_string()));
        assert!(builder.graph().vars().get_variable("uLight0_cosCutoff").is_some());
        assert!(builder.graph().vars().get_variable("uShadow0_depthMap").is_some());
    }

    #[test]
    fn test_missing_streams_skip_lighting_and_textures() {
        let config = RenderStateConfig {
            vertex_streams: VertexStreams::POSITION,
            lights: vec![LightConfig {
                kind: LightKind::Directional,
                casts_shadow: false,
            }],
            texture_units: vec![TextureUnit { unit: 0, texcoord: 1 }],
            ..Default::default()
        };
        let mut builder = GraphBuilder::new(Stage::Fragment, "test", &config);
        builder.declare_fragment_main().unwrap();

        let vars = builder.graph().vars();
        assert!(varying_names(&builder).is_empty());
        assert!(vars.get_variable("uLight0_direction").is_none());
        assert!(vars.get_variable("Texture0").is_none());
    }
}

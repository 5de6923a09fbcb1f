//! Shader Library
//!
//! Source registry for the named GLSL snippets node lowerings pull in
//! (skinning, morphing, billboard, lighting, shadow) and for the stage
//! envelope template. Snippets are embedded at build time and may be
//! overridden or extended at runtime with [`ShaderLibrary::register_snippet`].
//! Nothing is read from disk, so output does not depend on the host's
//! working directory.
//!
//! Snippets are minijinja templates using the engine's custom syntax:
//!
//! | Syntax        | Meaning              |
//! |---------------|----------------------|
//! | `{{ x }}`     | parameter            |
//! | `{$ ... $}`   | inline block         |
//! | `$$ ...`      | line statement       |

use std::borrow::Cow;
use std::collections::BTreeMap;

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use rust_embed::RustEmbed;
use serde::Serialize;

use crate::errors::{Result, ShaderGraphError};
use crate::graph::node::HelperRef;

#[derive(RustEmbed)]
#[folder = "src/shaders"]
struct ShaderChunks;

/// Name of the template wrapping every generated stage.
pub const PROGRAM_TEMPLATE: &str = "program";

pub struct ShaderLibrary {
    env: Environment<'static>,
}

impl std::fmt::Debug for ShaderLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderLibrary").finish_non_exhaustive()
    }
}

impl ShaderLibrary {
    /// Creates a library backed by the embedded snippets.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();

        let syntax = SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()?;

        env.set_syntax(syntax);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_loader(chunk_loader);

        Ok(Self { env })
    }

    /// Registers (or replaces) a snippet under `name`.
    pub fn register_snippet(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        source: impl Into<Cow<'static, str>>,
    ) -> Result<()> {
        self.env.add_template_owned(name, source)?;
        Ok(())
    }

    /// Whether a snippet can be resolved, embedded or registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Renders a helper snippet with its parameters.
    pub fn render_helper(&self, helper: &HelperRef) -> Result<String> {
        let params: BTreeMap<&str, &str> = helper
            .params
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_str()))
            .collect();
        self.render(&helper.snippet, &params)
    }

    /// Renders any snippet with a serializable context.
    pub fn render<S: Serialize>(&self, name: &str, ctx: &S) -> Result<String> {
        let template = self.env.get_template(name).map_err(|err| {
            if err.kind() == ErrorKind::TemplateNotFound {
                ShaderGraphError::UnknownSnippet(name.to_string())
            } else {
                ShaderGraphError::TemplateError(err)
            }
        })?;
        Ok(template.render(ctx)?)
    }
}

fn chunk_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("glsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.glsl"))
    };

    if let Some(file) = ShaderChunks::get(&filename)
        && let Ok(source) = std::str::from_utf8(file.data.as_ref())
    {
        return Ok(Some(source.to_string()));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_snippets_resolve() {
        let library = ShaderLibrary::new().unwrap();
        for name in ["skinning", "morphing", "billboard", "lighting", "shadow", PROGRAM_TEMPLATE] {
            assert!(library.contains(name), "missing snippet {name}");
        }
        assert!(!library.contains("does_not_exist"));
    }

    #[test]
    fn test_morphing_expands_per_target_count() {
        let library = ShaderLibrary::new().unwrap();
        let helper = HelperRef::new("morphing").with_param("target_count", 2);
        let source = library.render_helper(&helper).unwrap();

        assert!(source.contains("morphTransform2("));
        assert!(source.contains("const in vec3 target1"));
        assert!(!source.contains("target2"));
        assert!(source.contains("weights[1] * (target1 - base)"));
    }

    #[test]
    fn test_lighting_emits_only_requested_kind() {
        let library = ShaderLibrary::new().unwrap();
        let helper = HelperRef::new("lighting").with_param("kind", "spot");
        let source = library.render_helper(&helper).unwrap();

        assert!(source.contains("vec3 computeSpotLight("));
        assert!(!source.contains("computeDirectionalLight"));
        assert!(!source.contains("computePointLight"));
        assert!(!source.contains("computeHemiLight"));
    }

    #[test]
    fn test_unknown_snippet_is_reported() {
        let library = ShaderLibrary::new().unwrap();
        let err = library.render_helper(&HelperRef::new("nope")).unwrap_err();
        assert!(matches!(err, ShaderGraphError::UnknownSnippet(ref name) if name == "nope"));
    }

    #[test]
    fn test_registered_snippet_overrides_embedded() {
        let mut library = ShaderLibrary::new().unwrap();
        library
            .register_snippet("billboard", "vec4 billboard() { return vec4(0.0); }")
            .unwrap();
        let source = library.render_helper(&HelperRef::new("billboard")).unwrap();
        assert_eq!(source, "vec4 billboard() { return vec4(0.0); }");
    }
}

//! Node Lowering
//!
//! Turns one [`Node`] into GLSL statements. Every [`NodeKind`] has exactly
//! one lowering function; [`NodeKind::Custom`] kinds are looked up in a
//! [`NodeRegistry`] filled by the host.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::node::{HelperRef, Input, Node, NodeKind};
use super::types::GlslType;
use super::variables::{VariableKey, VariableTable};
use crate::errors::{Result, ShaderGraphError};

/// Output of lowering one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lowered {
    pub statements: Vec<String>,
    /// Library snippets the statements call into.
    pub helpers: SmallVec<[HelperRef; 1]>,
}

impl Lowered {
    fn statement(statement: String) -> Self {
        Self {
            statements: vec![statement],
            helpers: SmallVec::new(),
        }
    }

    fn with_helper(mut self, helper: HelperRef) -> Self {
        self.helpers.push(helper);
        self
    }
}

/// Lowering function for a custom node kind.
pub type CustomLowering = dyn Fn(&Node, &VariableTable) -> Result<Lowered> + Send + Sync;

/// Registration table for node kinds outside the built-in set.
#[derive(Default)]
pub struct NodeRegistry {
    custom: FxHashMap<String, Box<CustomLowering>>,
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, lowering: F)
    where
        F: Fn(&Node, &VariableTable) -> Result<Lowered> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Box::new(lowering));
    }
}

/// Lowers a single node.
pub fn lower(node: &Node, vars: &VariableTable, registry: &NodeRegistry) -> Result<Lowered> {
    match &node.kind {
        NodeKind::Assign => lower_assign(node, vars),
        NodeKind::InlineCode { code } => lower_inline(node, vars, code),
        NodeKind::MatrixMultPosition { inverse } => lower_mult_position(node, vars, *inverse),
        NodeKind::MatrixMultDirection { inverse } => lower_mult_direction(node, vars, *inverse),
        NodeKind::Normalize => lower_normalize(node, vars),
        NodeKind::SetAlpha => lower_set_alpha(node, vars),
        NodeKind::Skinning { bone_count } => lower_skinning(node, vars, *bone_count),
        NodeKind::Morphing { target_count } => lower_morphing(node, vars, *target_count),
        NodeKind::Billboard => lower_billboard(node, vars),
        NodeKind::TextureSample => lower_texture_sample(node, vars),
        NodeKind::Call { function, snippet } => lower_call(node, vars, function, snippet.as_ref()),
        NodeKind::Custom { name } => {
            let lowering = registry
                .custom
                .get(name)
                .ok_or_else(|| ShaderGraphError::UnregisteredKind(name.clone()))?;
            lowering(node, vars)
        }
    }
}

// ─── Operand helpers ─────────────────────────────────────────────────────────

/// An expression with its type when known (literals are untyped).
struct Operand {
    text: String,
    ty: Option<GlslType>,
}

fn operand(vars: &VariableTable, input: &Input) -> Operand {
    match input {
        Input::Variable(key) => Operand {
            text: vars.name(*key).to_string(),
            ty: Some(vars.ty(*key)),
        },
        Input::Literal(text) => Operand {
            text: text.clone(),
            ty: None,
        },
    }
}

fn input_operand(node: &Node, vars: &VariableTable, slot: &str) -> Result<Operand> {
    node.input(slot)
        .map(|input| operand(vars, input))
        .ok_or_else(|| missing(node, slot))
}

fn output_var(node: &Node, slot: &str) -> Result<VariableKey> {
    node.output(slot).ok_or_else(|| missing(node, slot))
}

fn missing(node: &Node, slot: &str) -> ShaderGraphError {
    ShaderGraphError::MissingSlot {
        kind: node.kind.name().to_string(),
        slot: slot.to_string(),
    }
}

/// Converts `expr` of type `from` to `to` with a GLSL constructor.
///
/// Widening to `vec4` fills `w` with `fill_w`; narrowing keeps the leading components.
fn cast(expr: &str, from: Option<GlslType>, to: GlslType, fill_w: &str) -> String {
    let Some(from) = from else {
        return expr.to_string();
    };
    if from == to {
        return expr.to_string();
    }
    match (from, to) {
        (GlslType::Vec3, GlslType::Vec4) => format!("vec4({expr}, {fill_w})"),
        (GlslType::Vec2, GlslType::Vec4) => format!("vec4({expr}, 0.0, {fill_w})"),
        (GlslType::Vec2, GlslType::Vec3) => format!("vec3({expr}, 0.0)"),
        _ => format!("{to}({expr})"),
    }
}

// ─── Per-kind lowering ───────────────────────────────────────────────────────

fn lower_assign(node: &Node, vars: &VariableTable) -> Result<Lowered> {
    let value = input_operand(node, vars, "in")?;
    let out = output_var(node, "out")?;
    Ok(Lowered::statement(format!(
        "{} = {};",
        vars.name(out),
        cast(&value.text, value.ty, vars.ty(out), "1.0")
    )))
}

fn lower_inline(node: &Node, vars: &VariableTable, code: &str) -> Result<Lowered> {
    let mut result = String::with_capacity(code.len());
    let mut rest = code;

    while let Some(pos) = rest.find('%') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let slot = &after[..len];

        if slot.is_empty() {
            result.push('%');
        } else if let Some(input) = node.input(slot) {
            result.push_str(&operand(vars, input).text);
        } else if let Some(out) = node.output(slot) {
            result.push_str(vars.name(out));
        } else {
            return Err(missing(node, slot));
        }
        rest = &after[len..];
    }
    result.push_str(rest);

    Ok(Lowered::statement(result))
}

fn lower_mult_position(node: &Node, vars: &VariableTable, inverse: bool) -> Result<Lowered> {
    let matrix = input_operand(node, vars, "matrix")?;
    let vec = input_operand(node, vars, "vec")?;
    let out = output_var(node, "vec")?;

    let (product, product_ty) = if matrix.ty == Some(GlslType::Mat3) {
        let v = cast(&vec.text, vec.ty, GlslType::Vec3, "1.0");
        let product = if inverse {
            format!("{v} * {}", matrix.text)
        } else {
            format!("{} * {v}", matrix.text)
        };
        (product, GlslType::Vec3)
    } else {
        let point = match vec.ty {
            Some(GlslType::Vec4) => format!("vec4({}.xyz, 1.0)", vec.text),
            ty => cast(&vec.text, ty.or(Some(GlslType::Vec3)), GlslType::Vec4, "1.0"),
        };
        let product = if inverse {
            format!("{point} * {}", matrix.text)
        } else {
            format!("{} * {point}", matrix.text)
        };
        (product, GlslType::Vec4)
    };

    Ok(Lowered::statement(format!(
        "{} = {};",
        vars.name(out),
        cast(&product, Some(product_ty), vars.ty(out), "1.0")
    )))
}

fn lower_mult_direction(node: &Node, vars: &VariableTable, inverse: bool) -> Result<Lowered> {
    let matrix = input_operand(node, vars, "matrix")?;
    let vec = input_operand(node, vars, "vec")?;
    let out = output_var(node, "vec")?;

    let direction = cast(&vec.text, vec.ty, GlslType::Vec3, "0.0");
    let product = match (matrix.ty, inverse) {
        (Some(GlslType::Mat3), false) => format!("{} * {direction}", matrix.text),
        (Some(GlslType::Mat3), true) => format!("{direction} * {}", matrix.text),
        (_, false) => format!("vec3({} * vec4({direction}, 0.0))", matrix.text),
        (_, true) => format!("vec3(vec4({direction}, 0.0) * {})", matrix.text),
    };

    Ok(Lowered::statement(format!(
        "{} = {};",
        vars.name(out),
        cast(&product, Some(GlslType::Vec3), vars.ty(out), "0.0")
    )))
}

fn lower_normalize(node: &Node, vars: &VariableTable) -> Result<Lowered> {
    let vec = input_operand(node, vars, "vec")?;
    let out = output_var(node, "result")?;
    Ok(Lowered::statement(format!(
        "{} = normalize({});",
        vars.name(out),
        cast(&vec.text, vec.ty, vars.ty(out), "0.0")
    )))
}

fn lower_set_alpha(node: &Node, vars: &VariableTable) -> Result<Lowered> {
    let color = input_operand(node, vars, "color")?;
    let alpha = input_operand(node, vars, "alpha")?;
    let out = output_var(node, "result")?;

    let alpha = match alpha.ty {
        Some(GlslType::Vec4) => format!("{}.w", alpha.text),
        _ => alpha.text,
    };
    Ok(Lowered::statement(format!(
        "{} = vec4({}, {alpha});",
        vars.name(out),
        cast(&color.text, color.ty, GlslType::Vec3, "1.0")
    )))
}

fn lower_skinning(node: &Node, vars: &VariableTable, bone_count: u32) -> Result<Lowered> {
    let weights = input_operand(node, vars, "weights")?;
    let bones = input_operand(node, vars, "bonesIndex")?;
    let palette = input_operand(node, vars, "matrixPalette")?;
    let out = output_var(node, "result")?;

    Ok(Lowered::statement(format!(
        "{} = skeletalTransform({}, {});",
        vars.name(out),
        weights.text,
        bones.text
    ))
    .with_helper(
        HelperRef::new("skinning")
            .with_param("palette", palette.text)
            .with_param("bone_count", bone_count),
    ))
}

fn lower_morphing(node: &Node, vars: &VariableTable, target_count: u32) -> Result<Lowered> {
    let base = input_operand(node, vars, "vertex")?;
    let weights = input_operand(node, vars, "weights")?;
    let out = output_var(node, "result")?;

    let mut args = vec![
        cast(&base.text, base.ty, GlslType::Vec3, "1.0"),
        weights.text,
    ];
    for i in 0..target_count {
        let target = input_operand(node, vars, &format!("target{i}"))?;
        args.push(cast(&target.text, target.ty, GlslType::Vec3, "1.0"));
    }

    let call = format!("morphTransform{target_count}({})", args.join(", "));
    Ok(Lowered::statement(format!(
        "{} = {};",
        vars.name(out),
        cast(&call, Some(GlslType::Vec3), vars.ty(out), "1.0")
    ))
    .with_helper(HelperRef::new("morphing").with_param("target_count", target_count)))
}

fn lower_billboard(node: &Node, vars: &VariableTable) -> Result<Lowered> {
    let vertex = input_operand(node, vars, "Vertex")?;
    let model_view = input_operand(node, vars, "ModelViewMatrix")?;
    let projection = input_operand(node, vars, "ProjectionMatrix")?;
    let out = output_var(node, "result")?;

    Ok(Lowered::statement(format!(
        "{} = billboard({}, {}, {});",
        vars.name(out),
        cast(&vertex.text, vertex.ty, GlslType::Vec3, "1.0"),
        model_view.text,
        projection.text
    ))
    .with_helper(HelperRef::new("billboard")))
}

fn lower_texture_sample(node: &Node, vars: &VariableTable) -> Result<Lowered> {
    let sampler = input_operand(node, vars, "sampler")?;
    let uv = input_operand(node, vars, "uv")?;
    let out = output_var(node, "color")?;

    let sample = format!(
        "texture2D({}, {})",
        sampler.text,
        cast(&uv.text, uv.ty, GlslType::Vec2, "1.0")
    );
    Ok(Lowered::statement(format!(
        "{} = {};",
        vars.name(out),
        cast(&sample, Some(GlslType::Vec4), vars.ty(out), "1.0")
    )))
}

fn lower_call(
    node: &Node,
    vars: &VariableTable,
    function: &str,
    snippet: Option<&HelperRef>,
) -> Result<Lowered> {
    let args: Vec<String> = node
        .inputs()
        .map(|(_, input)| operand(vars, input).text)
        .collect();
    let call = format!("{function}({})", args.join(", "));

    let statement = match node.outputs().next() {
        Some((_, out)) => format!("{} = {call};", vars.name(out)),
        None => format!("{call};"),
    };

    let mut lowered = Lowered::statement(statement);
    if let Some(helper) = snippet {
        lowered.helpers.push(helper.clone());
    }
    Ok(lowered)
}

//! Graph Node
//!
//! A [`Node`] is one unit of shader computation: a closed [`NodeKind`] plus
//! named input slots (variables or literals) and named output slots
//! (variables). Nodes are immutable once added to a [`StageGraph`].
//!
//! Two nodes with the same [`NodeSignature`] (kind + resolved inputs) compute
//! the same value, so the stage graph coalesces them into one.
//!
//! [`StageGraph`]: super::context::StageGraph

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use super::variables::VariableKey;

/// Slot names are mostly static (`"matrix"`, `"vec"`), morph targets are not.
pub type SlotName = Cow<'static, str>;

/// Operation identity of a node, with its per-kind parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// `out = in`, with a constructor cast when the types differ.
    Assign,
    /// Raw GLSL where `%slot` refers to an input or output slot.
    InlineCode { code: String },
    /// Homogeneous point transform (`w = 1`). `inverse` multiplies the row
    /// vector on the left, used with transposed bone palettes.
    MatrixMultPosition { inverse: bool },
    /// Direction transform (`w = 0`), same `inverse` convention.
    MatrixMultDirection { inverse: bool },
    Normalize,
    /// `vec4(color.rgb, alpha.a)`.
    SetAlpha,
    /// Weighted bone-palette matrix from `Weights`/`Bones`.
    Skinning { bone_count: u32 },
    /// Blend of a base attribute with its morph targets.
    Morphing { target_count: u32 },
    /// Screen-aligned clip position, replaces the projection node.
    Billboard,
    /// `texture2D(sampler, uv)`.
    TextureSample,
    /// `out = function(inputs...)` where the function lives in a library snippet.
    Call {
        function: Cow<'static, str>,
        snippet: Option<HelperRef>,
    },
    /// A kind lowered by a function registered on the compiler.
    Custom { name: String },
}

impl NodeKind {
    /// Short diagnostic name of the kind.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Assign => "Assign",
            Self::InlineCode { .. } => "InlineCode",
            Self::MatrixMultPosition { .. } => "MatrixMultPosition",
            Self::MatrixMultDirection { .. } => "MatrixMultDirection",
            Self::Normalize => "Normalize",
            Self::SetAlpha => "SetAlpha",
            Self::Skinning { .. } => "Skinning",
            Self::Morphing { .. } => "Morphing",
            Self::Billboard => "Billboard",
            Self::TextureSample => "TextureSample",
            Self::Call { .. } => "Call",
            Self::Custom { name } => name,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference to a library snippet, plus the template parameters it is
/// rendered with. Equal refs are rendered once per stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HelperRef {
    pub snippet: Cow<'static, str>,
    pub params: SmallVec<[(Cow<'static, str>, String); 2]>,
}

impl HelperRef {
    #[must_use]
    pub fn new(snippet: impl Into<Cow<'static, str>>) -> Self {
        Self {
            snippet: snippet.into(),
            params: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<Cow<'static, str>>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }
}

/// What feeds an input slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Input {
    Variable(VariableKey),
    /// GLSL literal text such as `1.0` or `vec4(1.0)`.
    Literal(String),
}

impl From<VariableKey> for Input {
    fn from(key: VariableKey) -> Self {
        Input::Variable(key)
    }
}

/// Identity used to coalesce equivalent nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeSignature {
    pub kind: NodeKind,
    pub inputs: SmallVec<[(SlotName, Input); 4]>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub(crate) inputs: SmallVec<[(SlotName, Input); 4]>,
    pub(crate) outputs: SmallVec<[(SlotName, VariableKey); 2]>,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn input(&self, slot: &str) -> Option<&Input> {
        self.inputs
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, input)| input)
    }

    #[must_use]
    pub fn output(&self, slot: &str) -> Option<VariableKey> {
        self.outputs
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, key)| *key)
    }

    /// Inputs in wiring order.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &Input)> {
        self.inputs.iter().map(|(name, input)| (name.as_ref(), input))
    }

    /// Outputs in wiring order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, VariableKey)> {
        self.outputs.iter().map(|(name, key)| (name.as_ref(), *key))
    }

    /// Variables read by this node.
    pub fn input_variables(&self) -> impl Iterator<Item = VariableKey> + '_ {
        self.inputs.iter().filter_map(|(_, input)| match input {
            Input::Variable(key) => Some(*key),
            Input::Literal(_) => None,
        })
    }

    #[must_use]
    pub fn signature(&self) -> NodeSignature {
        NodeSignature {
            kind: self.kind.clone(),
            inputs: self.inputs.clone(),
        }
    }
}

//! Graph Builder
//!
//! Shared state for the stage builders in [`vertex`](super::vertex) and
//! [`fragment`](super::fragment): the graph under construction, the render
//! state it is built for, and per-compilation memoization of derived values
//! (`viewVertex`, `boneMatrix`, ...), so every helper can be called from
//! several places and still wire its nodes once.

use super::context::{Stage, StageGraph};
use super::node::NodeKind;
use super::types::GlslType;
use super::variables::VariableKey;
use crate::errors::Result;
use crate::state::config::RenderStateConfig;

pub struct GraphBuilder<'a> {
    pub(crate) graph: StageGraph,
    pub(crate) config: &'a RenderStateConfig,
}

impl<'a> GraphBuilder<'a> {
    #[must_use]
    pub fn new(stage: Stage, name: impl Into<String>, config: &'a RenderStateConfig) -> Self {
        Self {
            graph: StageGraph::new(stage, name),
            config,
        }
    }

    #[must_use]
    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut StageGraph {
        &mut self.graph
    }

    #[must_use]
    pub fn finish(self) -> StageGraph {
        self.graph
    }

    /// Runs `build` once per compilation and caches its result under `key`.
    pub(crate) fn memoized(
        &mut self,
        key: &'static str,
        build: impl FnOnce(&mut Self) -> Result<VariableKey>,
    ) -> Result<VariableKey> {
        if let Some(var) = self.graph.memo(key) {
            return Ok(var);
        }
        let var = build(self)?;
        self.graph.set_memo(key, var);
        Ok(var)
    }

    pub(crate) fn attribute(&mut self, ty: GlslType, name: &str) -> Result<VariableKey> {
        self.graph.vars_mut().get_or_create_attribute(ty, name)
    }

    pub(crate) fn uniform(&mut self, ty: GlslType, name: &str) -> Result<VariableKey> {
        self.graph.vars_mut().get_or_create_uniform(ty, name)
    }

    pub(crate) fn varying(&mut self, ty: GlslType, name: &str) -> Result<VariableKey> {
        self.graph.vars_mut().get_or_create_varying(ty, name)
    }

    pub(crate) fn local(&mut self, ty: GlslType, name: Option<&str>) -> VariableKey {
        self.graph.vars_mut().create_variable(ty, name)
    }

    /// `out = in`.
    pub(crate) fn assign(&mut self, input: VariableKey, output: VariableKey) {
        self.graph
            .node(NodeKind::Assign)
            .input("in", input)
            .output("out", output)
            .add();
    }

    /// `result = a * b` into a fresh local.
    pub(crate) fn multiply(
        &mut self,
        a: VariableKey,
        b: VariableKey,
        ty: GlslType,
        name: &str,
    ) -> VariableKey {
        let result = self.local(ty, Some(name));
        self.graph
            .node(NodeKind::InlineCode {
                code: "%result = %a * %b;".into(),
            })
            .input("a", a)
            .input("b", b)
            .output("result", result)
            .add();
        self.graph.resolve(result)
    }

    pub(crate) fn normalize(&mut self, vec: VariableKey, name: Option<&str>) -> VariableKey {
        let ty = self.graph.vars().ty(vec);
        let result = self.local(ty, name);
        self.graph
            .node(NodeKind::Normalize)
            .input("vec", vec)
            .output("result", result)
            .add();
        self.graph.resolve(result)
    }
}

//! Stage Graph
//!
//! Per-compilation arena holding every node and variable of one shader stage.
//! A fresh graph is built for each configuration and dropped wholesale after
//! lowering; nothing outside it keeps node or variable keys.
//!
//! # Coalescing
//!
//! ```text
//!  t0 = normalize(Normal)   ─┐
//!  t1 = normalize(Normal)   ─┴─► one node, t1 aliases t0
//! ```
//!
//! A node whose `(kind, resolved inputs)` matches an existing node, and whose
//! outputs are fresh locals, is not added: its outputs become aliases of the
//! existing node's outputs and every later read resolves through the alias.

use std::borrow::Cow;
use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use super::node::{Input, Node, NodeKind, NodeSignature, SlotName};
use super::types::{GlslType, StorageClass};
use super::variables::{VariableKey, VariableTable};
use crate::errors::{Result, ShaderGraphError};

new_key_type! {
    /// Handle to a node inside one stage graph.
    pub struct NodeKey;
}

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        })
    }
}

pub const GL_POSITION: &str = "gl_Position";
pub const GL_POINT_SIZE: &str = "gl_PointSize";
pub const GL_FRAG_COLOR: &str = "gl_FragColor";

pub struct StageGraph {
    stage: Stage,
    name: String,
    vars: VariableTable,
    nodes: SlotMap<NodeKey, Node>,
    signatures: FxHashMap<NodeSignature, NodeKey>,
    producers: FxHashMap<VariableKey, SmallVec<[NodeKey; 1]>>,
    aliases: FxHashMap<VariableKey, VariableKey>,
    roots: Vec<VariableKey>,
    memo: FxHashMap<&'static str, VariableKey>,
}

impl StageGraph {
    /// Creates an empty graph with the stage built-ins registered.
    #[must_use]
    pub fn new(stage: Stage, name: impl Into<String>) -> Self {
        let mut vars = VariableTable::new();
        // Fresh table, no conflicts possible.
        let builtins: &[(GlslType, &str)] = match stage {
            Stage::Vertex => &[(GlslType::Vec4, GL_POSITION), (GlslType::Float, GL_POINT_SIZE)],
            Stage::Fragment => &[(GlslType::Vec4, GL_FRAG_COLOR)],
        };
        for &(ty, name) in builtins {
            let _ = vars.get_or_create_builtin(ty, name);
        }

        Self {
            stage,
            name: name.into(),
            vars,
            nodes: SlotMap::with_key(),
            signatures: FxHashMap::default(),
            producers: FxHashMap::default(),
            aliases: FxHashMap::default(),
            roots: Vec::new(),
            memo: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn vars(&self) -> &VariableTable {
        &self.vars
    }

    #[inline]
    pub fn vars_mut(&mut self) -> &mut VariableTable {
        &mut self.vars
    }

    /// Fails with [`ShaderGraphError::VertexOnlyHelper`] unless this is a vertex graph.
    pub fn require_vertex(&self, helper: &'static str) -> Result<()> {
        if self.stage == Stage::Vertex {
            Ok(())
        } else {
            Err(ShaderGraphError::VertexOnlyHelper { helper })
        }
    }

    /// The stage built-in output variable (`gl_Position`, `gl_FragColor`, ...).
    #[must_use]
    pub fn builtin(&self, name: &str) -> Option<VariableKey> {
        self.vars
            .get_variable(name)
            .filter(|&key| self.vars.get(key).storage == StorageClass::BuiltIn)
    }

    /// Starts wiring a node of `kind`.
    pub fn node(&mut self, kind: NodeKind) -> NodeBuilder<'_> {
        NodeBuilder {
            graph: self,
            node: Node::new(kind),
        }
    }

    /// Marks a variable as a mandatory output of the stage.
    pub fn add_root(&mut self, var: VariableKey) {
        let var = self.resolve(var);
        if !self.roots.contains(&var) {
            self.roots.push(var);
        }
    }

    #[must_use]
    pub fn roots(&self) -> &[VariableKey] {
        &self.roots
    }

    /// Follows coalescing aliases to the variable actually written.
    #[must_use]
    pub fn resolve(&self, mut var: VariableKey) -> VariableKey {
        while let Some(&target) = self.aliases.get(&var) {
            var = target;
        }
        var
    }

    /// Nodes writing `var`, in creation order.
    #[must_use]
    pub fn producers(&self, var: VariableKey) -> &[NodeKey] {
        self.producers
            .get(&self.resolve(var))
            .map_or(&[] as &[NodeKey], SmallVec::as_slice)
    }

    #[inline]
    #[must_use]
    pub fn get_node(&self, key: NodeKey) -> &Node {
        &self.nodes[key]
    }

    /// The node with every input variable resolved through aliases made after it was wired.
    #[must_use]
    pub fn resolved_node(&self, key: NodeKey) -> Cow<'_, Node> {
        let node = &self.nodes[key];
        let stale = node
            .input_variables()
            .any(|var| self.aliases.contains_key(&var));
        if !stale {
            return Cow::Borrowed(node);
        }

        let mut node = node.clone();
        for (_, input) in &mut node.inputs {
            if let Input::Variable(var) = input {
                *var = self.resolve(*var);
            }
        }
        Cow::Owned(node)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates nodes in creation order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    /// Varyings this stage reads or writes, in creation order.
    #[must_use]
    pub fn varyings(&self) -> Vec<(String, GlslType)> {
        self.vars
            .iter_storage(StorageClass::Varying)
            .map(|(_, var)| (var.name.clone(), var.ty))
            .collect()
    }

    /// Per-compilation cache for helper results such as the shared bone matrix.
    #[must_use]
    pub fn memo(&self, key: &'static str) -> Option<VariableKey> {
        self.memo.get(key).copied()
    }

    pub fn set_memo(&mut self, key: &'static str, var: VariableKey) {
        self.memo.insert(key, var);
    }

    fn insert(&mut self, mut node: Node) -> NodeKey {
        for (_, input) in &mut node.inputs {
            if let Input::Variable(var) = input {
                *var = self.resolve(*var);
            }
        }

        let signature = node.signature();
        if let Some(&existing) = self.signatures.get(&signature)
            && self.can_alias(&node, existing)
        {
            let existing_outputs = self.nodes[existing].outputs.clone();
            for ((_, new_var), (_, old_var)) in node.outputs.iter().zip(existing_outputs.iter()) {
                if new_var != old_var {
                    self.aliases.insert(*new_var, *old_var);
                }
            }
            log::trace!("coalesced `{}` node in `{}`", node.kind, self.name);
            return existing;
        }

        let outputs: SmallVec<[VariableKey; 2]> = node.outputs.iter().map(|(_, var)| *var).collect();
        let key = self.nodes.insert(node);
        for var in outputs {
            self.producers.entry(var).or_default().push(key);
        }
        self.signatures.entry(signature).or_insert(key);
        key
    }

    /// Only fresh locals with identical slot layout can be folded into an existing node.
    fn can_alias(&self, node: &Node, existing: NodeKey) -> bool {
        let old = &self.nodes[existing];
        node.outputs.len() == old.outputs.len()
            && node
                .outputs
                .iter()
                .zip(old.outputs.iter())
                .all(|((new_slot, new_var), (old_slot, old_var))| {
                    new_slot == old_slot
                        && (new_var == old_var
                            || (self.vars.get(*new_var).storage == StorageClass::Local
                                && self.vars.ty(*new_var) == self.vars.ty(*old_var)
                                && !self.producers.contains_key(new_var)))
                })
    }
}

/// Fluent wiring of one node; nothing is added until [`NodeBuilder::add`].
pub struct NodeBuilder<'g> {
    graph: &'g mut StageGraph,
    node: Node,
}

impl NodeBuilder<'_> {
    #[must_use]
    pub fn input(mut self, slot: impl Into<SlotName>, var: VariableKey) -> Self {
        self.node.inputs.push((slot.into(), Input::Variable(var)));
        self
    }

    #[must_use]
    pub fn literal(mut self, slot: impl Into<SlotName>, value: impl Into<String>) -> Self {
        self.node.inputs.push((slot.into(), Input::Literal(value.into())));
        self
    }

    #[must_use]
    pub fn output(mut self, slot: impl Into<SlotName>, var: VariableKey) -> Self {
        self.node.outputs.push((slot.into(), var));
        self
    }

    /// Adds the node, or returns the existing equivalent one.
    pub fn add(self) -> NodeKey {
        self.graph.insert(self.node)
    }
}

//! Shader Graph
//!
//! The node-graph IR and its compiler.
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`], [`variables`] | GLSL types and the per-compilation variable arena |
//! | [`node`], [`context`] | node kinds and the per-stage graph with coalescing |
//! | [`lowering`], [`compiler`] | node → GLSL statements → stage source |
//! | [`builder`], [`vertex`], [`fragment`] | stage graphs from a render state |

pub mod builder;
pub mod compiler;
pub mod context;
pub mod fragment;
pub mod lowering;
pub mod node;
pub mod types;
pub mod variables;
pub mod vertex;

pub use builder::GraphBuilder;
pub use compiler::{GraphCompiler, ShaderSource};
pub use context::{NodeBuilder, NodeKey, Stage, StageGraph};
pub use lowering::{CustomLowering, Lowered, NodeRegistry};
pub use node::{HelperRef, Input, Node, NodeKind};
pub use types::{GlslType, StorageClass, Variable};
pub use variables::{VariableKey, VariableTable};

use crate::errors::Result;
use crate::state::config::RenderStateConfig;

/// Builds both stage graphs for one render state.
///
/// The fragment graph goes first; the varyings it reads become roots of the
/// vertex graph.
pub fn build_stage_graphs(config: &RenderStateConfig, name: &str) -> Result<(StageGraph, StageGraph)> {
    config.validate()?;

    let mut fragment = GraphBuilder::new(Stage::Fragment, name, config);
    fragment.declare_fragment_main()?;
    let fragment = fragment.finish();

    let mut vertex = GraphBuilder::new(Stage::Vertex, name, config);
    vertex.declare_vertex_main(&fragment.varyings())?;
    let vertex = vertex.finish();

    log::debug!(
        "built `{name}`: {} vertex nodes, {} fragment nodes, {} varyings",
        vertex.node_count(),
        fragment.node_count(),
        fragment.varyings().len()
    );
    Ok((vertex, fragment))
}

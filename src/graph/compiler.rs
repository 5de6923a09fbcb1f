//! Graph Compiler
//!
//! Lowers a [`StageGraph`] into GLSL source text.
//!
//! # Pipeline
//!
//! ```text
//! roots ─► post-order DFS ─► lower each node ─► collect declarations ─► render envelope
//! ```
//!
//! 1. The stage-mandatory outputs are seeded first (`gl_PointSize`,
//!    `gl_Position` for vertex, `gl_FragColor` for fragment), followed by the
//!    roots the builder registered (varyings).
//! 2. A depth-first walk from each root's producers emits every node after all
//!    nodes writing its inputs. Coalesced nodes share one key, so shared
//!    sub-expressions are emitted once.
//! 3. Declarations are ordered by storage class (attributes, uniforms,
//!    varyings) and then by first use; locals open `main`.
//!
//! Equal graphs always produce byte-identical text: every ordering above
//! derives from wiring order, never from hash iteration.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

use super::context::{GL_FRAG_COLOR, GL_POINT_SIZE, GL_POSITION, NodeKey, Stage, StageGraph};
use super::lowering::{NodeRegistry, lower};
use super::node::HelperRef;
use super::types::StorageClass;
use super::variables::VariableKey;
use crate::errors::{Result, ShaderGraphError};
use crate::library::{PROGRAM_TEMPLATE, ShaderLibrary};
use crate::settings::CompilerSettings;

/// Generated source for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: Stage,
    pub name: String,
    pub text: String,
    /// Global then local declarations, in emission order.
    pub declarations: Vec<String>,
    /// Body statements of `main`, in emission order.
    pub statements: Vec<String>,
    /// Rendered helper snippets, deduplicated.
    pub helpers: Vec<String>,
}

impl ShaderSource {
    /// Wraps hand-written source text.
    #[must_use]
    pub fn from_text(stage: Stage, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            stage,
            name: name.into(),
            text: text.into(),
            declarations: Vec::new(),
            statements: Vec::new(),
            helpers: Vec::new(),
        }
    }

    /// xxh3-128 of the full text.
    #[must_use]
    pub fn hash(&self) -> u128 {
        xxh3_128(self.text.as_bytes())
    }
}

#[derive(Serialize)]
struct ProgramContext<'a> {
    header: Option<&'a str>,
    name: &'a str,
    precision: Option<&'static str>,
    globals: &'a [String],
    helpers: &'a [String],
    locals: &'a [String],
    body: &'a [String],
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Lowers stage graphs with a snippet library and custom-kind registry.
#[derive(Debug)]
pub struct GraphCompiler {
    library: ShaderLibrary,
    registry: NodeRegistry,
    settings: CompilerSettings,
}

impl GraphCompiler {
    pub fn new(settings: CompilerSettings) -> Result<Self> {
        Ok(Self {
            library: ShaderLibrary::new()?,
            registry: NodeRegistry::new(),
            settings,
        })
    }

    #[must_use]
    pub fn library(&self) -> &ShaderLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.library
    }

    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Compiles one stage graph into source text.
    pub fn compile(&self, graph: &StageGraph) -> Result<ShaderSource> {
        let order = self.schedule(graph)?;

        let mut statements = Vec::new();
        let mut helper_refs: Vec<HelperRef> = Vec::new();
        let mut used: Vec<VariableKey> = Vec::new();
        let mut seen: FxHashSet<VariableKey> = FxHashSet::default();

        for &key in &order {
            let node = graph.resolved_node(key);
            let lowered = lower(&node, graph.vars(), &self.registry)?;
            statements.extend(lowered.statements);
            for helper in lowered.helpers {
                if !helper_refs.contains(&helper) {
                    helper_refs.push(helper);
                }
            }

            let touched = node
                .input_variables()
                .chain(node.outputs().map(|(_, var)| var));
            for var in touched {
                if seen.insert(var) {
                    used.push(var);
                }
            }
        }

        let vars = graph.vars();
        let mut globals: Vec<VariableKey> = used
            .iter()
            .copied()
            .filter(|&var| vars.get(var).storage < StorageClass::Local)
            .collect();
        // Stable: first-use order is kept within each class.
        globals.sort_by_key(|&var| vars.get(var).storage);

        let global_decls: Vec<String> = globals
            .iter()
            .filter_map(|&var| vars.get(var).declaration())
            .collect();
        let local_decls: Vec<String> = used
            .iter()
            .filter(|&&var| vars.get(var).storage == StorageClass::Local)
            .filter_map(|&var| vars.get(var).declaration())
            .collect();

        let helpers = helper_refs
            .iter()
            .map(|helper| self.library.render_helper(helper).map(|s| s.trim_end().to_string()))
            .collect::<Result<Vec<_>>>()?;

        let ctx = ProgramContext {
            header: self.settings.glsl_version.as_deref(),
            name: graph.name(),
            precision: self.settings.precision.map(|p| p.as_str()),
            globals: &global_decls,
            helpers: &helpers,
            locals: &local_decls,
            body: &statements,
        };
        let text = self.library.render(PROGRAM_TEMPLATE, &ctx)?;

        if self.settings.dump_source {
            dump_source(graph.stage(), graph.name(), &text);
        }

        let mut declarations = global_decls;
        declarations.extend(local_decls);

        Ok(ShaderSource {
            stage: graph.stage(),
            name: graph.name().to_string(),
            text,
            declarations,
            statements,
            helpers,
        })
    }

    /// Orders the nodes reachable from the roots so every producer precedes its readers.
    fn schedule(&self, graph: &StageGraph) -> Result<Vec<NodeKey>> {
        let mandatory: &[&str] = match graph.stage() {
            Stage::Vertex => &[GL_POINT_SIZE, GL_POSITION],
            Stage::Fragment => &[GL_FRAG_COLOR],
        };

        let mut roots: Vec<VariableKey> = Vec::with_capacity(mandatory.len() + graph.roots().len());
        for name in mandatory {
            let var = graph
                .builtin(name)
                .ok_or_else(|| ShaderGraphError::MissingRoot((*name).to_string()))?;
            roots.push(graph.resolve(var));
        }
        for &root in graph.roots() {
            let root = graph.resolve(root);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        let mut marks: FxHashMap<NodeKey, Mark> = FxHashMap::default();
        let mut order = Vec::with_capacity(graph.node_count());

        for root in roots {
            let producers = graph.producers(root);
            if producers.is_empty() {
                return Err(ShaderGraphError::MissingRoot(graph.vars().name(root).to_string()));
            }
            for &producer in producers {
                visit(graph, producer, &mut marks, &mut order)?;
            }
        }

        log::trace!(
            "scheduled {} of {} nodes for {} stage `{}`",
            order.len(),
            graph.node_count(),
            graph.stage(),
            graph.name()
        );
        Ok(order)
    }
}

fn visit(
    graph: &StageGraph,
    key: NodeKey,
    marks: &mut FxHashMap<NodeKey, Mark>,
    order: &mut Vec<NodeKey>,
) -> Result<()> {
    match marks.get(&key) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let node = graph.get_node(key);
            let variable = node
                .outputs()
                .next()
                .map(|(_, var)| graph.vars().name(var).to_string())
                .unwrap_or_default();
            return Err(ShaderGraphError::CyclicGraph {
                kind: node.kind.name().to_string(),
                variable,
            });
        }
        None => {}
    }

    marks.insert(key, Mark::Visiting);
    let inputs: Vec<VariableKey> = graph.get_node(key).input_variables().collect();
    for var in inputs {
        for &producer in graph.producers(var) {
            // Read-modify-write of the node's own output.
            if producer != key {
                visit(graph, producer, marks, order)?;
            }
        }
    }
    marks.insert(key, Mark::Done);
    order.push(key);
    Ok(())
}

fn dump_source(stage: Stage, name: &str, source: &str) {
    fn normalize_newlines(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut last_was_newline = false;
        for c in s.chars() {
            if c == '\n' {
                if !last_was_newline {
                    result.push('\n');
                    last_was_newline = true;
                }
            } else {
                result.push(c);
                last_was_newline = false;
            }
        }
        result
    }

    log::debug!(
        "================= Generated {stage} shader {name} ==================\n{}",
        normalize_newlines(source)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeKind;
    use crate::graph::types::GlslType;

    fn compiler() -> GraphCompiler {
        GraphCompiler::new(CompilerSettings {
            dump_source: false,
            ..Default::default()
        })
        .unwrap()
    }

    fn minimal_vertex() -> StageGraph {
        let mut graph = StageGraph::new(Stage::Vertex, "minimal");
        let vars = graph.vars_mut();
        let vertex = vars.get_or_create_attribute(GlslType::Vec3, "Vertex").unwrap();
        let mvp = vars.get_or_create_uniform(GlslType::Mat4, "uModelViewProjection").unwrap();
        let position = graph.builtin(GL_POSITION).unwrap();
        let point_size = graph.builtin(GL_POINT_SIZE).unwrap();

        graph
            .node(NodeKind::MatrixMultPosition { inverse: false })
            .input("matrix", mvp)
            .input("vec", vertex)
            .output("vec", position)
            .add();
        graph.node(NodeKind::Assign).literal("in", "1.0").output("out", point_size).add();
        graph
    }

    #[test]
    fn test_minimal_vertex_stage() {
        let source = compiler().compile(&minimal_vertex()).unwrap();

        assert!(source.text.starts_with("#version 100\n#define SHADER_NAME minimal\n"));
        assert_eq!(
            source.statements,
            vec![
                "gl_PointSize = 1.0;".to_string(),
                "gl_Position = uModelViewProjection * vec4(Vertex, 1.0);".to_string(),
            ]
        );
        assert_eq!(
            source.declarations,
            vec![
                "attribute vec3 Vertex;".to_string(),
                "uniform mat4 uModelViewProjection;".to_string(),
            ]
        );
        assert!(!source.text.contains("gl_Position;"));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let compiler = compiler();
        let a = compiler.compile(&minimal_vertex()).unwrap();
        let b = compiler.compile(&minimal_vertex()).unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_missing_mandatory_root() {
        let graph = StageGraph::new(Stage::Fragment, "empty");
        let err = compiler().compile(&graph).unwrap_err();
        assert!(matches!(err, ShaderGraphError::MissingRoot(ref name) if name == GL_FRAG_COLOR));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = StageGraph::new(Stage::Fragment, "cycle");
        let a = graph.vars_mut().create_variable(GlslType::Vec4, Some("a"));
        let b = graph.vars_mut().create_variable(GlslType::Vec4, Some("b"));
        let frag = graph.builtin(GL_FRAG_COLOR).unwrap();

        graph.node(NodeKind::Normalize).input("vec", b).output("result", a).add();
        graph.node(NodeKind::Normalize).input("vec", a).output("result", b).add();
        graph.node(NodeKind::Assign).input("in", a).output("out", frag).add();

        let err = compiler().compile(&graph).unwrap_err();
        assert!(matches!(err, ShaderGraphError::CyclicGraph { .. }));
    }

    #[test]
    fn test_unreachable_nodes_are_not_emitted() {
        let mut graph = minimal_vertex();
        let normal = graph
            .vars_mut()
            .get_or_create_attribute(GlslType::Vec3, "Normal")
            .unwrap();
        let unused = graph.vars_mut().create_variable(GlslType::Vec3, None);
        graph.node(NodeKind::Normalize).input("vec", normal).output("result", unused).add();

        let source = compiler().compile(&graph).unwrap();
        assert!(!source.text.contains("Normal"));
        assert_eq!(source.statements.len(), 2);
    }
}

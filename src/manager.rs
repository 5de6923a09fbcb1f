//! Shader Manager
//!
//! Facade owned once per GPU context: the graph compiler (snippet library,
//! custom node registry, settings), the program cache and the shared uniform
//! table.
//!
//! ```rust,ignore
//! let mut manager = ShaderManager::new(CompilerSettings::default())?;
//! let fingerprint = Fingerprint::of(&config);
//! let id = manager.get_or_create_program(&fingerprint, &config)?;
//! match manager.apply(id, &mut driver)? {
//!     ApplyOutcome::Bound => { /* draw */ }
//!     ApplyOutcome::Unusable | ApplyOutcome::Skipped => { /* skip */ }
//! }
//! ```
//!
//! All mutation goes through `&mut self`, so one manager on the GPU thread
//! builds each fingerprint exactly once. Hosts that touch it from several
//! threads wrap it in a [`SharedShaderManager`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{ProgramCache, ProgramId, ProgramSources};
use crate::errors::Result;
use crate::graph::build_stage_graphs;
use crate::graph::compiler::{GraphCompiler, ShaderSource};
use crate::graph::context::StageGraph;
use crate::program::driver::GpuDriver;
use crate::program::program::{ApplyOutcome, Program};
use crate::program::uniform::{SharedUniforms, UniformBlock};
use crate::settings::CompilerSettings;
use crate::state::config::RenderStateConfig;
use crate::state::fingerprint::{Fingerprint, variant_name};

pub type SharedShaderManager = Arc<Mutex<ShaderManager>>;

#[derive(Debug)]
pub struct ShaderManager {
    compiler: GraphCompiler,
    cache: ProgramCache,
    uniforms: SharedUniforms,
}

impl ShaderManager {
    pub fn new(settings: CompilerSettings) -> Result<Self> {
        Ok(Self {
            compiler: GraphCompiler::new(settings)?,
            cache: ProgramCache::new(),
            uniforms: SharedUniforms::new(),
        })
    }

    /// Wraps the manager for cross-thread use.
    #[must_use]
    pub fn into_shared(self) -> SharedShaderManager {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn compiler(&self) -> &GraphCompiler {
        &self.compiler
    }

    /// Access for registering snippets and custom node lowerings.
    pub fn compiler_mut(&mut self) -> &mut GraphCompiler {
        &mut self.compiler
    }

    #[must_use]
    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Lowers one stage graph to source.
    pub fn compile(&self, graph: &StageGraph) -> Result<ShaderSource> {
        self.compiler.compile(graph)
    }

    /// Returns the program for a render state, generating it on the first request.
    ///
    /// A configuration error inserts nothing: the next request retries.
    pub fn get_or_create_program(
        &mut self,
        fingerprint: &Fingerprint,
        config: &RenderStateConfig,
    ) -> Result<ProgramId> {
        if let Some(id) = self.cache.lookup(fingerprint) {
            return Ok(id);
        }

        if config.is_degenerate() {
            log::debug!("fingerprint {fingerprint} has no position stream, using sentinel");
            return Ok(self.cache.insert_sentinel(*fingerprint));
        }

        let name = variant_name(config);
        log::debug!("program cache miss for `{name}` ({fingerprint})");

        let (vertex_graph, fragment_graph) = build_stage_graphs(config, &name)?;
        let vertex = self.compiler.compile(&vertex_graph)?;
        let fragment = self.compiler.compile(&fragment_graph)?;

        Ok(self.cache.insert(*fingerprint, ProgramSources { vertex, fragment }))
    }

    /// Fingerprints `config` and returns its program.
    pub fn program_for(&mut self, config: &RenderStateConfig) -> Result<ProgramId> {
        let fingerprint = Fingerprint::of(config);
        self.get_or_create_program(&fingerprint, config)
    }

    /// Builds the program if needed and binds it.
    pub fn apply(&mut self, id: ProgramId, driver: &mut dyn GpuDriver) -> Result<ApplyOutcome> {
        self.cache.get_mut(id)?.apply(driver)
    }

    pub fn program(&self, id: ProgramId) -> Result<&Program> {
        self.cache.get(id)
    }

    pub fn program_mut(&mut self, id: ProgramId) -> Result<&mut Program> {
        self.cache.get_mut(id)
    }

    #[must_use]
    pub fn sources(&self, fingerprint: &Fingerprint) -> Option<Arc<ProgramSources>> {
        self.cache.sources(fingerprint)
    }

    /// Shared default-valued uniform blocks for the features `config` enables.
    pub fn uniform_blocks(&mut self, config: &RenderStateConfig) -> Vec<UniformBlock> {
        self.uniforms.blocks_for(config)
    }

    /// Forgets all driver objects after context loss; programs relink on next apply.
    pub fn invalidate_all(&mut self) {
        log::info!("invalidating {} programs", self.cache.program_count());
        self.cache.invalidate_all();
    }

    /// Deletes all driver objects, e.g. before tearing down the context.
    pub fn release_all(&mut self, driver: &mut dyn GpuDriver) -> Result<()> {
        self.cache.release_all(driver)
    }
}

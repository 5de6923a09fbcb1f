//! Program Object
//!
//! A linked GPU program built lazily from a pair of generated sources.
//!
//! ```text
//!            apply()                     invalidate()
//!  Pending ───────────► Linked ◄──────────────┐
//!     │   compile/link                        │ (dirty, relink on next apply)
//!     └───────────────► Failed ───────────────┘
//! ```
//!
//! Compile and link failures are recovered locally: the sources and the
//! driver log are reported once at `error` level and the program stays
//! [`ProgramStatus::Failed`] until invalidated. Driver errors (context loss,
//! out of memory) propagate to the caller.

use rustc_hash::FxHashMap;

use super::driver::{DriverError, GpuDriver, ProgramHandle, ShaderHandle, UniformLocation};
use super::introspect::{Qualifier, scan_program};
use super::uniform::UniformValue;
use crate::errors::Result;
use crate::graph::context::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStatus {
    Pending,
    Linked,
    Failed,
}

/// Result of [`Program::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ApplyOutcome {
    /// The program is current on the driver.
    Bound,
    /// Compile or link failed; skip draws using this variant.
    Unusable,
    /// Sentinel program, nothing to bind.
    Skipped,
}

/// Name → location, iterable in first-introspected order.
#[derive(Debug)]
struct LocationCache<L> {
    order: Vec<String>,
    locations: FxHashMap<String, L>,
}

impl<L> Default for LocationCache<L> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            locations: FxHashMap::default(),
        }
    }
}

impl<L: Copy> LocationCache<L> {
    fn insert(&mut self, name: &str, location: L) {
        if self.locations.insert(name.to_string(), location).is_none() {
            self.order.push(name.to_string());
        }
    }

    fn get(&self, name: &str) -> Option<L> {
        self.locations.get(name).copied()
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.locations.clear();
    }
}

#[derive(Debug)]
pub struct Program {
    name: String,
    vertex_source: String,
    fragment_source: String,

    handle: Option<ProgramHandle>,
    vertex_shader: Option<ShaderHandle>,
    fragment_shader: Option<ShaderHandle>,

    dirty: bool,
    status: ProgramStatus,
    sentinel: bool,

    uniforms: LocationCache<UniformLocation>,
    attributes: LocationCache<u32>,
    failure_log: Option<String>,
}

impl Program {
    #[must_use]
    pub fn new(name: impl Into<String>, vertex_source: String, fragment_source: String) -> Self {
        Self {
            name: name.into(),
            vertex_source,
            fragment_source,
            handle: None,
            vertex_shader: None,
            fragment_shader: None,
            dirty: true,
            status: ProgramStatus::Pending,
            sentinel: false,
            uniforms: LocationCache::default(),
            attributes: LocationCache::default(),
            failure_log: None,
        }
    }

    /// Placeholder whose `apply` does nothing.
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            sentinel: true,
            dirty: false,
            ..Self::new("Sentinel", String::new(), String::new())
        }
    }

    /// Builds the program if needed, then binds it.
    pub fn apply(&mut self, driver: &mut dyn GpuDriver) -> Result<ApplyOutcome> {
        if self.sentinel {
            return Ok(ApplyOutcome::Skipped);
        }

        if self.handle.is_none() || self.dirty {
            if self.status == ProgramStatus::Failed && !self.dirty {
                return Ok(ApplyOutcome::Unusable);
            }
            if !self.build(driver)? {
                return Ok(ApplyOutcome::Unusable);
            }
        }

        driver.use_program(self.handle)?;
        Ok(ApplyOutcome::Bound)
    }

    /// Compiles, links and introspects. `Ok(false)` on compile or link failure.
    fn build(&mut self, driver: &mut dyn GpuDriver) -> Result<bool> {
        self.dirty = false;

        let Some(vertex) = self.shader(driver, Stage::Vertex)? else {
            return Ok(false);
        };
        let Some(fragment) = self.shader(driver, Stage::Fragment)? else {
            return Ok(false);
        };

        let program = driver.create_program()?;
        match self.link(driver, program, vertex, fragment) {
            Ok(true) => {
                self.handle = Some(program);
                self.status = ProgramStatus::Linked;
                self.failure_log = None;
                Ok(true)
            }
            Ok(false) => {
                driver.delete_program(program)?;
                Ok(false)
            }
            Err(err) => {
                // A lost context already took the program with it.
                if !driver.is_context_lost() {
                    let _ = driver.delete_program(program);
                }
                Err(err)
            }
        }
    }

    /// Links `program` and fills the location caches. The caller owns `program`
    /// and deletes it unless this returns `Ok(true)`.
    fn link(
        &mut self,
        driver: &mut dyn GpuDriver,
        program: ProgramHandle,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<bool> {
        driver.attach_shader(program, vertex)?;
        driver.attach_shader(program, fragment)?;
        driver.link_program(program)?;

        if !driver.program_link_status(program)? {
            if driver.is_context_lost() {
                return Err(DriverError::ContextLost.into());
            }
            let log = driver.program_info_log(program)?;
            self.fail("link", &log);
            return Ok(false);
        }
        driver.validate_program(program)?;

        let declarations = match scan_program(&self.vertex_source, &self.fragment_source) {
            Ok(declarations) => declarations,
            Err(err) => {
                self.status = ProgramStatus::Failed;
                return Err(err);
            }
        };

        self.uniforms.clear();
        self.attributes.clear();
        for decl in &declarations {
            match decl.qualifier {
                Qualifier::Uniform => {
                    if let Some(location) = driver.uniform_location(program, &decl.name)? {
                        self.uniforms.insert(&decl.name, location);
                    }
                }
                Qualifier::Attribute => {
                    if let Some(location) = driver.attrib_location(program, &decl.name)? {
                        self.attributes.insert(&decl.name, location);
                    }
                }
            }
        }

        log::debug!(
            "linked program `{}`: {} active uniforms, {} active attributes",
            self.name,
            self.uniforms.order.len(),
            self.attributes.order.len()
        );
        Ok(true)
    }

    /// The compiled shader for `stage`, compiling it on first use.
    fn shader(&mut self, driver: &mut dyn GpuDriver, stage: Stage) -> Result<Option<ShaderHandle>> {
        let (cached, source) = match stage {
            Stage::Vertex => (self.vertex_shader, &self.vertex_source),
            Stage::Fragment => (self.fragment_shader, &self.fragment_source),
        };
        if cached.is_some() {
            return Ok(cached);
        }

        let shader = driver.create_shader(stage)?;
        driver.shader_source(shader, source)?;
        driver.compile_shader(shader)?;

        if !driver.shader_compile_status(shader)? {
            if driver.is_context_lost() {
                return Err(DriverError::ContextLost.into());
            }
            let log = driver.shader_info_log(shader)?;
            driver.delete_shader(shader)?;
            self.fail(&format!("{stage} compile"), &log);
            return Ok(None);
        }

        match stage {
            Stage::Vertex => self.vertex_shader = Some(shader),
            Stage::Fragment => self.fragment_shader = Some(shader),
        }
        Ok(Some(shader))
    }

    fn fail(&mut self, step: &str, log: &str) {
        self.status = ProgramStatus::Failed;
        let report = format!(
            "program `{}` {step} failed:\n{log}\n----- vertex -----\n{}\n----- fragment -----\n{}",
            self.name, self.vertex_source, self.fragment_source
        );
        log::error!("{report}");
        self.failure_log = Some(report);
    }

    /// Forgets driver objects without deleting them (the context is gone).
    pub fn invalidate(&mut self) {
        if self.sentinel {
            return;
        }
        self.handle = None;
        self.vertex_shader = None;
        self.fragment_shader = None;
        self.uniforms.clear();
        self.attributes.clear();
        self.status = ProgramStatus::Pending;
        self.failure_log = None;
        self.dirty = true;
    }

    /// Deletes driver objects; the next `apply` rebuilds.
    pub fn release(&mut self, driver: &mut dyn GpuDriver) -> Result<()> {
        if let Some(program) = self.handle.take() {
            driver.delete_program(program)?;
        }
        for shader in [self.vertex_shader.take(), self.fragment_shader.take()]
            .into_iter()
            .flatten()
        {
            driver.delete_shader(shader)?;
        }
        self.invalidate();
        Ok(())
    }

    /// Uploads `value` to an active uniform. Returns `false` for inactive names.
    pub fn set_uniform(
        &self,
        driver: &mut dyn GpuDriver,
        name: &str,
        value: &UniformValue,
    ) -> Result<bool> {
        let Some(location) = self.uniforms.get(name) else {
            return Ok(false);
        };
        driver.set_uniform(location, value)?;
        Ok(true)
    }

    #[must_use]
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name)
    }

    #[must_use]
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name)
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.names()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.names()
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> ProgramStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    /// The last compile or link report: driver log plus both sources.
    #[must_use]
    pub fn failure_log(&self) -> Option<&str> {
        self.failure_log.as_deref()
    }

    #[must_use]
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    #[must_use]
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }
}

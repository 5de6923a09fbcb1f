//! In-memory `GpuDriver` used by the integration tests.
//!
//! Shaders "compile" unless their source contains one of `failing_sources`,
//! programs "link" unless `fail_link` is set, attaching runs out of memory
//! when `fail_attach` is set, and every declared name is active except those
//! listed in `inactive`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use shadegraph::program::DriverResult;
use shadegraph::{
    DriverError, GpuDriver, ProgramHandle, ShaderHandle, Stage, UniformLocation, UniformValue,
};

#[derive(Debug, Default)]
pub struct MockDriver {
    next_handle: u32,
    next_location: i32,
    shader_sources: HashMap<u32, String>,
    compiled: HashMap<u32, bool>,
    linked: HashMap<u32, bool>,

    pub failing_sources: Vec<String>,
    pub fail_link: bool,
    pub fail_attach: bool,
    pub inactive: HashSet<String>,
    pub context_lost: bool,

    pub compile_calls: usize,
    pub link_calls: usize,
    pub created_programs: usize,
    pub deleted_programs: usize,
    pub current: Option<ProgramHandle>,
    pub uploads: Vec<(UniformLocation, UniformValue)>,
    pub queried_uniforms: Vec<String>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_context(&self) -> DriverResult<()> {
        if self.context_lost {
            Err(DriverError::ContextLost)
        } else {
            Ok(())
        }
    }
}

impl GpuDriver for MockDriver {
    fn create_shader(&mut self, _stage: Stage) -> DriverResult<ShaderHandle> {
        self.check_context()?;
        Ok(ShaderHandle(self.handle()))
    }

    fn shader_source(&mut self, shader: ShaderHandle, source: &str) -> DriverResult<()> {
        self.shader_sources.insert(shader.0, source.to_string());
        Ok(())
    }

    fn compile_shader(&mut self, shader: ShaderHandle) -> DriverResult<()> {
        self.check_context()?;
        self.compile_calls += 1;
        let source = self.shader_sources.get(&shader.0).map_or("", String::as_str);
        let ok = !self.failing_sources.iter().any(|marker| source.contains(marker.as_str()));
        self.compiled.insert(shader.0, ok);
        Ok(())
    }

    fn shader_compile_status(&mut self, shader: ShaderHandle) -> DriverResult<bool> {
        Ok(self.compiled.get(&shader.0).copied().unwrap_or(false))
    }

    fn shader_info_log(&mut self, shader: ShaderHandle) -> DriverResult<String> {
        Ok(format!("ERROR: 0:1: shader {} rejected", shader.0))
    }

    fn delete_shader(&mut self, shader: ShaderHandle) -> DriverResult<()> {
        self.shader_sources.remove(&shader.0);
        self.compiled.remove(&shader.0);
        Ok(())
    }

    fn create_program(&mut self) -> DriverResult<ProgramHandle> {
        self.check_context()?;
        self.created_programs += 1;
        Ok(ProgramHandle(self.handle()))
    }

    fn attach_shader(&mut self, _program: ProgramHandle, _shader: ShaderHandle) -> DriverResult<()> {
        if self.fail_attach {
            return Err(DriverError::OutOfMemory);
        }
        Ok(())
    }

    fn link_program(&mut self, program: ProgramHandle) -> DriverResult<()> {
        self.check_context()?;
        self.link_calls += 1;
        self.linked.insert(program.0, !self.fail_link);
        Ok(())
    }

    fn validate_program(&mut self, _program: ProgramHandle) -> DriverResult<()> {
        Ok(())
    }

    fn program_link_status(&mut self, program: ProgramHandle) -> DriverResult<bool> {
        Ok(self.linked.get(&program.0).copied().unwrap_or(false))
    }

    fn program_info_log(&mut self, program: ProgramHandle) -> DriverResult<String> {
        Ok(format!("ERROR: program {} failed to link", program.0))
    }

    fn delete_program(&mut self, program: ProgramHandle) -> DriverResult<()> {
        self.linked.remove(&program.0);
        self.deleted_programs += 1;
        Ok(())
    }

    fn uniform_location(
        &mut self,
        _program: ProgramHandle,
        name: &str,
    ) -> DriverResult<Option<UniformLocation>> {
        self.queried_uniforms.push(name.to_string());
        if self.inactive.contains(name) {
            return Ok(None);
        }
        self.next_location += 1;
        Ok(Some(UniformLocation(self.next_location)))
    }

    fn attrib_location(&mut self, _program: ProgramHandle, name: &str) -> DriverResult<Option<u32>> {
        if self.inactive.contains(name) {
            return Ok(None);
        }
        self.next_location += 1;
        Ok(Some(self.next_location as u32))
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) -> DriverResult<()> {
        self.check_context()?;
        self.current = program;
        Ok(())
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) -> DriverResult<()> {
        self.uploads.push((location, value.clone()));
        Ok(())
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

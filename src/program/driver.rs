//! GPU Driver Interface
//!
//! The narrow slice of a GL-style API the program layer needs. Hosts
//! implement [`GpuDriver`] over their real context; tests use a mock.
//!
//! Every call is fallible. A [`DriverError`] means the context itself is in
//! trouble (lost, out of memory) and is terminal for the current frame. A
//! shader that fails to compile or link is *not* a driver error: it is
//! reported through the status and info-log queries.

use thiserror::Error;

use super::uniform::UniformValue;
use crate::graph::context::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("GPU context lost")]
    ContextLost,

    #[error("GPU out of memory")]
    OutOfMemory,

    #[error("`{call}` failed: {message}")]
    Call { call: &'static str, message: String },
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

pub trait GpuDriver {
    fn create_shader(&mut self, stage: Stage) -> DriverResult<ShaderHandle>;
    fn shader_source(&mut self, shader: ShaderHandle, source: &str) -> DriverResult<()>;
    fn compile_shader(&mut self, shader: ShaderHandle) -> DriverResult<()>;
    fn shader_compile_status(&mut self, shader: ShaderHandle) -> DriverResult<bool>;
    fn shader_info_log(&mut self, shader: ShaderHandle) -> DriverResult<String>;
    fn delete_shader(&mut self, shader: ShaderHandle) -> DriverResult<()>;

    fn create_program(&mut self) -> DriverResult<ProgramHandle>;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) -> DriverResult<()>;
    fn link_program(&mut self, program: ProgramHandle) -> DriverResult<()>;
    fn validate_program(&mut self, program: ProgramHandle) -> DriverResult<()>;
    fn program_link_status(&mut self, program: ProgramHandle) -> DriverResult<bool>;
    fn program_info_log(&mut self, program: ProgramHandle) -> DriverResult<String>;
    fn delete_program(&mut self, program: ProgramHandle) -> DriverResult<()>;

    /// `None` when the linker optimised the uniform away.
    fn uniform_location(
        &mut self,
        program: ProgramHandle,
        name: &str,
    ) -> DriverResult<Option<UniformLocation>>;

    /// `None` when the attribute is inactive.
    fn attrib_location(&mut self, program: ProgramHandle, name: &str) -> DriverResult<Option<u32>>;

    fn use_program(&mut self, program: Option<ProgramHandle>) -> DriverResult<()>;
    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) -> DriverResult<()>;

    fn is_context_lost(&self) -> bool;
}

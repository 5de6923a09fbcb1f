//! GPU program objects and the driver seam they are built through.

pub mod driver;
pub mod introspect;
#[allow(clippy::module_inception)]
pub mod program;
pub mod uniform;

pub use driver::{
    DriverError, DriverResult, GpuDriver, ProgramHandle, ShaderHandle, UniformLocation,
};
pub use program::{ApplyOutcome, Program, ProgramStatus};
pub use uniform::{SharedUniforms, UniformBlock, UniformBlockKey, UniformDescriptor, UniformValue};

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod errors;
pub mod graph;
pub mod library;
pub mod manager;
pub mod program;
pub mod settings;
pub mod state;

pub use cache::{ProgramCache, ProgramId, ProgramSources};
pub use errors::{Result, ShaderGraphError};
pub use graph::{GraphCompiler, NodeKind, NodeRegistry, ShaderSource, Stage, StageGraph, build_stage_graphs};
pub use library::ShaderLibrary;
pub use manager::{ShaderManager, SharedShaderManager};
pub use program::{
    ApplyOutcome, DriverError, GpuDriver, Program, ProgramHandle, ProgramStatus, ShaderHandle,
    UniformLocation, UniformValue,
};
pub use settings::{CompilerSettings, Precision};
pub use state::{
    Fingerprint, LightConfig, LightKind, MorphConfig, RenderStateConfig, ShadowTechnique,
    SkinningConfig, TextureUnit, VertexStreams,
};

//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`ShaderGraphError`] covers two failure families:
//! - Configuration errors: the requested graph cannot be built or lowered
//!   (conflicting variable types, vertex-only helpers used in the fragment
//!   stage, missing roots, cycles, unknown library snippets).
//! - Driver errors: the GPU context rejected a call for reasons unrelated to
//!   the generated source (context loss, resource exhaustion).
//!
//! A driver that *compiles* the source but refuses to link it is not an
//! error value: the program is marked unusable and the failure is logged (see
//! [`crate::program::ApplyOutcome`]).
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ShaderGraphError>`.
//!
//! ```rust,ignore
//! use shadegraph::errors::Result;
//!
//! fn build() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::graph::types::{GlslType, StorageClass};
use crate::program::driver::DriverError;

/// The main error type for the shader graph compiler and program cache.
#[derive(Error, Debug)]
pub enum ShaderGraphError {
    // ========================================================================
    // Graph Construction Errors
    // ========================================================================
    /// A variable name was requested twice with different types or storage.
    #[error(
        "Variable `{name}` requested as {requested_storage:?} {requested}, \
         but already exists as {existing_storage:?} {existing}"
    )]
    VariableTypeConflict {
        name: String,
        existing: GlslType,
        existing_storage: StorageClass,
        requested: GlslType,
        requested_storage: StorageClass,
    },

    /// A vertex-only graph helper was invoked while building the fragment stage.
    #[error("Vertex-only helper `{helper}` called while building the fragment stage")]
    VertexOnlyHelper { helper: &'static str },

    /// A node is missing a slot its kind requires.
    #[error("Node `{kind}` is missing required slot `{slot}`")]
    MissingSlot { kind: String, slot: String },

    /// More morph targets than the blend weights can address.
    #[error("Morph configuration has {count} targets, at most {max} are supported")]
    TooManyMorphTargets { count: u32, max: u32 },

    /// A varying is consumed by one stage with a different type than the other declares.
    #[error("Varying `{name}` is {fragment} in the fragment stage but {vertex} in the vertex stage")]
    VaryingMismatch {
        name: String,
        vertex: GlslType,
        fragment: GlslType,
    },

    // ========================================================================
    // Compilation Errors
    // ========================================================================
    /// A stage-mandatory output has no node writing it.
    #[error("Missing required root `{0}`: no node writes it")]
    MissingRoot(String),

    /// The node graph contains a dependency cycle.
    #[error("Cyclic dependency through node `{kind}` (output `{variable}`)")]
    CyclicGraph { kind: String, variable: String },

    /// A custom node kind was used without a registered lowering.
    #[error("No lowering registered for custom node kind `{0}`")]
    UnregisteredKind(String),

    /// A helper snippet is not present in the shader library.
    #[error("Shader snippet not found: {0}")]
    UnknownSnippet(String),

    /// Rendering a templated snippet failed.
    #[error("Shader template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    // ========================================================================
    // Program Errors
    // ========================================================================
    /// Two declarations in the linked sources share a name but not a type.
    #[error("Declaration `{name}` appears as both `{first}` and `{second}`")]
    DeclarationConflict {
        name: String,
        first: String,
        second: String,
    },

    /// A program id does not belong to this cache.
    #[error("Invalid program id: {0}")]
    InvalidProgramId(u32),

    // ========================================================================
    // Driver Errors
    // ========================================================================
    /// The GPU driver failed for a reason unrelated to the generated source.
    #[error("GPU driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Alias for `Result<T, ShaderGraphError>`.
pub type Result<T> = std::result::Result<T, ShaderGraphError>;

//! Compiler Settings
//!
//! Host-level knobs that shape every generated stage but are not part of the
//! render state (and therefore not part of the fingerprint). Changing them
//! means building a new [`ShaderManager`](crate::ShaderManager).
//!
//! ```rust,ignore
//! use shadegraph::{CompilerSettings, Precision};
//!
//! let settings = CompilerSettings {
//!     precision: Some(Precision::Medium),
//!     dump_source: true,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

/// Default float precision qualifier emitted at the top of each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    Low,
    Medium,
    High,
}

impl Precision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Precision::Low => "lowp",
            Precision::Medium => "mediump",
            Precision::High => "highp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// First line of every stage, usually a `#version` directive.
    pub glsl_version: Option<String>,

    /// Default float precision, `None` for desktop GLSL without qualifiers.
    pub precision: Option<Precision>,

    /// Log every generated stage at `debug` level.
    pub dump_source: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            glsl_version: Some("#version 100".to_string()),
            precision: Some(Precision::High),
            dump_source: cfg!(debug_assertions),
        }
    }
}

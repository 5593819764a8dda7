// error.rs - error types for mesh generation, rendering, sources and config

use thiserror::Error;

/// Sphere parameter validation failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("invalid sphere geometry: {0}")]
    InvalidGeometry(String),
}

/// Errors raised by [`crate::renderer::MeshRenderer`] and [`crate::texture::VideoTexture`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Shader module or pipeline creation failed. `log` holds the compiler output.
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: &'static str, log: String },

    /// The device reported an error after `call`.
    #[error("graphics error after {call}: {message}")]
    GraphicsState { call: &'static str, message: String },

    /// Lifecycle operation attempted from the wrong state.
    #[error("cannot {op} while renderer is {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    /// GPU operation issued from a thread other than the one that initialized the renderer.
    #[error("{op} called off the thread that initialized the renderer")]
    WrongThread { op: &'static str },

    #[error("frame is {actual:?}, texture expects {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("media source is empty")]
    Empty,

    #[error("bundled resource {0:?} not found")]
    ResourceNotFound(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown media format {0:?}")]
    UnknownFormat(String),
}

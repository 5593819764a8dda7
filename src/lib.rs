//! Panoramic (360°) media on a UV sphere.
//!
//! [`mesh::build_uv_sphere`] generates the geometry on any thread;
//! [`renderer::MeshRenderer`] draws it per eye with wgpu, sampling a video
//! frame texture supplied by the playback side.

pub mod camera;
pub mod config;
pub mod error;
mod gpu;
pub mod logging;
pub mod mesh;
pub mod renderer;
pub mod source;
pub mod texture;

pub use error::{ConfigError, MeshError, RenderError, SourceError};
pub use mesh::{build_uv_sphere, MediaFormat, SphereMesh, Vertex};
pub use renderer::{Eye, Lifecycle, MeshRenderer, Viewport};
pub use texture::VideoTexture;

mod common;
pub mod mesh;
mod renderer;

pub use common::{CameraParams, GL_TO_WGPU_DEPTH};
pub use mesh::Mesh;
pub use renderer::Renderer;

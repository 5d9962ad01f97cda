use glam::{Mat4, Vec4};

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    /// Projection times view, with OpenGL clip depth.
    pub view_proj: Mat4,
}

impl CameraParams {
    /// Parameters that leave vertex positions untouched.
    pub const IDENTITY: Self = Self {
        view_proj: Mat4::IDENTITY,
    };
}

/// Remaps clip depth from [-w, w] to [0, w] as wgpu expects.
pub const GL_TO_WGPU_DEPTH: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 1.0),
);

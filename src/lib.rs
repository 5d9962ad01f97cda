//! A small wgpu scene: a spinning textured cube, a flat-coloured light cube
//! and a free-fly camera steered with the keyboard and mouse.
//!
//! The camera maths, input bookkeeping, scene description and configuration
//! are plain data and can be driven without a window, which is how the
//! headless mode of the binary and the tests use them. Only [`Renderer`]
//! touches the GPU.

pub mod app;
pub mod camera;
pub mod config;
pub mod input;
pub mod render;
pub mod scene;
pub mod texture;

pub use app::{Frame, FrameClock, Viewer};
pub use camera::{Camera, CameraConfig, MoveKeys};
pub use config::{ConfigError, ViewerConfig};
pub use input::{InputSnapshot, InputState, KeyBindings, KeyCode, NamedKey};
pub use render::{CameraParams, Renderer};
pub use scene::{DrawItem, ObjectKind, Scene, SceneObject, Stage};
pub use texture::{TextureError, TextureImage, TextureSet, TextureSource};

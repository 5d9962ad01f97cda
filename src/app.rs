use std::time::Instant;

use glam::Vec3;
use log::debug;

use crate::camera::{aspect_ratio, Camera};
use crate::config::ViewerConfig;
use crate::input::InputState;
use crate::render::CameraParams;
use crate::scene::{DrawItem, Scene};

/// Monotonic frame timer; each tick returns the seconds since the last one.
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        delta
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of one frame update, ready for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub camera: CameraParams,
    pub draws: Vec<DrawItem>,
}

/// Everything one run of the viewer owns: config, camera, pending input and
/// the scene. Window and GPU state live in the renderer.
#[derive(Debug)]
pub struct Viewer {
    config: ViewerConfig,
    camera: Camera,
    input: InputState,
    scene: Scene,
    aspect: f32,
    elapsed: f32,
    frames: u64,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let start = config.start;
        let scene = Scene::new(config.scene_objects());
        let aspect = aspect_ratio(config.window.width, config.window.height);
        Self {
            camera: Camera::new(start.position, start.yaw, start.pitch),
            input: InputState::new(),
            scene,
            aspect,
            elapsed: 0.0,
            frames: 0,
            config,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Recomputes the aspect ratio; zero-sized viewports (minimized windows)
    /// keep the previous one.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = aspect_ratio(width, height);
        debug!("viewport {width}x{height}, aspect {:.3}", self.aspect);
    }

    /// Advances the simulation by `delta_time` seconds and returns what to draw.
    ///
    /// Input captured since the previous call is consumed here: the cursor
    /// delta turns the camera, held keys move it, then the current cursor
    /// becomes the reference for the next frame.
    pub fn update(&mut self, delta_time: f32) -> Frame {
        let delta_time = delta_time.max(0.0);
        let snapshot = self.input.snapshot(&self.config.bindings);
        if self.config.stage.camera_enabled() {
            let settings = self.config.camera;
            self.camera.rotate(snapshot.cursor_delta(), settings.sensitivity);
            self.camera.advance(snapshot.keys, settings.move_speed, delta_time);
        }
        self.input.end_frame();
        self.elapsed += delta_time;
        self.frames += 1;

        Frame {
            camera: self.camera_params(),
            draws: self.scene.draw_list(self.elapsed),
        }
    }

    pub fn camera_params(&self) -> CameraParams {
        if !self.config.stage.uses_projection() {
            return CameraParams::IDENTITY;
        }
        CameraParams {
            view_proj: self
                .camera
                .view_projection(self.config.camera.fov_degrees, self.aspect),
        }
    }

    /// Human readable camera pose.
    pub fn camera_summary(&self) -> String {
        let camera = &self.camera;
        format!(
            " position={} yaw={:.3} pitch={:.3}\n facing={}",
            format_vec3(camera.position()),
            tidy(camera.yaw(), 0.0005),
            tidy(camera.pitch(), 0.0005),
            format_vec3(camera.facing()),
        )
    }
}

/// Formats with two decimals, printing negative zero as zero.
pub fn format_vec3(value: Vec3) -> String {
    format!(
        "({:.2}, {:.2}, {:.2})",
        tidy(value.x, 0.005),
        tidy(value.y, 0.005),
        tidy(value.z, 0.005)
    )
}

/// Values that would round to zero at the printed precision.
fn tidy(value: f32, rounding: f32) -> f32 {
    if value.abs() < rounding {
        0.0
    } else {
        value
    }
}

use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Which version of the demo to run.
///
/// All stages share one pipeline; they differ in the default objects and in
/// whether the camera is driven by input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stage {
    /// Spinning textured triangle drawn directly in clip space.
    Transform,
    /// Rotating textured cube and light cube seen from a fixed camera.
    Perspective,
    /// Same scene as `Perspective` with a free-fly camera.
    #[default]
    FlyCamera,
}

impl Stage {
    pub fn camera_enabled(self) -> bool {
        matches!(self, Stage::FlyCamera)
    }

    /// Whether draws go through the camera's view-projection at all.
    pub fn uses_projection(self) -> bool {
        !matches!(self, Stage::Transform)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Transform => "transform",
            Stage::Perspective => "perspective",
            Stage::FlyCamera => "fly-camera",
        }
    }

    pub fn default_objects(self) -> Vec<SceneObject> {
        match self {
            Stage::Transform => vec![SceneObject {
                name: "triangle".to_string(),
                kind: ObjectKind::TexturedTriangle,
                position: Vec3::new(0.5, -0.5, 0.0),
                spin: Some(Spin {
                    axis: Vec3::Z,
                    degrees_per_second: 1.0f32.to_degrees(),
                }),
                ..SceneObject::default()
            }],
            Stage::Perspective | Stage::FlyCamera => vec![
                SceneObject {
                    name: "container".to_string(),
                    kind: ObjectKind::TexturedCube,
                    spin: Some(Spin {
                        axis: Vec3::new(0.5, 1.0, 0.0),
                        degrees_per_second: 50.0,
                    }),
                    ..SceneObject::default()
                },
                SceneObject {
                    name: "lamp".to_string(),
                    kind: ObjectKind::LightCube,
                    position: Vec3::new(1.2, 1.0, 2.0),
                    scale: Vec3::splat(0.2),
                    ..SceneObject::default()
                },
            ],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transform" => Ok(Stage::Transform),
            "perspective" => Ok(Stage::Perspective),
            "fly-camera" | "fly_camera" | "camera" => Ok(Stage::FlyCamera),
            other => Err(format!(
                "unknown stage `{other}` (expected transform, perspective or fly-camera)"
            )),
        }
    }
}

/// Geometry and shading used for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectKind {
    TexturedTriangle,
    #[default]
    TexturedCube,
    /// Untextured cube filled with its flat colour.
    LightCube,
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::TexturedTriangle => "textured-triangle",
            ObjectKind::TexturedCube => "textured-cube",
            ObjectKind::LightCube => "light-cube",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "textured-triangle" | "triangle" => Some(ObjectKind::TexturedTriangle),
            "textured-cube" | "cube" => Some(ObjectKind::TexturedCube),
            "light-cube" | "light" => Some(ObjectKind::LightCube),
            _ => None,
        }
    }

    pub fn mesh(self) -> MeshKind {
        match self {
            ObjectKind::TexturedTriangle => MeshKind::Triangle,
            ObjectKind::TexturedCube | ObjectKind::LightCube => MeshKind::Cube,
        }
    }

    pub fn textured(self) -> bool {
        !matches!(self, ObjectKind::LightCube)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshKind {
    Triangle,
    Cube,
}

/// Constant rotation about an axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spin {
    pub axis: Vec3,
    pub degrees_per_second: f32,
}

impl Spin {
    fn rotation(&self, elapsed: f32) -> Mat4 {
        match self.axis.try_normalize() {
            Some(axis) => {
                Mat4::from_axis_angle(axis, (self.degrees_per_second * elapsed).to_radians())
            }
            None => Mat4::IDENTITY,
        }
    }
}

/// Renderable object; owns its model transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub position: Vec3,
    pub scale: Vec3,
    pub color: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin: Option<Spin>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: ObjectKind::default(),
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            color: Vec3::ONE,
            spin: None,
        }
    }
}

impl SceneObject {
    pub fn model_matrix(&self, elapsed: f32) -> Mat4 {
        let rotation = self
            .spin
            .as_ref()
            .map_or(Mat4::IDENTITY, |spin| spin.rotation(elapsed));
        Mat4::from_translation(self.position) * rotation * Mat4::from_scale(self.scale)
    }
}

/// Everything the renderer needs to draw one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshKind,
    pub model: Mat4,
    pub color: Vec3,
    pub textured: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new(objects: Vec<SceneObject>) -> Self {
        Self { objects }
    }

    pub fn draw_list(&self, elapsed: f32) -> Vec<DrawItem> {
        self.objects
            .iter()
            .map(|object| DrawItem {
                mesh: object.kind.mesh(),
                model: object.model_matrix(elapsed),
                color: object.color,
                textured: object.kind.textured(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_names() {
        assert_eq!("transform".parse::<Stage>(), Ok(Stage::Transform));
        assert_eq!("Perspective".parse::<Stage>(), Ok(Stage::Perspective));
        assert_eq!("fly-camera".parse::<Stage>(), Ok(Stage::FlyCamera));
        assert!("orbit".parse::<Stage>().is_err());
    }

    #[test]
    fn only_fly_camera_stage_reads_input() {
        assert!(Stage::FlyCamera.camera_enabled());
        assert!(!Stage::Perspective.camera_enabled());
        assert!(!Stage::Transform.camera_enabled());
        assert!(!Stage::Transform.uses_projection());
    }

    #[test]
    fn perspective_scene_has_textured_and_light_cubes() {
        let objects = Stage::Perspective.default_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].kind, ObjectKind::TexturedCube);
        assert_eq!(objects[1].kind, ObjectKind::LightCube);
        assert!(objects[1].spin.is_none());
    }

    #[test]
    fn static_object_model_is_constant() {
        let lamp = SceneObject {
            position: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::splat(0.5),
            ..SceneObject::default()
        };
        assert_eq!(lamp.model_matrix(0.0), lamp.model_matrix(10.0));
        let corner = lamp.model_matrix(4.0).transform_point3(Vec3::ONE);
        assert!(corner.abs_diff_eq(Vec3::new(1.5, 2.5, 3.5), 1e-6));
    }

    #[test]
    fn triangle_spins_one_radian_per_second() {
        let triangle = Stage::Transform.default_objects().remove(0);
        let model = triangle.model_matrix(std::f32::consts::FRAC_PI_2);
        let moved = model.transform_point3(Vec3::X);
        assert!(moved.abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-5), "{moved:?}");
    }

    #[test]
    fn zero_spin_axis_does_not_produce_nan() {
        let object = SceneObject {
            spin: Some(Spin {
                axis: Vec3::ZERO,
                degrees_per_second: 90.0,
            }),
            ..SceneObject::default()
        };
        assert_eq!(object.model_matrix(3.0), Mat4::IDENTITY);
    }

    #[test]
    fn draw_list_follows_object_kinds() {
        let scene = Scene::new(Stage::FlyCamera.default_objects());
        let draws = scene.draw_list(1.0);
        assert_eq!(draws.len(), 2);
        assert!(draws[0].textured);
        assert_eq!(draws[1].mesh, MeshKind::Cube);
        assert!(!draws[1].textured);
    }
}

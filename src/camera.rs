use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Pitch limit in radians, just short of a quarter turn so the camera never
/// flips over the poles.
pub const PITCH_LIMIT: f32 = 1.5533;

pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

const WORLD_UP: Vec3 = Vec3::Y;

/// Tunables read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Radians of rotation per pixel of cursor motion.
    pub sensitivity: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.002,
            move_speed: 2.5,
            fov_degrees: 70.0,
        }
    }
}

/// Directional key state for a single frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

/// First-person camera pose.
///
/// Only `position`, `yaw` and `pitch` are state. The facing vector is cached
/// but always recomputed from the two angles, never integrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    facing: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), 0.0, 0.0)
    }
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let pitch = clamp_pitch(pitch);
        Self {
            position,
            yaw,
            pitch,
            facing: facing_from_angles(yaw, pitch),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn facing(&self) -> Vec3 {
        self.facing
    }

    /// Applies a cursor delta in pixels to the yaw and pitch angles.
    ///
    /// Non-finite deltas are ignored so the pitch always stays clamped.
    pub fn rotate(&mut self, cursor_delta: Vec2, sensitivity: f32) {
        if !(cursor_delta * sensitivity).is_finite() {
            return;
        }
        self.yaw += sensitivity * cursor_delta.x;
        self.pitch = clamp_pitch(self.pitch + sensitivity * cursor_delta.y);
        self.facing = facing_from_angles(self.yaw, self.pitch);
    }

    /// Unit vector pointing to the camera's left along the ground plane.
    ///
    /// This is `cross(up, facing)`. When the facing vector is too close to
    /// vertical for the cross product to normalize, the yaw-only limit of the
    /// same vector is used instead.
    pub fn left(&self) -> Vec3 {
        let mut left = WORLD_UP.cross(self.facing);
        left.y = 0.0;
        left.try_normalize()
            .unwrap_or_else(|| Vec3::new(-self.yaw.cos(), 0.0, -self.yaw.sin()))
    }

    /// Moves the camera along the pressed directions for `delta_time` seconds.
    ///
    /// Opposing keys cancel exactly and leave the position untouched; diagonal
    /// motion is normalized so it is no faster than a single direction.
    pub fn advance(&mut self, keys: MoveKeys, move_speed: f32, delta_time: f32) {
        let direction = self.move_direction(keys);
        let Some(direction) = direction.try_normalize() else {
            return;
        };
        self.position += direction * move_speed * delta_time;
    }

    fn move_direction(&self, keys: MoveKeys) -> Vec3 {
        let left = self.left();
        let mut direction = Vec3::ZERO;
        if keys.forward {
            direction += self.facing;
        }
        if keys.backward {
            direction -= self.facing;
        }
        if keys.left {
            direction += left;
        }
        if keys.right {
            direction -= left;
        }
        direction
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.facing, WORLD_UP)
    }

    pub fn view_projection(&self, fov_degrees: f32, aspect: f32) -> Mat4 {
        projection_matrix(fov_degrees, aspect) * self.view_matrix()
    }
}

/// Unit facing vector for the given angles, looking down -Z at yaw = pitch = 0.
pub fn facing_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    Vec3::new(sin_yaw * cos_pitch, -sin_pitch, -cos_yaw * cos_pitch).normalize()
}

pub fn clamp_pitch(pitch: f32) -> f32 {
    pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT)
}

/// Right-handed perspective projection with OpenGL clip depth.
pub fn projection_matrix(fov_degrees: f32, aspect: f32) -> Mat4 {
    Mat4::perspective_rh_gl(
        fov_degrees.to_radians(),
        aspect.max(0.01),
        NEAR_PLANE,
        FAR_PLANE,
    )
}

/// Aspect ratio for a viewport, treating a zero height as square.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_vec3_near(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, EPSILON),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn default_orientation_looks_down_negative_z() {
        assert_vec3_near(facing_from_angles(0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        let camera = Camera::default();
        assert_vec3_near(camera.facing(), Vec3::NEG_Z);
    }

    #[test]
    fn pitch_stays_clamped_under_large_accumulation() {
        let mut camera = Camera::default();
        for _ in 0..1_000 {
            camera.rotate(Vec2::new(0.0, 10_000.0), 0.01);
            assert!(camera.pitch() <= PITCH_LIMIT);
        }
        assert_eq!(camera.pitch(), PITCH_LIMIT);

        for _ in 0..1_000 {
            camera.rotate(Vec2::new(0.0, -10_000.0), 0.01);
            assert!(camera.pitch() >= -PITCH_LIMIT);
        }
        assert_eq!(camera.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn constructor_clamps_pitch() {
        let camera = Camera::new(Vec3::ZERO, 0.0, 3.0);
        assert_eq!(camera.pitch(), PITCH_LIMIT);
    }

    #[test]
    fn facing_is_unit_length_across_valid_range() {
        let steps = 24;
        for yaw_step in 0..=steps {
            let yaw = -10.0 + 20.0 * yaw_step as f32 / steps as f32;
            for pitch_step in 0..=steps {
                let pitch = -PITCH_LIMIT + 2.0 * PITCH_LIMIT * pitch_step as f32 / steps as f32;
                let facing = facing_from_angles(yaw, pitch);
                assert!((facing.length() - 1.0).abs() < EPSILON, "{yaw} {pitch}");
            }
        }
    }

    #[test]
    fn positive_cursor_y_looks_down() {
        let mut camera = Camera::default();
        camera.rotate(Vec2::new(0.0, 100.0), 0.002);
        assert!(camera.facing().y < 0.0);
    }

    #[test]
    fn zero_delta_leaves_angles_unchanged() {
        let mut camera = Camera::new(Vec3::ZERO, 0.7, -0.3);
        camera.rotate(Vec2::ZERO, 0.5);
        assert_eq!(camera.yaw(), 0.7);
        assert_eq!(camera.pitch(), -0.3);
    }

    #[test]
    fn non_finite_delta_keeps_pitch_clamped() {
        let mut camera = Camera::new(Vec3::ZERO, 0.7, -0.3);
        camera.rotate(Vec2::new(0.0, f32::NAN), 0.002);
        camera.rotate(Vec2::new(f32::INFINITY, 0.0), 0.002);
        assert_eq!(camera.yaw(), 0.7);
        assert_eq!(camera.pitch(), -0.3);
        assert!(camera.facing().is_finite());
    }

    #[test]
    fn no_keys_means_no_motion() {
        let mut camera = Camera::new(Vec3::new(1.0, 2.0, 3.0), 0.4, 0.2);
        for dt in [0.0, 0.016, 1.0, 250.0] {
            camera.advance(MoveKeys::default(), 5.0, dt);
        }
        assert_eq!(camera.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn forward_moves_one_unit_down_negative_z() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0);
        let keys = MoveKeys {
            forward: true,
            ..MoveKeys::default()
        };
        camera.advance(keys, 1.0, 1.0);
        assert_vec3_near(camera.position(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn opposing_keys_cancel_without_nan() {
        let start = Vec3::new(0.5, 0.5, 0.5);
        let mut camera = Camera::new(start, 1.1, 0.3);
        let keys = MoveKeys {
            forward: true,
            backward: true,
            ..MoveKeys::default()
        };
        camera.advance(keys, 3.0, 0.5);
        assert_eq!(camera.position(), start);

        let keys = MoveKeys {
            left: true,
            right: true,
            ..MoveKeys::default()
        };
        camera.advance(keys, 3.0, 0.5);
        assert_eq!(camera.position(), start);
        assert!(camera.position().is_finite());
    }

    #[test]
    fn left_key_strafes_toward_negative_x() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0);
        let keys = MoveKeys {
            left: true,
            ..MoveKeys::default()
        };
        camera.advance(keys, 1.0, 1.0);
        assert_vec3_near(camera.position(), Vec3::new(-1.0, 0.0, 0.0));

        let keys = MoveKeys {
            right: true,
            ..MoveKeys::default()
        };
        camera.advance(keys, 2.0, 1.0);
        assert_vec3_near(camera.position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn diagonal_motion_is_normalized() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0);
        let keys = MoveKeys {
            forward: true,
            left: true,
            ..MoveKeys::default()
        };
        camera.advance(keys, 1.0, 1.0);
        assert!((camera.position().length() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn strafing_stays_on_ground_plane_when_pitched() {
        let mut camera = Camera::new(Vec3::ZERO, 0.3, PITCH_LIMIT);
        let keys = MoveKeys {
            right: true,
            ..MoveKeys::default()
        };
        camera.advance(keys, 1.0, 1.0);
        assert_eq!(camera.position().y, 0.0);
        assert!((camera.position().length() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn left_vector_matches_yaw_limit_at_pitch_extremes() {
        for pitch in [PITCH_LIMIT, -PITCH_LIMIT] {
            let camera = Camera::new(Vec3::ZERO, 0.8, pitch);
            let expected = Vec3::new(-0.8f32.cos(), 0.0, -0.8f32.sin());
            assert_vec3_near(camera.left(), expected);
        }
    }

    #[test]
    fn view_matrix_maps_target_onto_negative_z_axis() {
        let camera = Camera::new(Vec3::new(2.0, 1.0, 5.0), 0.5, 0.25);
        let target = camera.position() + camera.facing() * 4.0;
        let eye_space = camera.view_matrix().transform_point3(target);
        assert_vec3_near(eye_space, Vec3::new(0.0, 0.0, -4.0));
    }

    #[test]
    fn projection_matches_reference_coefficients() {
        let fov = 70.0f32.to_radians();
        let aspect = 16.0 / 9.0;
        let f = 1.0 / (fov / 2.0).tan();
        let expected = Mat4::from_cols_array(&[
            f / aspect,
            0.0,
            0.0,
            0.0,
            0.0,
            f,
            0.0,
            0.0,
            0.0,
            0.0,
            (FAR_PLANE + NEAR_PLANE) / (NEAR_PLANE - FAR_PLANE),
            -1.0,
            0.0,
            0.0,
            2.0 * FAR_PLANE * NEAR_PLANE / (NEAR_PLANE - FAR_PLANE),
            0.0,
        ]);
        let actual = projection_matrix(70.0, aspect);
        assert!(actual.abs_diff_eq(expected, EPSILON), "{actual:?}");
        assert!((actual.col(1).y - 1.428_148).abs() < 1e-4);
    }

    #[test]
    fn aspect_ratio_handles_zero_height() {
        assert_eq!(aspect_ratio(1600, 900), 1600.0 / 900.0);
        assert_eq!(aspect_ratio(640, 0), 1.0);
    }
}

//! First-person camera and projection.
//!
//! The camera keeps a yaw/pitch pair instead of a free quaternion: yaw turns
//! about -Y and is applied after pitch about +X, which keeps the horizon
//! level. Movement is in camera space and applied once per [`Camera::update`].

use glam::{Mat4, Quat, Vec3};

/// Radians of rotation per pixel of mouse motion.
const LOOK_SENSITIVITY: f32 = 1.0 / 200.0;
/// World units moved per update at unit velocity.
const MOVE_SPEED: f32 = 0.1;

/// Default vertical field of view in degrees.
pub const DEFAULT_FOV_Y_DEGREES: f32 = 70.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 10_000.0;

/// Movement keys understood by the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraKey {
    Forward,
    Backward,
    Left,
    Right,
}

#[derive(Clone, Debug, Default)]
pub struct Camera {
    pub velocity: Vec3,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    looking: bool,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// `yaw(-Y) * pitch(+X)`.
    pub fn rotation_matrix(&self) -> Mat4 {
        let pitch = Quat::from_axis_angle(Vec3::X, self.pitch);
        let yaw = Quat::from_axis_angle(Vec3::NEG_Y, self.yaw);
        Mat4::from_quat(yaw) * Mat4::from_quat(pitch)
    }

    /// Inverse of the camera's own translation and rotation.
    pub fn view_matrix(&self) -> Mat4 {
        (Mat4::from_translation(self.position) * self.rotation_matrix()).inverse()
    }

    /// Moves along the current velocity, rotated into world space.
    pub fn update(&mut self) {
        let step = self.rotation_matrix() * (self.velocity * MOVE_SPEED).extend(0.0);
        self.position += step.truncate();
    }

    /// Sets or clears the velocity component a key controls.
    pub fn process_key(&mut self, key: CameraKey, pressed: bool) {
        match (key, pressed) {
            (CameraKey::Forward, true) => self.velocity.z = -1.0,
            (CameraKey::Backward, true) => self.velocity.z = 1.0,
            (CameraKey::Left, true) => self.velocity.x = -1.0,
            (CameraKey::Right, true) => self.velocity.x = 1.0,
            (CameraKey::Forward | CameraKey::Backward, false) => self.velocity.z = 0.0,
            (CameraKey::Left | CameraKey::Right, false) => self.velocity.x = 0.0,
        }
    }

    /// Mouse look is active while the look button is held.
    pub fn set_looking(&mut self, looking: bool) {
        self.looking = looking;
    }

    pub fn is_looking(&self) -> bool {
        self.looking
    }

    /// Applies a relative mouse motion in pixels while looking.
    pub fn process_mouse_motion(&mut self, dx: f32, dy: f32) {
        if self.looking {
            self.yaw += dx * LOOK_SENSITIVITY;
            self.pitch -= dy * LOOK_SENSITIVITY;
        }
    }
}

/// Reversed-Z perspective projection with Y flipped for Vulkan.
///
/// The near plane maps to depth 1 and the far plane to 0, so geometry is
/// depth-tested with `GREATER_OR_EQUAL` against a buffer cleared to 0.
pub fn perspective(fov_y_degrees: f32, aspect: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, FAR_PLANE, NEAR_PLANE);
    proj.y_axis.y *= -1.0;
    proj
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn assert_vec3_near(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a:?} != {b:?}");
    }

    #[test]
    fn test_identity_rotation_at_rest() {
        let camera = Camera::default();
        assert_eq!(camera.rotation_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_view_moves_world_opposite_to_camera() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert_vec3_near(origin, Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_forward_moves_along_negative_z() {
        let mut camera = Camera::default();
        camera.process_key(CameraKey::Forward, true);
        camera.update();
        assert_vec3_near(camera.position, Vec3::new(0.0, 0.0, -0.1));

        camera.process_key(CameraKey::Forward, false);
        camera.update();
        assert_vec3_near(camera.position, Vec3::new(0.0, 0.0, -0.1));
    }

    #[test]
    fn test_yaw_turns_forward_to_the_right() {
        let mut camera = Camera::default();
        camera.yaw = std::f32::consts::FRAC_PI_2;
        let forward = camera.rotation_matrix() * Vec4::new(0.0, 0.0, -1.0, 0.0);
        assert_vec3_near(forward.truncate(), Vec3::X);
    }

    #[test]
    fn test_mouse_look_requires_button() {
        let mut camera = Camera::default();
        camera.process_mouse_motion(200.0, 100.0);
        assert_eq!((camera.yaw, camera.pitch), (0.0, 0.0));

        camera.set_looking(true);
        camera.process_mouse_motion(200.0, 100.0);
        assert!((camera.yaw - 1.0).abs() < 1e-6);
        assert!((camera.pitch + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_perspective_is_reversed_z() {
        let proj = perspective(DEFAULT_FOV_Y_DEGREES, 16.0 / 9.0);
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -NEAR_PLANE));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -FAR_PLANE));
        assert!((near.z - 1.0).abs() < 1e-4);
        assert!(far.z.abs() < 1e-4);

        let up = proj.project_point3(Vec3::new(0.0, 1.0, -5.0));
        assert!(up.y < 0.0);
    }
}

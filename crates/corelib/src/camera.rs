use crate::{Mat4, Vec2, Vec3};

/// Fixed perspective projection (right-handed, OpenGL clip space: z in [-1,1]).
///
/// The picker and the renderer both build their matrices from this type, so
/// the projected bounding boxes always line up with what is on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Projection {
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_y_deg.to_radians(),
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_deg: 45.0,
            aspect: 1.0,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

/// Discrete camera translations bound to keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMove {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Camera described by two rotations (degrees) applied around the world
/// origin and a translation. `distance` is added on top of `position.z`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitCamera {
    pub rotation_x_deg: f32,
    pub rotation_y_deg: f32,
    pub position: Vec3,
    pub distance: f32,
}

impl OrbitCamera {
    pub const MOVE_STEP: f32 = 0.1;

    /// View = Rx * Ry * T(-(x, y, distance + z)).
    #[inline]
    pub fn view(&self) -> Mat4 {
        let eye = Vec3::new(
            self.position.x,
            self.position.y,
            self.distance + self.position.z,
        );
        Mat4::from_rotation_x(self.rotation_x_deg.to_radians())
            * Mat4::from_rotation_y(self.rotation_y_deg.to_radians())
            * Mat4::from_translation(-eye)
    }

    pub fn translate(&mut self, mv: CameraMove) {
        let step = Self::MOVE_STEP;
        match mv {
            CameraMove::Forward => self.position.z -= step,
            CameraMove::Backward => self.position.z += step,
            CameraMove::Left => self.position.x -= step,
            CameraMove::Right => self.position.x += step,
            CameraMove::Up => self.position.y += step,
            CameraMove::Down => self.position.y -= step,
        }
    }

    /// Orbit from a pointer drag (same axis mapping as object rotation).
    #[inline]
    pub fn apply_drag(&mut self, delta: Vec2, sensitivity: f32) {
        self.rotation_y_deg += delta.x * sensitivity;
        self.rotation_x_deg += delta.y * sensitivity;
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            rotation_x_deg: 63.5,
            rotation_y_deg: 38.5,
            position: Vec3::new(-7.2, 20.0, 1.3),
            distance: 5.0,
        }
    }
}

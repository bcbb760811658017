use crate::{Mat4, Vec2};

/// Accumulated object rotation about the local X and Y axes, in degrees.
/// Unbounded: drags keep adding to it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ObjectRotation {
    pub x_deg: f32,
    pub y_deg: f32,
}

impl ObjectRotation {
    #[inline]
    pub const fn new(x_deg: f32, y_deg: f32) -> Self {
        Self { x_deg, y_deg }
    }

    /// Model matrix = Rx * Ry (rotate about X, then Y, post-multiplied).
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_x(self.x_deg.to_radians()) * Mat4::from_rotation_y(self.y_deg.to_radians())
    }

    /// Apply a pointer drag: horizontal motion spins about Y, vertical about X.
    #[inline]
    pub fn apply_drag(&mut self, delta: Vec2, sensitivity: f32) {
        self.y_deg += delta.x * sensitivity;
        self.x_deg += delta.y * sensitivity;
    }
}

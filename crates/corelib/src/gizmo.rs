//! World-space coordinate axes drawn as three line segments from the origin.

use crate::VERTEX_STRIDE;

pub const AXIS_LENGTH: f32 = 40.0;

/// Line colors for X, Y and Z, matching the segment order of [`axis_lines`].
pub const AXIS_COLORS: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Six records (origin, tip) per axis in X, Y, Z order.
pub fn axis_lines(length: f32) -> Vec<[f32; VERTEX_STRIDE]> {
    (0..3)
        .flat_map(|axis| {
            let mut tip = [0.0; VERTEX_STRIDE];
            tip[axis] = length;
            [[0.0; VERTEX_STRIDE], tip]
        })
        .collect()
}

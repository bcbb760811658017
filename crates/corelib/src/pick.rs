//! Screen-space object picking against projected bounding boxes.
//!
//! Each candidate's 8 box corners are pushed through `proj * view * model`
//! and divided by w; the cursor hits an object when it falls inside the 2D
//! envelope of those points (bounds inclusive). Overlaps are resolved by the
//! device-space depth of each box center, nearest first.

use crate::bounds::BoundingBox;
use crate::scene::ObjectId;
use crate::{Mat4, UVec2, Vec2, Vec3};

/// Everything the picker needs to know about one object.
#[derive(Clone, Copy, Debug)]
pub struct PickTarget {
    pub id: ObjectId,
    pub model: Mat4,
    pub bounds: BoundingBox,
}

/// Axis-aligned rectangle in device space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl ScreenRect {
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Pixel position (origin top-left, y down) to device space [-1,1]^2 (y up).
/// `None` for a zero-sized screen.
pub fn cursor_to_device(cursor: Vec2, screen: UVec2) -> Option<Vec2> {
    if screen.x == 0 || screen.y == 0 {
        return None;
    }
    let half = screen.as_vec2() * 0.5;
    Some(Vec2::new(
        (cursor.x - half.x) / half.x,
        (half.y - cursor.y) / half.y,
    ))
}

#[inline]
fn project(mvp: Mat4, p: Vec3) -> Vec3 {
    let clip = mvp * p.extend(1.0);
    clip.truncate() / clip.w
}

/// 2D envelope of the projected box corners.
pub fn project_bounds(mvp: Mat4, bounds: &BoundingBox) -> ScreenRect {
    bounds.corners().into_iter().map(|c| project(mvp, c).truncate()).fold(
        ScreenRect {
            min: Vec2::splat(f32::INFINITY),
            max: Vec2::splat(f32::NEG_INFINITY),
        },
        |r, p| ScreenRect {
            min: r.min.min(p),
            max: r.max.max(p),
        },
    )
}

/// Device-space depth (post-divide z) of the box center.
pub fn center_depth(mvp: Mat4, bounds: &BoundingBox) -> f32 {
    project(mvp, bounds.center()).z
}

/// Resolve a click to an object. Pure: same inputs, same answer.
pub fn pick(
    cursor: Vec2,
    screen: UVec2,
    proj_view: Mat4,
    targets: &[PickTarget],
) -> Option<ObjectId> {
    let ndc = cursor_to_device(cursor, screen)?;

    let hits: Vec<&PickTarget> = targets
        .iter()
        .filter(|t| project_bounds(proj_view * t.model, &t.bounds).contains(ndc))
        .collect();

    match hits.as_slice() {
        [] => {
            log::debug!("pick at ({:.3}, {:.3}): empty space", ndc.x, ndc.y);
            None
        }
        [only] => {
            log::debug!("pick at ({:.3}, {:.3}): {:?}", ndc.x, ndc.y, only.id);
            Some(only.id)
        }
        _ => {
            let mut best: Option<(ObjectId, f32)> = None;
            for t in &hits {
                let depth = center_depth(proj_view * t.model, &t.bounds);
                // Later targets win ties.
                match best {
                    Some((_, best_depth)) if !(depth <= best_depth) => {}
                    _ => best = Some((t.id, depth)),
                }
            }
            if let Some((id, depth)) = best {
                log::debug!(
                    "pick at ({:.3}, {:.3}): {:?} (closer, depth {:.4})",
                    ndc.x,
                    ndc.y,
                    id,
                    depth
                );
            }
            best.map(|(id, _)| id)
        }
    }
}

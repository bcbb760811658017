//! Interactive scene state: two pickable objects, an orbit camera and the
//! drag in progress. Owned by the event loop and mutated only by its
//! pointer/key handlers; the renderer and the picker read from it.

use crate::bounds::BoundingBox;
use crate::camera::{CameraMove, OrbitCamera, Projection};
use crate::pick::{self, PickTarget};
use crate::transform::ObjectRotation;
use crate::{Mat4, UVec2, Vec2};

/// Degrees of rotation per pixel of pointer motion.
pub const DRAG_SENSITIVITY: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Cube,
    PiggyBank,
}

impl ObjectId {
    pub const ALL: [ObjectId; 2] = [ObjectId::Cube, ObjectId::PiggyBank];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ObjectId::Cube => 0,
            ObjectId::PiggyBank => 1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SceneObject {
    pub id: ObjectId,
    pub rotation: ObjectRotation,
    /// `None` until the object's mesh loads; such objects are never picked.
    pub bounds: Option<BoundingBox>,
}

/// Drag started by a pointer press. The selection is fixed for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Drag {
    pub last_cursor: Vec2,
    pub selected: Option<ObjectId>,
}

#[derive(Clone, Debug)]
pub struct SceneState {
    pub camera: OrbitCamera,
    pub projection: Projection,
    pub objects: [SceneObject; 2],
    drag: Option<Drag>,
}

impl SceneState {
    pub fn new(camera: OrbitCamera, projection: Projection) -> Self {
        Self {
            camera,
            projection,
            objects: ObjectId::ALL.map(|id| SceneObject {
                id,
                rotation: ObjectRotation::default(),
                bounds: None,
            }),
            drag: None,
        }
    }

    #[inline]
    pub fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[id.index()]
    }

    #[inline]
    pub fn object_mut(&mut self, id: ObjectId) -> &mut SceneObject {
        &mut self.objects[id.index()]
    }

    pub fn set_bounds(&mut self, id: ObjectId, bounds: Option<BoundingBox>) {
        self.object_mut(id).bounds = bounds;
    }

    /// Projection * view; shared by rendering and picking.
    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.projection.matrix() * self.camera.view()
    }

    #[inline]
    pub fn model_matrix(&self, id: ObjectId) -> Mat4 {
        self.object(id).rotation.matrix()
    }

    pub fn pick_targets(&self) -> Vec<PickTarget> {
        self.objects
            .iter()
            .filter_map(|o| {
                o.bounds.map(|bounds| PickTarget {
                    id: o.id,
                    model: o.rotation.matrix(),
                    bounds,
                })
            })
            .collect()
    }

    pub fn pick(&self, cursor: Vec2, screen: UVec2) -> Option<ObjectId> {
        pick::pick(cursor, screen, self.proj_view(), &self.pick_targets())
    }

    /// Currently grabbed object, if a drag is active.
    #[inline]
    pub fn selected(&self) -> Option<ObjectId> {
        self.drag.and_then(|d| d.selected)
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Pick against the current snapshot and begin a drag.
    pub fn pointer_down(&mut self, cursor: Vec2, screen: UVec2) -> Option<ObjectId> {
        let selected = self.pick(cursor, screen);
        match selected {
            Some(id) => log::info!("Selected {:?}", id),
            None => log::info!("Clicked on empty space"),
        }
        self.drag = Some(Drag {
            last_cursor: cursor,
            selected,
        });
        selected
    }

    /// Rotate the grabbed object, or orbit the camera when nothing was
    /// grabbed. Ignored outside a drag.
    pub fn pointer_move(&mut self, cursor: Vec2) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let delta = cursor - drag.last_cursor;
        drag.last_cursor = cursor;

        match drag.selected {
            Some(id) => {
                let rotation = &mut self.objects[id.index()].rotation;
                rotation.apply_drag(delta, DRAG_SENSITIVITY);
                log::trace!("Rotating {:?}: X={:.1}, Y={:.1}", id, rotation.x_deg, rotation.y_deg);
            }
            None => {
                self.camera.apply_drag(delta, DRAG_SENSITIVITY);
                log::trace!(
                    "Rotating camera: X={:.1}, Y={:.1}",
                    self.camera.rotation_x_deg,
                    self.camera.rotation_y_deg
                );
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn key(&mut self, mv: CameraMove) {
        self.camera.translate(mv);
        log::trace!("Camera position: {:?}", self.camera.position);
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new(OrbitCamera::default(), Projection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vec3;

    const SCREEN: UVec2 = UVec2::new(480, 480);

    /// Scene looking straight down -Z at the origin with the cube loaded.
    fn scene_with_cube() -> SceneState {
        let camera = OrbitCamera {
            rotation_x_deg: 0.0,
            rotation_y_deg: 0.0,
            position: Vec3::ZERO,
            distance: 5.0,
        };
        let mut scene = SceneState::new(camera, Projection::default());
        scene.set_bounds(
            ObjectId::Cube,
            Some(BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0))),
        );
        scene
    }

    #[test]
    fn drag_on_object_rotates_only_that_object() {
        let mut scene = scene_with_cube();
        let camera_before = scene.camera;
        assert_eq!(scene.pointer_down(Vec2::new(240.0, 240.0), SCREEN), Some(ObjectId::Cube));
        scene.pointer_move(Vec2::new(250.0, 236.0));
        scene.pointer_move(Vec2::new(260.0, 236.0));
        let cube = scene.object(ObjectId::Cube).rotation;
        assert_eq!(cube, ObjectRotation::new(-2.0, 10.0));
        assert_eq!(scene.object(ObjectId::PiggyBank).rotation, ObjectRotation::default());
        assert_eq!(scene.camera, camera_before);
    }

    #[test]
    fn drag_on_empty_space_orbits_camera() {
        let mut scene = scene_with_cube();
        assert_eq!(scene.pointer_down(Vec2::new(5.0, 5.0), SCREEN), None);
        assert!(scene.is_dragging());
        scene.pointer_move(Vec2::new(25.0, 15.0));
        assert_eq!(scene.camera.rotation_y_deg, 10.0);
        assert_eq!(scene.camera.rotation_x_deg, 5.0);
        assert_eq!(scene.object(ObjectId::Cube).rotation, ObjectRotation::default());
    }

    #[test]
    fn selection_is_not_repicked_during_drag() {
        let mut scene = scene_with_cube();
        scene.pointer_down(Vec2::new(240.0, 240.0), SCREEN);
        // Moving far outside the object keeps rotating the object.
        scene.pointer_move(Vec2::new(2.0, 2.0));
        scene.pointer_move(Vec2::new(0.0, 0.0));
        assert_eq!(scene.selected(), Some(ObjectId::Cube));
        assert_eq!(scene.camera.rotation_y_deg, 0.0);
    }

    #[test]
    fn release_clears_selection_and_stops_rotation() {
        let mut scene = scene_with_cube();
        scene.pointer_down(Vec2::new(240.0, 240.0), SCREEN);
        scene.pointer_up();
        assert_eq!(scene.selected(), None);
        assert!(!scene.is_dragging());
        scene.pointer_move(Vec2::new(400.0, 400.0));
        assert_eq!(scene.object(ObjectId::Cube).rotation, ObjectRotation::default());
        assert_eq!(scene.camera.rotation_x_deg, 0.0);
    }

    #[test]
    fn objects_without_bounds_are_not_pickable() {
        let mut scene = scene_with_cube();
        scene.set_bounds(ObjectId::Cube, None);
        assert!(scene.pick_targets().is_empty());
        assert_eq!(scene.pointer_down(Vec2::new(240.0, 240.0), SCREEN), None);
    }

    #[test]
    fn keys_translate_camera() {
        let mut scene = SceneState::default();
        let start = scene.camera.position;
        scene.key(CameraMove::Left);
        scene.key(CameraMove::Down);
        let d = scene.camera.position - start;
        assert!((d - Vec3::new(-0.1, -0.1, 0.0)).length() < 1e-5);
    }
}

//! Camera component and the exclusive-active invariant.
//!
//! Any number of entities may carry a [`Camera`]; at most one is *active*.
//! Activating a camera clears the previous holder's flag, so the renderer
//! contract ([`CameraSystem::view_projection`]) always has a single
//! unambiguous viewpoint.

use glam::Mat4;
use magpie_ecs::{ComponentStore, EntityId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::transform::TransformSystem;
use crate::EngineError;

/// Default vertical field of view, degrees.
pub const DEFAULT_FOV_Y_DEGREES: f32 = 90.0;
/// Default aspect ratio (16:9).
pub const DEFAULT_ASPECT: f32 = 16.0 / 9.0;
/// Default near plane.
pub const DEFAULT_NEAR: f32 = 0.1;
/// Default far plane.
pub const DEFAULT_FAR: f32 = 1000.0;

// ---------------------------------------------------------------------------
// Projection & Camera
// ---------------------------------------------------------------------------

/// Projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        fov_y_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        half_width: f32,
        half_height: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    /// Standard perspective defaults.
    pub fn perspective() -> Self {
        Self::Perspective {
            fov_y_degrees: DEFAULT_FOV_Y_DEGREES,
            aspect: DEFAULT_ASPECT,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Orthographic projection covering `±half_width` x `±half_height`.
    pub fn orthographic(half_width: f32, half_height: f32) -> Self {
        Self::Orthographic {
            half_width,
            half_height,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Projection matrix (right-handed).
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective {
                fov_y_degrees,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far),
            Self::Orthographic {
                half_width,
                half_height,
                near,
                far,
            } => Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                near,
                far,
            ),
        }
    }
}

/// Camera component: projection plus the active flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub projection: Projection,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// CameraSystem
// ---------------------------------------------------------------------------

/// Owner of all [`Camera`] components; tracks the single active one.
#[derive(Debug, Default)]
pub struct CameraSystem {
    pub(crate) store: ComponentStore<Camera>,
    pub(crate) active: Option<EntityId>,
}

impl CameraSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an inactive perspective camera with default parameters,
    /// replacing any existing camera on `entity`.
    pub fn add_perspective(&mut self, entity: EntityId) -> &mut Camera {
        self.add(entity, Projection::perspective())
    }

    /// Attach an inactive orthographic camera, replacing any existing
    /// camera on `entity`.
    pub fn add_orthographic(
        &mut self,
        entity: EntityId,
        half_width: f32,
        half_height: f32,
    ) -> &mut Camera {
        self.add(entity, Projection::orthographic(half_width, half_height))
    }

    fn add(&mut self, entity: EntityId, projection: Projection) -> &mut Camera {
        // Re-adding resets to inactive; drop the active slot if it pointed here.
        if self.active == Some(entity) {
            self.active = None;
        }
        self.store.insert(
            entity,
            Camera {
                projection,
                active: false,
            },
        );
        self.store.get_mut(entity).expect("slot occupied by insert")
    }

    /// Make `entity`'s camera the active one, clearing the previous holder.
    ///
    /// Usage error if `entity` has no camera component; the previously
    /// active camera keeps its flag in that case.
    pub fn set_active(&mut self, entity: EntityId) -> Result<(), EngineError> {
        if !self.store.contains(entity) {
            warn!(entity = %entity, "set_active on entity without a camera");
            return Err(EngineError::NoCamera { entity });
        }
        if let Some(previous) = self.active.take() {
            if let Some(camera) = self.store.get_mut(previous) {
                camera.active = false;
            }
        }
        if let Some(camera) = self.store.get_mut(entity) {
            camera.active = true;
        }
        self.active = Some(entity);
        debug!(entity = %entity, "camera activated");
        Ok(())
    }

    /// The currently active camera's entity, if any.
    pub fn active(&self) -> Option<EntityId> {
        self.active
    }

    pub fn get(&self, entity: EntityId) -> Option<&Camera> {
        self.store.get(entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Camera> {
        self.store.get_mut(entity)
    }

    /// Detach and return `entity`'s camera; clears the active slot if this
    /// was the active one.
    pub fn remove(&mut self, entity: EntityId) -> Option<Camera> {
        if self.active == Some(entity) {
            self.active = None;
        }
        self.store.remove(entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.store.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// View-projection matrix of the active camera for the renderer
    /// contract: projection x inverse camera pose. A camera without a
    /// transform views from the identity pose.
    pub fn view_projection(&self, transforms: &TransformSystem) -> Option<Mat4> {
        let entity = self.active?;
        let camera = self.store.get(entity)?;
        let pose = transforms
            .get(entity)
            .map(|t| Mat4::from_rotation_translation(t.rotation, t.position))
            .unwrap_or(Mat4::IDENTITY);
        Some(camera.projection.matrix() * pose.inverse())
    }

    /// Count of cameras with the active flag set. Always 0 or 1; exposed
    /// for invariant checks in tests.
    pub fn active_flag_count(&self) -> usize {
        self.store.iter().filter(|(_, c)| c.active).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn id(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn perspective_defaults() {
        let mut cameras = CameraSystem::new();
        let cam = cameras.add_perspective(id(0));
        assert!(!cam.active);
        assert_eq!(
            cam.projection,
            Projection::Perspective {
                fov_y_degrees: 90.0,
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 1000.0,
            }
        );
    }

    #[test]
    fn activation_is_exclusive() {
        let mut cameras = CameraSystem::new();
        cameras.add_perspective(id(0));
        cameras.add_perspective(id(1));

        cameras.set_active(id(0)).unwrap();
        cameras.set_active(id(1)).unwrap();

        assert_eq!(cameras.active(), Some(id(1)));
        assert!(!cameras.get(id(0)).unwrap().active);
        assert!(cameras.get(id(1)).unwrap().active);
        assert_eq!(cameras.active_flag_count(), 1);

        // Thrash a few times; the invariant must hold after any sequence.
        for _ in 0..3 {
            cameras.set_active(id(0)).unwrap();
            cameras.set_active(id(1)).unwrap();
        }
        assert_eq!(cameras.active_flag_count(), 1);
    }

    #[test]
    fn set_active_without_camera_is_usage_error() {
        let mut cameras = CameraSystem::new();
        cameras.add_perspective(id(0));
        cameras.set_active(id(0)).unwrap();

        let err = cameras.set_active(id(5)).unwrap_err();
        assert!(matches!(err, EngineError::NoCamera { entity } if entity == id(5)));
        // Previous active camera is untouched.
        assert_eq!(cameras.active(), Some(id(0)));
        assert!(cameras.get(id(0)).unwrap().active);
    }

    #[test]
    fn removing_active_camera_clears_slot() {
        let mut cameras = CameraSystem::new();
        cameras.add_perspective(id(0));
        cameras.set_active(id(0)).unwrap();
        cameras.remove(id(0));
        assert_eq!(cameras.active(), None);
        assert_eq!(cameras.active_flag_count(), 0);
    }

    #[test]
    fn re_add_resets_active_state() {
        let mut cameras = CameraSystem::new();
        cameras.add_perspective(id(0));
        cameras.set_active(id(0)).unwrap();
        cameras.add_perspective(id(0));
        assert_eq!(cameras.active(), None);
        assert!(!cameras.get(id(0)).unwrap().active);
    }

    #[test]
    fn view_projection_uses_camera_pose() {
        let mut cameras = CameraSystem::new();
        let mut transforms = TransformSystem::new();
        cameras.add_perspective(id(0));
        cameras.set_active(id(0)).unwrap();
        transforms.add(id(0)).position = Vec3::new(0.0, 0.0, -250.0);

        let vp = cameras.view_projection(&transforms).unwrap();
        // A point at the camera's position maps behind the near plane;
        // a point in front of it (camera looks down -Z) projects inside.
        let in_front = vp * glam::Vec4::new(0.0, 0.0, -260.0, 1.0);
        assert!(in_front.w > 0.0);
    }

    #[test]
    fn view_projection_none_without_active() {
        let cameras = CameraSystem::new();
        let transforms = TransformSystem::new();
        assert!(cameras.view_projection(&transforms).is_none());
    }

    #[test]
    fn orthographic_matrix_is_finite() {
        let proj = Projection::orthographic(640.0, 360.0);
        let m = proj.matrix();
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
    }
}

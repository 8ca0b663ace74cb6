use glam::{DMat3, DMat4, DQuat, DVec3};

use crate::animation::Interpolate;

/// Angle kept between the view direction and the up axis while orbiting.
const MIN_POLE_ANGLE: f64 = 0.01;

/// Rigid transform taking world-frame points into the camera frame.
///
/// The camera frame is x right, y down, z forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    cam_from_world: DMat4,
}

impl CameraPose {
    pub fn new(cam_from_world: DMat4) -> Self {
        Self { cam_from_world }
    }

    /// A roll-free pose at `center` looking along `forward`, with the image
    /// y axis pointing away from `up`. `None` if `forward` is zero or
    /// parallel to `up`.
    pub fn looking(center: DVec3, forward: DVec3, up: DVec3) -> Option<Self> {
        let rotation = world_from_cam_rotation(forward, up)?;
        let world_from_cam = DMat4::from_cols(
            rotation.x_axis.extend(0.0),
            rotation.y_axis.extend(0.0),
            rotation.z_axis.extend(0.0),
            center.extend(1.0),
        );
        Some(Self::new(world_from_cam.inverse()))
    }

    pub fn cam_from_world(&self) -> DMat4 {
        self.cam_from_world
    }

    pub fn world_from_cam(&self) -> DMat4 {
        self.cam_from_world.inverse()
    }

    /// Camera position in world space.
    pub fn center(&self) -> DVec3 {
        self.world_from_cam().transform_point3(DVec3::ZERO)
    }

    pub fn forward(&self) -> DVec3 {
        self.world_from_cam()
            .transform_vector3(DVec3::Z)
            .normalize_or_zero()
    }

    pub fn right(&self) -> DVec3 {
        self.world_from_cam()
            .transform_vector3(DVec3::X)
            .normalize_or_zero()
    }

    /// Finite and invertible. Uniformly scaled poses count, however small
    /// the scale.
    pub fn is_finite(&self) -> bool {
        self.cam_from_world.is_finite()
            && self.cam_from_world.determinant() != 0.0
            && self.world_from_cam().is_finite()
    }

    /// Same orientation, camera moved to `center`.
    pub fn with_center(&self, center: DVec3) -> Self {
        let mut world_from_cam = self.world_from_cam();
        world_from_cam.w_axis = center.extend(1.0);
        Self::new(world_from_cam.inverse())
    }

    /// Move the world by `delta` as seen in the camera frame.
    pub fn translated_in_camera(&self, delta: DVec3) -> Self {
        Self::new(DMat4::from_translation(delta) * self.cam_from_world)
    }

    /// Orbit around `pivot`: `yaw` radians about `up`, then `pitch` radians
    /// about the camera's right axis. Pitch that would bring the view
    /// direction within [`MIN_POLE_ANGLE`] of `up` is dropped. The result is
    /// rebuilt roll-free against `up` whenever the view direction allows it.
    pub fn orbit(&self, pivot: DVec3, up: DVec3, yaw: f64, pitch: f64) -> Self {
        let up = up.normalize_or_zero();
        if up == DVec3::ZERO {
            return *self;
        }
        let forward = self.forward();
        let yaw_rotation = DQuat::from_axis_angle(up, yaw);
        let mut rotation = yaw_rotation;
        let right = self.right();
        if right != DVec3::ZERO {
            let with_pitch = yaw_rotation * DQuat::from_axis_angle(right, pitch);
            let pitched = with_pitch * forward;
            if pitched.dot(up).abs() < MIN_POLE_ANGLE.cos() {
                rotation = with_pitch;
            }
        }

        let center = pivot + rotation * (self.center() - pivot);
        let forward = rotation * forward;
        match Self::looking(center, forward, up) {
            Some(pose) => pose,
            None => {
                // Looking straight along `up`: rotate the whole frame instead.
                let world_from_cam = self.world_from_cam();
                let frame = DMat3::from_quat(rotation) * DMat3::from_mat4(world_from_cam);
                let world_from_cam = DMat4::from_cols(
                    frame.x_axis.extend(0.0),
                    frame.y_axis.extend(0.0),
                    frame.z_axis.extend(0.0),
                    center.extend(1.0),
                );
                Self::new(world_from_cam.inverse())
            }
        }
    }

    /// Scale the camera's offset from `pivot` by `factor` (< 1 moves closer).
    pub fn dolly_towards(&self, pivot: DVec3, factor: f64) -> Self {
        self.with_center(pivot + (self.center() - pivot) * factor)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::new(DMat4::IDENTITY)
    }
}

impl From<DMat4> for CameraPose {
    fn from(cam_from_world: DMat4) -> Self {
        Self::new(cam_from_world)
    }
}

impl Interpolate for CameraPose {
    /// Slerp the orientation and lerp the camera center.
    fn interpolate(&self, to: &Self, alpha: f64) -> Self {
        let (from_scale, from_rotation, from_center) =
            self.world_from_cam().to_scale_rotation_translation();
        let (to_scale, to_rotation, to_center) =
            to.world_from_cam().to_scale_rotation_translation();
        let world_from_cam = DMat4::from_scale_rotation_translation(
            from_scale.lerp(to_scale, alpha),
            from_rotation.slerp(to_rotation, alpha),
            from_center.lerp(to_center, alpha),
        );
        Self::new(world_from_cam.inverse())
    }
}

/// Columns are the camera x (right), y (down) and z (forward) axes in world.
fn world_from_cam_rotation(forward: DVec3, up: DVec3) -> Option<DMat3> {
    let z = forward.normalize_or_zero();
    if z == DVec3::ZERO {
        return None;
    }
    let down = -up;
    let y = down - z * down.dot(z);
    if y.length_squared() < 1e-12 {
        return None;
    }
    let y = y.normalize();
    let x = y.cross(z);
    Some(DMat3::from_cols(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn roll(pose: &CameraPose, up: DVec3) -> f64 {
        // Right axis must stay perpendicular to up for a roll-free camera.
        pose.right().dot(up)
    }

    #[test]
    fn test_looking_is_roll_free() {
        let up = DVec3::Z;
        let pose = CameraPose::looking(DVec3::new(-5.0, 0.0, 1.0), DVec3::X, up).unwrap();
        assert!((pose.center() - DVec3::new(-5.0, 0.0, 1.0)).length() < EPS);
        assert!((pose.forward() - DVec3::X).length() < EPS);
        // Looking along +x with +z up, the image right is -y.
        assert!((pose.right() - DVec3::NEG_Y).length() < EPS);
        assert!(roll(&pose, up).abs() < EPS);

        let p = pose.cam_from_world().transform_point3(DVec3::new(0.0, 0.0, 1.0));
        assert!((p - DVec3::new(0.0, 0.0, 5.0)).length() < EPS);
    }

    #[test]
    fn test_looking_along_up_is_rejected() {
        assert!(CameraPose::looking(DVec3::ZERO, DVec3::Z, DVec3::Z).is_none());
        assert!(CameraPose::looking(DVec3::ZERO, DVec3::ZERO, DVec3::Z).is_none());
    }

    #[test]
    fn test_with_center_keeps_rotation() {
        let pose = CameraPose::looking(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0), DVec3::Z).unwrap();
        let moved = pose.with_center(DVec3::new(3.0, -2.0, 7.0));
        assert!((moved.center() - DVec3::new(3.0, -2.0, 7.0)).length() < EPS);
        assert!((moved.forward() - pose.forward()).length() < EPS);
    }

    #[test]
    fn test_orbit_keeps_distance_and_no_roll() {
        let up = DVec3::Z;
        let pivot = DVec3::new(1.0, 2.0, 0.0);
        let mut pose = CameraPose::looking(pivot - DVec3::X * 4.0, DVec3::X, up).unwrap();
        for _ in 0..50 {
            pose = pose.orbit(pivot, up, 0.13, -0.07);
            assert!(((pose.center() - pivot).length() - 4.0).abs() < 1e-6);
            assert!(roll(&pose, up).abs() < 1e-9);
        }
        // Pitch is limited before reaching the pole.
        assert!(pose.forward().dot(up).abs() < MIN_POLE_ANGLE.cos() + 1e-9);
    }

    #[test]
    fn test_orbit_from_top_down_view() {
        let up = DVec3::Z;
        let pose = CameraPose::new(DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0)));
        // Identity rotation looks along +z, i.e. exactly along up.
        let orbited = pose.orbit(DVec3::new(0.0, 0.0, 20.0), up, 0.5, 0.0);
        assert!(orbited.is_finite());
        assert!((orbited.forward() - up).length() < EPS);
    }

    #[test]
    fn test_degenerate_poses() {
        assert!(CameraPose::default().is_finite());
        let tiny = DMat4::from_scale(DVec3::splat(1e-7)) * DMat4::from_translation(DVec3::X);
        assert!(CameraPose::new(tiny).is_finite());
        assert!(!CameraPose::new(DMat4::ZERO).is_finite());
        assert!(!CameraPose::new(DMat4::from_scale(DVec3::new(1.0, 0.0, 1.0))).is_finite());
        assert!(!CameraPose::new(DMat4::from_translation(DVec3::splat(f64::NAN))).is_finite());
    }

    #[test]
    fn test_dolly_towards_pivot() {
        let pose = CameraPose::looking(DVec3::new(0.0, -10.0, 0.0), DVec3::Y, DVec3::Z).unwrap();
        let closer = pose.dolly_towards(DVec3::ZERO, 0.5);
        assert!((closer.center() - DVec3::new(0.0, -5.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_interpolate_translation() {
        let a = CameraPose::looking(DVec3::ZERO, DVec3::X, DVec3::Z).unwrap();
        let b = a.with_center(DVec3::new(0.0, 10.0, 0.0));
        let mid = a.interpolate(&b, 0.5);
        assert!((mid.center() - DVec3::new(0.0, 5.0, 0.0)).length() < 1e-6);
        assert!((mid.forward() - DVec3::X).length() < 1e-6);
    }
}

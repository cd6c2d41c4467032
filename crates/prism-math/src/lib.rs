// SPDX-License-Identifier: CEPL-1.0
pub use glam::{Mat4, Quat, Vec3};

/// Fixed viewer for the whole scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(2.0, 2.0, 2.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 10.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Right-handed, depth in [0, 1], Y pointing down in clip space.
    ///
    /// Vulkan's clip space has +Y going down the screen, so the GL-style
    /// projection gets its Y scale negated.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            aspect.max(f32::EPSILON),
            self.near,
            self.far,
        );
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// How a drawable's model matrix evolves over time.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Motion {
    #[default]
    Static,
    Spin {
        axis: Vec3,
        degrees_per_second: f32,
    },
}

impl Motion {
    pub fn rotation_at(&self, seconds: f32) -> Quat {
        match *self {
            Motion::Static => Quat::IDENTITY,
            Motion::Spin {
                axis,
                degrees_per_second,
            } => match axis.try_normalize() {
                Some(axis) => Quat::from_axis_angle(axis, (degrees_per_second * seconds).to_radians()),
                None => Quat::IDENTITY,
            },
        }
    }
}

/// Placement of a drawable: scale, then the motion's rotation, then translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub translation: Vec3,
    pub scale: Vec3,
    pub motion: Motion,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            motion: Motion::Static,
        }
    }
}

impl Placement {
    pub fn model_at(&self, seconds: f32) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            self.motion.rotation_at(seconds),
            self.translation,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn projection_flips_y() {
        let cam = Camera::default();
        let flipped = cam.projection(4.0 / 3.0);
        let plain = Mat4::perspective_rh(45f32.to_radians(), 4.0 / 3.0, 0.1, 10.0);
        assert_relative_eq!(flipped.y_axis.y, -plain.y_axis.y);
        assert_relative_eq!(flipped.x_axis.x, plain.x_axis.x);
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let cam = Camera::default();
        let clip = cam.projection(1.0) * glam::Vec4::new(0.0, 0.0, -cam.near, 1.0);
        assert_relative_eq!(clip.z / clip.w, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn spin_quarter_turn_after_one_second() {
        let motion = Motion::Spin {
            axis: Vec3::Z,
            degrees_per_second: 90.0,
        };
        let rotated = motion.rotation_at(1.0) * Vec3::X;
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_spin_axis_is_identity() {
        let motion = Motion::Spin {
            axis: Vec3::ZERO,
            degrees_per_second: 90.0,
        };
        assert_eq!(motion.rotation_at(3.0), Quat::IDENTITY);
    }

    #[test]
    fn static_placement_ignores_time() {
        let p = Placement {
            translation: Vec3::new(1.0, 0.0, 0.0),
            scale: Vec3::splat(2.0),
            motion: Motion::Static,
        };
        assert_eq!(p.model_at(0.0), p.model_at(12.5));
        let moved = p.model_at(0.0).transform_point3(Vec3::X);
        assert_relative_eq!(moved.x, 3.0);
    }
}

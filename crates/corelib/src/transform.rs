use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::{Mat4, Vec3};

/// Rotation applied per spin key press.
pub const SPIN_STEP: f32 = PI / 16.0;

/// Model view used by the ship viewer: the model is tilted to a fixed
/// three-quarter angle and spun around its own up axis (Z in file space).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewTransform {
    /// Spin around the model's Z axis, radians.
    pub spin: f32,
}

impl ViewTransform {
    #[inline]
    pub const fn new(spin: f32) -> Self {
        Self { spin }
    }

    #[inline]
    pub fn spin_left(&mut self) {
        self.spin += SPIN_STEP;
    }

    #[inline]
    pub fn spin_right(&mut self) {
        self.spin -= SPIN_STEP;
    }

    /// Build `ortho * S(1/radius) * Rx(-pi/2) * Rx(pi/4) * Rz(spin)`.
    /// Scaling by the bounding radius fits every vertex into the unit cube.
    #[inline]
    pub fn matrix(&self, bounding_radius: f32) -> Mat4 {
        let scale = if bounding_radius.is_finite() && bounding_radius > 0.0 {
            1.0 / bounding_radius
        } else {
            1.0
        };
        let ortho = Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        ortho
            * Mat4::from_scale(Vec3::splat(scale))
            * Mat4::from_rotation_x(-FRAC_PI_2)
            * Mat4::from_rotation_x(FRAC_PI_4)
            * Mat4::from_rotation_z(self.spin)
    }
}

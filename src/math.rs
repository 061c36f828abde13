//! Small vector/rotation helpers shared by the rail and tracker modules.
//!
//! World space is right-handed with +Y up. A [`Transform`] looks down its
//! local +Z axis, with +X to its right.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Lerp from `a` to `b`, with `t` first reshaped by `curve`.
pub fn clerp(a: f32, b: f32, curve: &Curve, t: f32) -> f32 {
    lerp(a, b, curve.evaluate(t))
}

/// Vector form of [`clerp`].
pub fn clerp_vec3(a: Vec3, b: Vec3, curve: &Curve, t: f32) -> Vec3 {
    a.lerp(b, curve.evaluate(t))
}

/// How a per-frame `rate * dt` pair is turned into an interpolation factor.
///
/// `FrameLinear` is the classic `lerp(current, goal, rate * dt)` step. It only
/// approximates exponential decay to first order, so the amount of smoothing
/// drifts with frame rate. `ExponentialDecay` uses `1 - exp(-rate * dt)`, which
/// converges identically regardless of how a second is sliced into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    #[default]
    FrameLinear,
    ExponentialDecay,
}

impl SmoothingMode {
    /// Interpolation factor in `[0, 1]` for one frame.
    ///
    /// Negative, zero or NaN inputs yield 0 (no movement).
    pub fn factor(self, rate: f32, dt: f32) -> f32 {
        let x = rate * dt;
        if x.is_nan() || x <= 0.0 {
            return 0.0;
        }
        match self {
            SmoothingMode::FrameLinear => x.min(1.0),
            SmoothingMode::ExponentialDecay => 1.0 - (-x).exp(),
        }
    }
}

/// Rotation that points local +Z along `forward`, keeping local +Y as close
/// to `up` as possible. Returns `None` for a zero direction.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    let z = forward.try_normalize()?;
    let x = match up.cross(z).try_normalize() {
        Some(x) => x,
        // forward is parallel to up
        None => return Some(Quat::from_rotation_arc(Vec3::Z, z)),
    };
    let y = z.cross(x);
    Some(Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize())
}

/// Position and orientation of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// World-space direction expressed in this transform's local axes.
    pub fn inverse_transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }
}

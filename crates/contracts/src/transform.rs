//! Rigid transform helpers
//!
//! All poses are `nalgebra::Isometry3<f64>` (translation + unit rotation).
//! Composition follows nalgebra's column-vector convention: `a * b` applies `b` first.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transform used for bones, actors and baselines
pub type Transform = Isometry3<f64>;

/// Express `world` relative to `baseline`: `inverse(baseline) * world`
pub fn rebase(baseline: &Transform, world: &Transform) -> Transform {
    renormalized(baseline.inverse() * world)
}

/// Express `child` in the space of `parent`
pub fn relative_to(child: &Transform, parent: &Transform) -> Transform {
    renormalized(parent.inverse() * child)
}

/// Re-normalize the rotation part after composition drift
pub fn renormalized(mut transform: Transform) -> Transform {
    transform.rotation.renormalize();
    transform
}

/// Convert a unit quaternion into intrinsic Z-Y-X Euler angles, in degrees.
///
/// Returns `[z, y, x]`. The pitch term is clamped to `[-1, 1]` before `asin`
/// so near-gimbal inputs never produce NaN.
pub fn quat_to_euler_zyx_degrees(rotation: &UnitQuaternion<f64>) -> [f64; 3] {
    let q = rotation.quaternion();
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp);

    let sinp = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = sinp.asin();

    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp);

    [yaw.to_degrees(), pitch.to_degrees(), roll.to_degrees()]
}

/// Serializable transform for configuration files
///
/// Location in scene units, rotation as roll/pitch/yaw in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub location: Location,

    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Location {
    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Rotation {
    pub fn to_quaternion(self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(
            self.roll.to_radians(),
            self.pitch.to_radians(),
            self.yaw.to_radians(),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.roll.is_finite() && self.pitch.is_finite() && self.yaw.is_finite()
    }
}

impl TransformConfig {
    pub fn to_transform(self) -> Transform {
        Isometry3::from_parts(
            Translation3::from(self.location.to_vector()),
            self.rotation.to_quaternion(),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.location.is_finite() && self.rotation.is_finite()
    }
}

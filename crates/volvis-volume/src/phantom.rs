//! Synthetic test volumes.

use glam::{UVec3, Vec3};
use volvis_core::Result;

use crate::volume::DenseVolume;

/// Procedural volume generators for demos and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phantom {
    /// Radial falloff from the centre: `max_value` at the centre, zero at 90% of the half extent.
    Sphere,
    /// Smooth periodic density in every direction.
    Sinusoid,
    /// Binary height field of wavy pillars rising from `y = 0`.
    Pillars,
    /// Every voxel holds the given value, ignoring `max_value`.
    Constant(f32),
}

impl Phantom {
    /// Generates a volume with values in `[0, max_value]`.
    pub fn generate(self, dims: UVec3, max_value: f32) -> Result<DenseVolume> {
        let extent = dims.as_vec3();
        let name = match self {
            Self::Sphere => "sphere",
            Self::Sinusoid => "sinusoid",
            Self::Pillars => "pillars",
            Self::Constant(_) => "constant",
        };
        let volume = DenseVolume::from_fn(dims, |p| {
            let p = p.as_vec3();
            match self {
                Self::Sphere => sphere(p, extent) * max_value,
                Self::Sinusoid => sinusoid(p, extent) * max_value,
                Self::Pillars => pillars(p, extent) * max_value,
                Self::Constant(value) => value,
            }
        })?;
        Ok(volume.with_name(name))
    }
}

fn sphere(p: Vec3, extent: Vec3) -> f32 {
    let centre = (extent - Vec3::ONE) / 2.0;
    let radius = extent.max_element() * 0.9 / 2.0;
    (1.0 - p.distance_squared(centre) / (radius * radius)).clamp(0.0, 1.0)
}

fn sinusoid(p: Vec3, extent: Vec3) -> f32 {
    let t = p / extent.max(Vec3::ONE) * std::f32::consts::TAU * 2.0;
    ((t.x.sin() * t.y.cos() + t.z.sin()) / 4.0 + 0.5).clamp(0.0, 1.0)
}

fn pillars(p: Vec3, extent: Vec3) -> f32 {
    let extent = extent.max(Vec3::ONE);
    let height = ((p.x / extent.x * 16.0).sin() * 0.5 + 0.7)
        * ((p.z / extent.z * 16.0).sin() * 0.5 + 0.7)
        * 0.5
        * extent.y;
    if p.y < height {
        1.0
    } else {
        0.0
    }
}

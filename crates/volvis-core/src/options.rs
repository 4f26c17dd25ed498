//! Render configuration value objects.
//!
//! These are produced by whatever drives the visualizer (a GUI, a script, a test) and
//! passed by reference into every rebuild. There is no global configuration state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolvisError};
use crate::transfer_function::TransferFunction;

/// Ray evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RenderMode {
    /// View-aligned slice through the volume center.
    #[default]
    Slicer,
    /// Maximum intensity projection.
    Mip,
    /// First-hit isosurface.
    Isosurface,
    /// Front-to-back compositing through the transfer function.
    Composite,
}

impl RenderMode {
    /// Returns display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RenderMode::Slicer => "Slicer",
            RenderMode::Mip => "MIP",
            RenderMode::Isosurface => "Isosurface",
            RenderMode::Composite => "Composite",
        }
    }
}

/// Interpolation used when sampling between lattice points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterpolationMode {
    /// Round to the closest voxel.
    #[default]
    NearestNeighbour,
    /// Trilinear interpolation over the 8 surrounding voxels.
    Linear,
    /// Separable Catmull-Rom interpolation over a 4x4x4 neighbourhood.
    Cubic,
}

impl InterpolationMode {
    /// Converts to a u32 index (used by UIs and shader uniforms).
    #[must_use]
    pub fn to_index(self) -> u32 {
        match self {
            InterpolationMode::NearestNeighbour => 0,
            InterpolationMode::Linear => 1,
            InterpolationMode::Cubic => 2,
        }
    }
}

/// Converts a raw mode index from deserialized or UI input; unknown indices are rejected
/// rather than panicking.
impl TryFrom<u32> for InterpolationMode {
    type Error = VolvisError;

    fn try_from(index: u32) -> Result<Self> {
        match index {
            0 => Ok(InterpolationMode::NearestNeighbour),
            1 => Ok(InterpolationMode::Linear),
            2 => Ok(InterpolationMode::Cubic),
            other => Err(VolvisError::InvalidInterpolationMode(other)),
        }
    }
}

/// Phong lighting coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhongParams {
    /// Ambient coefficient.
    pub ambient: f32,
    /// Diffuse coefficient.
    pub diffuse: f32,
    /// Specular coefficient.
    pub specular: f32,
    /// Specular exponent.
    pub shininess: f32,
}

impl Default for PhongParams {
    fn default() -> Self {
        Self {
            ambient: 0.1,
            diffuse: 0.7,
            specular: 0.2,
            shininess: 100.0,
        }
    }
}

/// Boundary enhancement applied to composite opacity.
///
/// Each sample's opacity is scaled by `kc + ks * g^ke`, where `g` is the gradient magnitude
/// normalized by the largest magnitude in the volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryParams {
    /// Constant weight kept regardless of the gradient.
    pub kc: f32,
    /// Weight of the gradient term.
    pub ks: f32,
    /// Exponent applied to the normalized gradient magnitude.
    pub ke: f32,
}

impl Default for BoundaryParams {
    fn default() -> Self {
        Self {
            kc: 0.0,
            ks: 1.0,
            ke: 1.0,
        }
    }
}

impl BoundaryParams {
    #[must_use]
    pub fn new(kc: f32, ks: f32, ke: f32) -> Self {
        Self { kc, ks, ke }
    }

    /// Opacity weight for a normalized gradient magnitude in `[0, 1]`.
    #[must_use]
    pub fn weight(&self, normalized_magnitude: f32) -> f32 {
        self.kc + self.ks * normalized_magnitude.clamp(0.0, 1.0).powf(self.ke)
    }
}

/// Volume bricking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrickingConfig {
    /// Edge length of a cubic brick, in voxels.
    pub brick_size: u32,
    /// Halo copied around every brick, in voxels.
    pub brick_padding: u32,
    /// Whether the volume is bricked at all.
    pub use_bricking: bool,
    /// Largest cache texture extent along one axis, in voxels.
    pub max_texture_size: u32,
    /// Time budget for the packing search, in milliseconds.
    pub packing_budget_ms: u64,
}

impl Default for BrickingConfig {
    fn default() -> Self {
        Self {
            brick_size: 32,
            brick_padding: 2,
            use_bricking: false,
            max_texture_size: 2048,
            packing_budget_ms: 5,
        }
    }
}

impl BrickingConfig {
    /// Brick edge length including the halo on both sides.
    #[must_use]
    pub fn padded_brick_size(&self) -> u32 {
        self.brick_size + 2 * self.brick_padding
    }

    /// Maximum number of bricks that fit along one cache axis.
    #[must_use]
    pub fn max_bricks_per_axis(&self) -> u32 {
        self.max_texture_size / self.padded_brick_size().max(1)
    }
}

/// Empty-space skipping configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippingConfig {
    /// Edge length of a cubic block, in voxels.
    pub block_size: u32,
    /// Whether inactive blocks are skipped during traversal.
    pub use_empty_space_skipping: bool,
}

impl Default for SkippingConfig {
    fn default() -> Self {
        Self {
            block_size: 8,
            use_empty_space_skipping: false,
        }
    }
}

/// Per-frame render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Ray evaluation mode.
    pub render_mode: RenderMode,

    /// Sampling interpolation.
    pub interpolation: InterpolationMode,

    /// Distance between ray samples, in voxels.
    pub step_size: f32,

    /// Isosurface threshold.
    pub iso_value: f32,

    /// Refine isosurface hits by bisection.
    pub bisection: bool,

    /// Apply Phong shading using the gradient as normal.
    pub volume_shading: bool,

    /// Phong coefficients.
    pub shading: PhongParams,

    /// Scale composite opacity by normalized gradient magnitude.
    pub opacity_modulation: bool,

    /// Weights of the opacity modulation.
    pub boundary: BoundaryParams,

    /// Color used for isosurface hits.
    pub iso_color: glam::Vec3,

    /// 1D transfer function.
    pub transfer_function: TransferFunction,

    /// Volume bricking.
    pub bricking: BrickingConfig,

    /// Empty-space skipping.
    pub skipping: SkippingConfig,

    /// Cast rays on the worker pool instead of the calling thread.
    pub multithreaded: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Slicer,
            interpolation: InterpolationMode::NearestNeighbour,
            step_size: 1.0,
            iso_value: 95.0,
            bisection: false,
            volume_shading: false,
            shading: PhongParams::default(),
            opacity_modulation: false,
            boundary: BoundaryParams::default(),
            iso_color: glam::Vec3::new(0.8, 0.8, 0.2),
            transfer_function: TransferFunction::default(),
            bricking: BrickingConfig::default(),
            skipping: SkippingConfig::default(),
            multithreaded: true,
        }
    }
}

impl RenderConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the render mode.
    #[must_use]
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    /// Sets the interpolation mode.
    #[must_use]
    pub fn with_interpolation(mut self, interpolation: InterpolationMode) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Sets the step size.
    #[must_use]
    pub fn with_step_size(mut self, step_size: f32) -> Self {
        self.step_size = step_size;
        self
    }

    /// Sets the iso value.
    #[must_use]
    pub fn with_iso_value(mut self, iso_value: f32) -> Self {
        self.iso_value = iso_value;
        self
    }

    /// Sets the transfer function.
    #[must_use]
    pub fn with_transfer_function(mut self, tf: TransferFunction) -> Self {
        self.transfer_function = tf;
        self
    }

    /// Enables or disables bricking with the given brick size.
    #[must_use]
    pub fn with_bricking(mut self, use_bricking: bool, brick_size: u32) -> Self {
        self.bricking.use_bricking = use_bricking;
        self.bricking.brick_size = brick_size;
        self
    }

    /// Sets the brick padding.
    #[must_use]
    pub fn with_brick_padding(mut self, padding: u32) -> Self {
        self.bricking.brick_padding = padding;
        self
    }

    /// Enables or disables empty-space skipping with the given block size.
    #[must_use]
    pub fn with_skipping(mut self, use_skipping: bool, block_size: u32) -> Self {
        self.skipping.use_empty_space_skipping = use_skipping;
        self.skipping.block_size = block_size;
        self
    }

    /// Enables or disables shading.
    #[must_use]
    pub fn with_shading(mut self, volume_shading: bool) -> Self {
        self.volume_shading = volume_shading;
        self
    }

    /// Enables opacity modulation with the given boundary weights.
    #[must_use]
    pub fn with_boundary_enhancement(mut self, boundary: BoundaryParams) -> Self {
        self.opacity_modulation = true;
        self.boundary = boundary;
        self
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(VolvisError::InvalidConfig(format!(
                "step size must be positive, got {}",
                self.step_size
            )));
        }
        let BoundaryParams { kc, ks, ke } = self.boundary;
        if [kc, ks, ke].iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(VolvisError::InvalidConfig(format!(
                "boundary weights must be non-negative, got kc={kc} ks={ks} ke={ke}"
            )));
        }
        if self.bricking.brick_size == 0 {
            return Err(VolvisError::InvalidBrickSize(self.bricking.brick_size));
        }
        if self.skipping.block_size == 0 {
            return Err(VolvisError::InvalidBlockSize(self.skipping.block_size));
        }
        if self.bricking.padded_brick_size() > self.bricking.max_texture_size {
            return Err(VolvisError::InvalidConfig(format!(
                "padded brick size {} exceeds the maximum texture size {}",
                self.bricking.padded_brick_size(),
                self.bricking.max_texture_size
            )));
        }
        self.transfer_function.validate()
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("loaded render configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}

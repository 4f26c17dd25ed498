//! Transfer functions and the opacity prefix-sum table.
//!
//! A transfer function maps scalar values to RGBA through a fixed 256-entry table.
//! Values are mapped to table indices with an affine transform:
//! `index = (value - start) / range * 256`, clamped to the table.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolvisError};

/// Number of entries in a transfer function table.
pub const TF_SIZE: usize = 256;

/// Affine map from scalar values to transfer function indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexMapping {
    /// Value mapped to index 0.
    pub start: f32,
    /// Width of the value range covered by the table.
    pub range: f32,
}

impl Default for IndexMapping {
    fn default() -> Self {
        Self {
            start: 0.0,
            range: TF_SIZE as f32,
        }
    }
}

impl IndexMapping {
    /// Creates a mapping covering `[start, start + range)`.
    pub fn new(start: f32, range: f32) -> Self {
        Self { start, range }
    }

    /// Creates a mapping that spans the closed value range `[min, max]`.
    ///
    /// A degenerate range maps everything to index 0.
    pub fn spanning(min: f32, max: f32) -> Self {
        let range = max - min;
        if range > 0.0 {
            Self::new(min, range)
        } else {
            Self::new(min, 1.0)
        }
    }

    /// Returns the table index for a value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn index_of(&self, value: f32) -> usize {
        let t = (value - self.start) / self.range * TF_SIZE as f32;
        if t.is_nan() || t <= 0.0 {
            return 0;
        }
        (t.floor() as usize).min(TF_SIZE - 1)
    }
}

/// A color map for building transfer functions.
#[derive(Debug, Clone)]
pub struct ColorMap {
    /// Color map name.
    pub name: String,
    /// Color samples (evenly spaced from 0 to 1).
    pub colors: Vec<Vec3>,
}

impl ColorMap {
    /// Creates a new color map.
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    /// Samples the color map at a given value (0 to 1).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);

        if self.colors.is_empty() {
            return Vec3::ZERO;
        }

        if self.colors.len() == 1 {
            return self.colors[0];
        }

        let n = self.colors.len() - 1;
        let idx = (t * n as f32).floor() as usize;
        let idx = idx.min(n - 1);
        let frac = t * n as f32 - idx as f32;

        self.colors[idx].lerp(self.colors[idx + 1], frac)
    }

    /// Grey ramp from black to white.
    pub fn grayscale() -> Self {
        Self::new("grayscale", vec![Vec3::ZERO, Vec3::ONE])
    }

    /// Viridis color map.
    pub fn viridis() -> Self {
        Self::new(
            "viridis",
            vec![
                Vec3::new(0.267, 0.004, 0.329),
                Vec3::new(0.282, 0.140, 0.457),
                Vec3::new(0.253, 0.265, 0.529),
                Vec3::new(0.206, 0.371, 0.553),
                Vec3::new(0.163, 0.471, 0.558),
                Vec3::new(0.127, 0.566, 0.550),
                Vec3::new(0.134, 0.658, 0.517),
                Vec3::new(0.266, 0.749, 0.440),
                Vec3::new(0.477, 0.821, 0.318),
                Vec3::new(0.741, 0.873, 0.150),
                Vec3::new(0.993, 0.906, 0.144),
            ],
        )
    }

    /// Coolwarm diverging color map.
    pub fn coolwarm() -> Self {
        Self::new(
            "coolwarm",
            vec![
                Vec3::new(0.230, 0.299, 0.754),
                Vec3::new(0.552, 0.690, 0.996),
                Vec3::new(0.866, 0.866, 0.866),
                Vec3::new(0.956, 0.604, 0.486),
                Vec3::new(0.706, 0.016, 0.150),
            ],
        )
    }

    /// Looks up one of the built-in color maps by name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "grayscale" => Some(Self::grayscale()),
            "viridis" => Some(Self::viridis()),
            "coolwarm" => Some(Self::coolwarm()),
            _ => None,
        }
    }
}

/// A 1D transfer function: 256 RGBA entries plus the value-to-index mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    /// RGBA entries; alpha is opacity in `[0, 1]`.
    pub colors: Vec<Vec4>,
    /// Value-to-index mapping.
    pub mapping: IndexMapping,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self::ramp()
    }
}

impl TransferFunction {
    /// Creates a transfer function from a full table.
    pub fn new(colors: Vec<Vec4>, mapping: IndexMapping) -> Result<Self> {
        let tf = Self { colors, mapping };
        tf.validate()?;
        Ok(tf)
    }

    /// Grey ramp where both intensity and opacity grow linearly with the index.
    pub fn ramp() -> Self {
        Self::from_color_map(&ColorMap::grayscale())
    }

    /// Builds a transfer function from a color map with a linear opacity ramp.
    pub fn from_color_map(color_map: &ColorMap) -> Self {
        let colors = (0..TF_SIZE)
            .map(|i| {
                let t = i as f32 / (TF_SIZE - 1) as f32;
                color_map.sample(t).extend(t)
            })
            .collect();
        Self {
            colors,
            mapping: IndexMapping::default(),
        }
    }

    /// Fully transparent everywhere except `index`, which gets `color`.
    pub fn isolated(index: usize, color: Vec4) -> Self {
        let mut colors = vec![Vec4::ZERO; TF_SIZE];
        colors[index.min(TF_SIZE - 1)] = color;
        Self {
            colors,
            mapping: IndexMapping::default(),
        }
    }

    /// Sets the value-to-index mapping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: IndexMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Fits the mapping to a volume's value range.
    #[must_use]
    pub fn fitted_to(self, minimum: f32, maximum: f32) -> Self {
        self.with_mapping(IndexMapping::spanning(minimum, maximum))
    }

    /// Returns the table index for a value.
    #[must_use]
    pub fn index_of(&self, value: f32) -> usize {
        self.mapping.index_of(value)
    }

    /// Returns the RGBA entry for a value.
    #[must_use]
    pub fn sample(&self, value: f32) -> Vec4 {
        self.colors
            .get(self.index_of(value))
            .copied()
            .unwrap_or(Vec4::ZERO)
    }

    /// Computes the opacity prefix-sum table for this transfer function.
    #[must_use]
    pub fn opacity_sum_table(&self) -> OpacitySumTable {
        OpacitySumTable::compute(self)
    }

    /// Checks the table length and the mapping.
    pub fn validate(&self) -> Result<()> {
        if self.colors.len() != TF_SIZE {
            return Err(VolvisError::InvalidTransferFunction(format!(
                "expected {TF_SIZE} entries, got {}",
                self.colors.len()
            )));
        }
        if !(self.mapping.range.is_finite() && self.mapping.range > 0.0) {
            return Err(VolvisError::InvalidTransferFunction(format!(
                "index range must be positive, got {}",
                self.mapping.range
            )));
        }
        Ok(())
    }
}

/// Prefix sums over the transfer function alpha channel.
///
/// Entry `i` holds the summed alpha of indices `0..=i`, so the opacity of any
/// index range is answered with two lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct OpacitySumTable {
    sums: [f32; TF_SIZE],
    mapping: IndexMapping,
}

impl Default for OpacitySumTable {
    fn default() -> Self {
        Self::compute(&TransferFunction::default())
    }
}

impl OpacitySumTable {
    /// Computes the table from a transfer function.
    pub fn compute(tf: &TransferFunction) -> Self {
        let mut sums = [0.0_f32; TF_SIZE];
        let mut running = 0.0_f32;
        for (sum, color) in sums.iter_mut().zip(tf.colors.iter()) {
            running += color.w;
            *sum = running;
        }
        // Short tables are padded with the last running sum (zero opacity)
        let filled = tf.colors.len().min(TF_SIZE);
        for sum in &mut sums[filled..] {
            *sum = running;
        }
        Self {
            sums,
            mapping: tf.mapping,
        }
    }

    /// Raw prefix sums.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.sums
    }

    /// Raw prefix sums as bytes for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.sums.as_slice())
    }

    /// The value-to-index mapping the table was computed with.
    #[must_use]
    pub fn mapping(&self) -> IndexMapping {
        self.mapping
    }

    /// Summed alpha over the inclusive index range `[lo, hi]`.
    #[must_use]
    pub fn range_opacity(&self, lo: usize, hi: usize) -> f32 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let hi = hi.min(TF_SIZE - 1);
        let lo = lo.min(hi);
        let below = if lo == 0 { 0.0 } else { self.sums[lo - 1] };
        self.sums[hi] - below
    }

    /// Whether any index in `[lo, hi]` has nonzero opacity.
    #[must_use]
    pub fn is_index_range_visible(&self, lo: usize, hi: usize) -> bool {
        self.range_opacity(lo, hi) > 0.0
    }

    /// Whether any value in `[min, max]` maps to a nonzero opacity.
    #[must_use]
    pub fn is_value_range_visible(&self, min: f32, max: f32) -> bool {
        self.is_index_range_visible(self.mapping.index_of(min), self.mapping.index_of(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_mapping_identity() {
        let mapping = IndexMapping::default();
        assert_eq!(mapping.index_of(0.0), 0);
        assert_eq!(mapping.index_of(10.0), 10);
        assert_eq!(mapping.index_of(10.9), 10);
        assert_eq!(mapping.index_of(255.0), 255);
        assert_eq!(mapping.index_of(1000.0), 255);
        assert_eq!(mapping.index_of(-5.0), 0);
        assert_eq!(mapping.index_of(f32::NAN), 0);
    }

    #[test]
    fn test_index_mapping_spanning() {
        let mapping = IndexMapping::spanning(100.0, 200.0);
        assert_eq!(mapping.index_of(100.0), 0);
        assert_eq!(mapping.index_of(150.0), 128);
        assert_eq!(mapping.index_of(200.0), 255);

        let degenerate = IndexMapping::spanning(5.0, 5.0);
        assert_eq!(degenerate.index_of(5.0), 0);
    }

    #[test]
    fn test_prefix_sums() {
        let tf = TransferFunction::ramp();
        let table = tf.opacity_sum_table();
        assert_eq!(table.as_slice()[0], tf.colors[0].w);
        for i in 1..TF_SIZE {
            let expected = table.as_slice()[i - 1] + tf.colors[i].w;
            assert!((table.as_slice()[i] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_isolated_visibility() {
        let tf = TransferFunction::isolated(200, Vec4::ONE);
        let table = tf.opacity_sum_table();
        assert!(!table.is_value_range_visible(0.0, 199.0));
        assert!(table.is_value_range_visible(150.0, 210.0));
        assert!(table.is_value_range_visible(200.0, 200.0));
        assert!(!table.is_value_range_visible(201.0, 255.0));
    }

    #[test]
    fn test_range_opacity_is_order_independent() {
        let table = TransferFunction::ramp().opacity_sum_table();
        assert_eq!(table.range_opacity(10, 20), table.range_opacity(20, 10));
    }

    #[test]
    fn test_validate_rejects_short_table() {
        let result = TransferFunction::new(vec![Vec4::ONE; 10], IndexMapping::default());
        assert!(matches!(
            result,
            Err(VolvisError::InvalidTransferFunction(_))
        ));
    }

    #[test]
    fn test_sample_uses_mapping() {
        let tf = TransferFunction::isolated(255, Vec4::new(1.0, 0.0, 0.0, 1.0))
            .fitted_to(0.0, 1.0);
        assert_eq!(tf.sample(1.0), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(tf.sample(0.0), Vec4::ZERO);
    }

    #[test]
    fn test_color_map_lookup() {
        assert!(ColorMap::by_name("viridis").is_some());
        assert!(ColorMap::by_name("nope").is_none());
        let gray = ColorMap::grayscale();
        assert_eq!(gray.sample(0.5), Vec3::splat(0.5));
    }
}

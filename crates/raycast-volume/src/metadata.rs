use crate::{
    bbox::BoundingBox,
    range::ValueRange,
};
use anyhow::{
    bail,
    ensure,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    #[default]
    Cartesian,
    Rectilinear,
    Tetrahedral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    FloatingPoint,
    UnsignedInteger,
    SignedInteger,
    Bits,
}

/// Description of one volume frame as delivered by a [`crate::source::VolumeSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub grid_type: GridType,
    pub scalar_type: ScalarType,
    /// Bytes per scalar.
    pub scalar_length: usize,
    pub components: usize,
    pub resolution: [u32; 3],
    pub origin: [f32; 3],
    pub extents: [f32; 3],
    pub min_values: Vec<f32>,
    pub max_values: Vec<f32>,
    pub frame_count: u32,
}

impl Metadata {
    pub fn validate(&self) -> Result<()> {
        if self.grid_type != GridType::Cartesian {
            bail!(
                "volume rendering only works with cartesian grids, got {:?}",
                self.grid_type
            );
        }
        ensure!(
            self.resolution.iter().all(|&r| r > 0),
            "volume resolution must be positive, got {:?}",
            self.resolution
        );
        ensure!(
            self.extents.iter().all(|&e| e > 0.0),
            "volume extents must be positive, got {:?}",
            self.extents
        );
        ensure!(self.components >= 1, "volume has no components");
        ensure!(
            !self.min_values.is_empty() && !self.max_values.is_empty(),
            "volume metadata carries no value range"
        );
        Ok(())
    }

    pub fn voxel_count(&self) -> usize {
        self.resolution.iter().map(|&r| r as usize).product()
    }

    pub fn byte_len(&self) -> usize {
        self.voxel_count() * self.scalar_length * self.components
    }

    pub fn max_resolution(&self) -> u32 {
        self.resolution.iter().copied().max().unwrap_or(1)
    }

    pub fn max_extent(&self) -> f32 {
        self.extents.iter().copied().fold(0.0, f32::max)
    }

    /// Distance between neighbouring grid points along the longest axis.
    pub fn voxel_size(&self) -> f32 {
        let intervals = self.max_resolution().saturating_sub(1).max(1);
        self.max_extent() / intervals as f32
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_origin_extents(self.origin, self.extents)
    }

    /// Value range of the first component.
    pub fn value_range(&self) -> ValueRange {
        ValueRange::new(
            self.min_values.first().copied().unwrap_or(0.0),
            self.max_values.first().copied().unwrap_or(1.0),
        )
    }

    /// Texture coordinate mapping for grid points spanning the full extents: a normalized
    /// position `p` in [0, 1] maps to `p * scale + offset`, which hits texel centers at the
    /// boundaries.
    pub fn texel_mapping(&self) -> ([f32; 3], [f32; 3]) {
        let mut scale = [0.0; 3];
        let mut offset = [0.0; 3];
        for axis in 0..3 {
            let res = self.resolution[axis].max(1) as f32;
            scale[axis] = (res - 1.0) / res;
            offset[axis] = 0.5 / res;
        }
        (scale, offset)
    }
}

#[cfg(test)]
pub(crate) fn test_metadata(resolution: [u32; 3]) -> Metadata {
    Metadata {
        grid_type: GridType::Cartesian,
        scalar_type: ScalarType::FloatingPoint,
        scalar_length: 4,
        components: 1,
        resolution,
        origin: [0.0; 3],
        extents: [1.0; 3],
        min_values: vec![0.0],
        max_values: vec![1.0],
        frame_count: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_cartesian() {
        let mut metadata = test_metadata([8, 8, 8]);
        metadata.grid_type = GridType::Rectilinear;
        let error = metadata.validate().unwrap_err();
        assert!(error.to_string().contains("cartesian"));
    }

    #[test]
    fn test_voxel_size_uses_longest_axis() {
        let mut metadata = test_metadata([11, 5, 3]);
        metadata.extents = [2.0, 1.0, 4.0];
        // max extent 4.0 over max resolution 11 -> 10 intervals
        assert!((metadata.voxel_size() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_voxel_size_single_voxel() {
        let metadata = test_metadata([1, 1, 1]);
        assert_eq!(metadata.voxel_size(), 1.0);
    }

    #[test]
    fn test_texel_mapping_hits_texel_centers() {
        let metadata = test_metadata([4, 1, 2]);
        let (scale, offset) = metadata.texel_mapping();
        // first and last grid point of the x axis
        assert!((0.0 * scale[0] + offset[0] - 0.125).abs() < 1e-6);
        assert!((1.0 * scale[0] + offset[0] - 0.875).abs() < 1e-6);
        // a single slice always samples its center
        assert_eq!(scale[1], 0.0);
        assert_eq!(offset[1], 0.5);
    }

    #[test]
    fn test_byte_len() {
        let metadata = test_metadata([4, 4, 2]);
        assert_eq!(metadata.byte_len(), 4 * 4 * 2 * 4);
    }
}

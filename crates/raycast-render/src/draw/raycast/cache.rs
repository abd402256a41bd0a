use raycast_volume::{
    bbox::BoundingBox,
    format::VolumeFormat,
    metadata::Metadata,
    params::{
        RaycastMode,
        RaycastParams,
    },
    range::ValueRange,
    source::VolumeExtents,
};

/// Only the transfer function modes refresh the table, and only on a version change.
pub fn transfer_function_needs_upload(mode: RaycastMode, uploaded: u64, requested: u64) -> bool {
    mode.uses_transfer_function() && uploaded != requested
}

/// Grows both boxes of `extents` to cover the chained renderer's box.
pub fn widen_extents(mut extents: VolumeExtents, chain_box: Option<&BoundingBox>) -> VolumeExtents {
    if let Some(chain_box) = chain_box {
        extents.bounding_box = extents.bounding_box.union(chain_box);
        extents.clip_box = extents.clip_box.union(chain_box);
    }
    extents
}

/// Remembers which frame the volume texture holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeCache {
    uploaded: Option<(u32, u64)>,
}

impl VolumeCache {
    pub fn needs_upload(&self, frame_id: u32, data_hash: u64) -> bool {
        self.uploaded != Some((frame_id, data_hash))
    }

    pub fn store(&mut self, frame_id: u32, data_hash: u64) {
        self.uploaded = Some((frame_id, data_hash));
    }

    pub fn invalidate(&mut self) {
        self.uploaded = None;
    }

    pub fn frame_id(&self) -> Option<u32> {
        self.uploaded.map(|(frame_id, _)| frame_id)
    }
}

/// Geometry and value mapping of the uploaded volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeInfo {
    pub metadata: Metadata,
    pub format: VolumeFormat,
}

impl VolumeInfo {
    pub fn new(metadata: Metadata, format: VolumeFormat) -> Self {
        Self { metadata, format }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.metadata.bounding_box()
    }

    pub fn voxel_size(&self) -> f32 {
        self.metadata.voxel_size()
    }

    pub fn value_range(&self, params: &RaycastParams) -> ValueRange {
        params.effective_value_range(&self.metadata)
    }

    /// World space distance between neighbouring grid points along each axis.
    pub fn gradient_step(&self) -> [f32; 3] {
        let mut step = [0.0; 3];
        for axis in 0..3 {
            let intervals = self.metadata.resolution[axis].saturating_sub(1).max(1);
            step[axis] = self.metadata.extents[axis] / intervals as f32;
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raycast_volume::metadata::{
        GridType,
        ScalarType,
    };

    #[test]
    fn test_cache_tracks_frame_and_hash() {
        let mut cache = VolumeCache::default();
        assert!(cache.needs_upload(0, 7));
        assert_eq!(cache.frame_id(), None);

        cache.store(0, 7);
        assert!(!cache.needs_upload(0, 7));
        assert!(cache.needs_upload(1, 7));
        assert!(cache.needs_upload(0, 8));
        assert_eq!(cache.frame_id(), Some(0));

        cache.invalidate();
        assert!(cache.needs_upload(0, 7));
    }

    #[test]
    fn test_transfer_function_refresh() {
        assert!(transfer_function_needs_upload(RaycastMode::Integration, 0, 1));
        assert!(transfer_function_needs_upload(RaycastMode::Aggregate, 3, 2));
        assert!(!transfer_function_needs_upload(RaycastMode::Integration, 1, 1));
        assert!(!transfer_function_needs_upload(RaycastMode::Isosurface, 0, 1));
    }

    #[test]
    fn test_widen_extents() {
        let volume_box = BoundingBox::from_origin_extents([0.0; 3], [1.0; 3]);
        let extents = VolumeExtents {
            bounding_box: volume_box,
            clip_box: volume_box,
            frame_count: 3,
        };
        assert_eq!(widen_extents(extents, None), extents);

        let chain_box = BoundingBox::from_origin_extents([-1.0, 0.5, 0.5], [1.0, 2.0, 0.25]);
        let widened = widen_extents(extents, Some(&chain_box));
        let expected = BoundingBox::from_origin_extents([-1.0, 0.0, 0.0], [2.0, 2.5, 1.0]);
        assert_eq!(widened.bounding_box, expected);
        assert_eq!(widened.clip_box, expected);
        assert_eq!(widened.frame_count, 3);
    }

    #[test]
    fn test_gradient_step() {
        let info = VolumeInfo::new(
            Metadata {
                grid_type: GridType::Cartesian,
                scalar_type: ScalarType::FloatingPoint,
                scalar_length: 4,
                components: 1,
                resolution: [5, 1, 3],
                origin: [0.0; 3],
                extents: [2.0, 1.0, 4.0],
                min_values: vec![0.0],
                max_values: vec![1.0],
                frame_count: 1,
            },
            VolumeFormat::R32Float,
        );
        // a single sample along y still spans the extent
        assert_eq!(info.gradient_step(), [0.5, 1.0, 2.0]);
        assert_eq!(info.voxel_size(), 1.0);
    }
}

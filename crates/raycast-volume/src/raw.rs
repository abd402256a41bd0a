use crate::{
    bbox::BoundingBox,
    format::VolumeFormat,
    metadata::{
        GridType,
        Metadata,
        ScalarType,
    },
    range::ValueRange,
    source::{
        loaded_frame,
        LoadedFrame,
        VolumeExtents,
        VolumeFrame,
        VolumeSource,
    },
};
use anyhow::{
    ensure,
    Context,
    Result,
};
use bytemuck::Pod;
use num_traits::ToPrimitive;
use raycast_base::path::resolve;
use serde::Deserialize;
use std::path::{
    Path,
    PathBuf,
};

fn default_spacing() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Raw little-endian scalar volume on disk. `path` may be a glob pattern; every match is one
/// frame, in file name order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawVolumeDescriptor {
    pub path: PathBuf,
    pub resolution: [u32; 3],
    pub scalar_type: ScalarType,
    pub scalar_length: usize,
    #[serde(default)]
    pub grid_type: GridType,
    #[serde(default)]
    pub origin: [f32; 3],
    #[serde(default = "default_spacing")]
    pub spacing: [f32; 3],
    /// Scanned from the data when omitted.
    #[serde(default)]
    pub value_range: Option<[f32; 2]>,
}

impl RawVolumeDescriptor {
    /// Grid points span `(resolution - 1) * spacing` on every axis.
    pub fn extents(&self) -> [f32; 3] {
        let mut extents = [0.0; 3];
        for axis in 0..3 {
            let intervals = self.resolution[axis].saturating_sub(1).max(1);
            extents[axis] = intervals as f32 * self.spacing[axis];
        }
        extents
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_origin_extents(self.origin, self.extents())
    }

    fn metadata(&self, frame_count: u32, range: ValueRange) -> Metadata {
        Metadata {
            grid_type: self.grid_type,
            scalar_type: self.scalar_type,
            scalar_length: self.scalar_length,
            components: 1,
            resolution: self.resolution,
            origin: self.origin,
            extents: self.extents(),
            min_values: vec![range.min],
            max_values: vec![range.max],
            frame_count,
        }
    }
}

fn scan<T: Pod + ToPrimitive>(data: &[u8]) -> Option<ValueRange> {
    let values: Vec<T> = bytemuck::pod_collect_to_vec(data);
    ValueRange::from_samples(values.iter().filter_map(|v| v.to_f32()))
}

/// Min/max of little-endian `data` in data units.
pub fn scan_value_range(format: VolumeFormat, data: &[u8]) -> Option<ValueRange> {
    match format {
        VolumeFormat::R32Float => scan::<f32>(data),
        VolumeFormat::R8Unorm => scan::<u8>(data),
        VolumeFormat::R16Unorm => scan::<u16>(data),
        VolumeFormat::R16Snorm => scan::<i16>(data),
    }
}

#[derive(Debug)]
pub struct RawVolumeSource {
    descriptor: RawVolumeDescriptor,
    files: Vec<PathBuf>,
    current: Option<LoadedFrame>,
}

impl RawVolumeSource {
    /// Relative descriptor paths are resolved against `base`.
    pub fn new(descriptor: RawVolumeDescriptor, base: &Path) -> Result<Self> {
        let pattern = resolve(base, &descriptor.path);
        let pattern = pattern.to_str().context("failed to convert to str")?;
        let mut files = Vec::new();
        for entry in glob::glob(pattern)? {
            files.push(entry?);
        }
        files.sort();
        ensure!(!files.is_empty(), "No raw volume file matches {}", pattern);
        log::info!("Raw volume: {} frame(s) from {}", files.len(), pattern);
        Ok(Self {
            descriptor,
            files,
            current: None,
        })
    }

    pub fn frame_count(&self) -> u32 {
        self.files.len() as u32
    }

    fn read_frame(&self, frame_id: u32) -> Result<LoadedFrame> {
        let path = &self.files[frame_id as usize];
        let data = std::fs::read(path).with_context(|| format!("failed to read {:?}", path))?;

        let mut metadata = self
            .descriptor
            .metadata(self.frame_count(), ValueRange::default());
        metadata.validate()?;
        let format = VolumeFormat::from_metadata(&metadata)?;
        ensure!(
            data.len() == metadata.byte_len(),
            "{:?} holds {} bytes, expected {} for resolution {:?}",
            path,
            data.len(),
            metadata.byte_len(),
            metadata.resolution
        );

        let range = match self.descriptor.value_range {
            Some([min, max]) => ValueRange::new(min, max),
            None => scan_value_range(format, &data).unwrap_or_default(),
        };
        metadata.min_values = vec![range.min];
        metadata.max_values = vec![range.max];
        Ok(LoadedFrame::new(frame_id, metadata, data))
    }
}

impl VolumeSource for RawVolumeSource {
    fn extents(&mut self, _frame_id: u32) -> Result<VolumeExtents> {
        let bounding_box = self.descriptor.bounding_box();
        Ok(VolumeExtents {
            bounding_box,
            clip_box: bounding_box,
            frame_count: self.frame_count(),
        })
    }

    fn load_frame(&mut self, frame_id: u32, force: bool) -> Result<u32> {
        ensure!(
            frame_id < self.frame_count(),
            "frame {} is out of range, {} frames match {:?}",
            frame_id,
            self.frame_count(),
            self.descriptor.path
        );
        let cached = matches!(&self.current, Some(frame) if frame.frame_id == frame_id);
        if force || !cached {
            log::debug!("Read raw frame {}", frame_id);
            self.current = Some(self.read_frame(frame_id)?);
        }
        Ok(frame_id)
    }

    fn frame(&self) -> Result<VolumeFrame<'_>> {
        loaded_frame(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::request_frame;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("raycast-raw-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn descriptor(path: &str, scalar_type: ScalarType, scalar_length: usize) -> RawVolumeDescriptor {
        RawVolumeDescriptor {
            path: PathBuf::from(path),
            resolution: [2, 2, 2],
            scalar_type,
            scalar_length,
            grid_type: GridType::Cartesian,
            origin: [0.0; 3],
            spacing: [0.5, 1.0, 2.0],
            value_range: None,
        }
    }

    #[test]
    fn test_descriptor_defaults() {
        let json = r#"{
            "path": "fuel_64x64x64_uint8.raw",
            "resolution": [64, 64, 64],
            "scalar_type": "unsigned_integer",
            "scalar_length": 1
        }"#;
        let descriptor: RawVolumeDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.spacing, [1.0; 3]);
        assert_eq!(descriptor.grid_type, GridType::Cartesian);
        assert_eq!(descriptor.extents(), [63.0; 3]);
        assert!(descriptor.value_range.is_none());
    }

    #[test]
    fn test_loads_frames_and_scans_range() {
        let dir = temp_dir("frames");
        let frame0: Vec<u8> = (0..8u16).flat_map(|v| (v * 100).to_le_bytes()).collect();
        let frame1: Vec<u8> = (0..8u16).flat_map(|v| (v + 7).to_le_bytes()).collect();
        std::fs::write(dir.join("t0.raw"), &frame0).unwrap();
        std::fs::write(dir.join("t1.raw"), &frame1).unwrap();

        let mut source =
            RawVolumeSource::new(descriptor("t*.raw", ScalarType::UnsignedInteger, 2), &dir).unwrap();
        let extents = source.extents(0).unwrap();
        assert_eq!(extents.frame_count, 2);
        assert_eq!(extents.bounding_box.size(), nalgebra_glm::vec3(0.5, 1.0, 2.0));

        let frame = request_frame(&mut source, 1).unwrap();
        assert_eq!(frame.frame_id, 1);
        assert_eq!(frame.metadata.value_range(), ValueRange::new(7.0, 14.0));
        let hash1 = frame.data_hash;

        let frame = request_frame(&mut source, 0).unwrap();
        assert_eq!(frame.metadata.value_range(), ValueRange::new(0.0, 700.0));
        assert_ne!(frame.data_hash, hash1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_out_of_range_frame_fails_at_once() {
        let dir = temp_dir("range");
        std::fs::write(dir.join("t0.raw"), [0u8; 8]).unwrap();
        let mut source =
            RawVolumeSource::new(descriptor("t*.raw", ScalarType::UnsignedInteger, 1), &dir).unwrap();
        let error = source.load_frame(5, true).unwrap_err();
        assert!(error.to_string().contains("out of range"), "{}", error);
        let error = request_frame(&mut source, 5).unwrap_err();
        assert!(error.to_string().contains("out of range"), "{}", error);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let dir = temp_dir("mismatch");
        std::fs::write(dir.join("short.raw"), [0u8; 7]).unwrap();
        let mut source =
            RawVolumeSource::new(descriptor("short.raw", ScalarType::UnsignedInteger, 1), &dir).unwrap();
        let error = source.load_frame(0, true).unwrap_err();
        assert!(error.to_string().contains("expected 8"), "{}", error);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rejects_unsupported_scalar() {
        let dir = temp_dir("scalar");
        std::fs::write(dir.join("wide.raw"), [0u8; 64]).unwrap();
        let mut source =
            RawVolumeSource::new(descriptor("wide.raw", ScalarType::UnsignedInteger, 8), &dir).unwrap();
        let error = source.load_frame(0, true).unwrap_err();
        assert!(error.to_string().contains("unsigned integers"), "{}", error);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let dir = temp_dir("missing");
        assert!(RawVolumeSource::new(descriptor("none.raw", ScalarType::FloatingPoint, 4), &dir).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_scan_value_range_signed() {
        let data: Vec<u8> = [-5i16, 3, 12].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(
            scan_value_range(VolumeFormat::R16Snorm, &data),
            Some(ValueRange::new(-5.0, 12.0))
        );
    }
}

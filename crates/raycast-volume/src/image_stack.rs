use crate::{
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
use std::path::Path;

/// Single-frame volume assembled from a directory of 8-bit grayscale PNG slices. Slices are
/// stacked along z in file name order.
#[derive(Debug)]
pub struct ImageStackSource {
    frame: Option<LoadedFrame>,
}

impl ImageStackSource {
    pub fn open(directory: &Path, spacing: [f32; 3]) -> Result<Self> {
        ensure!(
            directory.is_dir(),
            "Image stack directory doesn't exist: {:?}",
            directory
        );
        let pattern = directory.join("*.png");
        let mut slices = Vec::new();
        for entry in glob::glob(pattern.to_str().context("failed to convert to str")?)? {
            slices.push(entry?);
        }
        slices.sort();
        ensure!(!slices.is_empty(), "No png slices in {:?}", directory);

        let mut data = Vec::new();
        let mut size = None;
        for path in &slices {
            let slice = image::open(path)
                .with_context(|| format!("failed to open slice {:?}", path))?
                .to_luma8();
            let dimensions = slice.dimensions();
            match size {
                None => size = Some(dimensions),
                Some(expected) => ensure!(
                    expected == dimensions,
                    "slice {:?} is {:?}, expected {:?}",
                    path,
                    dimensions,
                    expected
                ),
            }
            data.extend_from_slice(slice.as_raw());
        }
        let (width, height) = size.context("empty image stack")?;
        let resolution = [width, height, slices.len() as u32];
        log::info!("Image stack {:?}: {:?}", directory, resolution);

        let range = ValueRange::from_samples(data.iter().map(|&v| v as f32)).unwrap_or_default();
        let mut extents = [0.0; 3];
        for axis in 0..3 {
            extents[axis] = resolution[axis].saturating_sub(1).max(1) as f32 * spacing[axis];
        }
        let metadata = Metadata {
            grid_type: GridType::Cartesian,
            scalar_type: ScalarType::UnsignedInteger,
            scalar_length: 1,
            components: 1,
            resolution,
            origin: [0.0; 3],
            extents,
            min_values: vec![range.min],
            max_values: vec![range.max],
            frame_count: 1,
        };
        metadata.validate()?;
        Ok(Self {
            frame: Some(LoadedFrame::new(0, metadata, data)),
        })
    }
}

impl VolumeSource for ImageStackSource {
    fn extents(&mut self, _frame_id: u32) -> Result<VolumeExtents> {
        let frame = self.frame()?;
        let bounding_box = frame.metadata.bounding_box();
        Ok(VolumeExtents {
            bounding_box,
            clip_box: bounding_box,
            frame_count: 1,
        })
    }

    fn load_frame(&mut self, frame_id: u32, _force: bool) -> Result<u32> {
        ensure!(frame_id == 0, "frame {} is out of range, an image stack has one frame", frame_id);
        Ok(0)
    }

    fn frame(&self) -> Result<VolumeFrame<'_>> {
        loaded_frame(&self.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{
        GrayImage,
        Luma,
    };
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("raycast-stack-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_stacks_slices_in_name_order() {
        let dir = temp_dir("order");
        for (name, value) in [("slice_01.png", 200u8), ("slice_00.png", 10), ("slice_02.png", 90)] {
            GrayImage::from_pixel(3, 2, Luma([value]))
                .save(dir.join(name))
                .unwrap();
        }

        let mut source = ImageStackSource::open(&dir, [1.0, 1.0, 0.5]).unwrap();
        let frame = source.frame().unwrap();
        assert_eq!(frame.metadata.resolution, [3, 2, 3]);
        assert_eq!(frame.metadata.extents, [2.0, 1.0, 1.0]);
        assert_eq!(frame.metadata.value_range(), ValueRange::new(10.0, 200.0));
        // first slice comes from slice_00
        assert_eq!(frame.data[0], 10);
        assert_eq!(frame.data[6], 200);
        assert_eq!(source.extents(0).unwrap().frame_count, 1);
        assert!(source.load_frame(1, true).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rejects_mismatched_slices() {
        let dir = temp_dir("mismatch");
        GrayImage::new(4, 4).save(dir.join("a.png")).unwrap();
        GrayImage::new(4, 3).save(dir.join("b.png")).unwrap();
        assert!(ImageStackSource::open(&dir, [1.0; 3]).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_directory() {
        let dir = temp_dir("empty");
        let error = ImageStackSource::open(&dir, [1.0; 3]).unwrap_err();
        assert!(error.to_string().contains("No png slices"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

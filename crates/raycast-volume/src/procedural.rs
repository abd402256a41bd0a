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
    Result,
};
use serde::Deserialize;
use std::f32::consts::{
    PI,
    TAU,
};

/// Analytic scalar fields defined on [-1, 1]^3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Radial falloff around a pulsating sphere.
    Sphere,
    /// Distance falloff around a tumbling torus.
    Torus,
    /// Marschner-Lobb test signal.
    MarschnerLobb,
}

impl Field {
    /// Value at `p` for animation phase `phase` in [0, 1).
    pub fn sample(&self, p: [f32; 3], phase: f32) -> f32 {
        let [x, y, z] = p;
        match self {
            Field::Sphere => {
                let radius = 0.6 + 0.2 * (TAU * phase).sin();
                let r = (x * x + y * y + z * z).sqrt();
                (1.0 - r / radius).max(0.0)
            }
            Field::Torus => {
                let (sin, cos) = (TAU * phase).sin_cos();
                // rotate around the x axis
                let (y, z) = (cos * y - sin * z, sin * y + cos * z);
                let ring = ((x * x + y * y).sqrt() - 0.55).hypot(z);
                (1.0 - ring / 0.3).max(0.0)
            }
            Field::MarschnerLobb => {
                let alpha = 0.25;
                let f_m = 6.0 * (1.0 + 0.25 * (TAU * phase).sin());
                let r = (x * x + y * y).sqrt();
                let rho_r = (TAU * f_m * (PI * r / 2.0).cos()).cos();
                (1.0 - (PI * z / 2.0).sin() + alpha * (1.0 + rho_r)) / (2.0 * (1.0 + alpha))
            }
        }
    }
}

/// Generates `frames` animation frames of a [`Field`] as 32-bit floats.
#[derive(Debug)]
pub struct ProceduralSource {
    field: Field,
    resolution: [u32; 3],
    frames: u32,
    current: Option<LoadedFrame>,
}

impl ProceduralSource {
    pub const ORIGIN: [f32; 3] = [-1.0, -1.0, -1.0];
    pub const EXTENTS: [f32; 3] = [2.0, 2.0, 2.0];

    pub fn new(field: Field, resolution: [u32; 3], frames: u32) -> Result<Self> {
        ensure!(
            resolution.iter().all(|&r| r > 0),
            "procedural resolution must be positive, got {:?}",
            resolution
        );
        ensure!(frames > 0, "procedural volume needs at least one frame");
        Ok(Self {
            field,
            resolution,
            frames,
            current: None,
        })
    }

    fn generate(&self, frame_id: u32) -> Result<LoadedFrame> {
        let phase = frame_id as f32 / self.frames as f32;
        let [nx, ny, nz] = self.resolution;
        let coordinate = |i: u32, n: u32| {
            if n > 1 {
                -1.0 + 2.0 * i as f32 / (n - 1) as f32
            } else {
                0.0
            }
        };

        let mut values = Vec::with_capacity(nx as usize * ny as usize * nz as usize);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let p = [coordinate(i, nx), coordinate(j, ny), coordinate(k, nz)];
                    values.push(self.field.sample(p, phase));
                }
            }
        }
        let range = ValueRange::from_samples(values.iter().copied()).unwrap_or_default();
        let metadata = Metadata {
            grid_type: GridType::Cartesian,
            scalar_type: ScalarType::FloatingPoint,
            scalar_length: 4,
            components: 1,
            resolution: self.resolution,
            origin: Self::ORIGIN,
            extents: Self::EXTENTS,
            min_values: vec![range.min],
            max_values: vec![range.max],
            frame_count: self.frames,
        };
        metadata.validate()?;
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Ok(LoadedFrame::new(frame_id, metadata, data))
    }
}

impl VolumeSource for ProceduralSource {
    fn extents(&mut self, _frame_id: u32) -> Result<VolumeExtents> {
        let bounding_box = crate::bbox::BoundingBox::from_origin_extents(Self::ORIGIN, Self::EXTENTS);
        Ok(VolumeExtents {
            bounding_box,
            clip_box: bounding_box,
            frame_count: self.frames,
        })
    }

    // Frames are deterministic, so `force` never needs to regenerate.
    fn load_frame(&mut self, frame_id: u32, _force: bool) -> Result<u32> {
        ensure!(
            frame_id < self.frames,
            "frame {} is out of range, {:?} has {} frames",
            frame_id,
            self.field,
            self.frames
        );
        let cached = matches!(&self.current, Some(frame) if frame.frame_id == frame_id);
        if !cached {
            log::debug!("Generate {:?} frame {}", self.field, frame_id);
            self.current = Some(self.generate(frame_id)?);
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

    #[test]
    fn test_marschner_lobb_range() {
        let mut source = ProceduralSource::new(Field::MarschnerLobb, [41, 41, 41], 1).unwrap();
        let frame = request_frame(&mut source, 0).unwrap();
        let range = frame.metadata.value_range();
        assert!(range.min >= 0.0 && range.max <= 1.0, "{:?}", range);
        assert_eq!(frame.data.len(), 41 * 41 * 41 * 4);
    }

    #[test]
    fn test_sphere_peaks_at_center() {
        let field = Field::Sphere;
        assert!((field.sample([0.0; 3], 0.0) - 1.0).abs() < 1e-6);
        assert_eq!(field.sample([1.0, 1.0, 1.0], 0.0), 0.0);
    }

    #[test]
    fn test_frames_differ() {
        let mut source = ProceduralSource::new(Field::Torus, [8, 8, 8], 4).unwrap();
        let hash0 = request_frame(&mut source, 0).unwrap().data_hash;
        let hash1 = request_frame(&mut source, 1).unwrap().data_hash;
        assert_ne!(hash0, hash1);
        // reloading the same frame keeps the hash
        assert_eq!(request_frame(&mut source, 1).unwrap().data_hash, hash1);
    }

    #[test]
    fn test_out_of_range_frame_fails() {
        let mut source = ProceduralSource::new(Field::Sphere, [4, 4, 4], 3).unwrap();
        assert!(source.load_frame(10, true).is_err());
        assert!(request_frame(&mut source, 10).is_err());
        assert_eq!(source.load_frame(2, true).unwrap(), 2);
    }

    #[test]
    fn test_rejects_empty_resolution() {
        assert!(ProceduralSource::new(Field::Sphere, [0, 4, 4], 1).is_err());
        assert!(ProceduralSource::new(Field::Sphere, [4, 4, 4], 0).is_err());
    }
}

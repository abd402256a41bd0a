use anyhow::{
    ensure,
    Result,
};
use serde::Deserialize;

pub const DEFAULT_RESOLUTION: usize = 256;

fn default_resolution() -> usize {
    DEFAULT_RESOLUTION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Grayscale,
    Fire,
    Cool,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Grayscale, Preset::Fire, Preset::Cool];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Grayscale => "grayscale",
            Preset::Fire => "fire",
            Preset::Cool => "cool",
        }
    }

    fn points(&self) -> Vec<ControlPoint> {
        let point = |position, color| ControlPoint { position, color };
        match self {
            Preset::Grayscale => vec![point(0.0, [0.0; 4]), point(1.0, [1.0; 4])],
            Preset::Fire => vec![
                point(0.0, [0.0, 0.0, 0.0, 0.0]),
                point(0.33, [0.8, 0.1, 0.0, 0.2]),
                point(0.66, [1.0, 0.6, 0.0, 0.6]),
                point(1.0, [1.0, 1.0, 0.9, 1.0]),
            ],
            Preset::Cool => vec![
                point(0.0, [0.0, 0.2, 0.4, 0.0]),
                point(0.5, [0.0, 0.6, 0.8, 0.4]),
                point(1.0, [0.8, 1.0, 1.0, 1.0]),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ControlPoint {
    pub position: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFunctionDescriptor {
    Preset(Preset),
    Points {
        #[serde(default = "default_resolution")]
        resolution: usize,
        points: Vec<ControlPoint>,
    },
}

impl Default for TransferFunctionDescriptor {
    fn default() -> Self {
        TransferFunctionDescriptor::Preset(Preset::Grayscale)
    }
}

/// RGBA lookup table over the normalized value range. The first texel belongs to 0, the last
/// one to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    pub texels: Vec<[f32; 4]>,
    /// Bumped on every change so consumers can skip redundant uploads.
    pub version: u64,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self::grayscale()
    }
}

impl TransferFunction {
    pub fn grayscale() -> Self {
        Self {
            texels: sample_points(&Preset::Grayscale.points(), DEFAULT_RESOLUTION),
            version: 0,
        }
    }

    pub fn from_descriptor(descriptor: &TransferFunctionDescriptor) -> Result<Self> {
        let texels = match descriptor {
            TransferFunctionDescriptor::Preset(preset) => {
                sample_points(&preset.points(), DEFAULT_RESOLUTION)
            }
            TransferFunctionDescriptor::Points { resolution, points } => {
                ensure!(*resolution >= 2, "transfer function needs at least 2 texels");
                ensure!(!points.is_empty(), "transfer function has no control points");
                for point in points {
                    ensure!(
                        (0.0..=1.0).contains(&point.position),
                        "control point position {} is outside [0, 1]",
                        point.position
                    );
                }
                let mut points = points.clone();
                points.sort_by(|a, b| a.position.total_cmp(&b.position));
                sample_points(&points, *resolution)
            }
        };
        Ok(Self { texels, version: 0 })
    }

    pub fn resolution(&self) -> usize {
        self.texels.len()
    }

    /// Linearly interpolated color at normalized value `t`. Transparent black for an empty
    /// table.
    pub fn lookup(&self, t: f32) -> [f32; 4] {
        if self.texels.is_empty() {
            return [0.0; 4];
        }
        let last = self.texels.len().saturating_sub(1);
        let x = t.clamp(0.0, 1.0) * last as f32;
        let i = (x.floor() as usize).min(last);
        let j = (i + 1).min(last);
        lerp(self.texels[i], self.texels[j], x - i as f32)
    }
}

fn lerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let mut out = [0.0; 4];
    for c in 0..4 {
        out[c] = a[c] + (b[c] - a[c]) * t;
    }
    out
}

/// `points` must be sorted by position.
fn sample_points(points: &[ControlPoint], resolution: usize) -> Vec<[f32; 4]> {
    (0..resolution)
        .map(|i| {
            let t = i as f32 / (resolution - 1) as f32;
            let upper = points.partition_point(|p| p.position < t);
            if upper == 0 {
                points[0].color
            } else if upper == points.len() {
                points[points.len() - 1].color
            } else {
                let (a, b) = (&points[upper - 1], &points[upper]);
                let span = b.position - a.position;
                let s = if span > 0.0 { (t - a.position) / span } else { 1.0 };
                lerp(a.color, b.color, s)
            }
        })
        .collect()
}

/// Transfer function provider. `None` signals a failed request; callers keep whatever they
/// uploaded last.
pub trait TransferFunctionSource {
    fn request(&mut self) -> Option<&TransferFunction>;
}

/// Provider holding a single transfer function that can be swapped at runtime.
#[derive(Debug, Clone, Default)]
pub struct StaticTransferFunction {
    transfer_function: TransferFunction,
}

impl StaticTransferFunction {
    pub fn new(mut transfer_function: TransferFunction) -> Self {
        transfer_function.version = 1;
        Self { transfer_function }
    }

    pub fn replace(&mut self, mut transfer_function: TransferFunction) {
        transfer_function.version = self.transfer_function.version + 1;
        self.transfer_function = transfer_function;
    }

    pub fn current(&self) -> &TransferFunction {
        &self.transfer_function
    }
}

impl TransferFunctionSource for StaticTransferFunction {
    fn request(&mut self) -> Option<&TransferFunction> {
        Some(&self.transfer_function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_color_eq(a: [f32; 4], b: [f32; 4]) {
        for c in 0..4 {
            assert!((a[c] - b[c]).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_grayscale_ramp() {
        let tf = TransferFunction::grayscale();
        assert_eq!(tf.resolution(), DEFAULT_RESOLUTION);
        assert_color_eq(tf.lookup(0.0), [0.0; 4]);
        assert_color_eq(tf.lookup(1.0), [1.0; 4]);
        assert_color_eq(tf.lookup(0.5), [0.5; 4]);
        // out of range lookups clamp
        assert_color_eq(tf.lookup(-3.0), [0.0; 4]);
    }

    #[test]
    fn test_points_are_sorted_and_interpolated() {
        let json = r#"{ "points": {
            "resolution": 5,
            "points": [
                { "position": 1.0, "color": [0.0, 0.0, 1.0, 1.0] },
                { "position": 0.5, "color": [1.0, 0.0, 0.0, 0.5] }
            ]
        } }"#;
        let descriptor: TransferFunctionDescriptor = serde_json::from_str(json).unwrap();
        let tf = TransferFunction::from_descriptor(&descriptor).unwrap();
        assert_eq!(tf.resolution(), 5);
        // before the first point the first color is held
        assert_color_eq(tf.texels[0], [1.0, 0.0, 0.0, 0.5]);
        assert_color_eq(tf.texels[2], [1.0, 0.0, 0.0, 0.5]);
        assert_color_eq(tf.texels[3], [0.5, 0.0, 0.5, 0.75]);
        assert_color_eq(tf.texels[4], [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_preset_descriptor() {
        let descriptor: TransferFunctionDescriptor = serde_json::from_str(r#"{ "preset": "fire" }"#).unwrap();
        assert_eq!(descriptor, TransferFunctionDescriptor::Preset(Preset::Fire));
        let tf = TransferFunction::from_descriptor(&descriptor).unwrap();
        assert_color_eq(tf.lookup(1.0), [1.0, 1.0, 0.9, 1.0]);
    }

    #[test]
    fn test_invalid_points() {
        let empty = TransferFunctionDescriptor::Points {
            resolution: 16,
            points: vec![],
        };
        assert!(TransferFunction::from_descriptor(&empty).is_err());
        let outside = TransferFunctionDescriptor::Points {
            resolution: 16,
            points: vec![ControlPoint {
                position: 1.5,
                color: [1.0; 4],
            }],
        };
        assert!(TransferFunction::from_descriptor(&outside).is_err());
    }

    #[test]
    fn test_empty_table_is_transparent() {
        let empty = TransferFunction {
            texels: Vec::new(),
            version: 0,
        };
        assert_eq!(empty.lookup(0.5), [0.0; 4]);
    }

    #[test]
    fn test_replace_bumps_version() {
        let mut source = StaticTransferFunction::new(TransferFunction::grayscale());
        let first = source.request().unwrap().version;
        source.replace(TransferFunction::from_descriptor(&TransferFunctionDescriptor::Preset(Preset::Cool)).unwrap());
        assert!(source.request().unwrap().version > first);
    }
}

use crate::{
    metadata::Metadata,
    range::ValueRange,
};
use anyhow::{
    ensure,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Upper bound for `ray_step_ratio`, in samples per voxel.
pub const MAX_RAY_STEP_RATIO: f32 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaycastMode {
    #[default]
    Integration,
    Isosurface,
    Aggregate,
}

impl RaycastMode {
    pub const ALL: [RaycastMode; 3] = [
        RaycastMode::Integration,
        RaycastMode::Isosurface,
        RaycastMode::Aggregate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RaycastMode::Integration => "Integration",
            RaycastMode::Isosurface => "Isosurface",
            RaycastMode::Aggregate => "Aggregate",
        }
    }

    /// Index shared with the shaders.
    pub fn index(&self) -> u32 {
        match self {
            RaycastMode::Integration => 0,
            RaycastMode::Isosurface => 1,
            RaycastMode::Aggregate => 2,
        }
    }

    pub fn uses_transfer_function(&self) -> bool {
        matches!(self, RaycastMode::Integration | RaycastMode::Aggregate)
    }

    pub fn shows_opacity_threshold(&self) -> bool {
        *self == RaycastMode::Integration
    }

    pub fn shows_iso_controls(&self) -> bool {
        *self == RaycastMode::Isosurface
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingParams {
    pub use_lighting: bool,
    pub ka: f32,
    pub kd: f32,
    pub ks: f32,
    pub shininess: f32,
    pub ambient_color: [f32; 3],
    pub specular_color: [f32; 3],
    pub light_color: [f32; 3],
    pub material_color: [f32; 3],
    /// Direction towards the light in world space, used without headlight.
    pub light_position: [f32; 3],
    pub headlight: bool,
}

impl Default for LightingParams {
    fn default() -> Self {
        Self {
            use_lighting: false,
            ka: 0.1,
            kd: 0.5,
            ks: 0.4,
            shininess: 10.0,
            ambient_color: [1.0; 3],
            specular_color: [1.0; 3],
            light_color: [1.0; 3],
            material_color: [0.95, 0.67, 0.47],
            light_position: [0.0, 0.0, 1.0],
            headlight: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeOverride {
    pub enabled: bool,
    pub min: f32,
    pub max: f32,
}

impl Default for RangeOverride {
    fn default() -> Self {
        Self {
            enabled: false,
            min: 0.0,
            max: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaycastParams {
    pub mode: RaycastMode,
    /// Samples per voxel.
    pub ray_step_ratio: f32,
    pub opacity_threshold: f32,
    /// In normalized value range units.
    pub iso_value: f32,
    pub opacity: f32,
    pub lighting: LightingParams,
    pub range_override: RangeOverride,
    pub background: [f32; 4],
}

impl Default for RaycastParams {
    fn default() -> Self {
        Self {
            mode: RaycastMode::Integration,
            ray_step_ratio: 1.0,
            opacity_threshold: 1.0,
            iso_value: 0.5,
            opacity: 1.0,
            lighting: LightingParams::default(),
            range_override: RangeOverride::default(),
            background: [1.0; 4],
        }
    }
}

impl RaycastParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.ray_step_ratio > 0.0 && self.ray_step_ratio <= MAX_RAY_STEP_RATIO,
            "ray step ratio must be in (0, {}], got {}",
            MAX_RAY_STEP_RATIO,
            self.ray_step_ratio
        );
        let lighting = &self.lighting;
        for (name, value) in [
            ("ka", lighting.ka),
            ("kd", lighting.kd),
            ("ks", lighting.ks),
            ("shininess", lighting.shininess),
        ] {
            ensure!(value >= 0.0, "{} must not be negative, got {}", name, value);
        }
        if self.range_override.enabled {
            ensure!(
                self.range_override.min <= self.range_override.max,
                "value range override min {} exceeds max {}",
                self.range_override.min,
                self.range_override.max
            );
        }
        Ok(())
    }

    pub fn effective_value_range(&self, metadata: &Metadata) -> ValueRange {
        if self.range_override.enabled {
            ValueRange::new(self.range_override.min, self.range_override.max)
        } else {
            metadata.value_range()
        }
    }

    pub fn step_length(&self, voxel_size: f32) -> f32 {
        voxel_size / self.ray_step_ratio
    }

    /// Steps needed to traverse a box with the given diagonal.
    pub fn max_steps(&self, voxel_size: f32, diagonal: f32) -> u32 {
        let step = self.step_length(voxel_size);
        if !(step > 0.0) {
            return 0;
        }
        ((diagonal / step).ceil() as u32).saturating_add(1)
    }
}

/// Adjusts a transfer function opacity given for unit sampling to `ratio` samples per voxel.
pub fn opacity_correction(alpha: f32, ratio: f32) -> f32 {
    1.0 - (1.0 - alpha.clamp(0.0, 1.0)).powf(1.0 / ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_metadata;

    #[test]
    fn test_defaults_from_empty_json() {
        let params: RaycastParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, RaycastParams::default());
        assert_eq!(params.mode, RaycastMode::Integration);
        assert_eq!(params.lighting.material_color, [0.95, 0.67, 0.47]);
        assert_eq!(params.background, [1.0; 4]);
    }

    #[test]
    fn test_partial_json() {
        let params: RaycastParams = serde_json::from_str(
            r#"{ "mode": "isosurface", "iso_value": 0.3, "lighting": { "use_lighting": true } }"#,
        )
        .unwrap();
        assert_eq!(params.mode, RaycastMode::Isosurface);
        assert_eq!(params.iso_value, 0.3);
        assert!(params.lighting.use_lighting);
        assert_eq!(params.lighting.kd, 0.5);
    }

    #[test]
    fn test_validate() {
        assert!(RaycastParams::default().validate().is_ok());

        let mut params = RaycastParams::default();
        params.ray_step_ratio = 0.0;
        assert!(params.validate().is_err());

        let mut params = RaycastParams::default();
        params.lighting.ks = -0.1;
        assert!(params.validate().is_err());

        let mut params = RaycastParams::default();
        params.range_override = RangeOverride {
            enabled: true,
            min: 2.0,
            max: 1.0,
        };
        assert!(params.validate().is_err());
        // a disabled override is not checked
        params.range_override.enabled = false;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_effective_value_range() {
        let mut metadata = test_metadata([2, 2, 2]);
        metadata.min_values = vec![-4.0];
        metadata.max_values = vec![12.0];
        let mut params = RaycastParams::default();
        assert_eq!(params.effective_value_range(&metadata), ValueRange::new(-4.0, 12.0));
        params.range_override = RangeOverride {
            enabled: true,
            min: 0.0,
            max: 5.0,
        };
        assert_eq!(params.effective_value_range(&metadata), ValueRange::new(0.0, 5.0));
    }

    #[test]
    fn test_control_visibility() {
        assert!(RaycastMode::Integration.shows_opacity_threshold());
        assert!(!RaycastMode::Aggregate.shows_opacity_threshold());
        assert!(RaycastMode::Isosurface.shows_iso_controls());
        assert!(!RaycastMode::Isosurface.uses_transfer_function());
        assert!(RaycastMode::Aggregate.uses_transfer_function());
    }

    #[test]
    fn test_opacity_correction() {
        // unit ratio keeps the opacity
        assert!((opacity_correction(0.3, 1.0) - 0.3).abs() < 1e-6);
        // two half steps compose to one full step
        let half = opacity_correction(0.3, 2.0);
        assert!((1.0 - (1.0 - half) * (1.0 - half) - 0.3).abs() < 1e-6);
        assert_eq!(opacity_correction(1.0, 4.0), 1.0);
    }

    #[test]
    fn test_step_length() {
        let mut params = RaycastParams::default();
        params.ray_step_ratio = 4.0;
        assert_eq!(params.step_length(0.5), 0.125);
        assert_eq!(params.max_steps(0.5, 1.0), 9);
    }

    #[test]
    fn test_huge_step_ratio() {
        let mut params = RaycastParams::default();
        params.ray_step_ratio = 1e12;
        assert!(params.validate().is_err());
        assert_eq!(params.max_steps(1.0, 2.0), u32::MAX);

        params.ray_step_ratio = MAX_RAY_STEP_RATIO;
        assert!(params.validate().is_ok());
    }
}

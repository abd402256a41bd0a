//! CPU ray caster following the compute shaders step for step. The application uses it for
//! the crosshair read-out, the tests use it to pin down the marching rules.

use crate::{
    bbox::BoundingBox,
    format::VolumeFormat,
    metadata::Metadata,
    params::{
        opacity_correction,
        LightingParams,
        RaycastMode,
        RaycastParams,
    },
    range::ValueRange,
    source::VolumeFrame,
    transfer::TransferFunction,
};
use anyhow::{
    ensure,
    Result,
};
use nalgebra_glm::{
    Mat4,
    Vec2,
    Vec3,
    Vec4,
};

/// Bisection steps refining an isosurface crossing.
pub const ISO_REFINEMENT_STEPS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Ray through `ndc`, unprojected at the near (0) and far (1) depth.
    pub fn from_ndc(inv_view_proj: &Mat4, ndc: Vec2) -> Self {
        let near = unproject(inv_view_proj, ndc, 0.0);
        let far = unproject(inv_view_proj, ndc, 1.0);
        Self::new(near, far - near)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

pub fn unproject(inv_view_proj: &Mat4, ndc: Vec2, depth: f32) -> Vec3 {
    let p = inv_view_proj * Vec4::new(ndc.x, ndc.y, depth, 1.0);
    p.xyz() / p.w
}

/// Trilinear sampling of one volume frame in world space. Grid points sit on the vertices of
/// the lattice spanning `origin .. origin + extents`.
pub struct VolumeSampler<'a> {
    metadata: &'a Metadata,
    data: &'a [u8],
    format: VolumeFormat,
}

impl<'a> VolumeSampler<'a> {
    pub fn new(frame: &VolumeFrame<'a>) -> Result<Self> {
        frame.metadata.validate()?;
        let format = VolumeFormat::from_metadata(frame.metadata)?;
        ensure!(
            frame.data.len() >= frame.metadata.byte_len(),
            "volume frame holds {} bytes, expected {}",
            frame.data.len(),
            frame.metadata.byte_len()
        );
        Ok(Self {
            metadata: frame.metadata,
            data: frame.data,
            format,
        })
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.metadata.bounding_box()
    }

    fn voxel(&self, x: u32, y: u32, z: u32) -> f32 {
        let [nx, ny, _] = self.metadata.resolution;
        let index = (z as usize * ny as usize + y as usize) * nx as usize + x as usize;
        self.format.decode(self.data, index)
    }

    /// Value in data units; positions outside the box clamp to the boundary.
    pub fn sample(&self, position: &Vec3) -> f32 {
        let mut base = [0u32; 3];
        let mut next = [0u32; 3];
        let mut fraction = [0.0f32; 3];
        for axis in 0..3 {
            let res = self.metadata.resolution[axis];
            let normalized =
                (position[axis] - self.metadata.origin[axis]) / self.metadata.extents[axis];
            let x = normalized.clamp(0.0, 1.0) * (res - 1) as f32;
            base[axis] = (x.floor() as u32).min(res - 1);
            next[axis] = (base[axis] + 1).min(res - 1);
            fraction[axis] = x - base[axis] as f32;
        }
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let corner = |dx: bool, dy: bool, dz: bool| {
            self.voxel(
                if dx { next[0] } else { base[0] },
                if dy { next[1] } else { base[1] },
                if dz { next[2] } else { base[2] },
            )
        };
        let x00 = lerp(corner(false, false, false), corner(true, false, false), fraction[0]);
        let x10 = lerp(corner(false, true, false), corner(true, true, false), fraction[0]);
        let x01 = lerp(corner(false, false, true), corner(true, false, true), fraction[0]);
        let x11 = lerp(corner(false, true, true), corner(true, true, true), fraction[0]);
        let y0 = lerp(x00, x10, fraction[1]);
        let y1 = lerp(x01, x11, fraction[1]);
        lerp(y0, y1, fraction[2])
    }

    /// Central-difference gradient with a one voxel step per axis.
    pub fn gradient(&self, position: &Vec3) -> Vec3 {
        let mut gradient = Vec3::zeros();
        for axis in 0..3 {
            let intervals = self.metadata.resolution[axis].saturating_sub(1).max(1);
            let h = self.metadata.extents[axis] / intervals as f32;
            let mut offset = Vec3::zeros();
            offset[axis] = h;
            gradient[axis] =
                (self.sample(&(position + offset)) - self.sample(&(position - offset))) / (2.0 * h);
        }
        gradient
    }

    /// Marches `ray` through the volume. `None` when the ray misses the box.
    pub fn probe(
        &self,
        ray: &Ray,
        params: &RaycastParams,
        range: &ValueRange,
        transfer_function: &TransferFunction,
    ) -> Option<ProbeResult> {
        let (t_near, t_far) = self.bounding_box().intersect_ray(&ray.origin, &ray.direction)?;
        let voxel_size = self.metadata.voxel_size();
        let step = params.step_length(voxel_size);
        let max_steps = params.max_steps(voxel_size, self.bounding_box().diagonal());

        let mut result = ProbeResult {
            entry: ray.at(t_near),
            samples: 0,
            max_value: f32::NEG_INFINITY,
            color: [0.0; 4],
            opacity: 0.0,
            terminated_early: false,
            iso_hit: None,
        };
        let iso = range.denormalize(params.iso_value);
        let mut previous: Option<(f32, f32)> = None;

        for i in 0..max_steps {
            let t = t_near + (i as f32 + 0.5) * step;
            if t > t_far {
                break;
            }
            let position = ray.at(t);
            let value = self.sample(&position);
            result.samples += 1;
            result.max_value = result.max_value.max(value);

            match params.mode {
                RaycastMode::Integration => {
                    let mut color = transfer_function.lookup(range.normalize(value));
                    let alpha = opacity_correction(color[3], params.ray_step_ratio);
                    if params.lighting.use_lighting {
                        let normal = facing_normal(&self.gradient(&position), &ray.direction);
                        let base = [color[0], color[1], color[2]];
                        let lit = shade(&params.lighting, &normal, &-ray.direction, &base);
                        color[..3].copy_from_slice(&lit);
                    }
                    let weight = (1.0 - result.opacity) * alpha;
                    for c in 0..3 {
                        result.color[c] += weight * color[c];
                    }
                    result.opacity += weight;
                    if result.opacity >= params.opacity_threshold {
                        result.terminated_early = true;
                        break;
                    }
                }
                RaycastMode::Isosurface => {
                    if let Some((t_prev, v_prev)) = previous {
                        if (v_prev < iso) != (value < iso) {
                            let hit = self.refine_iso(ray, iso, (t_prev, v_prev), t);
                            let normal = facing_normal(&self.gradient(&hit), &ray.direction);
                            let material = params.lighting.material_color;
                            let rgb = if params.lighting.use_lighting {
                                shade(&params.lighting, &normal, &-ray.direction, &material)
                            } else {
                                material
                            };
                            result.color = [rgb[0], rgb[1], rgb[2], params.opacity];
                            result.opacity = params.opacity;
                            result.iso_hit = Some(IsoHit {
                                position: hit,
                                normal,
                            });
                            break;
                        }
                    }
                    previous = Some((t, value));
                }
                RaycastMode::Aggregate => {}
            }
        }
        if params.mode == RaycastMode::Integration {
            result.color[3] = result.opacity;
        }
        if params.mode == RaycastMode::Aggregate && result.samples > 0 {
            let t = range.normalize(result.max_value);
            result.color = transfer_function.lookup(t);
            result.opacity = result.color[3];
        }
        Some(result)
    }

    fn refine_iso(&self, ray: &Ray, iso: f32, previous: (f32, f32), t: f32) -> Vec3 {
        let (mut t_low, v_low) = previous;
        let mut t_high = t;
        let below = v_low < iso;
        for _ in 0..ISO_REFINEMENT_STEPS {
            let t_mid = 0.5 * (t_low + t_high);
            if (self.sample(&ray.at(t_mid)) < iso) == below {
                t_low = t_mid;
            } else {
                t_high = t_mid;
            }
        }
        ray.at(0.5 * (t_low + t_high))
    }
}

/// Range a probe normalizes by. Aggregate follows the composite pass and maps through the
/// range gathered over the last rendered frame, ignoring the override; before the first
/// read-back it falls back to the data range.
pub fn probe_value_range(
    params: &RaycastParams,
    metadata: &Metadata,
    gathered: Option<ValueRange>,
) -> ValueRange {
    match params.mode {
        RaycastMode::Aggregate => gathered.unwrap_or_else(|| metadata.value_range()),
        _ => params.effective_value_range(metadata),
    }
}

/// Unit normal along `gradient`, flipped to face against `direction`.
pub fn facing_normal(gradient: &Vec3, direction: &Vec3) -> Vec3 {
    let length = gradient.norm();
    if length <= f32::EPSILON {
        return -direction;
    }
    let normal = gradient / length;
    if normal.dot(direction) > 0.0 {
        -normal
    } else {
        normal
    }
}

/// Blinn-Phong. The headlight shines along the view direction.
pub fn shade(lighting: &LightingParams, normal: &Vec3, to_eye: &Vec3, base: &[f32; 3]) -> [f32; 3] {
    let light = if lighting.headlight {
        *to_eye
    } else {
        Vec3::from_row_slice(&lighting.light_position).normalize()
    };
    let half = (light + to_eye).normalize();
    let diffuse = normal.dot(&light).max(0.0);
    let specular = normal.dot(&half).max(0.0).powf(lighting.shininess);
    let mut out = [0.0; 3];
    for c in 0..3 {
        out[c] = lighting.ka * lighting.ambient_color[c] * base[c]
            + lighting.kd * diffuse * lighting.light_color[c] * base[c]
            + lighting.ks * specular * lighting.specular_color[c] * lighting.light_color[c];
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoHit {
    pub position: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    /// Where the ray enters the volume box.
    pub entry: Vec3,
    pub samples: u32,
    /// Largest value along the ray in data units.
    pub max_value: f32,
    pub color: [f32; 4],
    pub opacity: f32,
    pub terminated_early: bool,
    pub iso_hit: Option<IsoHit>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::test_metadata,
        params::RangeOverride,
        source::LoadedFrame,
    };

    /// Linear ramp along x from 0 to 1 over a unit cube.
    fn ramp_frame(resolution: u32) -> LoadedFrame {
        let metadata = test_metadata([resolution; 3]);
        let mut data = Vec::new();
        for _z in 0..resolution {
            for _y in 0..resolution {
                for x in 0..resolution {
                    let value = x as f32 / (resolution - 1) as f32;
                    data.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        LoadedFrame::new(0, metadata, data)
    }

    fn x_ray() -> Ray {
        Ray::new(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn test_trilinear_sampling() {
        let frame = ramp_frame(5);
        let sampler = VolumeSampler::new(&frame.as_frame()).unwrap();
        assert!((sampler.sample(&Vec3::new(0.375, 0.1, 0.9)) - 0.375).abs() < 1e-6);
        // clamped outside the box
        assert_eq!(sampler.sample(&Vec3::new(2.0, 0.5, 0.5)), 1.0);
        let gradient = sampler.gradient(&Vec3::new(0.5, 0.5, 0.5));
        assert!((gradient.x - 1.0).abs() < 1e-5);
        assert!(gradient.y.abs() < 1e-6);
    }

    #[test]
    fn test_miss_returns_none() {
        let frame = ramp_frame(5);
        let sampler = VolumeSampler::new(&frame.as_frame()).unwrap();
        let ray = Ray::new(Vec3::new(-1.0, 3.0, 0.5), Vec3::new(1.0, 0.0, 0.0));
        let tf = TransferFunction::grayscale();
        assert!(sampler
            .probe(&ray, &RaycastParams::default(), &ValueRange::default(), &tf)
            .is_none());
    }

    #[test]
    fn test_step_count_follows_ratio() {
        let frame = ramp_frame(5);
        let sampler = VolumeSampler::new(&frame.as_frame()).unwrap();
        let tf = TransferFunction::grayscale();
        let mut params = RaycastParams::default();
        params.mode = RaycastMode::Aggregate;

        // voxel size 0.25 gives 4 samples across the unit box
        let result = sampler.probe(&x_ray(), &params, &ValueRange::default(), &tf).unwrap();
        assert_eq!(result.samples, 4);
        assert!((result.entry.x - 0.0).abs() < 1e-6);

        params.ray_step_ratio = 2.0;
        let result = sampler.probe(&x_ray(), &params, &ValueRange::default(), &tf).unwrap();
        assert_eq!(result.samples, 8);
        // last sample at 0.9375
        assert!((result.max_value - 0.9375).abs() < 1e-5);
    }

    #[test]
    fn test_early_termination() {
        let frame = ramp_frame(5);
        let sampler = VolumeSampler::new(&frame.as_frame()).unwrap();
        let opaque = TransferFunction {
            texels: vec![[1.0, 0.0, 0.0, 0.6]; 4],
            version: 0,
        };
        let mut params = RaycastParams::default();
        params.opacity_threshold = 0.8;
        let result = sampler.probe(&x_ray(), &params, &ValueRange::default(), &opaque).unwrap();
        // 0.6 then 0.84 crosses the threshold on the second sample
        assert!(result.terminated_early);
        assert_eq!(result.samples, 2);
        assert!((result.opacity - 0.84).abs() < 1e-5);
        assert!((result.color[0] - 0.84).abs() < 1e-5);

        params.opacity_threshold = 1.0;
        let result = sampler.probe(&x_ray(), &params, &ValueRange::default(), &opaque).unwrap();
        assert!(!result.terminated_early);
        assert_eq!(result.samples, 4);
    }

    #[test]
    fn test_isosurface_hit() {
        let frame = ramp_frame(9);
        let sampler = VolumeSampler::new(&frame.as_frame()).unwrap();
        let tf = TransferFunction::grayscale();
        let mut params = RaycastParams::default();
        params.mode = RaycastMode::Isosurface;
        params.iso_value = 0.4;
        params.opacity = 0.7;

        let result = sampler.probe(&x_ray(), &params, &ValueRange::default(), &tf).unwrap();
        let hit = result.iso_hit.unwrap();
        // bisection narrows the crossing to step / 64
        assert!((hit.position.x - 0.4).abs() < 0.125 / 32.0, "{:?}", hit.position);
        // the normal faces the viewer
        assert!((hit.normal - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1e-4);
        assert_eq!(result.color[3], 0.7);
        assert_eq!(&result.color[..3], &params.lighting.material_color);
    }

    #[test]
    fn test_isosurface_in_value_range_units() {
        let frame = ramp_frame(9);
        let sampler = VolumeSampler::new(&frame.as_frame()).unwrap();
        let tf = TransferFunction::grayscale();
        let mut params = RaycastParams::default();
        params.mode = RaycastMode::Isosurface;
        params.iso_value = 0.5;
        // the iso value is relative to the range, 0.5 of [0, 0.5] is 0.25
        let range = ValueRange::new(0.0, 0.5);
        let hit = sampler.probe(&x_ray(), &params, &range, &tf).unwrap().iso_hit.unwrap();
        assert!((hit.position.x - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_aggregate_uses_gathered_range() {
        let frame = ramp_frame(5);
        let sampler = VolumeSampler::new(&frame.as_frame()).unwrap();
        let tf = TransferFunction::grayscale();
        let mut params = RaycastParams::default();
        params.mode = RaycastMode::Aggregate;
        params.range_override = RangeOverride {
            enabled: true,
            min: 0.0,
            max: 10.0,
        };
        let gathered = ValueRange::new(0.0, 1.5);

        let range = probe_value_range(&params, &frame.metadata, Some(gathered));
        assert_eq!(range, gathered);
        let result = sampler.probe(&x_ray(), &params, &range, &tf).unwrap();
        // max value 0.875 over the gathered [0, 1.5], not the override
        let expected = 0.875 / 1.5;
        assert!((result.color[0] - expected).abs() < 1e-2, "{:?}", result.color);

        // no read-back yet
        let range = probe_value_range(&params, &frame.metadata, None);
        assert_eq!(range, ValueRange::new(0.0, 1.0));

        // the other modes keep honoring the override
        params.mode = RaycastMode::Integration;
        let range = probe_value_range(&params, &frame.metadata, Some(gathered));
        assert_eq!(range, ValueRange::new(0.0, 10.0));
    }

    #[test]
    fn test_from_ndc_identity() {
        let ray = Ray::from_ndc(&Mat4::identity(), Vec2::new(0.25, -0.5));
        assert_eq!(ray.origin, Vec3::new(0.25, -0.5, 0.0));
        assert_eq!(ray.direction, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_shade_headlight() {
        let lighting = LightingParams::default();
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let lit = shade(&lighting, &normal, &normal, &[1.0, 1.0, 1.0]);
        // ka + kd + ks when light, view and normal coincide
        assert!((lit[0] - 1.0).abs() < 1e-5);
    }
}

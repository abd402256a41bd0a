use super::cache::VolumeInfo;
use crate::common::camera::TransformParams;
use ash::vk;
use bytemuck::{
    Pod,
    Zeroable,
};
use nalgebra_glm::Mat4;
use raycast_volume::params::RaycastParams;

/// Uniform block shared by the compute and composite shaders (`RaycastUniforms` in
/// `raycast_common.glsl`). Every member is 16 byte aligned so the std140 layout matches.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RaycastUniforms {
    pub view_inv: [[f32; 4]; 4],
    pub proj_inv: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub box_min: [f32; 4],
    pub box_max: [f32; 4],
    pub texel_scale: [f32; 4],
    pub texel_offset: [f32; 4],
    /// xyz: direction towards the light, w: 1 for a headlight.
    pub light_direction: [f32; 4],
    pub ambient_color: [f32; 4],
    pub specular_color: [f32; 4],
    pub light_color: [f32; 4],
    pub material_color: [f32; 4],
    pub background: [f32; 4],
    /// min, max, factor from texture fetch to data units.
    pub value_range: [f32; 4],
    /// width, height, 1 / width, 1 / height.
    pub resolution: [f32; 4],
    /// step length, ray step ratio, opacity threshold, iso value in data units.
    pub step: [f32; 4],
    /// ka, kd, ks, shininess.
    pub lighting: [f32; 4],
    /// xyz: gradient offsets, w: isosurface opacity.
    pub gradient_step: [f32; 4],
    /// use lighting, use depth texture, mode, max steps.
    pub flags: [u32; 4],
}

fn columns(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

fn extend(v: [f32; 3], w: f32) -> [f32; 4] {
    [v[0], v[1], v[2], w]
}

impl RaycastUniforms {
    /// Without a volume the box is left inverted so that every ray misses it.
    pub fn new(
        transform: &TransformParams,
        volume: Option<&VolumeInfo>,
        params: &RaycastParams,
        extent: vk::Extent2D,
        use_depth_tx: bool,
    ) -> Self {
        let lighting = &params.lighting;
        let width = extent.width.max(1) as f32;
        let height = extent.height.max(1) as f32;

        let mut uniforms = Self {
            view_inv: columns(&transform.view_inv),
            proj_inv: columns(&transform.proj_inv),
            view_proj: columns(&transform.view_proj),
            camera_position: extend(transform.position.into(), 1.0),
            box_min: [1.0, 1.0, 1.0, 0.0],
            box_max: [-1.0, -1.0, -1.0, 0.0],
            texel_scale: [1.0, 1.0, 1.0, 0.0],
            texel_offset: [0.0; 4],
            light_direction: extend(
                lighting.light_position,
                if lighting.headlight { 1.0 } else { 0.0 },
            ),
            ambient_color: extend(lighting.ambient_color, 1.0),
            specular_color: extend(lighting.specular_color, 1.0),
            light_color: extend(lighting.light_color, 1.0),
            material_color: extend(lighting.material_color, 1.0),
            background: params.background,
            value_range: [0.0, 1.0, 1.0, 0.0],
            resolution: [width, height, 1.0 / width, 1.0 / height],
            step: [1.0, params.ray_step_ratio, params.opacity_threshold, 0.0],
            lighting: [lighting.ka, lighting.kd, lighting.ks, lighting.shininess],
            gradient_step: [1.0, 1.0, 1.0, params.opacity],
            flags: [
                lighting.use_lighting as u32,
                use_depth_tx as u32,
                params.mode.index(),
                0,
            ],
        };

        if let Some(volume) = volume {
            let bounding_box = volume.bounding_box();
            let (texel_scale, texel_offset) = volume.metadata.texel_mapping();
            let range = volume.value_range(params);
            let voxel_size = volume.voxel_size();

            uniforms.box_min = extend(bounding_box.min.into(), 0.0);
            uniforms.box_max = extend(bounding_box.max.into(), 0.0);
            uniforms.texel_scale = extend(texel_scale, 0.0);
            uniforms.texel_offset = extend(texel_offset, 0.0);
            uniforms.value_range = [range.min, range.max, volume.format.value_scale(), 0.0];
            uniforms.step[0] = params.step_length(voxel_size);
            uniforms.step[3] = range.denormalize(params.iso_value);
            uniforms.gradient_step = extend(volume.gradient_step(), params.opacity);
            uniforms.flags[3] = params.max_steps(voxel_size, bounding_box.diagonal());
        }
        uniforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::camera::Camera;
    use raycast_volume::{
        format::VolumeFormat,
        metadata::{
            GridType,
            Metadata,
            ScalarType,
        },
        params::{
            RangeOverride,
            RaycastMode,
        },
    };

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 64,
        height: 32,
    };

    fn volume() -> VolumeInfo {
        VolumeInfo::new(
            Metadata {
                grid_type: GridType::Cartesian,
                scalar_type: ScalarType::UnsignedInteger,
                scalar_length: 1,
                components: 1,
                resolution: [5, 5, 5],
                origin: [-1.0, -1.0, -1.0],
                extents: [2.0, 2.0, 2.0],
                min_values: vec![0.0],
                max_values: vec![200.0],
                frame_count: 1,
            },
            VolumeFormat::R8Unorm,
        )
    }

    fn transform() -> TransformParams {
        Camera::new(EXTENT.width, EXTENT.height).create_transform_params()
    }

    #[test]
    fn test_std140_size() {
        assert_eq!(std::mem::size_of::<RaycastUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<RaycastUniforms>(), 3 * 64 + 17 * 16);
    }

    #[test]
    fn test_without_volume_every_ray_misses() {
        let params = RaycastParams::default();
        let uniforms = RaycastUniforms::new(&transform(), None, &params, EXTENT, false);
        for axis in 0..3 {
            assert!(uniforms.box_min[axis] > uniforms.box_max[axis]);
        }
        assert_eq!(uniforms.flags[3], 0);
        assert_eq!(uniforms.resolution, [64.0, 32.0, 1.0 / 64.0, 1.0 / 32.0]);
    }

    #[test]
    fn test_volume_mapping() {
        let mut params = RaycastParams::default();
        params.mode = RaycastMode::Isosurface;
        params.ray_step_ratio = 2.0;
        params.iso_value = 0.25;
        let uniforms = RaycastUniforms::new(&transform(), Some(&volume()), &params, EXTENT, true);

        assert_eq!(uniforms.box_min, [-1.0, -1.0, -1.0, 0.0]);
        assert_eq!(uniforms.box_max, [1.0, 1.0, 1.0, 0.0]);
        assert_eq!(uniforms.texel_scale, [0.8, 0.8, 0.8, 0.0]);
        assert_eq!(uniforms.texel_offset, [0.1, 0.1, 0.1, 0.0]);
        assert_eq!(uniforms.value_range, [0.0, 200.0, 255.0, 0.0]);
        // voxel size 0.5 sampled twice per voxel
        assert_eq!(uniforms.step[0], 0.25);
        assert_eq!(uniforms.step[3], 50.0);
        assert_eq!(uniforms.flags[..3], [0, 1, RaycastMode::Isosurface.index()]);
        assert_eq!(
            uniforms.flags[3],
            params.max_steps(0.5, volume().bounding_box().diagonal())
        );
    }

    #[test]
    fn test_range_override() {
        let mut params = RaycastParams::default();
        params.range_override = RangeOverride {
            enabled: true,
            min: 10.0,
            max: 20.0,
        };
        params.iso_value = 0.5;
        let uniforms = RaycastUniforms::new(&transform(), Some(&volume()), &params, EXTENT, false);
        assert_eq!(uniforms.value_range[..2], [10.0, 20.0]);
        assert_eq!(uniforms.step[3], 15.0);
    }

    #[test]
    fn test_headlight_flag() {
        let mut params = RaycastParams::default();
        params.lighting.headlight = false;
        params.lighting.light_position = [0.0, 1.0, 0.0];
        let uniforms = RaycastUniforms::new(&transform(), None, &params, EXTENT, false);
        assert_eq!(uniforms.light_direction, [0.0, 1.0, 0.0, 0.0]);
    }
}

use anyhow::Result;
use ash::vk;

pub struct PipelineLayout {
    pipeline_layout: vk::PipelineLayout,
    device: ash::Device,
}

impl PipelineLayout {
    pub fn new(
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        device: ash::Device,
    ) -> Result<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let pipeline_layout = unsafe { device.create_pipeline_layout(&create_info, None)? };
        Ok(Self {
            pipeline_layout,
            device,
        })
    }

    pub fn vk_pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

/// A batch of pipelines created in one call, indexed in creation order.
///
/// Compute and graphics pipelines share this owner since both are destroyed
/// with `vkDestroyPipeline`.
pub struct Pipelines {
    pipelines: Vec<vk::Pipeline>,
    device: ash::Device,
}

impl Pipelines {
    pub fn compute(
        create_infos: &[vk::ComputePipelineCreateInfo],
        device: ash::Device,
    ) -> Result<Self> {
        let created = unsafe {
            device.create_compute_pipelines(vk::PipelineCache::null(), create_infos, None)
        };
        Self::collect(created, device)
    }

    pub fn graphics(
        create_infos: &[vk::GraphicsPipelineCreateInfo],
        device: ash::Device,
    ) -> Result<Self> {
        let created = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), create_infos, None)
        };
        Self::collect(created, device)
    }

    fn collect(
        created: std::result::Result<Vec<vk::Pipeline>, (Vec<vk::Pipeline>, vk::Result)>,
        device: ash::Device,
    ) -> Result<Self> {
        match created {
            Ok(pipelines) => Ok(Self { pipelines, device }),
            Err((partial, error)) => {
                // a failed batch may still hand back some valid handles
                for pipeline in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    unsafe { device.destroy_pipeline(pipeline, None) };
                }
                Err(error.into())
            }
        }
    }

    pub fn vk_pipeline(&self, index: usize) -> vk::Pipeline {
        self.pipelines[index]
    }
}

impl Drop for Pipelines {
    fn drop(&mut self) {
        for &pipeline in self.pipelines.iter() {
            unsafe {
                self.device.destroy_pipeline(pipeline, None);
            }
        }
    }
}

use super::gui::{
    self,
    Stats,
};
use crate::{
    common::{
        self,
        camera::{
            Camera,
            TransformParams,
        },
        consts::MAX_FRAMES_IN_FLIGHT,
        device::{
            create_logical_device,
            pick_physical_device,
            QueueFamilyIndices,
        },
        image_buffer::{
            color_subresource_layers,
            color_subresource_range,
            ImageBuffer,
        },
        layer::{
            check_layer_support,
            required_layer_names,
        },
        sync::SyncObjects,
    },
    control::{
        keyboard::Keyboard,
        Control,
    },
    draw::{
        raycast::Raycast,
        strategy::DrawStrategy,
    },
    utils::time::{
        get_fps,
        Playback,
        Timer,
    },
};
use anyhow::{
    bail,
    Result,
};
use ash::vk::{
    self,
    CommandBufferSubmitInfo,
    PipelineStageFlags2,
};
use imgui::{
    FontConfig,
    FontSource,
};
use imgui_winit_support::{
    HiDpiMode,
    WinitPlatform,
};
use nalgebra_glm::Vec2;
use raycast_volume::{
    probe::{
        probe_value_range,
        ProbeResult,
        Ray,
        VolumeSampler,
    },
    scene::Scene,
    transfer::{
        Preset,
        StaticTransferFunction,
        TransferFunction,
        TransferFunctionDescriptor,
    },
};
use std::time::Duration;
use winit::{
    dpi::{
        PhysicalPosition,
        PhysicalSize,
    },
    keyboard::KeyCode,
    window::Window,
};

fn create_output_render_target(
    format: vk::Format,
    extent: vk::Extent2D,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    instance: &ash::Instance,
) -> Result<ImageBuffer> {
    ImageBuffer::new_2d(
        format,
        extent,
        vk::ImageUsageFlags::COLOR_ATTACHMENT
            | vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST,
        vk::ImageAspectFlags::COLOR,
        physical_device,
        device,
        instance,
    )
}

fn create_output_framebuffers(
    render_pass: vk::RenderPass,
    output_render_target: &ImageBuffer,
    device: &ash::Device,
) -> Result<Vec<common::render_pass::Framebuffer>> {
    let mut output_framebuffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        let image_views = [output_render_target.image_view()];
        output_framebuffers.push(common::render_pass::Framebuffer::new(
            render_pass,
            &image_views,
            output_render_target.extent_2d(),
            device.clone(),
        )?);
    }
    Ok(output_framebuffers)
}

fn layout_barrier<'a>(
    image: vk::Image,
    src: (PipelineStageFlags2, vk::AccessFlags2, vk::ImageLayout),
    dst: (PipelineStageFlags2, vk::AccessFlags2, vk::ImageLayout),
) -> vk::ImageMemoryBarrier2<'a> {
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(src.0)
        .src_access_mask(src.1)
        .old_layout(src.2)
        .dst_stage_mask(dst.0)
        .dst_access_mask(dst.1)
        .new_layout(dst.2)
        .image(image)
        .subresource_range(color_subresource_range())
}

fn copy_image(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    src_image: vk::Image,
    dst_image: vk::Image,
    extent: vk::Extent2D,
) {
    let image_copy = [vk::ImageCopy2::default()
        .src_subresource(color_subresource_layers())
        .dst_subresource(color_subresource_layers())
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })];
    let copy_image_info = vk::CopyImageInfo2::default()
        .src_image(src_image)
        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
        .dst_image(dst_image)
        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .regions(&image_copy);
    unsafe {
        device.cmd_copy_image2(command_buffer, &copy_image_info);
    }
}

fn min_extent(a: vk::Extent2D, b: vk::Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: a.width.min(b.width),
        height: a.height.min(b.height),
    }
}

/// Owns the Vulkan context and the volume pipeline. Fields are declared in drop order.
pub struct Renderer {
    imgui_renderer: imgui_rs_vulkan_renderer::Renderer,
    output_framebuffers: Vec<common::render_pass::Framebuffer>,
    imgui_render_pass: common::render_pass::RenderPass,
    output_render_target: ImageBuffer,
    raycast: Raycast,
    sync_objects: SyncObjects,
    command_buffers: Vec<vk::CommandBuffer>,
    _command_pool: common::command_buffer::CommandPool,
    swapchain: common::swapchain::Swapchain,
    device: common::device::Device,
    surface: common::surface::Surface,
    _debug_utils: Option<common::debug::DebugUtils>,
    instance: common::instance::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_indices: QueueFamilyIndices,
    graphics_compute_queue: vk::Queue,
    present_queue: vk::Queue,
    camera: Camera,
    scene: Scene,
    transfer_function: StaticTransferFunction,
    preset: Preset,
    playback: Playback,
    timer: Timer,
    current_frame: usize,
    needs_resize: bool,
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(error) = self.device_wait_idle() {
            log::error!("failed to wait for the device: {}", error);
        }
    }
}

impl Renderer {
    pub fn new(
        window: &Window,
        window_size: PhysicalSize<u32>,
        validation: bool,
        scene: &Scene,
        imgui_platform: &mut WinitPlatform,
        imgui_context: &mut imgui::Context,
    ) -> Result<Self> {
        // Init vulkan stuff
        log::info!("loading vulkan entry");
        let entry = unsafe { ash::Entry::load()? };

        let validation = if validation && !check_layer_support(&entry, &required_layer_names())? {
            log::warn!("validation layers are not supported, continuing without them");
            false
        } else {
            validation
        };

        log::info!("creating instance");
        let instance = common::instance::Instance::new(&entry, validation)?;

        let debug_utils = if instance.validation() {
            log::info!("setting up debug utils");
            Some(common::debug::DebugUtils::new(&entry, instance.instance())?)
        } else {
            None
        };

        log::info!("creating surface");
        let surface = common::surface::Surface::new(&entry, instance.instance(), window)?;

        log::info!("picking physical device");
        let physical_device = pick_physical_device(instance.instance(), &surface)?;

        log::info!("getting queue family indices");
        let queue_family_indices =
            common::device::find_queue_family(instance.instance(), physical_device, &surface)?;

        log::info!("creating logical device");
        let device =
            create_logical_device(&queue_family_indices, instance.instance(), physical_device)?;
        let ash_device = device.ash_device().clone();

        log::info!("getting queues");
        let graphics_compute_queue =
            unsafe { ash_device.get_device_queue(queue_family_indices.graphics_compute()?, 0) };
        let present_queue =
            unsafe { ash_device.get_device_queue(queue_family_indices.present()?, 0) };

        log::info!("creating swapchain");
        let swapchain = common::swapchain::Swapchain::new(
            instance.instance(),
            &ash_device,
            physical_device,
            &surface,
            &queue_family_indices,
            window_size,
        )?;
        let extent = swapchain.vk_swapchain_extent();

        log::info!("creating command pool");
        let command_pool = common::command_buffer::CommandPool::new(
            queue_family_indices.graphics_compute()?,
            ash_device.clone(),
        )?;

        log::info!("creating command buffers");
        let command_buffers = command_pool.allocate(MAX_FRAMES_IN_FLIGHT as u32)?;
        let sync_objects = SyncObjects::new(ash_device.clone())?;

        log::info!("creating output render target");
        let output_render_target = create_output_render_target(
            swapchain.vk_swapchain_format(),
            extent,
            physical_device,
            ash_device.clone(),
            instance.instance(),
        )?;

        log::info!("creating volume source for scene {}", scene.name);
        let source = scene.create_volume_source()?;
        let transfer_function = scene.create_transfer_function()?;
        let preset = match scene.transfer_function {
            TransferFunctionDescriptor::Preset(preset) => preset,
            TransferFunctionDescriptor::Points { .. } => Preset::default(),
        };

        let mut raycast = Raycast::new(
            source,
            scene.params,
            scene.chain.as_ref(),
            extent,
            swapchain.vk_swapchain_format(),
            graphics_compute_queue,
            queue_family_indices.graphics_compute()?,
            physical_device,
            ash_device.clone(),
            instance.instance().clone(),
        )?;

        // setup imgui
        log::info!("setting up imgui");
        let imgui_render_pass = {
            let render_pass_attachments = [
                // output
                vk::AttachmentDescription::default()
                    .format(output_render_target.format())
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::LOAD)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            ];

            let color_attachments = [vk::AttachmentReference::default()
                .attachment(0)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

            let subpasses = [vk::SubpassDescription::default()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(&color_attachments)];

            let renderpass_create_info = vk::RenderPassCreateInfo::default()
                .attachments(&render_pass_attachments)
                .subpasses(&subpasses);

            common::render_pass::RenderPass::new(&renderpass_create_info, ash_device.clone())?
        };

        let output_framebuffers = create_output_framebuffers(
            imgui_render_pass.vk_render_pass(),
            &output_render_target,
            &ash_device,
        )?;

        let hidpi_factor = imgui_platform.hidpi_factor();
        let font_size = (20.0 * hidpi_factor) as f32;
        imgui_context
            .fonts()
            .add_font(&[FontSource::DefaultFontData {
                config: Some(FontConfig {
                    size_pixels: font_size,
                    ..FontConfig::default()
                }),
            }]);
        imgui_context.io_mut().font_global_scale = (1.0 / hidpi_factor) as f32;
        imgui_platform.attach_window(imgui_context.io_mut(), window, HiDpiMode::Rounded);

        let imgui_renderer = imgui_rs_vulkan_renderer::Renderer::with_default_allocator(
            instance.instance(),
            physical_device,
            ash_device.clone(),
            graphics_compute_queue,
            command_pool.vk_command_pool(),
            imgui_render_pass.vk_render_pass(),
            imgui_context,
            None,
        )?;

        log::info!("framing camera on the volume");
        let extents = raycast.extents(0)?;
        let mut camera = Camera::new(extent.width, extent.height);
        camera.frame_bounding_box(&extents.bounding_box);
        let playback = Playback::new(extents.frame_count);

        Ok(Self {
            imgui_renderer,
            output_framebuffers,
            imgui_render_pass,
            output_render_target,
            raycast,
            sync_objects,
            command_buffers,
            _command_pool: command_pool,
            swapchain,
            device,
            surface,
            _debug_utils: debug_utils,
            instance,
            physical_device,
            queue_family_indices,
            graphics_compute_queue,
            present_queue,
            camera,
            scene: scene.clone(),
            transfer_function,
            preset,
            playback,
            timer: Timer::new(),
            current_frame: 0,
            needs_resize: false,
        })
    }

    pub fn request_resize(&mut self) {
        self.needs_resize = true;
    }

    /// Left/Right step through time, Space toggles playback.
    pub fn input_playback(&mut self, keyboard: &mut Keyboard) {
        if keyboard.take_just_pressed(&KeyCode::ArrowLeft) {
            self.playback.step_backward();
        }
        if keyboard.take_just_pressed(&KeyCode::ArrowRight) {
            self.playback.step_forward();
        }
        if keyboard.take_just_pressed(&KeyCode::Space) {
            self.playback.toggle();
            log::info!(
                "playback {}",
                if self.playback.is_playing() {
                    "started"
                } else {
                    "paused"
                }
            );
        }
    }

    fn recreate_size_dependent(&mut self, window_size: PhysicalSize<u32>) -> Result<()> {
        log::info!(
            "recreating size dependent resources: {}x{}",
            window_size.width,
            window_size.height
        );
        self.device_wait_idle()?;
        let ash_device = self.device.ash_device().clone();
        self.swapchain.recreate(
            self.instance.instance(),
            &ash_device,
            self.physical_device,
            &self.surface,
            &self.queue_family_indices,
            window_size,
        )?;
        let extent = self.swapchain.vk_swapchain_extent();

        self.output_framebuffers.clear();
        self.output_render_target = create_output_render_target(
            self.swapchain.vk_swapchain_format(),
            extent,
            self.physical_device,
            ash_device.clone(),
            self.instance.instance(),
        )?;
        self.output_framebuffers = create_output_framebuffers(
            self.imgui_render_pass.vk_render_pass(),
            &self.output_render_target,
            &ash_device,
        )?;
        self.raycast.resize(extent)?;
        self.camera.set_extent(extent.width, extent.height);
        self.needs_resize = false;
        Ok(())
    }

    fn update_volume(&mut self, elapsed: Duration) -> Result<()> {
        self.playback.advance(elapsed);
        let extents = self.raycast.extents(self.playback.frame())?;
        self.playback.set_frame_count(extents.frame_count);
        if self.raycast.update_volume_data(self.playback.frame())? {
            log::debug!("uploaded volume frame {}", self.playback.frame());
        }
        if self
            .raycast
            .update_transfer_function(&mut self.transfer_function)?
        {
            log::debug!("uploaded transfer function");
        }
        Ok(())
    }

    /// CPU ray through the crosshair, evaluated with the parameters of the current frame.
    fn probe_center(&self, transform: &TransformParams) -> Option<ProbeResult> {
        let frame = self.raycast.volume_frame()?;
        let sampler = match VolumeSampler::new(&frame) {
            Ok(sampler) => sampler,
            Err(error) => {
                log::debug!("probe unavailable: {}", error);
                return None;
            }
        };
        let params = self.raycast.params();
        let range = probe_value_range(params, frame.metadata, self.raycast.last_value_range());
        let ray = Ray::from_ndc(&transform.view_proj_inv(), Vec2::zeros());
        sampler.probe(&ray, params, &range, self.transfer_function.current())
    }

    /// Re-creates the volume source from the scene, e.g. after the data on disk changed.
    fn reload_volume(&mut self) -> Result<()> {
        log::info!("reloading volume of scene {}", self.scene.name);
        let source = self.scene.create_volume_source()?;
        self.raycast.set_source(Some(source));
        Ok(())
    }

    fn apply_preset(&mut self) -> Result<()> {
        let descriptor = TransferFunctionDescriptor::Preset(self.preset);
        self.transfer_function
            .replace(TransferFunction::from_descriptor(&descriptor)?);
        log::info!("transfer function preset: {}", self.preset.name());
        Ok(())
    }

    pub fn draw_frame(
        &mut self,
        window: &Window,
        imgui_platform: &mut WinitPlatform,
        imgui_context: &mut imgui::Context,
        control: &Control,
    ) -> Result<()> {
        let elapsed = self.timer.get_elapsed_and_reset();
        let fps = get_fps(&elapsed);

        if self.needs_resize {
            let window_size = window.inner_size();
            if window_size.width == 0 || window_size.height == 0 {
                return Ok(());
            }
            self.recreate_size_dependent(window_size)?;
        }

        let frame_index = self.current_frame;
        let image_available_semaphore = self.sync_objects.image_available_semaphore(frame_index);
        let render_finished_semaphore = self.sync_objects.render_finished_semaphore(frame_index);
        let inflight_fence = self.sync_objects.inflight_fence(frame_index);

        log::debug!("get next image");
        let acquired = unsafe {
            self.swapchain.swapchain_loader().acquire_next_image(
                self.swapchain.vk_swapchain(),
                u64::MAX,
                image_available_semaphore,
                vk::Fence::null(),
            )
        };
        let image_index = match acquired {
            Ok((image_index, is_sub_optimal)) => {
                if is_sub_optimal {
                    self.needs_resize = true;
                }
                image_index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.needs_resize = true;
                return Ok(());
            }
            Err(error) => bail!("failed to acquire swapchain image: {}", error),
        };

        log::debug!("updating volume");
        self.update_volume(elapsed)?;

        log::debug!("updating camera");
        let swapchain_extent = self.swapchain.vk_swapchain_extent();
        self.camera.input_control(
            control,
            PhysicalPosition::new(
                swapchain_extent.width as f32 / 2.0,
                swapchain_extent.height as f32 / 2.0,
            ),
            elapsed,
        );
        let transform = self.camera.create_transform_params();

        let device = self.device.ash_device().clone();
        let command_buffer = self.command_buffers[frame_index];

        log::debug!("reset and begin command buffer");
        unsafe {
            device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::default())?;
            device.begin_command_buffer(command_buffer, &vk::CommandBufferBeginInfo::default())?;
        }

        // draw pass
        self.raycast.draw(command_buffer, frame_index, &transform)?;

        // copy draw output to output render target
        let draw_output = self.raycast.output_render_target().image();
        let output = self.output_render_target.image();
        let copy_extent = min_extent(
            self.raycast.output_render_target().extent_2d(),
            self.output_render_target.extent_2d(),
        );
        log::debug!("draw output: color attachment -> transfer src");
        let barriers = [
            layout_barrier(
                draw_output,
                (
                    PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                ),
                (
                    PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_READ,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                ),
            ),
            layout_barrier(
                output,
                (
                    PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::NONE,
                    vk::ImageLayout::UNDEFINED,
                ),
                (
                    PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_WRITE,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                ),
            ),
        ];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
        }
        copy_image(&device, command_buffer, draw_output, output, copy_extent);

        log::debug!("output: transfer dst -> color attachment");
        let barriers = [
            layout_barrier(
                output,
                (
                    PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_WRITE,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                ),
                (
                    PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_READ
                        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                ),
            ),
            layout_barrier(
                draw_output,
                (
                    PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_READ,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                ),
                (
                    PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                ),
            ),
        ];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
        }

        // imgui pass
        log::debug!("imgui pass");
        let output_extent = self.output_render_target.extent_2d();
        let render_pass_begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.imgui_render_pass.vk_render_pass())
            .framebuffer(self.output_framebuffers[frame_index].vk_framebuffer())
            .render_area(self.output_framebuffers[frame_index].render_area());
        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin_info,
                vk::SubpassContents::INLINE,
            );
        }

        let stats = Stats {
            fps,
            frame: self.playback.frame(),
            frame_count: self.playback.frame_count(),
            playing: self.playback.is_playing(),
            camera_position: self.camera.position(),
            value_range: self
                .raycast
                .volume_info()
                .map(|info| info.value_range(self.raycast.params())),
            feedback_range: self.raycast.last_value_range(),
            probe: self.probe_center(&transform),
        };
        let mut params = *self.raycast.params();

        imgui_platform.prepare_frame(imgui_context.io_mut(), window)?;
        imgui_context.io_mut().update_delta_time(elapsed);
        let ui = imgui_context.frame();
        gui::stats_window(ui, &stats);
        let response = gui::control_window(
            ui,
            &mut params,
            &mut self.preset,
            &mut self.playback,
            &mut self.camera,
        );
        imgui_platform.prepare_render(ui, window);
        self.imgui_renderer
            .cmd_draw(command_buffer, imgui_context.render())?;

        unsafe {
            device.cmd_end_render_pass(command_buffer);
        }

        if response.params_changed {
            if let Err(error) = self.raycast.set_params(params) {
                log::warn!("rejected parameters: {}", error);
            }
        }
        if response.preset_changed {
            self.apply_preset()?;
        }
        if response.reload_requested {
            self.reload_volume()?;
        }

        // copy output to swapchain
        let swapchain_image = self.swapchain.vk_swapchain_image(image_index);
        log::debug!("output: color attachment -> transfer src");
        log::debug!("swapchain: undefined -> transfer dst");
        let barriers = [
            layout_barrier(
                output,
                (
                    PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                ),
                (
                    PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_READ,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                ),
            ),
            layout_barrier(
                swapchain_image,
                (
                    PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::NONE,
                    vk::ImageLayout::UNDEFINED,
                ),
                (
                    PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_WRITE,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                ),
            ),
        ];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
        }
        copy_image(
            &device,
            command_buffer,
            output,
            swapchain_image,
            min_extent(output_extent, swapchain_extent),
        );

        log::debug!("swapchain: transfer dst -> present src");
        let barriers = [layout_barrier(
            swapchain_image,
            (
                PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ),
            (
                PipelineStageFlags2::BOTTOM_OF_PIPE,
                vk::AccessFlags2::NONE,
                vk::ImageLayout::PRESENT_SRC_KHR,
            ),
        )];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
        }

        log::debug!("end command buffer");
        unsafe {
            device.end_command_buffer(command_buffer)?;
        }

        log::debug!("submit command buffer");
        let command_buffer_infos =
            [CommandBufferSubmitInfo::default().command_buffer(command_buffer)];
        let signal_semaphore_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(render_finished_semaphore)
            .stage_mask(PipelineStageFlags2::ALL_COMMANDS)];
        let wait_semaphore_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(image_available_semaphore)
            .stage_mask(PipelineStageFlags2::ALL_COMMANDS)];
        let submit_infos = [vk::SubmitInfo2::default()
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_semaphore_infos)
            .wait_semaphore_infos(&wait_semaphore_infos)];
        unsafe {
            device.queue_submit2(self.graphics_compute_queue, &submit_infos, inflight_fence)?;
        }

        let swapchains = [self.swapchain.vk_swapchain()];
        let image_indices = [image_index];
        let signal_semaphores = [render_finished_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        log::debug!("presenting");
        let presented = unsafe {
            self.swapchain
                .swapchain_loader()
                .queue_present(self.present_queue, &present_info)
        };
        match presented {
            Ok(false) => {}
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => self.needs_resize = true,
            Err(error) => bail!("failed to present: {}", error),
        }

        // wait
        log::debug!("wait for fences");
        let wait_fences = [inflight_fence];
        unsafe {
            device.wait_for_fences(&wait_fences, true, u64::MAX)?;
            device.reset_fences(&wait_fences)?;
        }
        self.raycast.frame_finished(frame_index)?;

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }

    pub fn device_wait_idle(&self) -> Result<()> {
        unsafe { self.device.ash_device().device_wait_idle()? };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_extent() {
        let a = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let b = vk::Extent2D {
            width: 640,
            height: 900,
        };
        assert_eq!(
            min_extent(a, b),
            vk::Extent2D {
                width: 640,
                height: 600
            }
        );
    }
}

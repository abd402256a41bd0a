use anyhow::{
    bail,
    Context,
    Result,
};
use ash::vk;
use winit::raw_window_handle::{
    HasDisplayHandle,
    HasWindowHandle,
    RawDisplayHandle,
    RawWindowHandle,
};

/// What a physical device can present to the window surface.
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn is_usable(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The presentation surface of the viewer window. Only X11 windows are supported.
pub struct Surface {
    surface: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    pub fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &winit::window::Window,
    ) -> Result<Self> {
        let surface = unsafe { create_xlib_surface(entry, instance, window)? };
        let loader = ash::khr::surface::Instance::new(entry, instance);
        Ok(Self { surface, loader })
    }

    pub fn vk_surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool> {
        let supported = unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                self.surface,
            )?
        };
        Ok(supported)
    }

    pub fn support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .loader
                    .get_physical_device_surface_capabilities(physical_device, self.surface)?,
                formats: self
                    .loader
                    .get_physical_device_surface_formats(physical_device, self.surface)?,
                present_modes: self
                    .loader
                    .get_physical_device_surface_present_modes(physical_device, self.surface)?,
            })
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

unsafe fn create_xlib_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &winit::window::Window,
) -> Result<vk::SurfaceKHR> {
    log::info!("creating xlib surface");
    let window_handle = match window.window_handle()?.as_raw() {
        RawWindowHandle::Xlib(handle) => handle.window,
        other => bail!("unsupported window handle {:?}, the viewer needs X11", other),
    };
    let display = match window.display_handle()?.as_raw() {
        RawDisplayHandle::Xlib(handle) => handle.display.context("xlib display is not set")?,
        other => bail!("unsupported display handle {:?}, the viewer needs X11", other),
    };

    let create_info = vk::XlibSurfaceCreateInfoKHR::default()
        .window(window_handle)
        .dpy(display.as_ptr() as *mut std::ffi::c_void);
    let loader = ash::khr::xlib_surface::Instance::new(entry, instance);
    Ok(loader.create_xlib_surface(&create_info, None)?)
}

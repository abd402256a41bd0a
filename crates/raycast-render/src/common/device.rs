use super::surface::Surface;
use crate::utils::tool::convert_char_to_string;
use anyhow::{
    Context,
    Result,
};
use ash::vk;
use std::{
    collections::HashSet,
    ffi::CStr,
};

const DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Formats the ray casting passes write through storage image bindings.
const STORAGE_FORMATS: [vk::Format; 2] = [
    vk::Format::R32G32B32A32_SFLOAT,
    vk::Format::R32_SFLOAT,
];

/// Higher is better. `None` for devices the renderer cannot run on.
fn device_score(properties: &vk::PhysicalDeviceProperties) -> Option<u32> {
    if properties.api_version < vk::API_VERSION_1_3 {
        return None;
    }
    let type_score = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    };
    Some(type_score)
}

pub fn pick_physical_device(
    instance: &ash::Instance,
    surface: &Surface,
) -> Result<vk::PhysicalDevice> {
    let physical_devices = unsafe { instance.enumerate_physical_devices()? };
    log::debug!("{} vulkan devices found", physical_devices.len());

    let mut best: Option<(u32, vk::PhysicalDevice, String)> = None;
    for &physical_device in physical_devices.iter() {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = convert_char_to_string(&properties.device_name)?;
        let Some(score) = device_score(&properties) else {
            log::info!("skipping {}: vulkan 1.3 is required", name);
            continue;
        };
        match is_physical_device_suitable(instance, physical_device, surface) {
            Ok(true) => {
                if best.as_ref().map_or(true, |(best_score, ..)| score > *best_score) {
                    best = Some((score, physical_device, name));
                }
            }
            Ok(false) => log::info!("skipping {}: missing features", name),
            Err(error) => log::warn!("skipping {}: {}", name, error),
        }
    }

    let (_, physical_device, name) = best.context("no GPU can run the volume renderer")?;
    log::info!("using device: {}", name);
    Ok(physical_device)
}

/// Capabilities of one queue family as seen by [`select_queue_families`].
#[derive(Debug, Clone, Copy)]
struct QueueFamilyInfo {
    flags: vk::QueueFlags,
    queue_count: u32,
    present: bool,
}

/// Prefers a single family that does graphics, compute and present.
fn select_queue_families(families: &[QueueFamilyInfo]) -> QueueFamilyIndices {
    let graphics_compute = |family: &QueueFamilyInfo| {
        family.queue_count > 0
            && family
                .flags
                .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
    };

    if let Some(index) = families
        .iter()
        .position(|family| graphics_compute(family) && family.present)
    {
        return QueueFamilyIndices {
            graphics_compute_family: Some(index as u32),
            present_family: Some(index as u32),
        };
    }
    QueueFamilyIndices {
        graphics_compute_family: families
            .iter()
            .position(graphics_compute)
            .map(|index| index as u32),
        present_family: families
            .iter()
            .position(|family| family.queue_count > 0 && family.present)
            .map(|index| index as u32),
    }
}

pub fn find_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: &Surface,
) -> Result<QueueFamilyIndices> {
    let properties =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    let families = properties
        .iter()
        .enumerate()
        .map(|(index, family)| {
            Ok(QueueFamilyInfo {
                flags: family.queue_flags,
                queue_count: family.queue_count,
                present: surface.supports_present(physical_device, index as u32)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(select_queue_families(&families))
}

fn supports_storage_formats(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
    STORAGE_FORMATS.iter().all(|&format| {
        let properties =
            unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::STORAGE_IMAGE)
    })
}

fn is_physical_device_suitable(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: &Surface,
) -> Result<bool> {
    if !check_device_extension_support(instance, physical_device)? {
        return Ok(false);
    }
    let indices = find_queue_family(instance, physical_device, surface)?;
    Ok(indices.is_complete()
        && surface.support(physical_device)?.is_usable()
        && supports_storage_formats(instance, physical_device))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_compute_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_compute_family.is_some() && self.present_family.is_some()
    }

    pub fn graphics_compute(&self) -> Result<u32> {
        self.graphics_compute_family
            .context("no graphics and compute queue family")
    }

    pub fn present(&self) -> Result<u32> {
        self.present_family.context("no present queue family")
    }
}

pub fn create_logical_device(
    indices: &QueueFamilyIndices,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<Device> {
    let mut unique_queue_families = HashSet::new();
    unique_queue_families.insert(indices.graphics_compute()?);
    unique_queue_families.insert(indices.present()?);

    let queue_priorities = [1.0_f32];
    let queue_create_infos = unique_queue_families
        .iter()
        .map(|&queue_family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)
        })
        .collect::<Vec<_>>();

    // synchronization2 for the barrier2/submit2 calls
    let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::default()
        .synchronization2(true)
        .maintenance4(true);
    let mut features = vk::PhysicalDeviceFeatures2::default()
        .features(vk::PhysicalDeviceFeatures::default())
        .push_next(&mut vulkan13_features);

    let extension_names = DEVICE_EXTENSIONS
        .iter()
        .map(|extension| extension.as_ptr())
        .collect::<Vec<_>>();
    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features);
    let device = unsafe { instance.create_device(physical_device, &create_info, None)? };
    Ok(Device { device })
}

fn check_device_extension_support(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<bool> {
    let available_extensions =
        unsafe { instance.enumerate_device_extension_properties(physical_device)? };
    let available = available_extensions
        .iter()
        .map(|extension| convert_char_to_string(&extension.extension_name))
        .collect::<Result<HashSet<_>>>()?;
    Ok(DEVICE_EXTENSIONS
        .iter()
        .all(|extension| available.contains(&*extension.to_string_lossy())))
}

pub struct Device {
    device: ash::Device,
}

impl Device {
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, present: bool) -> QueueFamilyInfo {
        QueueFamilyInfo {
            flags,
            queue_count: 1,
            present,
        }
    }

    #[test]
    fn test_prefers_shared_family() {
        let graphics_compute = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE;
        let families = [
            family(graphics_compute, false),
            family(vk::QueueFlags::TRANSFER, true),
            family(graphics_compute, true),
        ];
        let indices = select_queue_families(&families);
        assert_eq!(indices.graphics_compute_family, Some(2));
        assert_eq!(indices.present_family, Some(2));
    }

    #[test]
    fn test_split_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, false),
            family(vk::QueueFlags::TRANSFER, true),
        ];
        let indices = select_queue_families(&families);
        assert_eq!(indices.graphics_compute_family, Some(0));
        assert_eq!(indices.present_family, Some(1));

        let indices = select_queue_families(&families[1..]);
        assert!(!indices.is_complete());
        assert!(indices.graphics_compute().is_err());
    }

    #[test]
    fn test_device_score() {
        let mut properties = vk::PhysicalDeviceProperties {
            api_version: vk::API_VERSION_1_3,
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            ..Default::default()
        };
        let discrete = device_score(&properties);
        properties.device_type = vk::PhysicalDeviceType::CPU;
        assert!(discrete > device_score(&properties));
        properties.api_version = vk::API_VERSION_1_2;
        assert_eq!(device_score(&properties), None);
    }
}

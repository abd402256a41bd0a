use super::{
    debug::create_debug_messenger_create_info,
    extension::required_extension_names,
    layer::required_layer_names,
};
use anyhow::Result;
use ash::vk::{
    self,
    ValidationFeatureEnableEXT,
};
use std::ffi::{
    c_char,
    CString,
};

pub struct Instance {
    instance: ash::Instance,
    validation: bool,
}

impl Instance {
    /// With `validation` the Khronos validation layer is enabled and its messages are routed
    /// into the `log` facade.
    pub fn new(entry: &ash::Entry, validation: bool) -> Result<Self> {
        let app_name = CString::new("Raycast")?;
        let engine_name = CString::new("Raycast Engine")?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .api_version(ash::vk::API_VERSION_1_3)
            .engine_name(&engine_name)
            .engine_version(ash::vk::make_api_version(0, 0, 1, 0))
            .application_version(ash::vk::make_api_version(0, 0, 1, 0));

        let extension_names = required_extension_names(validation);

        let layer_names_c_char = if validation {
            required_layer_names()
                .iter()
                .map(|&name| CString::new(name))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        let layer_names_ptrs: Vec<*const c_char> = layer_names_c_char
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let enabled_validation_features = [
            ValidationFeatureEnableEXT::BEST_PRACTICES,
            ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION,
        ];
        let mut validation_features = vk::ValidationFeaturesEXT::default()
            .enabled_validation_features(&enabled_validation_features);
        let mut debug_messenger_create_info = create_debug_messenger_create_info();

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names_ptrs);
        if validation {
            create_info = create_info
                .push_next(&mut debug_messenger_create_info)
                .push_next(&mut validation_features);
        }

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        Ok(Self {
            instance,
            validation,
        })
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn validation(&self) -> bool {
        self.validation
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

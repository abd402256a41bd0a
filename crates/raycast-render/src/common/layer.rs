use crate::utils::tool::convert_char_to_string;
use anyhow::Result;

const LAYER_KHRONOS_VALIDATION: &str = "VK_LAYER_KHRONOS_validation";

pub fn required_layer_names() -> Vec<&'static str> {
    vec![LAYER_KHRONOS_VALIDATION]
}

pub fn check_layer_support(entry: &ash::Entry, layer_names: &[&str]) -> Result<bool> {
    let layer_properties = unsafe { entry.enumerate_instance_layer_properties()? };

    if layer_properties.is_empty() {
        log::warn!("No available layers.");
        return Ok(false);
    }

    let mut available = Vec::with_capacity(layer_properties.len());
    log::debug!("Instance Available Layers: ");
    for layer in layer_properties.iter() {
        let layer_name = convert_char_to_string(&layer.layer_name)?;
        log::debug!("\t{}", layer_name);
        available.push(layer_name);
    }

    Ok(layer_names
        .iter()
        .all(|required| available.iter().any(|name| name == required)))
}

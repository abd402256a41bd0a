use anyhow::{
    ensure,
    Result,
};
use ash::vk;
use raycast_base::path::get_shader_spv_root;
use std::{
    fs::File,
    path::Path,
};

pub fn read_shader_code(shader_path: &Path) -> Result<Vec<u32>> {
    ensure!(
        shader_path.exists(),
        "Shader path does not exist: {:?}",
        shader_path
    );
    let mut spv_file = File::open(shader_path)?;
    // handles alignment and endianness of the words
    let code = ash::util::read_spv(&mut spv_file)?;
    Ok(code)
}

pub fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let shader_module_create_info = vk::ShaderModuleCreateInfo::default().code(code);
    let shader_module = unsafe { device.create_shader_module(&shader_module_create_info, None)? };
    Ok(shader_module)
}

/// Loads `relative_path` below the compiled shader directory.
pub fn load_shader_module(device: &ash::Device, relative_path: &str) -> Result<vk::ShaderModule> {
    let path = get_shader_spv_root()?.join(relative_path);
    log::info!("loading shader {:?}", path);
    let code = read_shader_code(&path)?;
    create_shader_module(device, &code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_shader_code() {
        let path = std::env::temp_dir().join(format!("raycast-spv-{}.spv", std::process::id()));
        let words: [u32; 2] = [0x0723_0203, 0x0001_0000];
        let mut file = File::create(&path).unwrap();
        file.write_all(bytemuck::cast_slice(&words)).unwrap();
        drop(file);

        assert_eq!(read_shader_code(&path).unwrap(), words.to_vec());
        std::fs::remove_file(&path).unwrap();
        assert!(read_shader_code(&path).is_err());
    }
}

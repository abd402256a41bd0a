use anyhow::{
    ensure,
    Context,
    Result,
};
use raycast_base::path::{
    get_shader_include_root,
    get_shader_spv_root,
    get_shader_src_root,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    process::Command,
};

/// Shader stages handed to `glslc`. Files with any other extension (e.g. `.glsl` includes)
/// are only compiled as part of the stages that include them.
pub const SHADER_EXTENSIONS: [&str; 3] = ["vert", "frag", "comp"];

/// Maps `<src_root>/a/b.comp` to `<spv_root>/a/b.comp.spv`.
pub fn spv_output_path(src_root: &Path, spv_root: &Path, input_path: &Path) -> Result<PathBuf> {
    let input_filename = input_path
        .file_name()
        .context("failed to get file name")?
        .to_str()
        .context("failed to convert to string")?;
    let output_filename = format!("{}.spv", input_filename);

    let relative_input_path = input_path.strip_prefix(src_root)?;
    let relative_output_path = relative_input_path.with_file_name(output_filename);
    Ok(spv_root.join(relative_output_path))
}

pub fn compile(input_path: &Path) -> Result<()> {
    let shader_src_root = get_shader_src_root()?;
    let shader_spv_root = get_shader_spv_root()?;
    let include_root = get_shader_include_root()?;
    let output_path = spv_output_path(&shader_src_root, &shader_spv_root, input_path)?;

    let output_dir = output_path.parent().context("failed to get parent")?;
    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir)?;
    }

    log::info!(
        "compiling shader: {} -> {}",
        input_path.display(),
        output_path.display()
    );
    let output = Command::new("glslc")
        .arg(input_path.as_os_str())
        .arg("--target-env=vulkan1.3")
        .arg("-I")
        .arg(include_root.as_os_str())
        .arg("-O")
        .arg("-o")
        .arg(output_path.as_os_str())
        .output()
        .context("failed to run glslc, is the Vulkan SDK installed?")?;
    if !output.stderr.is_empty() {
        log::warn!("{}", String::from_utf8_lossy(&output.stderr));
    }
    ensure!(
        output.status.success(),
        "failed to compile shader: {}",
        input_path.display()
    );
    Ok(())
}

pub fn compile_all() -> Result<()> {
    let shader_src_root = get_shader_src_root()?;
    let extensions = SHADER_EXTENSIONS.iter().cloned().collect();
    let target_paths = crate::utils::glob_shader_src(&shader_src_root, &extensions)?;
    ensure!(
        !target_paths.is_empty(),
        "no shaders found under {}",
        shader_src_root.display()
    );
    for path in target_paths {
        compile(&path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spv_output_path() {
        let path = spv_output_path(
            Path::new("/p/shader/src"),
            Path::new("/p/shader/spv"),
            Path::new("/p/shader/src/raycast/integration.comp"),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/p/shader/spv/raycast/integration.comp.spv"));
    }

    #[test]
    fn test_spv_output_path_outside_root() {
        let result = spv_output_path(
            Path::new("/p/shader/src"),
            Path::new("/p/shader/spv"),
            Path::new("/elsewhere/a.frag"),
        );
        assert!(result.is_err());
    }
}

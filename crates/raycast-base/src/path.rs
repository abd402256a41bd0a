use anyhow::Result;
use std::path::{
    Path,
    PathBuf,
};

/// Overrides the git based project root lookup, e.g. when running from an exported tree.
pub const PROJECT_ROOT_ENV: &str = "RAYCAST_ROOT";

pub fn get_project_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(PROJECT_ROOT_ENV) {
        return Ok(PathBuf::from(root));
    }
    let repo = git2::Repository::discover(std::env::current_dir()?)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| git2::Error::from_str("No workdir"))?;
    Ok(workdir.to_path_buf())
}

pub fn get_shader_root() -> Result<PathBuf> {
    let project_root = get_project_root()?;
    Ok(project_root.join("shader"))
}

pub fn get_shader_src_root() -> Result<PathBuf> {
    let shader_root = get_shader_root()?;
    Ok(shader_root.join("src"))
}

pub fn get_shader_include_root() -> Result<PathBuf> {
    let shader_src_root = get_shader_src_root()?;
    Ok(shader_src_root.join("include"))
}

pub fn get_shader_spv_root() -> Result<PathBuf> {
    let shader_root = get_shader_root()?;
    Ok(shader_root.join("spv"))
}

pub fn get_asset_root() -> Result<PathBuf> {
    let project_root = get_project_root()?;
    Ok(project_root.join("asset"))
}

pub fn get_scene_config_root() -> Result<PathBuf> {
    let project_root = get_project_root()?;
    Ok(project_root.join("crates/raycast-volume/config"))
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let base = Path::new("/data/volumes");
        assert_eq!(
            resolve(base, Path::new("fuel.raw")),
            PathBuf::from("/data/volumes/fuel.raw")
        );
        assert_eq!(
            resolve(base, Path::new("/tmp/fuel.raw")),
            PathBuf::from("/tmp/fuel.raw")
        );
    }
}

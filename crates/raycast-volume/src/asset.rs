use anyhow::{
    ensure,
    Context,
    Result,
};
use raycast_base::path::get_asset_root;
use std::{
    fs::File,
    path::{
        Path,
        PathBuf,
    },
};

struct Dataset {
    name: &'static str,
    url: &'static str,
    size: u64,
}

const DATASETS: &[Dataset] = &[Dataset {
    // https://klacansky.com/open-scivis-datasets/
    name: "fuel_64x64x64_uint8.raw",
    url: "https://klacansky.com/open-scivis-datasets/fuel/fuel_64x64x64_uint8.raw",
    size: 64 * 64 * 64,
}];

fn partial_path(local_path: &Path) -> PathBuf {
    let mut name = local_path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    local_path.with_file_name(name)
}

fn has_size(path: &Path, size: u64) -> bool {
    std::fs::metadata(path).is_ok_and(|metadata| metadata.len() == size)
}

/// Writes through `fetch` into a sibling file and moves it to `local_path` only once it holds
/// `size` bytes. Nothing is left behind on failure.
fn fetch_into(
    local_path: &Path,
    size: u64,
    fetch: impl FnOnce(&mut File) -> Result<()>,
) -> Result<()> {
    let partial = partial_path(local_path);
    let result = File::create(&partial)
        .map_err(anyhow::Error::from)
        .and_then(|mut file| fetch(&mut file))
        .and_then(|_| {
            let written = std::fs::metadata(&partial)?.len();
            ensure!(
                written == size,
                "{:?} has {} bytes, expected {}",
                local_path,
                written,
                size
            );
            Ok(())
        });
    match result {
        Ok(()) => std::fs::rename(&partial, local_path)
            .with_context(|| format!("failed to move download to {:?}", local_path)),
        Err(error) => {
            if partial.exists() {
                std::fs::remove_file(&partial)?;
            }
            Err(error)
        }
    }
}

fn download_url(url: &str, local_path: &Path, size: u64) -> Result<()> {
    fetch_into(local_path, size, |file| {
        let mut response = reqwest::blocking::get(url)?.error_for_status()?;
        std::io::copy(&mut response, file)?;
        Ok(())
    })
}

pub fn init() -> Result<()> {
    log::info!("Building assets");
    let asset_root = get_asset_root()?;
    if !asset_root.exists() {
        log::info!("Create asset directory: {:?}", asset_root);
        std::fs::create_dir_all(&asset_root)?;
    }

    log::info!("Volume data sets");
    for dataset in DATASETS {
        let local_path = asset_root.join(dataset.name);
        if has_size(&local_path, dataset.size) {
            log::info!("- Skip downloading {}", dataset.name);
            continue;
        }
        if local_path.exists() {
            log::warn!("- Replace truncated {}", dataset.name);
        }
        log::info!("- Download {}", dataset.name);
        download_url(dataset.url, &local_path, dataset.size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("raycast-asset-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_fetch_into_commits_complete_file() {
        let dir = temp_dir("complete");
        let path = dir.join("volume.raw");
        fetch_into(&path, 4, |file| Ok(file.write_all(&[1, 2, 3, 4])?)).unwrap();
        assert!(has_size(&path, 4));
        assert!(!partial_path(&path).exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_fetch_into_leaves_nothing_on_failure() {
        let dir = temp_dir("failure");
        let path = dir.join("volume.raw");

        let result = fetch_into(&path, 4, |file| {
            file.write_all(&[1, 2])?;
            anyhow::bail!("connection reset")
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());

        // short transfer
        assert!(fetch_into(&path, 4, |file| Ok(file.write_all(&[1, 2])?)).is_err());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_truncated_file_is_not_complete() {
        let dir = temp_dir("truncated");
        let path = dir.join("volume.raw");
        std::fs::write(&path, [0u8; 3]).unwrap();
        assert!(!has_size(&path, 4));
        assert!(!has_size(&dir.join("missing.raw"), 4));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

use crate::{
    image_stack::ImageStackSource,
    params::RaycastParams,
    procedural::{
        Field,
        ProceduralSource,
    },
    raw::{
        RawVolumeDescriptor,
        RawVolumeSource,
    },
    source::VolumeSource,
    transfer::{
        StaticTransferFunction,
        TransferFunction,
        TransferFunctionDescriptor,
    },
};
use anyhow::{
    bail,
    ensure,
    Result,
};
use raycast_base::path::{
    get_asset_root,
    get_scene_config_root,
    resolve,
};
use serde::Deserialize;
use std::path::{
    Path,
    PathBuf,
};

fn default_spacing() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_frames() -> u32 {
    1
}

/// Relative paths are looked up in the asset directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VolumeDescriptor {
    Raw(RawVolumeDescriptor),
    ImageStack {
        directory: PathBuf,
        #[serde(default = "default_spacing")]
        spacing: [f32; 3],
    },
    Procedural {
        field: Field,
        resolution: [u32; 3],
        #[serde(default = "default_frames")]
        frames: u32,
    },
}

fn default_chain_color() -> [f32; 4] {
    [0.2, 0.2, 0.2, 1.0]
}

/// Bounding box renderer chained in front of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ChainDescriptor {
    #[serde(default = "default_chain_color")]
    pub color: [f32; 4],
    #[serde(default)]
    pub padding: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescriptor {
    pub scene: String,
    pub volume: VolumeDescriptor,
    #[serde(default)]
    pub transfer_function: Option<TransferFunctionDescriptor>,
    #[serde(default)]
    pub params: RaycastParams,
    #[serde(default)]
    pub chain: Option<ChainDescriptor>,
}

impl SceneDescriptor {
    pub fn from_path(path: &Path) -> Result<Self> {
        ensure!(path.exists(), "Specified path doesn't exist: {:?}", path);

        let file = std::fs::File::open(path)?;
        let mut deserializer = serde_json::Deserializer::from_reader(file);
        let scene_descriptor = SceneDescriptor::deserialize(&mut deserializer)?;
        Ok(scene_descriptor)
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub name: String,
    pub volume: VolumeDescriptor,
    pub transfer_function: TransferFunctionDescriptor,
    pub params: RaycastParams,
    pub chain: Option<ChainDescriptor>,
}

impl Scene {
    pub fn from_scene_descriptor(desc: SceneDescriptor) -> Result<Self> {
        desc.params.validate()?;
        Ok(Self {
            name: desc.scene,
            volume: desc.volume,
            transfer_function: desc.transfer_function.unwrap_or_default(),
            params: desc.params,
            chain: desc.chain,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let scene_descriptor = SceneDescriptor::from_path(path)?;
        Self::from_scene_descriptor(scene_descriptor)
    }

    pub fn from_scene_name(scene_name: &str) -> Result<Self> {
        Self::find_in(&get_scene_config_root()?, scene_name)
    }

    fn find_in(config_root: &Path, scene_name: &str) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(config_root)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            let scene_desc = SceneDescriptor::from_path(&path)?;
            if scene_desc.scene == scene_name {
                log::info!("Scene {} from {:?}", scene_name, path);
                return Self::from_scene_descriptor(scene_desc);
            }
        }
        bail!("Scene not found: {}", scene_name);
    }

    pub fn create_volume_source(&self) -> Result<Box<dyn VolumeSource>> {
        self.create_volume_source_in(&get_asset_root()?)
    }

    pub fn create_volume_source_in(&self, asset_root: &Path) -> Result<Box<dyn VolumeSource>> {
        let source: Box<dyn VolumeSource> = match &self.volume {
            VolumeDescriptor::Raw(descriptor) => {
                Box::new(RawVolumeSource::new(descriptor.clone(), asset_root)?)
            }
            VolumeDescriptor::ImageStack { directory, spacing } => Box::new(ImageStackSource::open(
                &resolve(asset_root, directory),
                *spacing,
            )?),
            VolumeDescriptor::Procedural {
                field,
                resolution,
                frames,
            } => Box::new(ProceduralSource::new(*field, *resolution, *frames)?),
        };
        Ok(source)
    }

    pub fn create_transfer_function(&self) -> Result<StaticTransferFunction> {
        let transfer_function = TransferFunction::from_descriptor(&self.transfer_function)?;
        Ok(StaticTransferFunction::new(transfer_function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        params::RaycastMode,
        source::request_frame,
        transfer::{
            Preset,
            TransferFunctionSource,
        },
    };

    const PROCEDURAL_SCENE: &str = r#"{
        "scene": "lobb",
        "volume": { "type": "procedural", "field": "marschner_lobb", "resolution": [16, 16, 16] },
        "transfer_function": { "preset": "cool" },
        "params": { "mode": "aggregate" },
        "chain": { "padding": 0.1 }
    }"#;

    #[test]
    fn test_procedural_scene() {
        let desc: SceneDescriptor = serde_json::from_str(PROCEDURAL_SCENE).unwrap();
        let scene = Scene::from_scene_descriptor(desc).unwrap();
        assert_eq!(scene.name, "lobb");
        assert_eq!(scene.params.mode, RaycastMode::Aggregate);
        assert_eq!(scene.transfer_function, TransferFunctionDescriptor::Preset(Preset::Cool));
        let chain = scene.chain.unwrap();
        assert_eq!(chain.color, default_chain_color());
        assert_eq!(chain.padding, 0.1);

        let mut source = scene.create_volume_source_in(Path::new("/nonexistent")).unwrap();
        let frame = request_frame(source.as_mut(), 0).unwrap();
        assert_eq!(frame.metadata.resolution, [16, 16, 16]);
        assert_eq!(frame.metadata.frame_count, 1);

        let mut tf = scene.create_transfer_function().unwrap();
        assert!(tf.request().is_some());
    }

    #[test]
    fn test_raw_scene_defaults() {
        let json = r#"{
            "scene": "fuel",
            "volume": {
                "type": "raw",
                "path": "fuel_64x64x64_uint8.raw",
                "resolution": [64, 64, 64],
                "scalar_type": "unsigned_integer",
                "scalar_length": 1
            }
        }"#;
        let desc: SceneDescriptor = serde_json::from_str(json).unwrap();
        let scene = Scene::from_scene_descriptor(desc).unwrap();
        assert!(matches!(scene.volume, VolumeDescriptor::Raw(_)));
        assert_eq!(scene.transfer_function, TransferFunctionDescriptor::default());
        assert_eq!(scene.params, RaycastParams::default());
        assert!(scene.chain.is_none());
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let json = r#"{
            "scene": "broken",
            "volume": { "type": "procedural", "field": "sphere", "resolution": [4, 4, 4] },
            "params": { "ray_step_ratio": -1.0 }
        }"#;
        let desc: SceneDescriptor = serde_json::from_str(json).unwrap();
        assert!(Scene::from_scene_descriptor(desc).is_err());
    }

    #[test]
    fn test_find_scene_by_name() {
        let dir = std::env::temp_dir().join(format!("raycast-scene-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("lobb.json"), PROCEDURAL_SCENE).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a scene").unwrap();

        assert_eq!(Scene::find_in(&dir, "lobb").unwrap().name, "lobb");
        let error = Scene::find_in(&dir, "missing").unwrap_err();
        assert!(error.to_string().contains("Scene not found"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
